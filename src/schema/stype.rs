//! Type descriptors and restrictions
//!
//! A type is a derivation chain: the descriptor written on a leaf or
//! typedef points through [`TypeRef`] at its parent descriptor, ending at
//! a built-in base. Restrictions attach at any level and compose by
//! intersection when a value is decoded; the chain is never flattened.

use crate::error::{ErrorKind, Result, SchemaError};
use crate::schema::{IdentId, SnodeId, TpdfId, TypeId};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;

/// Built-in YANG type bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeBase {
    /// Not yet resolved
    Unknown,
    /// base64 encoded opaque data
    Binary,
    /// Named bit set
    Bits,
    /// `true` or `false`
    Bool,
    /// Scaled 64-bit decimal
    Dec64,
    /// Presence-only value
    Empty,
    /// Named enumeration
    Enum,
    /// Reference into an identity hierarchy
    Ident,
    /// Path into the data tree
    InstId,
    /// Reference to another leaf's value
    Leafref,
    /// Unicode string
    Str,
    /// Ordered list of alternative types
    Union,
    /// 8-bit signed
    Int8,
    /// 16-bit signed
    Int16,
    /// 32-bit signed
    Int32,
    /// 64-bit signed
    Int64,
    /// 8-bit unsigned
    Uint8,
    /// 16-bit unsigned
    Uint16,
    /// 32-bit unsigned
    Uint32,
    /// 64-bit unsigned
    Uint64,
}

impl TypeBase {
    /// Map a built-in type name
    pub fn from_name(name: &str) -> Option<TypeBase> {
        Some(match name {
            "binary" => TypeBase::Binary,
            "bits" => TypeBase::Bits,
            "boolean" => TypeBase::Bool,
            "decimal64" => TypeBase::Dec64,
            "empty" => TypeBase::Empty,
            "enumeration" => TypeBase::Enum,
            "identityref" => TypeBase::Ident,
            "instance-identifier" => TypeBase::InstId,
            "leafref" => TypeBase::Leafref,
            "string" => TypeBase::Str,
            "union" => TypeBase::Union,
            "int8" => TypeBase::Int8,
            "int16" => TypeBase::Int16,
            "int32" => TypeBase::Int32,
            "int64" => TypeBase::Int64,
            "uint8" => TypeBase::Uint8,
            "uint16" => TypeBase::Uint16,
            "uint32" => TypeBase::Uint32,
            "uint64" => TypeBase::Uint64,
            _ => return None,
        })
    }

    /// Canonical name of the base
    pub fn name(self) -> &'static str {
        match self {
            TypeBase::Unknown => "unknown",
            TypeBase::Binary => "binary",
            TypeBase::Bits => "bits",
            TypeBase::Bool => "boolean",
            TypeBase::Dec64 => "decimal64",
            TypeBase::Empty => "empty",
            TypeBase::Enum => "enumeration",
            TypeBase::Ident => "identityref",
            TypeBase::InstId => "instance-identifier",
            TypeBase::Leafref => "leafref",
            TypeBase::Str => "string",
            TypeBase::Union => "union",
            TypeBase::Int8 => "int8",
            TypeBase::Int16 => "int16",
            TypeBase::Int32 => "int32",
            TypeBase::Int64 => "int64",
            TypeBase::Uint8 => "uint8",
            TypeBase::Uint16 => "uint16",
            TypeBase::Uint32 => "uint32",
            TypeBase::Uint64 => "uint64",
        }
    }

    /// True for the signed integer bases
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            TypeBase::Int8 | TypeBase::Int16 | TypeBase::Int32 | TypeBase::Int64
        )
    }

    /// True for the unsigned integer bases
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeBase::Uint8 | TypeBase::Uint16 | TypeBase::Uint32 | TypeBase::Uint64
        )
    }

    /// True for any numeric base including decimal64
    pub fn is_numeric(self) -> bool {
        self.is_signed() || self.is_unsigned() || self == TypeBase::Dec64
    }
}

/// Restriction carrying a range or length expression
#[derive(Debug, Clone)]
pub struct Restr {
    /// The `range`/`length` argument as written
    pub expr: Arc<str>,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
    /// error-message sub-statement
    pub emsg: Option<Arc<str>>,
    /// error-app-tag sub-statement
    pub eapptag: Option<Arc<str>>,
}

impl Restr {
    /// Create a restriction from its expression
    pub fn new(expr: Arc<str>) -> Self {
        Self {
            expr,
            dsc: None,
            reference: None,
            emsg: None,
            eapptag: None,
        }
    }
}

/// One `pattern` restriction with its lazily compiled regex
#[derive(Debug)]
pub struct Pattern {
    /// Pattern expression as written
    pub expr: Arc<str>,
    /// error-message sub-statement
    pub emsg: Option<Arc<str>>,
    /// error-app-tag sub-statement
    pub eapptag: Option<Arc<str>>,
    compiled: OnceCell<Regex>,
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        // the compiled regex is a cache, clones recompile on demand
        Self {
            expr: Arc::clone(&self.expr),
            emsg: self.emsg.clone(),
            eapptag: self.eapptag.clone(),
            compiled: OnceCell::new(),
        }
    }
}

impl Pattern {
    /// Create a pattern restriction
    pub fn new(expr: Arc<str>) -> Self {
        Self {
            expr,
            emsg: None,
            eapptag: None,
            compiled: OnceCell::new(),
        }
    }

    /// Compiled, anchored regex for this pattern
    ///
    /// YANG patterns match the whole value. A begin anchor is prepended
    /// unless the expression already starts with `.*`, and an end anchor
    /// appended unless it ends with `.*`.
    pub fn regex(&self) -> Result<&Regex> {
        self.compiled
            .get_or_try_init(|| {
                let mut anchored = String::with_capacity(self.expr.len() + 2);
                if !self.expr.starts_with(".*") {
                    anchored.push('^');
                }
                anchored.push_str(&self.expr);
                if !self.expr.ends_with(".*") {
                    anchored.push('$');
                }
                Regex::new(&anchored).map_err(|e| {
                    SchemaError::new(
                        ErrorKind::Inarg,
                        format!("invalid pattern \"{}\": {}", self.expr, e),
                    )
                    .into()
                })
            })
    }
}

/// One member of an enumeration
#[derive(Debug, Clone)]
pub struct EnumDef {
    /// Member name
    pub name: Arc<str>,
    /// Assigned or auto-incremented value
    pub value: i32,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// One member of a bit set
#[derive(Debug, Clone)]
pub struct BitDef {
    /// Bit name
    pub name: Arc<str>,
    /// Assigned or auto-incremented position
    pub pos: u32,
    /// description sub-statement
    pub dsc: Option<Arc<str>>,
    /// reference sub-statement
    pub reference: Option<Arc<str>>,
}

/// One `unique` constraint of a list
#[derive(Debug, Clone, Default)]
pub struct UniqueSet {
    /// Schema node identifiers as written
    pub exprs: Vec<Arc<str>>,
    /// Resolved descendant leaves, filled by the resolver
    pub nodes: Vec<SnodeId>,
}

/// Base-specific payload of a type descriptor
#[derive(Debug, Clone, Default)]
pub enum TypeInfo {
    /// No base-specific restrictions
    #[default]
    None,
    /// binary: length restriction on the decoded payload
    Binary {
        /// length restriction
        length: Option<Restr>,
    },
    /// bits: ordered bit definitions
    Bits {
        /// bit definitions ordered by position
        bits: Vec<BitDef>,
    },
    /// decimal64: fraction-digits and range
    Dec64 {
        /// range restriction
        range: Option<Restr>,
        /// fraction-digits, zero on derived descriptors
        dig: u8,
    },
    /// enumeration: ordered members
    Enums {
        /// enumeration members
        enums: Vec<EnumDef>,
    },
    /// identityref: base identity
    Ident {
        /// base identity name in canonical `module:name` form
        base_name: Option<Arc<str>>,
        /// resolved base identity
        base: Option<IdentId>,
    },
    /// leafref: target path
    Leafref {
        /// path argument in canonical form
        path: Option<Arc<str>>,
        /// resolved target leaf
        target: Option<SnodeId>,
    },
    /// string: length and patterns
    Str {
        /// length restriction on code points
        length: Option<Restr>,
        /// pattern restrictions, all must match
        patterns: Vec<Pattern>,
    },
    /// union: ordered alternatives
    Union {
        /// member type descriptors in written order
        types: Vec<TypeId>,
    },
    /// integer bases: range restriction
    Num {
        /// range restriction
        range: Option<Restr>,
    },
}

/// Parent link of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    /// Chain terminates at a built-in base
    Builtin(TypeBase),
    /// Chain continues at a typedef
    Typedef(TpdfId),
}

/// One type descriptor in the context arena
#[derive(Debug, Clone)]
pub struct TypeSpec {
    /// Type name as written, local part
    pub name: Arc<str>,
    /// Module name when the reference was prefixed
    pub module_name: Option<Arc<str>>,
    /// Resolved base, `Unknown` until the resolver ran
    pub base: TypeBase,
    /// Parent descriptor, `None` until the resolver ran
    pub der: Option<TypeRef>,
    /// Base-specific payload
    pub info: TypeInfo,
    /// Source line of the `type` statement
    pub line: u32,
}

impl Default for TypeBase {
    fn default() -> Self {
        TypeBase::Unknown
    }
}

impl TypeSpec {
    /// Create an unresolved descriptor for a named type
    pub fn named(name: Arc<str>, module_name: Option<Arc<str>>, line: u32) -> Self {
        Self {
            name,
            module_name,
            base: TypeBase::Unknown,
            der: None,
            info: TypeInfo::None,
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_from_name() {
        assert_eq!(TypeBase::from_name("uint8"), Some(TypeBase::Uint8));
        assert_eq!(TypeBase::from_name("decimal64"), Some(TypeBase::Dec64));
        assert_eq!(TypeBase::from_name("my-type"), None);
    }

    #[test]
    fn test_base_classification() {
        assert!(TypeBase::Int64.is_signed());
        assert!(TypeBase::Uint8.is_unsigned());
        assert!(TypeBase::Dec64.is_numeric());
        assert!(!TypeBase::Str.is_numeric());
    }

    #[test]
    fn test_pattern_anchoring() {
        let p = Pattern::new(Arc::from("[a-z]+"));
        let re = p.regex().unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert!(!re.is_match("1abc"));

        let open = Pattern::new(Arc::from(".*suffix"));
        let re = open.regex().unwrap();
        assert!(re.is_match("anything suffix"));
        assert!(!re.is_match("suffix and more"));
    }

    #[test]
    fn test_pattern_clone_recompiles() {
        let p = Pattern::new(Arc::from("x"));
        p.regex().unwrap();
        let q = p.clone();
        assert!(q.regex().unwrap().is_match("x"));
    }

    #[test]
    fn test_bad_pattern_reports_inarg() {
        let p = Pattern::new(Arc::from("(unclosed"));
        let err = p.regex().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Inarg));
    }
}
