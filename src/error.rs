//! Error types for yangtree
//!
//! Every diagnostic carries a numeric kind, an optional source line and an
//! optional path locating the offending schema or data node. Schema-side
//! and data-side diagnostics are separate structs wrapped by the top-level
//! [`Error`] enum.

use std::fmt;
use thiserror::Error;

/// Result type alias using the yangtree [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// Allocation failure, fatal
    Mem = 1,
    /// Internal invariant broken, fatal
    Int,
    /// Lexical value does not match the type
    Inval,
    /// Value out of range or length
    Oorval,
    /// Bad character in an identifier or path
    Inchar,
    /// Unknown element
    Inelem,
    /// Required element absent
    Misselem,
    /// Unexpected attribute
    Inattr,
    /// Required attribute absent
    Missattr,
    /// Statement or attribute repeated where once is permitted
    TooMany,
    /// Duplicated sibling name
    DupName,
    /// Duplicated list instance
    DupList,
    /// Duplicated leaf-list value
    DupLeaflist,
    /// Import or identity cycle
    Circular,
    /// Leafref target does not exist or is not a leaf
    LeafrefTarget,
    /// Unknown module or namespace
    Inmod,
    /// Data from two cases of one choice
    McaseData,
    /// Invalid argument value of a statement or attribute
    Inarg,
    /// Statement placed under a parent that does not allow it
    BadNesting,
    /// Parameterized catch-all
    Spec,
}

impl ErrorKind {
    /// Numeric code of the kind
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Short mnemonic used in rendered diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Mem => "MEM",
            ErrorKind::Int => "INT",
            ErrorKind::Inval => "INVAL",
            ErrorKind::Oorval => "OORVAL",
            ErrorKind::Inchar => "INCHAR",
            ErrorKind::Inelem => "INELEM",
            ErrorKind::Misselem => "MISSELEM",
            ErrorKind::Inattr => "INATTR",
            ErrorKind::Missattr => "MISSATTR",
            ErrorKind::TooMany => "TOOMANY",
            ErrorKind::DupName => "DUPNAME",
            ErrorKind::DupList => "DUPLIST",
            ErrorKind::DupLeaflist => "DUPLEAFLIST",
            ErrorKind::Circular => "CIRCULAR",
            ErrorKind::LeafrefTarget => "LEAFREFTARGET",
            ErrorKind::Inmod => "INMOD",
            ErrorKind::McaseData => "MCASEDATA",
            ErrorKind::Inarg => "INARG",
            ErrorKind::BadNesting => "BADNESTING",
            ErrorKind::Spec => "SPEC",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic raised while parsing or resolving a schema
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Diagnostic kind
    pub kind: ErrorKind,
    /// Error message
    pub message: String,
    /// Source line in the schema input
    pub line: Option<u32>,
    /// Path of the offending schema node
    pub path: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            path: None,
        }
    }

    /// Set the source line
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Set the schema node path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        if let Some(ref path) = self.path {
            write!(f, " (path {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// Diagnostic raised while parsing or validating instance data
#[derive(Debug, Clone)]
pub struct DataError {
    /// Diagnostic kind
    pub kind: ErrorKind,
    /// Error message
    pub message: String,
    /// Source line in the data input
    pub line: Option<u32>,
    /// Path of the offending data node
    pub path: Option<String>,
}

impl DataError {
    /// Create a new data error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            path: None,
        }
    }

    /// Set the source line
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Set the data node path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        if let Some(ref path) = self.path {
            write!(f, " (path {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for DataError {}

/// Main error type for yangtree operations
#[derive(Error, Debug)]
pub enum Error {
    /// Schema parsing or resolution failed
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Data parsing or validation failed
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// XML is not well formed
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Diagnostic kind of this error, when it carries one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            Error::Data(e) => Some(e.kind),
            Error::Internal(_) => Some(ErrorKind::Int),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::new(ErrorKind::TooMany, "statement \"namespace\" repeated")
            .with_line(12)
            .with_path("/acme:top");

        let msg = format!("{}", err);
        assert!(msg.contains("TOOMANY"));
        assert!(msg.contains("line 12"));
        assert!(msg.contains("/acme:top"));
    }

    #[test]
    fn test_error_conversion_keeps_kind() {
        let err: Error = DataError::new(ErrorKind::DupList, "duplicated instance").into();
        assert_eq!(err.kind(), Some(ErrorKind::DupList));
    }

    #[test]
    fn test_kind_codes_are_distinct() {
        let kinds = [
            ErrorKind::Mem,
            ErrorKind::Inval,
            ErrorKind::Oorval,
            ErrorKind::DupLeaflist,
            ErrorKind::Spec,
        ];
        let mut codes: Vec<u32> = kinds.iter().map(|k| k.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}
