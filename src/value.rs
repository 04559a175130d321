//! Lexical to typed value decoding
//!
//! [`decode`] turns the text content of a leaf into a typed [`Value`]
//! according to the leaf's derivation chain. Restrictions found along the
//! chain compose by intersection: ranges and lengths become a sorted list
//! of disjoint intervals, patterns all apply, enumerations and bit sets
//! may only shrink. Union alternatives are tried strictly in written
//! order and the first accepting type wins.

use crate::context::Context;
use crate::error::{DataError, ErrorKind, Result};
use crate::schema::{IdentId, ModId, TypeBase, TypeId, TypeInfo};
use base64::Engine;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// Decoded typed value of a leaf or leaf-list node
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// binary, the decoded payload
    Binary(Vec<u8>),
    /// bits, set bit names ordered by position
    Bits(Vec<Arc<str>>),
    /// boolean
    Bool(bool),
    /// decimal64
    Dec64(Decimal),
    /// empty
    Empty,
    /// enumeration member name
    Enum(Arc<str>),
    /// identityref, the resolved identity
    Ident(IdentId),
    /// instance-identifier path in canonical form
    InstId(Arc<str>),
    /// string
    Str(Arc<str>),
    /// signed integer, any width
    Int(i64),
    /// unsigned integer, any width
    Uint(u64),
}

impl Value {
    /// Canonical lexical form used for comparisons and printing
    pub fn canonical(&self, ctx: &Context) -> String {
        match self {
            Value::Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Value::Bits(names) => names
                .iter()
                .map(|n| n.as_ref())
                .collect::<Vec<_>>()
                .join(" "),
            Value::Bool(b) => b.to_string(),
            Value::Dec64(d) => d.to_string(),
            Value::Empty => String::new(),
            Value::Enum(name) => name.to_string(),
            Value::Ident(id) => format!(
                "{}:{}",
                ctx.module(id.module).name,
                ctx.module(id.module).identities[id.index].name
            ),
            Value::InstId(path) => path.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
        }
    }
}

/// Reference to the type that deferred its check to the data layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRef {
    /// Leafref to resolve against the finished data tree
    Leafref(TypeId),
    /// Instance identifier to resolve against the finished data tree
    InstId,
}

/// Result of decoding one lexical value
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The typed value
    pub value: Value,
    /// Set when resolution continues after the data tree is complete
    pub pending: Option<PendingRef>,
}

impl Decoded {
    fn done(value: Value) -> Self {
        Self {
            value,
            pending: None,
        }
    }
}

/// Maps an XML prefix to the name of the module bound to it
pub type PrefixResolver<'a> = dyn Fn(&str) -> Option<Arc<str>> + 'a;

fn inval(name: &str, value: &str) -> crate::error::Error {
    DataError::new(
        ErrorKind::Inval,
        format!("invalid value \"{}\" of \"{}\"", value, name),
    )
    .into()
}

fn oorval(name: &str, value: &str) -> crate::error::Error {
    DataError::new(
        ErrorKind::Oorval,
        format!("value \"{}\" of \"{}\" is out of range", value, name),
    )
    .into()
}

/// Decode a lexical value against a type descriptor
///
/// `name` is the data node name used in diagnostics; `resolver` maps XML
/// prefixes to module names for identityref and instance-identifier
/// content. `opts` are the data parser option bits.
pub fn decode(
    ctx: &Context,
    module: ModId,
    name: &str,
    tid: TypeId,
    lexical: &str,
    opts: u32,
    resolver: &PrefixResolver<'_>,
) -> Result<Decoded> {
    let chain = ctx.type_chain(tid);
    let base = ctx.stype(tid).base;
    match base {
        TypeBase::Unknown => Err(crate::error::Error::Internal(format!(
            "decoding against unresolved type of \"{}\"",
            name
        ))),
        TypeBase::Binary => {
            let cleaned: String = lexical.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|_| inval(name, lexical))?;
            let lengths = effective_lengths(ctx, &chain, binary_length_of)?;
            if !in_ranges(&lengths, bytes.len() as u64) {
                return Err(oorval(name, lexical));
            }
            Ok(Decoded::done(Value::Binary(bytes)))
        }
        TypeBase::Bits => {
            let bits = match find_info(ctx, &chain, |info| match info {
                TypeInfo::Bits { bits } => Some(bits),
                _ => None,
            }) {
                Some(bits) => bits,
                None => return Err(inval(name, lexical)),
            };
            let mut set: Vec<(u32, Arc<str>)> = Vec::new();
            for token in lexical.split_whitespace() {
                let def = bits
                    .iter()
                    .find(|b| &*b.name == token)
                    .ok_or_else(|| inval(name, lexical))?;
                if set.iter().any(|(_, n)| &**n == token) {
                    return Err(inval(name, lexical));
                }
                set.push((def.pos, Arc::clone(&def.name)));
            }
            set.sort_by_key(|(pos, _)| *pos);
            Ok(Decoded::done(Value::Bits(
                set.into_iter().map(|(_, n)| n).collect(),
            )))
        }
        TypeBase::Bool => match lexical {
            "true" => Ok(Decoded::done(Value::Bool(true))),
            "false" => Ok(Decoded::done(Value::Bool(false))),
            _ => Err(inval(name, lexical)),
        },
        TypeBase::Dec64 => decode_dec64(ctx, &chain, name, lexical),
        TypeBase::Empty => {
            if lexical.is_empty() {
                Ok(Decoded::done(Value::Empty))
            } else {
                Err(inval(name, lexical))
            }
        }
        TypeBase::Enum => {
            let enums = match find_info(ctx, &chain, |info| match info {
                TypeInfo::Enums { enums } => Some(enums),
                _ => None,
            }) {
                Some(enums) => enums,
                None => return Err(inval(name, lexical)),
            };
            let member = enums
                .iter()
                .find(|e| &*e.name == lexical)
                .ok_or_else(|| inval(name, lexical))?;
            Ok(Decoded::done(Value::Enum(Arc::clone(&member.name))))
        }
        TypeBase::Ident => {
            let canonical = transform_xml_value(lexical.trim(), resolver)
                .ok_or_else(|| inval(name, lexical))?;
            let declared = find_info(ctx, &chain, |info| match info {
                TypeInfo::Ident {
                    base: Some(base), ..
                } => Some(*base),
                _ => None,
            });
            let ident = resolve_identref(ctx, module, declared, &canonical)
                .ok_or_else(|| inval(name, lexical))?;
            Ok(Decoded::done(Value::Ident(ident)))
        }
        TypeBase::InstId => {
            let canonical = transform_xml_value(lexical.trim(), resolver)
                .ok_or_else(|| inval(name, lexical))?;
            crate::xpath::parse_instance_path(&canonical)?;
            let value = Value::InstId(ctx.dict.insert_owned(canonical));
            if opts & (crate::data::options::EDIT | crate::data::options::FILTER) != 0 {
                Ok(Decoded::done(value))
            } else {
                Ok(Decoded {
                    value,
                    pending: Some(PendingRef::InstId),
                })
            }
        }
        TypeBase::Leafref => {
            let lref = chain
                .iter()
                .find(|&&t| {
                    matches!(ctx.stype(t).info, TypeInfo::Leafref { path: Some(_), .. })
                })
                .copied()
                .ok_or_else(|| inval(name, lexical))?;
            if opts & (crate::data::options::EDIT | crate::data::options::FILTER) != 0 {
                // decode against the target's effective type instead
                let target = match &ctx.stype(lref).info {
                    TypeInfo::Leafref {
                        target: Some(t), ..
                    } => *t,
                    _ => return Err(inval(name, lexical)),
                };
                let target_type = match &ctx.snode(target).kind {
                    crate::schema::SnodeKind::Leaf { type_, .. } => *type_,
                    crate::schema::SnodeKind::LeafList { type_, .. } => *type_,
                    _ => return Err(inval(name, lexical)),
                };
                let effective = non_leafref_type(ctx, target_type).ok_or_else(|| inval(name, lexical))?;
                decode(ctx, module, name, effective, lexical, opts, resolver)
            } else {
                Ok(Decoded {
                    value: Value::Str(ctx.dict.insert(lexical)),
                    pending: Some(PendingRef::Leafref(lref)),
                })
            }
        }
        TypeBase::Str => {
            let lengths = effective_lengths(ctx, &chain, string_length_of)?;
            if !in_ranges(&lengths, lexical.chars().count() as u64) {
                return Err(oorval(name, lexical));
            }
            // ancestor-most patterns apply first
            for &link in chain.iter().rev() {
                if let TypeInfo::Str { patterns, .. } = &ctx.stype(link).info {
                    for pattern in patterns {
                        if !pattern.regex()?.is_match(lexical) {
                            return Err(inval(name, lexical));
                        }
                    }
                }
            }
            Ok(Decoded::done(Value::Str(ctx.dict.insert(lexical))))
        }
        TypeBase::Union => {
            for alt in union_alternatives(ctx, &chain) {
                if let Ok(decoded) = decode(ctx, module, name, alt, lexical, opts, resolver) {
                    return Ok(decoded);
                }
            }
            Err(inval(name, lexical))
        }
        TypeBase::Int8 => decode_int(ctx, &chain, name, lexical, i8::MIN as i64, i8::MAX as i64),
        TypeBase::Int16 => decode_int(ctx, &chain, name, lexical, i16::MIN as i64, i16::MAX as i64),
        TypeBase::Int32 => decode_int(ctx, &chain, name, lexical, i32::MIN as i64, i32::MAX as i64),
        TypeBase::Int64 => decode_int(ctx, &chain, name, lexical, i64::MIN, i64::MAX),
        TypeBase::Uint8 => decode_uint(ctx, &chain, name, lexical, u8::MAX as u64),
        TypeBase::Uint16 => decode_uint(ctx, &chain, name, lexical, u16::MAX as u64),
        TypeBase::Uint32 => decode_uint(ctx, &chain, name, lexical, u32::MAX as u64),
        TypeBase::Uint64 => decode_uint(ctx, &chain, name, lexical, u64::MAX),
    }
}

/// Walk leafref indirections until a non-leafref descriptor
pub(crate) fn non_leafref_type(ctx: &Context, tid: TypeId) -> Option<TypeId> {
    let mut current = tid;
    for _ in 0..32 {
        if ctx.stype(current).base != TypeBase::Leafref {
            return Some(current);
        }
        let chain = ctx.type_chain(current);
        let target = chain.iter().find_map(|&t| match &ctx.stype(t).info {
            TypeInfo::Leafref {
                target: Some(target),
                ..
            } => Some(*target),
            _ => None,
        })?;
        current = match &ctx.snode(target).kind {
            crate::schema::SnodeKind::Leaf { type_, .. } => *type_,
            crate::schema::SnodeKind::LeafList { type_, .. } => *type_,
            _ => return None,
        };
    }
    None
}

/// Union alternatives in significance order, nested unions flattened
fn union_alternatives(ctx: &Context, chain: &[TypeId]) -> Vec<TypeId> {
    let mut out = Vec::new();
    for &link in chain {
        if let TypeInfo::Union { types } = &ctx.stype(link).info {
            out.extend(types.iter().copied());
        }
    }
    out
}

/// Nearest base-specific info along the chain, the derived end first
fn find_info<'a, T>(
    ctx: &'a Context,
    chain: &[TypeId],
    mut pick: impl FnMut(&'a TypeInfo) -> Option<T>,
) -> Option<T> {
    chain.iter().find_map(|&id| pick(&ctx.stype(id).info))
}

fn string_length_of(info: &TypeInfo) -> Option<&crate::schema::Restr> {
    match info {
        TypeInfo::Str { length, .. } => length.as_ref(),
        _ => None,
    }
}

fn binary_length_of(info: &TypeInfo) -> Option<&crate::schema::Restr> {
    match info {
        TypeInfo::Binary { length } => length.as_ref(),
        TypeInfo::Str { length, .. } => length.as_ref(),
        _ => None,
    }
}

// =============================================================================
// Interval machinery
// =============================================================================

/// Parse one range or length expression against the current bounds
///
/// Parts are separated by `|`; each part is a value or `lo..hi`, where
/// `min` and `max` refer to the bounds of the set restricted so far.
pub(crate) fn parse_range_expr<T, F>(
    expr: &str,
    cur_min: T,
    cur_max: T,
    parse: F,
) -> Option<Vec<(T, T)>>
where
    T: Copy + PartialOrd,
    F: Fn(&str) -> Option<T>,
{
    let mut out: Vec<(T, T)> = Vec::new();
    for part in expr.split('|') {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        let endpoint = |tok: &str| -> Option<T> {
            match tok {
                "min" => Some(cur_min),
                "max" => Some(cur_max),
                _ => parse(tok),
            }
        };
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (endpoint(lo.trim())?, endpoint(hi.trim())?),
            None => {
                let v = endpoint(part)?;
                (v, v)
            }
        };
        if hi < lo {
            return None;
        }
        if let Some(last) = out.last() {
            if lo <= last.1 {
                // parts must be ascending and disjoint
                return None;
            }
        }
        out.push((lo, hi));
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Intersect two sorted disjoint interval lists
pub(crate) fn intersect<T: Copy + PartialOrd>(a: &[(T, T)], b: &[(T, T)]) -> Vec<(T, T)> {
    let mut out = Vec::new();
    for &(alo, ahi) in a {
        for &(blo, bhi) in b {
            let lo = if alo > blo { alo } else { blo };
            let hi = if ahi < bhi { ahi } else { bhi };
            if lo <= hi {
                out.push((lo, hi));
            }
        }
    }
    out
}

/// Membership in a sorted disjoint interval list
pub(crate) fn in_ranges<T: Copy + PartialOrd>(set: &[(T, T)], v: T) -> bool {
    set.iter().any(|&(lo, hi)| v >= lo && v <= hi)
}

/// Effective range set of a numeric chain, built-in bounds first
fn effective_num_ranges<T, F>(
    ctx: &Context,
    chain: &[TypeId],
    natural: (T, T),
    parse: F,
) -> Result<Vec<(T, T)>>
where
    T: Copy + PartialOrd,
    F: Fn(&str) -> Option<T> + Copy,
{
    let mut set = vec![natural];
    for &link in chain.iter().rev() {
        let restr = match &ctx.stype(link).info {
            TypeInfo::Num { range } => range.as_ref(),
            TypeInfo::Dec64 { range, .. } => range.as_ref(),
            _ => None,
        };
        if let Some(restr) = restr {
            set = restrict(&set, &restr.expr, parse)?;
        }
    }
    Ok(set)
}

/// Effective length set of a string or binary chain
fn effective_lengths(
    ctx: &Context,
    chain: &[TypeId],
    pick: impl Fn(&TypeInfo) -> Option<&crate::schema::Restr>,
) -> Result<Vec<(u64, u64)>> {
    let mut set = vec![(0u64, u64::MAX)];
    for &link in chain.iter().rev() {
        if let Some(restr) = pick(&ctx.stype(link).info) {
            set = restrict(&set, &restr.expr, |tok| tok.parse::<u64>().ok())?;
        }
    }
    Ok(set)
}

fn restrict<T, F>(set: &[(T, T)], expr: &str, parse: F) -> Result<Vec<(T, T)>>
where
    T: Copy + PartialOrd,
    F: Fn(&str) -> Option<T>,
{
    let cur_min = set.first().map(|r| r.0).unwrap();
    let cur_max = set.last().map(|r| r.1).unwrap();
    let parsed = parse_range_expr(expr, cur_min, cur_max, parse).ok_or_else(|| {
        crate::error::Error::from(crate::error::SchemaError::new(
            ErrorKind::Inarg,
            format!("invalid range expression \"{}\"", expr),
        ))
    })?;
    let narrowed = intersect(set, &parsed);
    if narrowed.is_empty() {
        return Err(crate::error::SchemaError::new(
            ErrorKind::Inarg,
            format!("range \"{}\" is disjoint from its base type", expr),
        )
        .into());
    }
    Ok(narrowed)
}

// =============================================================================
// Numeric decoding
// =============================================================================

fn parse_i64(lexical: &str) -> Option<i64> {
    let t = lexical.trim();
    if t.is_empty() {
        return None;
    }
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        i128::from_str(digits).ok()?
    };
    let signed = if neg { -value } else { value };
    i64::try_from(signed).ok()
}

fn parse_u64(lexical: &str) -> Option<u64> {
    let t = lexical.trim();
    if t.is_empty() || t.starts_with('-') {
        return None;
    }
    let digits = t.strip_prefix('+').unwrap_or(t);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        u64::from_str(digits).ok()
    }
}

fn decode_int(
    ctx: &Context,
    chain: &[TypeId],
    name: &str,
    lexical: &str,
    min: i64,
    max: i64,
) -> Result<Decoded> {
    let num = parse_i64(lexical).ok_or_else(|| inval(name, lexical))?;
    if num < min || num > max {
        return Err(oorval(name, lexical));
    }
    let ranges = effective_num_ranges(ctx, chain, (min, max), parse_i64)?;
    if !in_ranges(&ranges, num) {
        return Err(oorval(name, lexical));
    }
    Ok(Decoded::done(Value::Int(num)))
}

fn decode_uint(
    ctx: &Context,
    chain: &[TypeId],
    name: &str,
    lexical: &str,
    max: u64,
) -> Result<Decoded> {
    let num = parse_u64(lexical).ok_or_else(|| inval(name, lexical))?;
    if num > max {
        return Err(oorval(name, lexical));
    }
    let ranges = effective_num_ranges(ctx, chain, (0, max), parse_u64)?;
    if !in_ranges(&ranges, num) {
        return Err(oorval(name, lexical));
    }
    Ok(Decoded::done(Value::Uint(num)))
}

fn decode_dec64(ctx: &Context, chain: &[TypeId], name: &str, lexical: &str) -> Result<Decoded> {
    let dig = find_info(ctx, chain, |info| match info {
        TypeInfo::Dec64 { dig, .. } if *dig > 0 => Some(*dig),
        _ => None,
    })
    .unwrap_or(0);
    if dig == 0 {
        return Err(crate::error::Error::Internal(format!(
            "decimal64 without fraction-digits on \"{}\"",
            name
        )));
    }

    // renormalize to a signed 64-bit integer scaled by 10^dig
    let t = lexical.trim();
    if t.is_empty() {
        return Err(inval(name, lexical));
    }
    let (neg, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(inval(name, lexical));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(inval(name, lexical));
    }
    if frac_part.len() > dig as usize {
        return Err(oorval(name, lexical));
    }

    let mut scaled: i64 = 0;
    let digits = int_part
        .chars()
        .chain(frac_part.chars())
        .chain(std::iter::repeat('0').take(dig as usize - frac_part.len()));
    for c in digits {
        let d = (c as u8 - b'0') as i64;
        scaled = scaled
            .checked_mul(10)
            .and_then(|v| {
                if neg {
                    v.checked_sub(d)
                } else {
                    v.checked_add(d)
                }
            })
            .ok_or_else(|| oorval(name, lexical))?;
    }

    let value = Decimal::new(scaled, dig as u32);
    let natural = (
        Decimal::new(i64::MIN, dig as u32),
        Decimal::new(i64::MAX, dig as u32),
    );
    let ranges = effective_num_ranges(ctx, chain, natural, |tok| Decimal::from_str(tok).ok())?;
    if !in_ranges(&ranges, value) {
        return Err(oorval(name, lexical));
    }
    Ok(Decoded::done(Value::Dec64(value)))
}

// =============================================================================
// Identity references
// =============================================================================

/// Rewrite the XML prefixes of a value into module names
///
/// This is the transform applied to identityref and instance-identifier
/// content: each `prefix:` whose prefix is declared in the XML scope is
/// replaced by the name of the module bound to that namespace.
pub(crate) fn transform_xml_value(
    value: &str,
    resolver: &PrefixResolver<'_>,
) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &value[i..];
        let id_len = crate::names::parse_identifier(rest);
        if id_len > 0 {
            let word = &rest[..id_len];
            if bytes.get(i + id_len) == Some(&b':')
                && crate::names::parse_identifier(&value[i + id_len + 1..]) > 0
            {
                out.push_str(&resolver(word)?);
            } else {
                out.push_str(word);
            }
            i += id_len;
        } else {
            let c = rest.chars().next()?;
            if c == '\'' || c == '"' {
                let quote = c;
                out.push(c);
                i += 1;
                while i < bytes.len() {
                    let c = value[i..].chars().next()?;
                    out.push(c);
                    i += c.len_utf8();
                    if c == quote {
                        break;
                    }
                }
            } else {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
    Some(out)
}

/// Resolve an identityref value in canonical `module:name` form
///
/// The value must name the declared base identity itself or one of its
/// transitive descendants. An unprefixed value refers to `from`'s module.
pub(crate) fn resolve_identref(
    ctx: &Context,
    from: ModId,
    declared: Option<IdentId>,
    value: &str,
) -> Option<IdentId> {
    let (module_name, local) = crate::names::split_prefixed(value);
    let target_module = match module_name {
        Some(name) => ctx.module_ids().find(|&id| &*ctx.module(id).name == name)?,
        None => from,
    };
    let index = ctx.module(target_module).identity_index(local)?;
    let candidate = IdentId {
        module: target_module,
        index,
    };
    match declared {
        None => Some(candidate),
        Some(base) => {
            // the declared base itself is accepted
            let mut current = Some(candidate);
            let mut depth = 0;
            while let Some(id) = current {
                if id == base {
                    return Some(candidate);
                }
                depth += 1;
                if depth > 64 {
                    return None;
                }
                current = ctx.module(id.module).identities[id.index].base;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_expr() {
        let set = parse_range_expr("0..10|20..30", 0u64, 255, |t| t.parse().ok()).unwrap();
        assert_eq!(set, vec![(0, 10), (20, 30)]);

        let set = parse_range_expr("min..5|max", 0u64, 255, |t| t.parse().ok()).unwrap();
        assert_eq!(set, vec![(0, 5), (255, 255)]);

        assert!(parse_range_expr("10..1", 0u64, 255, |t| t.parse().ok()).is_none());
        assert!(parse_range_expr("5|1..3", 0u64, 255, |t| t.parse().ok()).is_none());
    }

    #[test]
    fn test_intersect() {
        let a = [(0u64, 10), (20, 30)];
        let b = [(5u64, 25)];
        assert_eq!(intersect(&a, &b), vec![(5, 10), (20, 25)]);
        assert!(intersect(&a, &[(11u64, 19)]).is_empty());
    }

    #[test]
    fn test_in_ranges() {
        let set = [(0u64, 10), (20, 30)];
        assert!(in_ranges(&set, 0));
        assert!(in_ranges(&set, 25));
        assert!(!in_ranges(&set, 15));
        assert!(!in_ranges(&set, 31));
    }

    #[test]
    fn test_parse_i64() {
        assert_eq!(parse_i64("-128"), Some(-128));
        assert_eq!(parse_i64(" 42 "), Some(42));
        assert_eq!(parse_i64("0x10"), Some(16));
        assert_eq!(parse_i64("-0x10"), Some(-16));
        assert_eq!(parse_i64("12a"), None);
        assert_eq!(parse_i64(""), None);
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("255"), Some(255));
        assert_eq!(parse_u64("0xff"), Some(255));
        assert_eq!(parse_u64("-1"), None);
    }

    #[test]
    fn test_transform_xml_value() {
        let resolver = |prefix: &str| -> Option<Arc<str>> {
            match prefix {
                "p" => Some(Arc::from("mod-one")),
                _ => None,
            }
        };
        assert_eq!(
            transform_xml_value("/p:a/p:b[p:k='p:untouched']", &resolver).as_deref(),
            Some("/mod-one:a/mod-one:b[mod-one:k='p:untouched']")
        );
        assert_eq!(transform_xml_value("q:a", &resolver), None);
        assert_eq!(
            transform_xml_value("plain", &resolver).as_deref(),
            Some("plain")
        );
    }
}
