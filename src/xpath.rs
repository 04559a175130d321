//! XPath token lexer and restricted path parsers
//!
//! `must` and `when` arguments are only checked lexically at parse time:
//! the expression must tokenize and parentheses and brackets must balance.
//! The two restricted path languages used by leafref types and
//! instance-identifier values get real parsers producing step lists that
//! the resolver and the data layer walk.

use crate::error::{ErrorKind, Result, SchemaError};
use crate::names::{is_identifier, parse_identifier};

/// Lexical XPath token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `/`
    Slash,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `@`
    At,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// Name test or function name, optionally prefixed
    Name(String),
    /// Quoted string literal
    Literal(String),
    /// Number literal
    Number(String),
    /// Comparison or arithmetic operator
    Operator(String),
}

/// Tokenize an XPath expression
pub fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '.' => {
                if bytes.get(i + 1) == Some(&b'.') {
                    tokens.push(Token::DotDot);
                    i += 2;
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            '|' | '+' | '-' => {
                tokens.push(Token::Operator(c.to_string()));
                i += 1;
            }
            '=' => {
                tokens.push(Token::Operator("=".into()));
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return Err(bad_char(expr, i));
                }
                tokens.push(Token::Operator("!=".into()));
                i += 2;
            }
            '<' | '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Operator(format!("{}=", c)));
                    i += 2;
                } else {
                    tokens.push(Token::Operator(c.to_string()));
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(SchemaError::new(
                        ErrorKind::Inchar,
                        format!("unterminated literal in \"{}\"", expr),
                    )
                    .into());
                }
                tokens.push(Token::Literal(expr[start..j].to_string()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                tokens.push(Token::Number(expr[start..i].to_string()));
            }
            _ => {
                let consumed = parse_identifier(&expr[i..]);
                if consumed == 0 {
                    return Err(bad_char(expr, i));
                }
                let mut end = i + consumed;
                // prefixed name test
                if bytes.get(end) == Some(&b':') {
                    let more = parse_identifier(&expr[end + 1..]);
                    if more == 0 {
                        return Err(bad_char(expr, end + 1));
                    }
                    end += 1 + more;
                }
                tokens.push(Token::Name(expr[i..end].to_string()));
                i = end;
            }
        }
    }
    Ok(tokens)
}

fn bad_char(expr: &str, at: usize) -> crate::error::Error {
    let c = expr[at..].chars().next().unwrap_or(' ');
    SchemaError::new(
        ErrorKind::Inchar,
        format!("invalid character '{}' in expression \"{}\"", c, expr),
    )
    .into()
}

/// Lexical check of a `must`/`when` argument
///
/// Verifies the expression tokenizes and that parentheses and brackets
/// balance. Semantic resolution of the expression is not performed here.
pub fn syntax_check(expr: &str, line: u32) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(SchemaError::new(ErrorKind::Inarg, "empty XPath expression")
            .with_line(line)
            .into());
    }
    let tokens = tokenize(expr).map_err(|e| match e {
        crate::error::Error::Schema(se) => crate::error::Error::Schema(se.with_line(line)),
        other => other,
    })?;
    let mut parens = 0i32;
    let mut brackets = 0i32;
    for tok in &tokens {
        match tok {
            Token::LParen => parens += 1,
            Token::RParen => parens -= 1,
            Token::LBracket => brackets += 1,
            Token::RBracket => brackets -= 1,
            _ => {}
        }
        if parens < 0 || brackets < 0 {
            return Err(SchemaError::new(
                ErrorKind::Inarg,
                format!("unbalanced expression \"{}\"", expr),
            )
            .with_line(line)
            .into());
        }
    }
    if parens != 0 || brackets != 0 {
        return Err(SchemaError::new(
            ErrorKind::Inarg,
            format!("unbalanced expression \"{}\"", expr),
        )
        .with_line(line)
        .into());
    }
    Ok(())
}

// =============================================================================
// Leafref path
// =============================================================================

/// Key predicate of one leafref path step, `[key = current()/../rel]`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPredicate {
    /// Prefix of the key leaf name
    pub key_prefix: Option<String>,
    /// Key leaf name
    pub key: String,
    /// Number of `../` steps after `current()`
    pub up: u32,
    /// Node names walked down after the `../` steps
    pub rel: Vec<(Option<String>, String)>,
}

/// One `/prefix:name[preds]` step of a leafref path
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    /// Step prefix, when qualified
    pub prefix: Option<String>,
    /// Step node name
    pub name: String,
    /// Key predicates attached to the step
    pub predicates: Vec<KeyPredicate>,
}

/// Parsed leafref `path` argument
#[derive(Debug, Clone, PartialEq)]
pub struct LeafrefPath {
    /// True for paths starting with `/`
    pub absolute: bool,
    /// Number of leading `../` steps of a relative path
    pub up: u32,
    /// Steps walked downwards
    pub steps: Vec<PathStep>,
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self
            .s[self.pos..]
            .chars()
            .next()
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    fn eat(&mut self, lit: &str) -> bool {
        if self.s[self.pos..].starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    fn done(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn node_id(&mut self) -> Result<(Option<String>, String)> {
        let rest = &self.s[self.pos..];
        let len = parse_identifier(rest);
        if len == 0 {
            return Err(bad_char(self.s, self.pos));
        }
        let first = rest[..len].to_string();
        self.pos += len;
        if self.peek() == Some(':') {
            self.pos += 1;
            let rest = &self.s[self.pos..];
            let len2 = parse_identifier(rest);
            if len2 == 0 {
                return Err(bad_char(self.s, self.pos));
            }
            let second = rest[..len2].to_string();
            self.pos += len2;
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }
}

/// Parse a leafref `path` argument
pub fn parse_leafref_path(path: &str) -> Result<LeafrefPath> {
    let mut cur = Cursor::new(path.trim());
    let mut result = LeafrefPath {
        absolute: false,
        up: 0,
        steps: Vec::new(),
    };

    if cur.peek() == Some('/') {
        result.absolute = true;
    } else {
        while cur.eat("../") {
            result.up += 1;
        }
        if result.up == 0 {
            return Err(SchemaError::new(
                ErrorKind::Inarg,
                format!("invalid leafref path \"{}\"", path),
            )
            .into());
        }
    }

    loop {
        if result.absolute || !result.steps.is_empty() {
            if !cur.eat("/") {
                break;
            }
        }
        let (prefix, name) = cur.node_id()?;
        let mut step = PathStep {
            prefix,
            name,
            predicates: Vec::new(),
        };
        while cur.peek() == Some('[') {
            step.predicates.push(parse_key_predicate(&mut cur)?);
        }
        result.steps.push(step);
    }

    if result.steps.is_empty() || !cur.done() {
        return Err(SchemaError::new(
            ErrorKind::Inarg,
            format!("invalid leafref path \"{}\"", path),
        )
        .into());
    }
    Ok(result)
}

fn parse_key_predicate(cur: &mut Cursor<'_>) -> Result<KeyPredicate> {
    let fail = |cur: &Cursor<'_>| -> crate::error::Error {
        SchemaError::new(
            ErrorKind::Inarg,
            format!("invalid path predicate in \"{}\"", cur.s),
        )
        .into()
    };

    if !cur.eat("[") {
        return Err(fail(cur));
    }
    cur.skip_ws();
    let (key_prefix, key) = cur.node_id()?;
    cur.skip_ws();
    if !cur.eat("=") {
        return Err(fail(cur));
    }
    cur.skip_ws();
    if !cur.eat("current") {
        return Err(fail(cur));
    }
    cur.skip_ws();
    if !cur.eat("(") {
        return Err(fail(cur));
    }
    cur.skip_ws();
    if !cur.eat(")") {
        return Err(fail(cur));
    }
    cur.skip_ws();
    if !cur.eat("/") {
        return Err(fail(cur));
    }
    let mut up = 0u32;
    while cur.eat("../") {
        up += 1;
    }
    if up == 0 {
        return Err(fail(cur));
    }
    let mut rel = vec![cur.node_id()?];
    while cur.peek() == Some('/') {
        cur.pos += 1;
        rel.push(cur.node_id()?);
    }
    cur.skip_ws();
    if !cur.eat("]") {
        return Err(fail(cur));
    }
    Ok(KeyPredicate {
        key_prefix,
        key,
        up,
        rel,
    })
}

// =============================================================================
// Instance identifier
// =============================================================================

/// One predicate of an instance-identifier step
#[derive(Debug, Clone, PartialEq)]
pub enum InstPredicate {
    /// `[key='value']`
    Key {
        /// Key leaf prefix
        prefix: Option<String>,
        /// Key leaf name
        name: String,
        /// Literal value
        value: String,
    },
    /// `[.='value']`, selects a leaf-list entry by value
    Value(String),
    /// `[N]`, selects the N-th instance, 1-based
    Position(u32),
}

/// One `/prefix:name[preds]` step of an instance identifier
#[derive(Debug, Clone, PartialEq)]
pub struct InstStep {
    /// Step prefix, when qualified
    pub prefix: Option<String>,
    /// Step node name
    pub name: String,
    /// Step predicates
    pub predicates: Vec<InstPredicate>,
}

/// Parse an instance-identifier value into its steps
pub fn parse_instance_path(path: &str) -> Result<Vec<InstStep>> {
    let trimmed = path.trim();
    let mut cur = Cursor::new(trimmed);
    let mut steps = Vec::new();
    let fail = || -> crate::error::Error {
        SchemaError::new(
            ErrorKind::Inarg,
            format!("invalid instance identifier \"{}\"", path),
        )
        .into()
    };

    while !cur.done() {
        if !cur.eat("/") {
            return Err(fail());
        }
        let (prefix, name) = cur.node_id()?;
        let mut step = InstStep {
            prefix,
            name,
            predicates: Vec::new(),
        };
        while cur.peek() == Some('[') {
            cur.pos += 1;
            cur.skip_ws();
            match cur.peek() {
                Some('.') => {
                    cur.pos += 1;
                    cur.skip_ws();
                    if !cur.eat("=") {
                        return Err(fail());
                    }
                    cur.skip_ws();
                    step.predicates.push(InstPredicate::Value(quoted(&mut cur)?));
                }
                Some(c) if c.is_ascii_digit() => {
                    let start = cur.pos;
                    while cur.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        cur.pos += 1;
                    }
                    let pos: u32 = cur.s[start..cur.pos].parse().map_err(|_| fail())?;
                    if pos == 0 {
                        return Err(fail());
                    }
                    step.predicates.push(InstPredicate::Position(pos));
                }
                _ => {
                    let (kp, kn) = cur.node_id()?;
                    cur.skip_ws();
                    if !cur.eat("=") {
                        return Err(fail());
                    }
                    cur.skip_ws();
                    step.predicates.push(InstPredicate::Key {
                        prefix: kp,
                        name: kn,
                        value: quoted(&mut cur)?,
                    });
                }
            }
            cur.skip_ws();
            if !cur.eat("]") {
                return Err(fail());
            }
        }
        steps.push(step);
    }

    if steps.is_empty() {
        return Err(fail());
    }
    Ok(steps)
}

fn quoted(cur: &mut Cursor<'_>) -> Result<String> {
    let quote = match cur.peek() {
        Some(q @ ('\'' | '"')) => q,
        _ => {
            return Err(SchemaError::new(
                ErrorKind::Inarg,
                format!("expected quoted value in \"{}\"", cur.s),
            )
            .into())
        }
    };
    cur.pos += 1;
    let start = cur.pos;
    while let Some(c) = cur.peek() {
        if c == quote {
            let value = cur.s[start..cur.pos].to_string();
            cur.pos += 1;
            return Ok(value);
        }
        cur.pos += c.len_utf8();
    }
    Err(SchemaError::new(
        ErrorKind::Inarg,
        format!("unterminated literal in \"{}\"", cur.s),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_expression() {
        let tokens = tokenize("../interface[name = current()/../ifname]").unwrap();
        assert!(tokens.contains(&Token::DotDot));
        assert!(tokens.contains(&Token::Name("interface".into())));
        assert!(tokens.contains(&Token::Operator("=".into())));
    }

    #[test]
    fn test_syntax_check() {
        assert!(syntax_check("count(interface) > 0 and enabled = 'true'", 1).is_ok());
        assert!(syntax_check("(a or b", 1).is_err());
        assert!(syntax_check("a]b", 1).is_err());
        assert!(syntax_check("a # b", 1).is_err());
        assert!(syntax_check("   ", 1).is_err());
    }

    #[test]
    fn test_parse_leafref_absolute() {
        let path = parse_leafref_path("/if:interfaces/if:interface/if:name").unwrap();
        assert!(path.absolute);
        assert_eq!(path.up, 0);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].prefix.as_deref(), Some("if"));
        assert_eq!(path.steps[2].name, "name");
    }

    #[test]
    fn test_parse_leafref_relative_with_predicate() {
        let path =
            parse_leafref_path("../../interface[name = current()/../ifname]/address").unwrap();
        assert!(!path.absolute);
        assert_eq!(path.up, 2);
        assert_eq!(path.steps.len(), 2);
        let pred = &path.steps[0].predicates[0];
        assert_eq!(pred.key, "name");
        assert_eq!(pred.up, 1);
        assert_eq!(pred.rel, vec![(None, "ifname".to_string())]);
    }

    #[test]
    fn test_parse_leafref_rejects_garbage() {
        assert!(parse_leafref_path("interfaces/name").is_err());
        assert!(parse_leafref_path("/a//b").is_err());
        assert!(parse_leafref_path("").is_err());
    }

    #[test]
    fn test_parse_instance_path() {
        let steps =
            parse_instance_path("/net:interfaces/net:interface[net:name='eth0']/net:mtu").unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[1].predicates[0],
            InstPredicate::Key {
                prefix: Some("net".into()),
                name: "name".into(),
                value: "eth0".into()
            }
        );
    }

    #[test]
    fn test_parse_instance_path_value_and_position() {
        let steps = parse_instance_path("/m:servers/m:server[.='a'][2]").unwrap();
        assert_eq!(
            steps[1].predicates,
            vec![
                InstPredicate::Value("a".into()),
                InstPredicate::Position(2)
            ]
        );
        assert!(parse_instance_path("no-slash").is_err());
        assert!(parse_instance_path("/m:x[0]").is_err());
    }
}
