//! YIN XML front-end
//!
//! Maps the XML serialization of YANG onto the shared statement tree.
//! Each YIN element in the YIN namespace is one statement; its argument
//! is carried either in an attribute or, for the text-valued statements,
//! in a child element. Elements from other namespaces are extension
//! instances and are skipped with their subtree.

use super::Stmt;
use crate::error::{ErrorKind, Result, SchemaError};
use crate::xml::Element;

/// Namespace of YIN documents
pub const YIN_NS: &str = "urn:ietf:params:xml:ns:yang:yin:1";

/// How a statement's argument is encoded in YIN
enum ArgSpec {
    /// In the named attribute
    Attr(&'static str),
    /// In the text of the named child element
    Elem(&'static str),
    /// The statement takes no argument
    None,
}

fn arg_spec(keyword: &str) -> ArgSpec {
    match keyword {
        "module" | "submodule" | "feature" | "identity" | "typedef" | "grouping"
        | "container" | "leaf" | "leaf-list" | "list" | "choice" | "case" | "anyxml" | "rpc"
        | "notification" | "bit" | "enum" | "base" | "type" | "if-feature" | "uses"
        | "extension" => ArgSpec::Attr("name"),
        "import" | "include" | "belongs-to" => ArgSpec::Attr("module"),
        "namespace" => ArgSpec::Attr("uri"),
        "unique" => ArgSpec::Attr("tag"),
        "revision" | "revision-date" => ArgSpec::Attr("date"),
        "augment" | "refine" | "deviation" => ArgSpec::Attr("target-node"),
        "when" | "must" => ArgSpec::Attr("condition"),
        "organization" | "contact" | "description" | "reference" => ArgSpec::Elem("text"),
        "error-message" => ArgSpec::Elem("value"),
        "input" | "output" => ArgSpec::None,
        // prefix, presence, units, default, config, mandatory, status,
        // value, position, fraction-digits, min/max-elements, ordered-by,
        // require-instance, key, unique, length, range, pattern,
        // error-app-tag, yang-version and path all use a value attribute
        _ => ArgSpec::Attr("value"),
    }
}

/// Argument child elements consumed by [`arg_spec`], not sub-statements
fn is_arg_element(keyword: &str, child: &Element) -> bool {
    match arg_spec(keyword) {
        ArgSpec::Elem(name) => child.name == name,
        _ => false,
    }
}

/// Parse a YIN document into its top-level statement
pub(crate) fn parse(data: &str) -> Result<Stmt> {
    let root = Element::parse(data)?;
    if root.ns.as_deref() != Some(YIN_NS) {
        return Err(SchemaError::new(
            ErrorKind::Inmod,
            format!(
                "root element \"{}\" is not in the YIN namespace",
                root.name
            ),
        )
        .with_line(root.line)
        .into());
    }
    element_to_stmt(&root)
}

fn element_to_stmt(elem: &Element) -> Result<Stmt> {
    let keyword = elem.name.clone();
    let arg = match arg_spec(&keyword) {
        ArgSpec::Attr(attr) => match elem.attr(attr) {
            Some(value) => Some(value.to_string()),
            None => None,
        },
        ArgSpec::Elem(name) => match elem.child(name) {
            Some(child) => Some(child.text_or_empty().to_string()),
            None => None,
        },
        ArgSpec::None => None,
    };

    let mut stmt = Stmt {
        keyword,
        arg,
        children: Vec::new(),
        line: elem.line,
    };
    for child in &elem.children {
        if child.ns.as_deref() != Some(YIN_NS) {
            // extension instance from another namespace
            continue;
        }
        if is_arg_element(&stmt.keyword, child) {
            continue;
        }
        stmt.children.push(element_to_stmt(child)?);
    }
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yin_module() {
        let stmt = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <module name="test" xmlns="urn:ietf:params:xml:ns:yang:yin:1">
              <namespace uri="urn:test"/>
              <prefix value="t"/>
              <description><text>demo module</text></description>
              <leaf name="x"><type name="string"/></leaf>
            </module>"#,
        )
        .unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg.as_deref(), Some("test"));
        assert_eq!(stmt.children[0].keyword, "namespace");
        assert_eq!(stmt.children[0].arg.as_deref(), Some("urn:test"));
        let dsc = &stmt.children[2];
        assert_eq!(dsc.keyword, "description");
        assert_eq!(dsc.arg.as_deref(), Some("demo module"));
        // the <text> argument element is not a sub-statement
        assert!(dsc.children.is_empty());
        let leaf = &stmt.children[3];
        assert_eq!(leaf.children[0].keyword, "type");
        assert_eq!(leaf.children[0].arg.as_deref(), Some("string"));
    }

    #[test]
    fn test_wrong_namespace_rejected() {
        let err = parse(r#"<module name="m" xmlns="urn:other"/>"#).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Inmod));
    }

    #[test]
    fn test_foreign_children_skipped() {
        let stmt = parse(
            r#"<module name="m" xmlns="urn:ietf:params:xml:ns:yang:yin:1"
                       xmlns:x="urn:vendor">
              <namespace uri="urn:m"/>
              <prefix value="m"/>
              <x:annotation/>
            </module>"#,
        )
        .unwrap();
        assert_eq!(stmt.children.len(), 2);
    }
}
