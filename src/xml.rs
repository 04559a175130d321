//! Owned XML element tree
//!
//! The schema YIN front-end and the data front-end both consume a fully
//! built element tree rather than a token stream. The tree is assembled
//! from `quick-xml` events; namespace declarations are resolved while
//! building so every element carries its namespace URI and the complete
//! prefix scope visible at its position. Source lines are computed from
//! the reader byte offset against a precomputed line index.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::sync::Arc;

/// XML attribute with its resolved namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    /// Attribute prefix as written
    pub prefix: Option<String>,
    /// Attribute local name
    pub name: String,
    /// Resolved namespace URI of a prefixed attribute
    pub ns: Option<Arc<str>>,
    /// Attribute value
    pub value: String,
}

/// XML element in the owned tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Element prefix as written
    pub prefix: Option<String>,
    /// Element local name
    pub name: String,
    /// Resolved namespace URI
    pub ns: Option<Arc<str>>,
    /// Attributes, namespace declarations excluded
    pub attrs: Vec<Attr>,
    /// Child elements
    pub children: Vec<Element>,
    /// Text content
    pub text: Option<String>,
    /// Line of the start tag in the source
    pub line: u32,
    /// Full prefix scope at this element, default namespace under ""
    pub scope: HashMap<String, Arc<str>>,
}

impl Element {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Element> {
        let line_index = LineIndex::new(xml);
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut ns_cache: HashMap<String, Arc<str>> = HashMap::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event();
            // the position after the event still sits on the start tag's line
            let line = line_index.line_of(reader.buffer_position());
            match event {
                Ok(Event::Start(e)) => {
                    let elem = build_element(&e, &stack, &mut ns_cache, line)?;
                    stack.push(elem);
                }
                Ok(Event::Empty(e)) => {
                    let elem = build_element(&e, &stack, &mut ns_cache, line)?;
                    attach(elem, &mut stack, &mut root)?;
                }
                Ok(Event::End(_)) => {
                    let elem = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced end tag".into()))?;
                    attach(elem, &mut stack, &mut root)?;
                }
                Ok(Event::Text(t)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                        if !text.trim().is_empty() {
                            match current.text {
                                Some(ref mut existing) => existing.push_str(&text),
                                None => current.text = Some(text.into_owned()),
                            }
                        }
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&t).into_owned();
                        match current.text {
                            Some(ref mut existing) => existing.push_str(&text),
                            None => current.text = Some(text),
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".into()));
        }
        root.ok_or_else(|| Error::Xml("no root element".into()))
    }

    /// Resolve a prefix against this element's scope
    ///
    /// An empty prefix resolves to the default namespace.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&Arc<str>> {
        self.scope.get(prefix)
    }

    /// Value of an unprefixed attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.prefix.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of an attribute qualified by namespace URI
    pub fn attr_ns(&self, name: &str, ns: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name && a.ns.as_deref() == Some(ns))
            .map(|a| a.value.as_str())
    }

    /// First child element with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content, empty string when absent
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

fn attach(elem: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
        Ok(())
    } else if root.is_none() {
        *root = Some(elem);
        Ok(())
    } else {
        Err(Error::Xml("multiple root elements".into()))
    }
}

fn build_element(
    start: &BytesStart<'_>,
    stack: &[Element],
    ns_cache: &mut HashMap<String, Arc<str>>,
    line: u32,
) -> Result<Element> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
        .to_string();

    let mut elem = Element {
        line,
        scope: stack
            .last()
            .map(|parent| parent.scope.clone())
            .unwrap_or_default(),
        ..Default::default()
    };

    // collect declarations first so sibling attributes may use them
    let mut plain: Vec<(Option<String>, String, String)> = Vec::new();
    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute: {}", e)))?
            .into_owned();

        if key == "xmlns" {
            let uri = intern_ns(ns_cache, &value);
            elem.scope.insert(String::new(), uri);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            let uri = intern_ns(ns_cache, &value);
            elem.scope.insert(prefix.to_string(), uri);
        } else if let Some((prefix, local)) = key.split_once(':') {
            plain.push((Some(prefix.to_string()), local.to_string(), value));
        } else {
            plain.push((None, key.to_string(), value));
        }
    }

    for (prefix, name, value) in plain {
        let ns = match prefix {
            Some(ref p) => Some(elem.scope.get(p).cloned().ok_or_else(|| {
                Error::Xml(format!("undefined namespace prefix \"{}\"", p))
            })?),
            // unprefixed attributes carry no namespace
            None => None,
        };
        elem.attrs.push(Attr {
            prefix,
            name,
            ns,
            value,
        });
    }

    match raw_name.split_once(':') {
        Some((prefix, local)) => {
            elem.ns = Some(
                elem.scope
                    .get(prefix)
                    .cloned()
                    .ok_or_else(|| Error::Xml(format!("undefined namespace prefix \"{}\"", prefix)))?,
            );
            elem.prefix = Some(prefix.to_string());
            elem.name = local.to_string();
        }
        None => {
            elem.ns = elem.scope.get("").cloned();
            elem.name = raw_name;
        }
    }

    Ok(elem)
}

fn intern_ns(cache: &mut HashMap<String, Arc<str>>, uri: &str) -> Arc<str> {
    if let Some(existing) = cache.get(uri) {
        return Arc::clone(existing);
    }
    let interned: Arc<str> = Arc::from(uri);
    cache.insert(uri.to_string(), Arc::clone(&interned));
    interned
}

/// Byte-offset to line-number lookup
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let root = Element::parse("<root><child>text</child></root>").unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_namespace_resolution() {
        let root = Element::parse(
            r#"<a xmlns="urn:x" xmlns:y="urn:y"><y:b/><c/></a>"#,
        )
        .unwrap();
        assert_eq!(root.ns.as_deref(), Some("urn:x"));
        assert_eq!(root.children[0].ns.as_deref(), Some("urn:y"));
        assert_eq!(root.children[1].ns.as_deref(), Some("urn:x"));
    }

    #[test]
    fn test_scope_is_inherited() {
        let root =
            Element::parse(r#"<a xmlns:p="urn:p"><b><c/></b></a>"#).unwrap();
        let c = &root.children[0].children[0];
        assert_eq!(c.resolve_prefix("p").map(|s| &**s), Some("urn:p"));
    }

    #[test]
    fn test_attributes() {
        let root = Element::parse(
            r#"<a xmlns:m="urn:m" plain="1" m:tagged="2"/>"#,
        )
        .unwrap();
        assert_eq!(root.attr("plain"), Some("1"));
        assert_eq!(root.attr_ns("tagged", "urn:m"), Some("2"));
        assert_eq!(root.attr("tagged"), None);
    }

    #[test]
    fn test_line_numbers() {
        let root = Element::parse("<a>\n  <b/>\n  <c/>\n</a>").unwrap();
        assert_eq!(root.line, 1);
        assert_eq!(root.children[0].line, 2);
        assert_eq!(root.children[1].line, 3);
    }

    #[test]
    fn test_undefined_prefix_fails() {
        assert!(Element::parse("<q:a/>").is_err());
    }

    #[test]
    fn test_multiple_roots_fail() {
        assert!(Element::parse("<a/><b/>").is_err());
    }
}
