//! Lightweight XML element tree.
//!
//! The upstream bus responses and the stream payloads are small,
//! irregular documents; a tree with recursive lookup is simpler than
//! one serde type per schema version. Namespace prefixes are
//! stripped, the sources mix them freely.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document into its root element.
    pub fn parse(xml: &str) -> Result<XmlNode, CoreError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader
                .read_event()
                .map_err(|e| CoreError::Xml(format!("malformed xml: {e}")))?
            {
                Event::Start(start) => {
                    stack.push(node_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let node = node_from_start(&start)?;
                    attach(&mut stack, &mut root, node);
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        let decoded = text
                            .unescape()
                            .map_err(|e| CoreError::Xml(format!("malformed xml: {e}")))?;
                        top.text.push_str(&decoded);
                    }
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| CoreError::Xml("unbalanced xml".to_string()))?;
                    attach(&mut stack, &mut root, node);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        root.ok_or_else(|| CoreError::Xml("empty xml document".to_string()))
    }

    /// Depth-first search for the first element with this local name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// All descendant elements with this local name, document order.
    pub fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        if self.name == name {
            out.push(self);
        }
        for child in &self.children {
            child.find_all(name, out);
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Like [`XmlNode::child_text`] but searches descendants.
    pub fn find_text(&self, name: &str) -> Option<&str> {
        self.find(name).map(|c| c.text.as_str())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

fn local_name(qualified: &[u8]) -> String {
    let qualified = String::from_utf8_lossy(qualified);
    qualified
        .rsplit(':')
        .next()
        .unwrap_or(&qualified)
        .to_string()
}

fn node_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlNode, CoreError> {
    let mut node = XmlNode {
        name: local_name(start.name().as_ref()),
        ..Default::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| CoreError::Xml(format!("malformed xml: {e}")))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| CoreError::Xml(format!("malformed xml: {e}")))?;
        node.attributes
            .insert(local_name(attribute.key.as_ref()), value.to_string());
    }
    Ok(node)
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = XmlNode::parse(
            r#"<ns:root><child code="X1">hello</child><child code="X2">world</child></ns:root>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "root");
        let mut all = Vec::new();
        doc.find_all("child", &mut all);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].text, "hello");
        assert_eq!(all[1].attr("code"), Some("X2"));
    }

    #[test]
    fn strips_namespace_prefixes() {
        let doc = XmlNode::parse(
            r#"<soapenv:Envelope><soapenv:Body><v3:point/></soapenv:Body></soapenv:Envelope>"#,
        )
        .unwrap();
        assert!(doc.find("Body").is_some());
        assert!(doc.find("point").is_some());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(XmlNode::parse("<a><b></a>").is_err());
        assert!(XmlNode::parse("").is_err());
    }
}
