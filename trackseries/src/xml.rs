//! Minimal namespace-aware element tree over `quick-xml`, shared by the GPX
//! extension scan and the TCX decoder.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlElement {
    /// Resolved namespace URI, empty when unbound.
    pub namespace: String,
    pub local_name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn open(namespace: ResolveResult<'_>, start: &BytesStart<'_>) -> Self {
        let namespace = match namespace {
            ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.as_ref()).into_owned(),
            _ => String::new(),
        };
        Self {
            namespace,
            local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    /// Every element named `local_name` below (and including) this one, in
    /// document order. Matches are not searched for nested matches.
    pub fn descendants_named<'a>(&'a self, local_name: &str, out: &mut Vec<&'a XmlElement>) {
        if self.local_name == local_name {
            out.push(self);
            return;
        }
        for child in &self.children {
            child.descendants_named(local_name, out);
        }
    }
}

/// Parse a whole document and return its root element.
pub fn parse_document(input: &[u8]) -> Result<XmlElement, String> {
    let mut reader = NsReader::from_reader(input);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => stack.push(XmlElement::open(ns, &e)),
            Ok((ns, Event::Empty(e))) => {
                let element = XmlElement::open(ns, &e);
                attach(&mut stack, &mut root, element)?;
            }
            Ok((_, Event::Text(t))) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok((_, Event::CData(c))) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok((_, Event::End(_))) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err("multiple root elements".to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_namespaces_and_text() {
        let doc = br#"<?xml version="1.0"?>
            <root xmlns="urn:a" xmlns:b="urn:b">
              <item><b:value> 42 </b:value></item>
              <b:empty/>
            </root>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.namespace, "urn:a");
        assert_eq!(root.children.len(), 2);
        let value = &root.children[0].children[0];
        assert_eq!(value.local_name, "value");
        assert_eq!(value.namespace, "urn:b");
        assert_eq!(value.text, "42");
        assert_eq!(root.children[1].local_name, "empty");
        assert!(root.children[1].is_leaf());
    }

    #[test]
    fn collects_named_descendants_in_order() {
        let doc = b"<a><b><c>1</c></b><c>2</c></a>";
        let root = parse_document(doc).unwrap();
        let mut found = Vec::new();
        root.descendants_named("c", &mut found);
        let texts: Vec<&str> = found.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2"]);
    }

    #[test]
    fn truncated_document_is_rejected() {
        assert!(parse_document(b"<a><b>").is_err());
        assert!(parse_document(b"").is_err());
    }
}
