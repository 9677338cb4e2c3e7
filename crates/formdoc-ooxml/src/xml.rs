//! Generic XML tree
//!
//! Parts are read into a plain element tree with quick-xml and written back
//! by string building. Names keep their prefixes (`w:p`, `v:shape`), which
//! is how WordprocessingML parts are written in practice.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// Element name and attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Attribute value by qualified name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position when it already exists
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attributes.retain(|(k, _)| k != key);
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub(crate) fn write_open(&self, out: &mut String, self_closing: bool) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push_str(if self_closing { "/>" } else { ">" });
    }

    pub(crate) fn write_close(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn from_start(e: &BytesStart) -> std::result::Result<Self, quick_xml::Error> {
        let mut tag = Tag::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            tag.attributes.push((key, value));
        }
        Ok(tag)
    }
}

/// An element with its children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_tag(Tag::new(name))
    }

    pub fn from_tag(tag: Tag) -> Self {
        Self {
            tag,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.tag.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.tag.attr(key)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given name
    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.tag.is(name))
    }

    /// Check if this element or any descendant has one of `names`
    pub fn contains_named(&self, names: &[&str]) -> bool {
        names.contains(&self.name()) || self.children.iter().any(|c| c.contains_named(names))
    }

    /// Remove every descendant element named `name`; returns how many went
    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, Node::Element(e) if e.tag.is(name)));
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let Node::Element(e) = child {
                removed += e.remove_named(name);
            }
        }
        removed
    }

    /// Concatenated character data of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn write(&self, out: &mut String) {
        if self.children.is_empty() {
            self.tag.write_open(out, true);
            return;
        }
        self.tag.write_open(out, false);
        for child in &self.children {
            child.write(out);
        }
        self.tag.write_close(out);
    }
}

/// Any XML node kept in a tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whitespace-only character data
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    pub fn contains_named(&self, names: &[&str]) -> bool {
        match self {
            Node::Element(e) => e.contains_named(names),
            _ => false,
        }
    }

    pub fn remove_named(&mut self, name: &str) -> usize {
        match self {
            Node::Element(e) => e.remove_named(name),
            _ => 0,
        }
    }

    pub fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            Node::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            Node::Instruction(t) => {
                out.push_str("<?");
                out.push_str(t);
                out.push_str("?>");
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// A parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Content of the `<?xml ...?>` declaration
    pub declaration: Option<String>,
    pub root: Element,
}

impl XmlDocument {
    /// Parse a part; `part` names it in errors
    pub fn parse(xml: &[u8], part: &str) -> Result<Self> {
        let xml_error = |source: quick_xml::Error| OoxmlError::Xml {
            part: part.to_string(),
            source,
        };

        let mut reader = Reader::from_reader(xml);
        // Whitespace inside w:t is content
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut declaration = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(xml_error)? {
                Event::Decl(decl) => {
                    declaration = Some(String::from_utf8_lossy(&decl).into_owned());
                }
                Event::Start(e) => {
                    stack.push(Element::from_tag(Tag::from_start(&e).map_err(xml_error)?));
                }
                Event::Empty(e) => {
                    let element = Element::from_tag(Tag::from_start(&e).map_err(xml_error)?);
                    attach(&mut stack, &mut root, Node::Element(element));
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        OoxmlError::InvalidStructure(format!("{}: unbalanced closing tag", part))
                    })?;
                    attach(&mut stack, &mut root, Node::Element(element));
                }
                Event::Text(e) => {
                    if !stack.is_empty() {
                        let text = e.unescape().map_err(xml_error)?.into_owned();
                        attach(&mut stack, &mut root, Node::Text(text));
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    attach(&mut stack, &mut root, Node::CData(text));
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    attach(&mut stack, &mut root, Node::Comment(text));
                }
                Event::PI(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    attach(&mut stack, &mut root, Node::Instruction(text));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(OoxmlError::InvalidStructure(format!(
                "{}: unclosed element <{}>",
                part,
                stack.last().map(Element::name).unwrap_or_default()
            )));
        }
        let root = root
            .ok_or_else(|| OoxmlError::InvalidStructure(format!("{}: no root element", part)))?;
        Ok(Self { declaration, root })
    }

    /// Serialize the part
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(declaration) = &self.declaration {
            out.push_str("<?");
            out.push_str(declaration);
            out.push_str("?>\r\n");
        }
        self.root.write(&mut out);
        out
    }
}

/// Add a node to the open element, or make it the root; top-level
/// comments and whitespace are dropped
fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if let Node::Element(element) = node {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }
}

/// Count elements with one of `names` in a serialized part
///
/// Scanning stops at the first malformed construct.
pub fn count_elements(xml: &[u8], names: &[&str]) -> usize {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if names.iter().any(|n| e.name().as_ref() == n.as_bytes()) {
                    count += 1;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    count
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r></w:p><!-- note --><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_roundtrip() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes(), "word/document.xml").unwrap();
        assert_eq!(
            doc.declaration.as_deref(),
            Some(r#"xml version="1.0" encoding="UTF-8" standalone="yes""#)
        );
        assert_eq!(doc.root.attr("xmlns:w"), Some("urn:w"));
        let expected = SAMPLE.replacen("?>\n", "?>\r\n", 1);
        assert_eq!(doc.to_xml(), expected);
    }

    #[test]
    fn test_text_is_unescaped() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes(), "word/document.xml").unwrap();
        let t = doc
            .root
            .find_child("w:body")
            .and_then(|b| b.find_child("w:p"))
            .and_then(|p| p.find_child("w:r"))
            .and_then(|r| r.find_child("w:t"))
            .unwrap();
        assert_eq!(t.text(), " a & b ");
    }

    #[test]
    fn test_attribute_escaping() {
        let element = Element::new("w:t").with_attr("w:val", "a\"<b>");
        let mut out = String::new();
        element.write(&mut out);
        assert_eq!(out, r#"<w:t w:val="a&quot;&lt;b&gt;"/>"#);
    }

    #[test]
    fn test_remove_named_is_recursive() {
        let mut element = Element::new("w:tbl").with_child(
            Element::new("w:tr").with_child(
                Element::new("w:tc").with_child(
                    Element::new("w:p").with_child(
                        Element::new("w:pPr").with_child(Element::new("w:sectPr")),
                    ),
                ),
            ),
        );
        assert!(element.contains_named(&["w:sectPr"]));
        assert_eq!(element.remove_named("w:sectPr"), 1);
        assert!(!element.contains_named(&["w:sectPr"]));
    }

    #[test]
    fn test_count_elements() {
        assert_eq!(count_elements(SAMPLE.as_bytes(), &["w:sectPr"]), 1);
        assert_eq!(count_elements(SAMPLE.as_bytes(), &["w:drawing"]), 0);
    }

    #[test]
    fn test_malformed_part() {
        let err = XmlDocument::parse(b"<w:document><w:body></w:document>", "word/document.xml")
            .unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
