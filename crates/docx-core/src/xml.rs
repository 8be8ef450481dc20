//! Owned XML element tree for package parts
//!
//! WordprocessingML parts are small enough to hold fully in memory, and the
//! structural edits this crate performs (cloning tables, replacing content
//! control bodies) are far simpler on an owned tree than on an event stream.
//! Parsing uses `quick-xml`; whitespace-only text is kept so `xml:space`
//! sensitive runs survive a round trip.

use crate::{DocxError, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Declaration written ahead of every serialized part
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// A node in the element tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data
    Text(String),
    /// Markup kept verbatim (comments, CDATA sections, processing instructions)
    Raw(String),
}

/// An XML element with its qualified name, attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Qualified name as written in the source (e.g. `w:tbl`)
    pub name: String,
    /// Attributes in source order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: append a text node (empty text adds nothing)
    pub fn with_text(mut self, text: &str) -> Self {
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_string()));
        }
        self
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Namespace prefix of the element name, if any
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Whether the element has the given local name
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Qualified name for a sibling element sharing this element's prefix
    pub fn qualify(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    /// Value of the first attribute whose local name matches
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| local_part(name) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute by local name, keeping the existing qualified name
    /// when present. New attributes take `qualified` as their name.
    pub fn set_attribute(&mut self, local: &str, qualified: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|(name, _)| local_part(name) == local)
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .attributes
                .push((qualified.to_string(), value.to_string())),
        }
    }

    /// Child elements in order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Mutable child elements in order
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    /// First mutable child element with the given local name
    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Child element at a position in `children`
    pub fn element_at(&self, index: usize) -> Option<&Element> {
        match self.children.get(index) {
            Some(Node::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Remove every child element with the given local name
    pub fn remove_children(&mut self, local: &str) {
        self.children.retain(|node| match node {
            Node::Element(element) => !element.is(local),
            _ => true,
        });
    }

    /// Resolve a path of child indices relative to this element
    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.element_at(index)?;
        }
        Some(current)
    }

    /// Resolve a path of child indices relative to this element (mutable)
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index) {
                Some(Node::Element(element)) => element,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Visit this element and all descendant elements in document order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Visit this element and all descendant elements mutably, pre-order
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Element)) {
        visit(self);
        for child in self.elements_mut() {
            child.walk_mut(visit);
        }
    }

    /// Concatenated text of every descendant element with the given local
    /// name (e.g. `t` for run text)
    pub fn text_of(&self, local: &str) -> String {
        let mut text = String::new();
        self.walk(&mut |element| {
            if element.is(local) {
                for node in &element.children {
                    if let Node::Text(value) = node {
                        text.push_str(value);
                    }
                }
            }
        });
        text
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(out),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
                Node::Raw(raw) => out.push_str(raw),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A parsed XML part: optional declaration, leading markup, and a root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Whether the source carried an XML declaration
    pub declaration: bool,
    /// Comments and processing instructions ahead of the root
    pub prolog: Vec<Node>,
    pub root: Element,
}

impl XmlDocument {
    /// Parse a complete XML part
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut declaration = false;
        let mut prolog = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(_) => declaration = true,
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocxError::Malformed("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::Text(text.unescape()?.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let raw = format!("<![CDATA[{}]]>", String::from_utf8_lossy(&data.into_inner()));
                    push_raw(&mut stack, &mut prolog, raw);
                }
                Event::Comment(comment) => {
                    let raw = format!("<!--{}-->", String::from_utf8_lossy(&comment.into_inner()));
                    push_raw(&mut stack, &mut prolog, raw);
                }
                Event::PI(pi) => {
                    let raw = format!("<?{}?>", String::from_utf8_lossy(&pi.into_inner()));
                    push_raw(&mut stack, &mut prolog, raw);
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocxError::Malformed(format!(
                "unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }
        let root = root.ok_or_else(|| DocxError::Malformed("part has no root element".to_string()))?;

        Ok(Self {
            declaration,
            prolog,
            root,
        })
    }

    /// Serialize back to XML text
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if self.declaration {
            out.push_str(XML_DECLARATION);
            out.push_str("\r\n");
        }
        for node in &self.prolog {
            if let Node::Raw(raw) = node {
                out.push_str(raw);
            }
        }
        self.root.write_to(&mut out);
        out
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn element_from_start(start: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(DocxError::Malformed(
                "multiple root elements".to_string(),
            ))
        }
    }
    Ok(())
}

fn push_raw(stack: &mut [Element], prolog: &mut Vec<Node>, raw: String) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Raw(raw)),
        None => prolog.push(Node::Raw(raw)),
    }
}
