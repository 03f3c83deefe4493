//! Lossless XML tree for surgical edits.
//!
//! Every node keeps the exact source text it was parsed from, so writing an
//! untouched tree reproduces the input byte for byte. Only start tags whose
//! attributes were changed through [`Element::set_attribute`] are re-emitted,
//! and even then only the attribute value itself is replaced. A leading
//! byte-order mark is not part of the tree.

use quick_xml::Reader;
use quick_xml::escape::{EscapeError, escape, unescape};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use std::ops::Range;
use thiserror::Error;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("malformed attribute value: {0}")]
    AttributeValue(#[from] EscapeError),

    #[error("unclosed element <{0}>")]
    Unclosed(String),

    #[error("closing tag without a matching start tag")]
    UnexpectedEnd,

    #[error("expected exactly one root element, found {0}")]
    RootCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Comment(String),
    Text(String),
    Declaration(String),
    /// Processing instructions, doctypes and CDATA sections.
    Other(String),
}

impl Node {
    fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_to(out),
            Node::Comment(raw) | Node::Text(raw) | Node::Declaration(raw) | Node::Other(raw) => {
                out.push_str(raw)
            }
        }
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(raw) if raw.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    start_tag: String,
    end_tag: Option<String>,
    children: Vec<Node>,
    /// Unescaped attributes in source order, kept in step with `start_tag`.
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn element_count(&self) -> usize {
        self.element_children().count()
    }

    pub fn element_child_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .nth(index)
    }

    /// Detach the `index`-th child element, taking the indentation that
    /// precedes it along so no blank line is left behind.
    pub fn remove_element_child(&mut self, index: usize) -> Option<Element> {
        let position = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, Node::Element(_)))
            .nth(index)
            .map(|(position, _)| position)?;

        let removed = match self.children.remove(position) {
            Node::Element(element) => element,
            _ => return None,
        };

        if position > 0 && self.children[position - 1].is_whitespace() {
            self.children.remove(position - 1);
        } else if position < self.children.len() && self.children[position].is_whitespace() {
            self.children.remove(position);
        }

        Some(removed)
    }

    /// Unescaped value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }

    /// All attributes in source order, unescaped.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.clone()
    }

    /// Set an attribute value, rewriting only the quoted value in the start
    /// tag. Missing attributes are appended after the last existing one.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        let spans = attribute_spans(&self.start_tag);
        let encoded = escape(value);

        match self.attributes.iter_mut().find(|(name, _)| name == key) {
            Some((_, current)) => *current = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }

        if let Some(span) = spans.iter().find(|span| &self.start_tag[span.name.clone()] == key) {
            self.start_tag.replace_range(span.value.clone(), &encoded);
            return;
        }

        // One past the closing quote of the last attribute, or right after the tag name.
        let insert_at = spans
            .last()
            .map(|span| span.value.end + 1)
            .unwrap_or(1 + self.name.len());
        self.start_tag
            .insert_str(insert_at, &format!(" {key}=\"{encoded}\""));
    }

    fn from_tag(tag: &BytesStart<'_>, raw: &str) -> Result<Self, DocumentError> {
        Ok(Self {
            name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
            start_tag: raw.to_string(),
            end_tag: None,
            children: Vec::new(),
            attributes: read_attributes(tag)?,
        })
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.start_tag);
        for child in &self.children {
            child.write_to(out);
        }
        if let Some(end_tag) = &self.end_tag {
            out.push_str(end_tag);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut reader = Reader::from_str(source);
        let mut open: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let end = reader.buffer_position() as usize;
            let raw = &source[start..end];

            let node = match event {
                Event::Start(tag) => {
                    open.push(Element::from_tag(&tag, raw)?);
                    continue;
                }
                Event::End(_) => {
                    let mut element = open.pop().ok_or(DocumentError::UnexpectedEnd)?;
                    element.end_tag = Some(raw.to_string());
                    Node::Element(element)
                }
                Event::Empty(tag) => Node::Element(Element::from_tag(&tag, raw)?),
                Event::Comment(_) => Node::Comment(raw.to_string()),
                Event::Text(_) | Event::GeneralRef(_) => Node::Text(raw.to_string()),
                Event::Decl(_) => Node::Declaration(raw.to_string()),
                Event::CData(_) | Event::PI(_) | Event::DocType(_) => Node::Other(raw.to_string()),
                Event::Eof => break,
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(unclosed) = open.pop() {
            return Err(DocumentError::Unclosed(unclosed.name));
        }

        let roots = nodes
            .iter()
            .filter(|node| matches!(node, Node::Element(_)))
            .count();
        if roots != 1 {
            return Err(DocumentError::RootCount(roots));
        }

        Ok(Self { nodes })
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Exact source text of the tree, including any edits.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }

    /// Serialize with a normalized declaration followed by `banner`.
    ///
    /// The original declaration is replaced, a prolog comment matching the
    /// banner is not repeated, and other prolog comments follow the banner.
    /// Everything from the root element on is written verbatim.
    pub fn render_with_banner(&self, banner: &str) -> String {
        let mut out = String::with_capacity(banner.len() + 64);
        out.push_str(XML_DECLARATION);
        out.push_str("\n\n");
        out.push_str(banner);
        out.push_str("\n\n");

        let mut in_prolog = true;
        for node in &self.nodes {
            if !in_prolog {
                node.write_to(&mut out);
                continue;
            }

            match node {
                Node::Element(element) => {
                    element.write_to(&mut out);
                    in_prolog = false;
                }
                Node::Declaration(_) => {}
                Node::Comment(raw) if same_text(raw, banner) => {}
                _ if node.is_whitespace() => {}
                other => {
                    other.write_to(&mut out);
                    out.push('\n');
                }
            }
        }

        out
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

/// Attributes of a start tag with duplicate, unquoted and undecodable values
/// rejected.
fn read_attributes(tag: &BytesStart<'_>) -> Result<Vec<(String, String)>, DocumentError> {
    tag.attributes()
        .map(|attribute| -> Result<(String, String), DocumentError> {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attribute.value);
            let value = unescape(&raw)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

#[derive(Debug, Clone)]
struct AttributeSpan {
    name: Range<usize>,
    /// Between the quotes.
    value: Range<usize>,
}

/// Locate attribute names and values inside a raw start tag such as
/// `<dependency org="a" rev='1.0' />`.
fn attribute_spans(tag: &str) -> Vec<AttributeSpan> {
    let bytes = tag.as_bytes();
    let mut spans = Vec::new();
    let mut i = 1;

    while i < bytes.len() && !is_tag_delimiter(bytes[i]) {
        i += 1;
    }

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'/' || bytes[i] == b'>' {
            break;
        }

        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !is_tag_delimiter(bytes[i]) {
            i += 1;
        }
        let name = name_start..i;

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            // Attribute without a value; not valid XML, skip it.
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || !matches!(bytes[i], b'"' | b'\'') {
            break;
        }

        let quote = bytes[i];
        let value_start = i + 1;
        let Some(len) = bytes[value_start..].iter().position(|b| *b == quote) else {
            break;
        };
        spans.push(AttributeSpan {
            name,
            value: value_start..value_start + len,
        });
        i = value_start + len + 1;
    }

    spans
}

fn is_tag_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'/' || byte == b'>'
}
