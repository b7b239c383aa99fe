//! Minimal XML document reader
//!
//! Command definition and tool configuration files are small, flat XML
//! documents. They are read into a lightweight element tree so the importers
//! can look elements up by name instead of tracking parser state.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Errors that can occur while reading an XML file
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file could not be read
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// The XML is malformed
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),
    /// The document structure is not usable
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

/// One element with its attributes, text, and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Text content (trimmed)
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Value of an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Parse an XML document and return its root element
pub fn parse_document(xml: &str) -> Result<XmlElement, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(start_element(e)?),
            Event::Empty(ref e) => {
                let element = start_element(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ImportError::InvalidFormat("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ImportError::InvalidFormat(format!(
            "element <{}> is never closed",
            open.name
        )));
    }

    root.ok_or_else(|| ImportError::InvalidFormat("document has no root element".into()))
}

/// Read and parse an XML file
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<XmlElement, ImportError> {
    let content = std::fs::read_to_string(path)?;
    parse_document(&content)
}

fn start_element(e: &BytesStart) -> Result<XmlElement, ImportError> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
        ..XmlElement::default()
    };

    for attr in e.attributes() {
        let attr = attr.map_err(|err| ImportError::InvalidFormat(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), ImportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ImportError::InvalidFormat(
                "document has more than one root element".into(),
            ))
        }
    }
    Ok(())
}
