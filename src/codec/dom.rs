//! Minimal element tree built from quick-xml events.
//!
//! The decoder maps this tree onto the model in a second step, which keeps
//! well-formedness errors (reported here) apart from schema errors.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{DawProjectError, Result};
use crate::model::Extensions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute that must be present.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            DawProjectError::malformed(format!(
                "{} is missing required attribute '{}'",
                self.describe(),
                name
            ))
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Attributes outside `known`, kept for re-emission.
    pub fn unknown_attributes(&self, known: &[&str]) -> Extensions {
        self.attributes
            .iter()
            .filter(|(key, _)| !known.contains(&key.as_str()))
            .cloned()
            .collect()
    }

    /// Short form for error messages, e.g. `<Track id="t1">`.
    pub fn describe(&self) -> String {
        match self.attr("id") {
            Some(id) => format!("<{} id=\"{}\">", self.name, id),
            None => format!("<{}>", self.name),
        }
    }
}

/// Deepest element nesting accepted before parsing gives up.
pub(crate) const MAX_ELEMENT_DEPTH: usize = 256;

/// Parse a complete document into its root element.
pub(crate) fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(DawProjectError::malformed(format!(
                        "elements nest deeper than {} levels at byte {}",
                        MAX_ELEMENT_DEPTH,
                        reader.buffer_position()
                    )));
                }
                stack.push(open(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = open(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(end)) => {
                let element = stack.pop().ok_or_else(|| {
                    DawProjectError::malformed(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    ))
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|err| {
                    DawProjectError::malformed(format!(
                        "bad text at byte {}: {}",
                        reader.buffer_position(),
                        err
                    ))
                })?;
                if !text.trim().is_empty() {
                    debug!(parent = ?stack.last().map(|e| e.name.as_str()), "ignoring text content");
                }
            }
            Ok(Event::CData(_)) => {
                debug!(parent = ?stack.last().map(|e| e.name.as_str()), "ignoring CDATA section");
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DawProjectError::malformed(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    err
                )))
            }
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(DawProjectError::malformed(format!(
            "unexpected end of document inside <{}>",
            unclosed.name
        )));
    }
    root.ok_or_else(|| DawProjectError::malformed("document has no root element"))
}

fn open(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| {
            DawProjectError::malformed(format!("bad attribute on <{}>: {}", name, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value: Cow<'_, str> = attr.unescape_value().map_err(|err| {
            DawProjectError::malformed(format!("bad value for '{}' on <{}>: {}", key, name, err))
        })?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(DawProjectError::malformed(format!(
                "second root element <{}>",
                element.name
            )))
        }
        None => *root = Some(element),
    }
    Ok(())
}
