use std::io::Cursor;

use std::borrow::Cow;

use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use crate::error::{Error, Result};

/// XML 1.0 valid char ranges:
/// - 0x09, 0x0A, 0x0D
/// - 0x20..=0xD7FF
/// - 0xE000..=0xFFFD
/// - 0x10000..=0x10FFFF
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Drops characters that XML 1.0 cannot carry, even escaped.
pub fn sanitize_xml_text(text: &str) -> String {
    text.chars().filter(|&c| is_valid_xml_char(c)).collect()
}

/// Indented, in-memory XML writer. Text escaping is left to quick-xml;
/// attribute values are escaped by [`escape_attribute`].
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    pub fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(Error::xml)
    }

    pub fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let elem = element(tag, attrs);
        self.writer.write_event(Event::Start(elem)).map_err(Error::xml)
    }

    pub fn end(&mut self, tag: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(Error::xml)
    }

    pub fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let elem = element(tag, attrs);
        self.writer.write_event(Event::Empty(elem)).map_err(Error::xml)
    }

    /// `<tag>text</tag>` on one line.
    pub fn text_element(&mut self, tag: &str, text: &str) -> Result<()> {
        self.start(tag, &[])?;
        let cleaned = sanitize_xml_text(text);
        self.writer
            .write_event(Event::Text(BytesText::new(&cleaned)))
            .map_err(Error::xml)?;
        self.end(tag)
    }

    pub fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner().into_inner()).map_err(Error::xml)
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn element<'a>(tag: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(tag);
    for (key, value) in attrs {
        let escaped = escape_attribute(value);
        elem.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Owned(escaped.into_bytes()),
        });
    }
    elem
}

/// Escapes markup plus tab, CR and LF. Attribute-value normalization turns
/// literal whitespace characters into spaces, so they go out as character
/// references.
pub fn escape_attribute(value: &str) -> String {
    let cleaned = sanitize_xml_text(value);
    let mut out = String::with_capacity(cleaned.len());
    for ch in escape(cleaned.as_str()).chars() {
        match ch {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Formats a coordinate without a trailing `.0` for whole numbers.
pub fn coord(value: f32) -> String {
    format!("{}", value)
}
