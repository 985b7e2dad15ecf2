//! The `[Content_Types].xml` manifest.
//!
//! [`ContentTypeMap`] is the read side: it resolves a part name to a content type using
//! Override elements first and Default elements (by extension) second. [`ContentTypesItem`]
//! is the write side: it builds the manifest for the parts of a package being saved.

use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{BTreeMap, HashMap};

/// Content types of well-known extensions, keyed by lowercase extension.
static WELL_KNOWN: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "bin" => ct::OFC_OLE_OBJECT,
    "bmp" => ct::BMP,
    "emf" => ct::X_EMF,
    "gif" => ct::GIF,
    "jpe" => ct::JPEG,
    "jpeg" => ct::JPEG,
    "jpg" => ct::JPEG,
    "png" => ct::PNG,
    "rels" => ct::OPC_RELATIONSHIPS,
    "svg" => ct::SVG,
    "tif" => ct::TIFF,
    "tiff" => ct::TIFF,
    "wmf" => ct::X_WMF,
    "xlsx" => ct::SML_SHEET,
    "xml" => ct::XML,
};

/// Content type conventionally used for a file extension, if it is a well-known one.
pub fn well_known_content_type(ext: &str) -> Option<&'static str> {
    WELL_KNOWN.get(ext.to_ascii_lowercase().as_str()).copied()
}

/// Content type map for looking up content types by part name or extension.
///
/// Keys are compared case-insensitively. Built once per package open.
#[derive(Debug, Default, Clone)]
pub struct ContentTypeMap {
    /// Maps lowercase file extensions to default content types
    defaults: HashMap<String, String>,

    /// Maps lowercase partnames to override content types
    overrides: HashMap<String, String>,

    /// Fall back to [`well_known_content_type`] when neither table matches
    infer: bool,
}

impl ContentTypeMap {
    /// Create a new empty content type map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse content types from [Content_Types].xml.
    ///
    /// A manifest that is not well-formed XML is a fatal error.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let (key_attr, is_default) = match e.local_name().as_ref() {
                        b"Default" => (&b"Extension"[..], true),
                        b"Override" => (&b"PartName"[..], false),
                        // Matches no attribute, so nothing is recorded
                        _ => (&b""[..], false),
                    };

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == key_attr {
                            key = Some(attr.unescape_value()?.to_string());
                        } else if attr.key.as_ref() == b"ContentType" {
                            content_type = Some(attr.unescape_value()?.to_string());
                        }
                    }

                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        if is_default {
                            map.add_default(&key, content_type);
                        } else {
                            map.add_override(&key, content_type);
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error at {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Enable or disable the well-known extension fallback.
    pub fn set_infer(&mut self, infer: bool) {
        self.infer = infer;
    }

    /// Add a default content type mapping for a file extension.
    pub fn add_default(&mut self, extension: &str, content_type: String) {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.defaults.insert(extension, content_type);
    }

    /// Add an override content type mapping for a specific partname.
    pub fn add_override(&mut self, partname: &str, content_type: String) {
        self.overrides.insert(partname.to_ascii_lowercase(), content_type);
    }

    /// Get the content type for a partname.
    ///
    /// An override always wins over a default. Fails with
    /// [`OpcError::ContentTypeNotFound`] when neither matches.
    pub fn content_type(&self, partname: &PackURI) -> Result<&str> {
        if let Some(ct) = self.overrides.get(&partname.as_str().to_ascii_lowercase()) {
            return Ok(ct);
        }

        let ext = partname.ext().to_ascii_lowercase();
        if let Some(ct) = self.defaults.get(&ext) {
            return Ok(ct);
        }

        if self.infer {
            if let Some(ct) = WELL_KNOWN.get(ext.as_str()) {
                return Ok(ct);
            }
        }

        Err(OpcError::ContentTypeNotFound(partname.to_string()))
    }

    #[inline]
    pub fn default_count(&self) -> usize {
        self.defaults.len()
    }

    #[inline]
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

/// Helper for building [Content_Types].xml content.
///
/// A part whose extension and content type form a well-known pair is covered by a Default
/// element; every other part gets an Override. Output is sorted for stable bytes.
#[derive(Debug)]
pub struct ContentTypesItem {
    /// Default content types by extension
    defaults: BTreeMap<String, String>,

    /// Override content types by partname
    overrides: BTreeMap<String, String>,
}

impl ContentTypesItem {
    /// Create an item holding only the `rels` and `xml` defaults every package carries.
    pub fn new() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());

        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }

    /// Build the manifest for a set of `(partname, content type)` pairs.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a PackURI, &'a str)>,
    {
        let mut cti = Self::new();
        for (partname, content_type) in parts {
            cti.add_content_type(partname, content_type);
        }
        cti
    }

    /// Add a content type for a part.
    pub fn add_content_type(&mut self, partname: &PackURI, content_type: &str) {
        let ext = partname.ext().to_ascii_lowercase();

        match WELL_KNOWN.get(ext.as_str()) {
            Some(&known) if known == content_type => {
                self.defaults.insert(ext, content_type.to_string());
            },
            _ => {
                self.overrides
                    .insert(partname.to_string(), content_type.to_string());
            },
        }
    }

    /// Generate the XML for [Content_Types].xml.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + 128 * (self.defaults.len() + self.overrides.len()));

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(r#"<Types xmlns=""#);
        xml.push_str(namespace::OPC_CONTENT_TYPES);
        xml.push_str(r#"">"#);

        for (ext, content_type) in &self.defaults {
            xml.push_str(r#"<Default Extension=""#);
            xml.push_str(&escape_xml(ext));
            xml.push_str(r#"" ContentType=""#);
            xml.push_str(&escape_xml(content_type));
            xml.push_str(r#""/>"#);
        }

        for (partname, content_type) in &self.overrides {
            xml.push_str(r#"<Override PartName=""#);
            xml.push_str(&escape_xml(partname));
            xml.push_str(r#"" ContentType=""#);
            xml.push_str(&escape_xml(content_type));
            xml.push_str(r#""/>"#);
        }

        xml.push_str("</Types>");

        xml
    }
}

impl Default for ContentTypesItem {
    fn default() -> Self {
        Self::new()
    }
}
