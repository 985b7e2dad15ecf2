//! Builds OPC packages in memory for the integration tests.

#![allow(dead_code)]

use opc_engine::ooxml::opc::PackURI;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CT_WML_MAIN: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const CT_WML_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";

/// A relationship recorded by the builder: (type, target, external).
type Rel = (String, String, bool);

/// Package fixture builder.
///
/// Defaults for `rels` and `xml` are always declared. Members are written in name order.
#[derive(Default)]
pub struct PackageBuilder {
    members: BTreeMap<String, Vec<u8>>,
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
    rels: BTreeMap<String, Vec<Rel>>,
    raw_content_types: Option<Vec<u8>>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.defaults.insert(
            "rels".to_string(),
            "application/vnd.openxmlformats-package.relationships+xml".to_string(),
        );
        builder
            .defaults
            .insert("xml".to_string(), "application/xml".to_string());
        builder
    }

    /// Add a member holding a part. `name` is an absolute part name.
    pub fn part(mut self, name: &str, body: &[u8]) -> Self {
        self.members.insert(member(name), body.to_vec());
        self
    }

    pub fn default_ct(mut self, ext: &str, content_type: &str) -> Self {
        self.defaults.insert(ext.to_string(), content_type.to_string());
        self
    }

    pub fn override_ct(mut self, name: &str, content_type: &str) -> Self {
        self.overrides.insert(name.to_string(), content_type.to_string());
        self
    }

    /// Replace the generated [Content_Types].xml with raw bytes.
    pub fn raw_content_types(mut self, xml: &[u8]) -> Self {
        self.raw_content_types = Some(xml.to_vec());
        self
    }

    /// Add an internal relationship from `source` ("/" for the package). Ids are rId1, rId2...
    pub fn rel(mut self, source: &str, reltype: &str, target: &str) -> Self {
        self.rels
            .entry(source.to_string())
            .or_default()
            .push((reltype.to_string(), target.to_string(), false));
        self
    }

    pub fn ext_rel(mut self, source: &str, reltype: &str, url: &str) -> Self {
        self.rels
            .entry(source.to_string())
            .or_default()
            .push((reltype.to_string(), url.to_string(), true));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut members = self.members;

        let content_types = match self.raw_content_types {
            Some(xml) => xml,
            None => content_types_xml(&self.defaults, &self.overrides).into_bytes(),
        };
        members.insert("[Content_Types].xml".to_string(), content_types);

        for (source, rels) in &self.rels {
            let rels_uri = PackURI::new(source.as_str()).unwrap().rels_uri().unwrap();
            members.insert(rels_uri.membername().to_string(), rels_xml(rels).into_bytes());
        }

        let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &members {
            zip_writer.start_file(name.as_str(), options).unwrap();
            zip_writer.write_all(data).unwrap();
        }
        zip_writer.finish().unwrap().into_inner()
    }
}

fn member(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

fn content_types_xml(defaults: &BTreeMap<String, String>, overrides: &BTreeMap<String, String>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    for (ext, ct) in defaults {
        xml.push_str(&format!(r#"<Default Extension="{}" ContentType="{}"/>"#, ext, ct));
    }
    for (name, ct) in overrides {
        xml.push_str(&format!(r#"<Override PartName="{}" ContentType="{}"/>"#, name, ct));
    }
    xml.push_str("</Types>");
    xml
}

fn rels_xml(rels: &[Rel]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (reltype, target, external)) in rels.iter().enumerate() {
        let mode = if *external { r#" TargetMode="External""# } else { "" };
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="{}"{}/>"#,
            i + 1,
            reltype,
            target,
            mode
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// A small Word-like package: document -> styles, document -> image, document -> hyperlink.
pub fn minimal_docx() -> Vec<u8> {
    PackageBuilder::new()
        .default_ct("png", "image/png")
        .override_ct("/word/document.xml", CT_WML_MAIN)
        .override_ct("/word/styles.xml", CT_WML_STYLES)
        .part("/word/document.xml", br#"<w:document xmlns:w="urn:w"><w:body/></w:document>"#)
        .part("/word/styles.xml", br#"<w:styles xmlns:w="urn:w"/>"#)
        .part("/word/media/image1.png", &[0x89, b'P', b'N', b'G', 0x0D, 0x0A])
        .part("/docProps/core.xml", b"<cp:coreProperties xmlns:cp=\"urn:cp\"/>")
        .rel("/", OFFICE_DOCUMENT, "word/document.xml")
        .rel("/", CORE_PROPERTIES, "docProps/core.xml")
        .rel("/word/document.xml", STYLES, "styles.xml")
        .rel("/word/document.xml", IMAGE, "media/image1.png")
        .ext_rel("/word/document.xml", HYPERLINK, "https://example.com/a?b=1&amp;c=2")
        .build()
}

pub const OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const STRICT_OFFICE_DOCUMENT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument";
pub const STRICT_STYLES: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships/styles";
pub const CUSTOM_XML: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/customXml";
