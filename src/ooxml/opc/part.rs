//! Open Packaging Convention (OPC) objects related to package parts.
//!
//! This module provides the [`Part`] trait and the part kinds the engine ships with:
//! [`BlobPart`] for opaque content, [`XmlPart`] for well-formed XML, and [`ImagePart`] for
//! media reached through an image relationship. Parts are the fundamental units of content in
//! an OPC package, each with a unique partname, a content type, and its own relationships.

use crate::common::encoding::{decode_xml, xml_encoding};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::package::OpcPackage;
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::rel::{PartId, Relationships};
use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::any::Any;
use std::borrow::Cow;

/// Trait representing a part in an OPC package.
///
/// A part does not own other parts. It refers to them through its relationships, whose
/// targets are [`PartId`] handles into the owning package.
pub trait Part: Any + Send {
    /// Get the partname of this part.
    fn partname(&self) -> &PackURI;

    /// Replace the partname. Relationships of other parts keep pointing at this part.
    fn set_partname(&mut self, partname: PackURI);

    /// Get the content type of this part.
    fn content_type(&self) -> &str;

    /// Get the binary content of this part.
    fn blob(&self) -> &[u8];

    /// Get the relationships for this part.
    fn rels(&self) -> &Relationships;

    /// Get mutable access to the relationships for this part.
    fn rels_mut(&mut self) -> &mut Relationships;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called once per part after the whole package graph is loaded and wired.
    ///
    /// The part itself is checked out of the package while this runs. Traversal on `package`
    /// still passes through it, so its whole subtree is visible; only the part itself is not
    /// yielded.
    fn after_unmarshal(&mut self, _package: &OpcPackage) -> Result<()> {
        Ok(())
    }

    /// Called on every reachable part before the package is written, in traversal order.
    fn before_marshal(&mut self, _package: &OpcPackage) -> Result<()> {
        Ok(())
    }

    /// Add or get a relationship to another part of the same package.
    ///
    /// Returns the rId of an existing relationship of this type to `target`, or of a new one
    /// whose reference is `target_partname` relative to this part.
    fn relate_to(&mut self, target: PartId, target_partname: &PackURI, reltype: &str) -> String {
        let target_ref = target_partname.relative_ref(self.partname().base_uri());
        self.rels_mut()
            .get_or_add(reltype, target, &target_ref)
            .r_id()
            .to_string()
    }

    /// Add or get an external relationship.
    fn relate_to_ext(&mut self, target_url: &str, reltype: &str) -> String {
        self.rels_mut().get_or_add_ext_rel(reltype, target_url)
    }

    /// Get the target reference for a relationship ID.
    fn target_ref(&self, r_id: &str) -> Result<&str> {
        self.rels()
            .get(r_id)
            .map(|rel| rel.target_ref())
            .ok_or_else(|| OpcError::RelationshipNotFound(format!("rId: {}", r_id)))
    }

    /// Count references to a relationship ID in the part content.
    ///
    /// Counts `r:id`, `r:embed` and `r:link` attributes carrying this value.
    fn rel_ref_count(&self, r_id: &str) -> usize {
        let blob = self.blob();
        ["r:id", "r:embed", "r:link"]
            .iter()
            .map(|attr| {
                let pattern = format!(r#"{}="{}""#, attr, r_id);
                memmem::find_iter(blob, pattern.as_bytes()).count()
            })
            .sum()
    }

    /// Remove a relationship unless the content still references it more than once.
    ///
    /// Returns whether the relationship was removed.
    fn drop_rel(&mut self, r_id: &str) -> bool {
        if self.rel_ref_count(r_id) < 2 {
            self.rels_mut().remove(r_id).is_some()
        } else {
            false
        }
    }
}

/// A basic implementation of a Part that stores binary content.
///
/// This is the generic fallback part kind: loading it never fails.
#[derive(Debug)]
pub struct BlobPart {
    partname: PackURI,
    content_type: String,
    blob: Vec<u8>,
    rels: Relationships,
}

impl BlobPart {
    /// Create a new BlobPart.
    pub fn new(partname: PackURI, content_type: String, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri());
        Self {
            partname,
            content_type,
            blob,
            rels,
        }
    }

    /// Load a part from raw data.
    pub fn load(partname: PackURI, content_type: String, blob: Vec<u8>) -> Self {
        Self::new(partname, content_type, blob)
    }

    /// Replace the content.
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = blob;
    }
}

impl Part for BlobPart {
    fn partname(&self) -> &PackURI {
        &self.partname
    }

    fn set_partname(&mut self, partname: PackURI) {
        self.partname = partname;
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn blob(&self) -> &[u8] {
        &self.blob
    }

    fn rels(&self) -> &Relationships {
        &self.rels
    }

    fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An XML part.
///
/// The content is checked for well-formedness on load and kept as the original bytes, so an
/// unmodified part is written back byte for byte.
#[derive(Debug)]
pub struct XmlPart {
    partname: PackURI,
    content_type: String,

    /// The XML content as stored (UTF-8 or UTF-16)
    xml_bytes: Vec<u8>,

    /// Local name of the document element
    root_name: String,

    rels: Relationships,
}

impl XmlPart {
    /// Load an XML part from raw data, failing on malformed XML.
    pub fn load(partname: PackURI, content_type: String, xml_bytes: Vec<u8>) -> Result<Self> {
        let root_name = check_well_formed(&xml_bytes)
            .map_err(|e| OpcError::XmlError(format!("{}: {}", partname, e)))?;
        let rels = Relationships::new(partname.base_uri());

        Ok(Self {
            partname,
            content_type,
            xml_bytes,
            root_name,
            rels,
        })
    }

    /// Local name of the document element (e.g. "document" for a WordprocessingML body).
    #[inline]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Replace the XML content. The part is left untouched if the new content is malformed.
    pub fn set_xml(&mut self, xml_bytes: Vec<u8>) -> Result<()> {
        self.root_name = check_well_formed(&xml_bytes)
            .map_err(|e| OpcError::XmlError(format!("{}: {}", self.partname, e)))?;
        self.xml_bytes = xml_bytes;
        Ok(())
    }

    /// Get a reader for parsing the XML content.
    ///
    /// Returns a quick-xml Reader over the stored bytes, configured to trim whitespace-only
    /// text. Use [`XmlPart::text`] for content that is not UTF-8.
    pub fn reader(&self) -> Reader<&[u8]> {
        let mut reader = Reader::from_reader(self.xml_bytes.as_slice());
        reader.config_mut().trim_text(true);
        reader
    }

    /// Get the XML content as a UTF-8 string.
    ///
    /// Fails for content stored in another encoding; see [`XmlPart::text`].
    pub fn xml_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.xml_bytes).map_err(Into::into)
    }

    /// Get the XML content as text, decoded from UTF-8 or UTF-16.
    pub fn text(&self) -> Result<Cow<'_, str>> {
        decode_xml(&self.xml_bytes).ok_or_else(|| {
            OpcError::XmlError(format!("{}: content is not valid text", self.partname))
        })
    }
}

impl Part for XmlPart {
    fn partname(&self) -> &PackURI {
        &self.partname
    }

    fn set_partname(&mut self, partname: PackURI) {
        self.partname = partname;
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn blob(&self) -> &[u8] {
        &self.xml_bytes
    }

    fn rels(&self) -> &Relationships {
        &self.rels
    }

    fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Walk the whole document and return the local name of its root element.
///
/// Mismatched end tags are reported by quick-xml itself; the walk adds the checks for a
/// missing root, several roots, stray text outside the root and unclosed elements.
fn check_well_formed(xml: &[u8]) -> Result<String> {
    let text = decode_xml(xml).ok_or_else(|| {
        OpcError::XmlError(format!("content is not valid {}", xml_encoding(xml).0.name()))
    })?;

    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut root: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                open_element(&mut root, depth, e.local_name().as_ref())?;
                depth += 1;
            },
            Event::Empty(ref e) => open_element(&mut root, depth, e.local_name().as_ref())?,
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    OpcError::XmlError("end tag without matching start tag".to_string())
                })?;
            },
            Event::Text(_) | Event::CData(_) if depth == 0 => {
                return Err(OpcError::XmlError("text outside the root element".to_string()));
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(OpcError::XmlError(format!("{} unclosed element(s)", depth)));
    }
    root.ok_or_else(|| OpcError::XmlError("no root element".to_string()))
}

/// Record the root element, or reject a second one.
fn open_element(root: &mut Option<String>, depth: usize, local_name: &[u8]) -> Result<()> {
    if depth > 0 {
        return Ok(());
    }
    if let Some(root) = root {
        return Err(OpcError::XmlError(format!("second root element after <{}>", root)));
    }
    *root = Some(String::from_utf8_lossy(local_name).into_owned());
    Ok(())
}

/// An image part, selected by relationship type rather than content type.
///
/// Header sniffing (dimensions, DPI) is left to higher layers; this kind only knows its
/// bytes and name.
#[derive(Debug)]
pub struct ImagePart {
    partname: PackURI,
    content_type: String,
    blob: Vec<u8>,
    rels: Relationships,
}

impl ImagePart {
    /// Load an image part from raw data.
    pub fn load(partname: PackURI, content_type: String, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri());
        Self {
            partname,
            content_type,
            blob,
            rels,
        }
    }

    /// File name of the image inside the package, e.g. "image1.png".
    #[inline]
    pub fn filename(&self) -> &str {
        self.partname.filename()
    }

    /// Extension of the image file, as stored in the part name.
    #[inline]
    pub fn image_ext(&self) -> &str {
        self.partname.ext()
    }

    /// Whether `blob` holds exactly this image.
    pub fn same_image(&self, blob: &[u8]) -> bool {
        self.blob.len() == blob.len() && self.blob == blob
    }
}

impl Part for ImagePart {
    fn partname(&self) -> &PackURI {
        &self.partname
    }

    fn set_partname(&mut self, partname: PackURI) {
        self.partname = partname;
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn blob(&self) -> &[u8] {
        &self.blob
    }

    fn rels(&self) -> &Relationships {
        &self.rels
    }

    fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<'a> dyn Part + 'a {
    /// Downcast to a concrete part kind.
    pub fn downcast_ref<T: Part>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete part kind, mutably.
    pub fn downcast_mut<T: Part>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;

    fn uri(s: &str) -> PackURI {
        PackURI::new(s).unwrap()
    }

    #[test]
    fn test_blob_part() {
        let content = vec![0x89, 0x50, 0x4E, 0x47]; // PNG header
        let part = BlobPart::new(uri("/word/media/image1.png"), ct::PNG.to_string(), content.clone());

        assert_eq!(part.content_type(), ct::PNG);
        assert_eq!(part.blob(), content.as_slice());
        assert_eq!(part.rels().base_uri(), "/word/media");
    }

    #[test]
    fn test_xml_part() {
        let xml = b"<?xml version=\"1.0\"?>\n<w:document xmlns:w=\"urn:w\"><w:body/></w:document>".to_vec();
        let part = XmlPart::load(uri("/word/document.xml"), ct::WML_DOCUMENT_MAIN.to_string(), xml.clone())
            .unwrap();

        assert_eq!(part.root_name(), "document");
        assert_eq!(part.blob(), xml.as_slice());
    }

    #[test]
    fn test_xml_part_with_bom() {
        let mut xml = vec![0xEF, 0xBB, 0xBF];
        xml.extend_from_slice(b"<root/>");
        let part = XmlPart::load(uri("/a.xml"), ct::XML.to_string(), xml).unwrap();
        assert_eq!(part.root_name(), "root");
    }

    #[test]
    fn test_xml_part_utf16() {
        let text = r#"<?xml version="1.0" encoding="UTF-16"?><ds:datastoreItem xmlns:ds="urn:ds"><ds:schemaRefs/></ds:datastoreItem>"#;
        let mut xml = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            xml.extend_from_slice(&unit.to_le_bytes());
        }

        let part = XmlPart::load(uri("/customXml/item1.xml"), ct::XML.to_string(), xml.clone()).unwrap();
        assert_eq!(part.root_name(), "datastoreItem");
        assert_eq!(part.blob(), xml.as_slice());
        assert_eq!(part.text().unwrap(), text);
        assert!(part.xml_str().is_err());

        // Malformed markup is still rejected after decoding.
        let mut broken = vec![0xFF, 0xFE];
        for unit in "<a><b></a>".encode_utf16() {
            broken.extend_from_slice(&unit.to_le_bytes());
        }
        assert!(XmlPart::load(uri("/customXml/item2.xml"), ct::XML.to_string(), broken).is_err());
    }

    #[test]
    fn test_xml_part_rejects_malformed() {
        let cases: [&[u8]; 6] = [
            b"<root><a></b></root>",
            b"<root><a>",
            b"",
            b"not xml at all",
            b"<a/><b/>",
            b"<root/>trailing",
        ];
        for xml in cases {
            let result = XmlPart::load(uri("/word/document.xml"), ct::XML.to_string(), xml.to_vec());
            assert!(result.is_err(), "accepted {:?}", String::from_utf8_lossy(xml));
        }
    }

    #[test]
    fn test_set_xml_keeps_old_content_on_error() {
        let mut part = XmlPart::load(uri("/a.xml"), ct::XML.to_string(), b"<a/>".to_vec()).unwrap();
        assert!(part.set_xml(b"<b>".to_vec()).is_err());
        assert_eq!(part.blob(), b"<a/>");

        part.set_xml(b"<b/>".to_vec()).unwrap();
        assert_eq!(part.root_name(), "b");
    }

    #[test]
    fn test_rel_ref_count_and_drop_rel() {
        let xml = br#"<w:document xmlns:w="urn:w" xmlns:r="urn:r">
            <a:blip r:embed="rId2"/><w:hyperlink r:id="rId3"/><a:blip r:embed="rId3"/>
        </w:document>"#;
        let mut part = XmlPart::load(uri("/word/document.xml"), ct::XML.to_string(), xml.to_vec()).unwrap();
        for n in 1..=3 {
            part.rels_mut().add("t", &format!("media/image{n}.png"), None, false);
        }

        assert_eq!(part.rel_ref_count("rId1"), 0);
        assert_eq!(part.rel_ref_count("rId2"), 1);
        assert_eq!(part.rel_ref_count("rId3"), 2);

        assert!(part.drop_rel("rId2"));
        assert!(!part.drop_rel("rId3"));
        assert_eq!(part.rels().len(), 2);
    }

    #[test]
    fn test_relate_to_uses_relative_reference() {
        let mut part = BlobPart::new(uri("/word/document.xml"), ct::XML.to_string(), Vec::new());
        let target = uri("/word/media/image1.png");

        let r_id = part.relate_to(PartId::new(4), &target, "image");
        assert_eq!(part.target_ref(&r_id).unwrap(), "media/image1.png");
        assert_eq!(part.relate_to(PartId::new(4), &target, "image"), r_id);
        assert!(part.target_ref("rId9").is_err());
    }

    #[test]
    fn test_image_part() {
        let part = ImagePart::load(uri("/word/media/image3.jpeg"), ct::JPEG.to_string(), vec![1, 2, 3]);
        assert_eq!(part.filename(), "image3.jpeg");
        assert_eq!(part.image_ext(), "jpeg");
        assert!(part.same_image(&[1, 2, 3]));
        assert!(!part.same_image(&[1, 2]));

        let boxed: Box<dyn Part> = Box::new(part);
        assert!(boxed.downcast_ref::<ImagePart>().is_some());
        assert!(boxed.downcast_ref::<XmlPart>().is_none());
    }
}
