//! Low-level, read-only API to a serialized Open Packaging Convention (OPC) package.
//!
//! [`PackageReader`] discovers the parts of a package by walking its relationship graph
//! from the package-level relationships. The walk is an iterative pre-order depth-first
//! search over an explicit stack, so arbitrarily deep or cyclic graphs terminate without
//! growing the call stack. Every part name is visited at most once.

use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::content_types::ContentTypeMap;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::package::OpenOptions;
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::rel::TargetMode;
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Relationships of one source, as read from its `.rels` member.
pub type SerializedRelationships = SmallVec<[SerializedRelationship; 8]>;

/// Serialized part with its content and relationships.
///
/// Represents a part as loaded from the physical package, before
/// being converted into a Part object.
#[derive(Debug)]
pub struct SerializedPart {
    /// The partname (URI) of this part
    pub partname: PackURI,

    /// The content type of this part
    pub content_type: String,

    /// The relationship type through which this part was first reached
    pub reltype: String,

    /// The binary content of this part
    pub blob: Vec<u8>,

    /// Serialized relationships from this part
    pub srels: SerializedRelationships,
}

/// Serialized relationship as read from a .rels file.
///
/// The relationship type is already normalized to its Transitional form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedRelationship {
    /// Base URI for resolving relative references
    pub base_uri: String,

    /// Relationship ID (e.g., "rId1")
    pub r_id: String,

    /// Relationship type URI
    pub reltype: String,

    /// Target reference (relative URI or external URL)
    pub target_ref: String,

    pub target_mode: TargetMode,
}

impl SerializedRelationship {
    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    /// Get the target partname for internal relationships.
    ///
    /// Resolves the relative target reference against the base URI
    /// to produce an absolute PackURI.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidRelationship(format!(
                "Cannot get target_partname for external relationship '{}'",
                self.r_id
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref)
    }
}

/// Package reader that provides access to serialized parts and relationships.
///
/// Parts come out in discovery order, which is deterministic for a given input.
#[derive(Debug)]
pub struct PackageReader {
    /// Package-level relationships
    pkg_srels: SerializedRelationships,

    /// All discovered parts, in pre-order
    sparts: Vec<SerializedPart>,
}

impl PackageReader {
    /// Read the structure of a package.
    ///
    /// A malformed or missing content-type manifest aborts the read. So does a malformed
    /// `.rels` member. A relationship whose target member is absent, and a part with no
    /// content type, are skipped with a warning unless `options.strict` is set.
    pub fn from_phys_reader(
        phys_reader: &mut dyn PhysPkgReader,
        options: &OpenOptions,
    ) -> Result<Self> {
        let mut content_types = ContentTypeMap::from_xml(&phys_reader.content_types_xml()?)?;
        content_types.set_infer(options.infer_content_types);

        let package_uri = PackURI::package();
        let pkg_srels = Self::load_rels(phys_reader, &package_uri)?;
        let sparts = Self::walk_parts(phys_reader, &pkg_srels, &content_types, options)?;

        debug!(
            parts = sparts.len(),
            package_rels = pkg_srels.len(),
            "package structure read"
        );
        Ok(Self { pkg_srels, sparts })
    }

    /// Load and parse the relationships of `source_uri`. A missing `.rels` member is empty.
    fn load_rels(
        phys_reader: &mut dyn PhysPkgReader,
        source_uri: &PackURI,
    ) -> Result<SerializedRelationships> {
        match phys_reader.rels_xml_for(source_uri)? {
            Some(rels_xml) => parse_rels_xml(&rels_xml, source_uri.base_uri()),
            None => Ok(SmallVec::new()),
        }
    }

    /// Walk the relationship graph depth first, in pre-order.
    ///
    /// Each stack frame is a source (None for the package) and the position of the next
    /// relationship of that source to look at. A target is marked visited before its
    /// member is fetched, so a dangling target is looked up only once.
    fn walk_parts(
        phys_reader: &mut dyn PhysPkgReader,
        pkg_srels: &[SerializedRelationship],
        content_types: &ContentTypeMap,
        options: &OpenOptions,
    ) -> Result<Vec<SerializedPart>> {
        let mut sparts: Vec<SerializedPart> = Vec::with_capacity(32);
        let mut visited: HashSet<PackURI> = HashSet::with_capacity(32);
        let mut stack: Vec<(Option<usize>, usize)> = vec![(None, 0)];

        while let Some(frame) = stack.last_mut() {
            let srels: &[SerializedRelationship] = match frame.0 {
                None => pkg_srels,
                Some(source) => &sparts[source].srels,
            };
            let Some(srel) = srels.get(frame.1) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;

            if srel.is_external() {
                continue;
            }

            let partname = match srel.target_partname() {
                Ok(partname) => partname,
                Err(e) if options.strict => return Err(e),
                Err(e) => {
                    warn!(r_id = %srel.r_id, target = %srel.target_ref, error = %e, "skipping unresolvable relationship target");
                    continue;
                },
            };
            if !visited.insert(partname.clone()) {
                continue;
            }
            let reltype = srel.reltype.clone();

            let blob = match phys_reader.blob_for(&partname) {
                Ok(blob) => blob,
                Err(e) if e.is_member_not_found() && !options.strict => {
                    warn!(partname = %partname, "skipping dangling relationship target");
                    continue;
                },
                Err(e) => return Err(e),
            };

            let content_type = match content_types.content_type(&partname) {
                Ok(content_type) => content_type.to_string(),
                Err(e) if options.strict => return Err(e),
                Err(_) => {
                    warn!(partname = %partname, "skipping part with no content type");
                    continue;
                },
            };

            let part_srels = Self::load_rels(phys_reader, &partname)?;
            trace!(
                partname = %partname,
                content_type = %content_type,
                rels = part_srels.len(),
                "discovered part"
            );

            sparts.push(SerializedPart {
                partname,
                content_type,
                reltype,
                blob,
                srels: part_srels,
            });
            stack.push((Some(sparts.len() - 1), 0));
        }

        Ok(sparts)
    }

    /// Get an iterator over all serialized parts, in discovery order.
    pub fn iter_sparts(&self) -> impl Iterator<Item = &SerializedPart> {
        self.sparts.iter()
    }

    /// Get package-level relationships.
    pub fn pkg_srels(&self) -> &[SerializedRelationship] {
        &self.pkg_srels
    }

    /// Split into package-level relationships and discovered parts.
    pub fn into_parts(self) -> (SerializedRelationships, Vec<SerializedPart>) {
        (self.pkg_srels, self.sparts)
    }
}

/// Parse relationships XML into SerializedRelationship structs.
///
/// Strict relationship types are normalized on the way in. A `Relationship` element
/// missing its Id, Type or Target is skipped.
pub fn parse_rels_xml(rels_xml: &[u8], base_uri: &str) -> Result<SerializedRelationships> {
    let mut srels = SmallVec::new();
    let mut reader = Reader::from_reader(rels_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut r_id = None;
                let mut reltype = None;
                let mut target_ref = None;
                let mut target_mode = TargetMode::Internal;

                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"Id" => r_id = Some(attr.unescape_value()?.to_string()),
                        b"Type" => {
                            let value = attr.unescape_value()?;
                            reltype = Some(relationship_type::normalize(&value).into_owned());
                        },
                        b"Target" => target_ref = Some(attr.unescape_value()?.to_string()),
                        b"TargetMode" => target_mode = TargetMode::from_attr(&attr.unescape_value()?),
                        _ => {},
                    }
                }

                match (r_id, reltype, target_ref) {
                    (Some(r_id), Some(reltype), Some(target_ref)) => {
                        srels.push(SerializedRelationship {
                            base_uri: base_uri.to_string(),
                            r_id,
                            reltype,
                            target_ref,
                            target_mode,
                        });
                    },
                    (r_id, _, _) => {
                        warn!(base_uri, r_id = ?r_id, "skipping incomplete relationship");
                    },
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(OpcError::XmlError(format!(
                    "Rels parse error under '{}' at {}: {}",
                    base_uri,
                    reader.buffer_position(),
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }

    Ok(srels)
}
