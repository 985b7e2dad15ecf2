//! Package writer for OPC packages.
//!
//! Serializes a package onto a [`PhysPkgWriter`]: the [Content_Types].xml manifest, the
//! package relationships, then every part followed by its own relationships.

use crate::ooxml::opc::content_types::ContentTypesItem;
use crate::ooxml::opc::error::Result;
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use crate::ooxml::opc::part::Part;
use crate::ooxml::opc::phys_pkg::PhysPkgWriter;
use crate::ooxml::opc::rel::{Relationships, TargetResolver};
use tracing::debug;

/// Writes the members of an OPC package.
///
/// [`OpcPackage::save`](crate::ooxml::opc::package::OpcPackage::save) is the usual entry
/// point; it runs the pre-save hooks and passes the reachable parts here in traversal order.
pub struct PackageWriter;

impl PackageWriter {
    /// Write a package.
    ///
    /// `/_rels/.rels` is always written, even when empty. A part's `.rels` member is written
    /// only when it has relationships. `resolver` supplies the current name of every part
    /// a relationship points at.
    pub fn write(
        phys_writer: &mut dyn PhysPkgWriter,
        pkg_rels: &Relationships,
        parts: &[&dyn Part],
        resolver: &dyn TargetResolver,
    ) -> Result<()> {
        Self::write_content_types(phys_writer, parts)?;
        Self::write_pkg_rels(phys_writer, pkg_rels, resolver)?;
        Self::write_parts(phys_writer, parts, resolver)?;

        debug!(parts = parts.len(), "package written");
        Ok(())
    }

    fn write_content_types(phys_writer: &mut dyn PhysPkgWriter, parts: &[&dyn Part]) -> Result<()> {
        let cti = ContentTypesItem::from_parts(
            parts
                .iter()
                .map(|part| (part.partname(), part.content_type())),
        );
        phys_writer.write(&PackURI::new(CONTENT_TYPES_URI)?, cti.to_xml().as_bytes())
    }

    fn write_pkg_rels(
        phys_writer: &mut dyn PhysPkgWriter,
        pkg_rels: &Relationships,
        resolver: &dyn TargetResolver,
    ) -> Result<()> {
        let rels_uri = PackURI::package().rels_uri()?;
        phys_writer.write(&rels_uri, pkg_rels.to_xml(resolver).as_bytes())
    }

    fn write_parts(
        phys_writer: &mut dyn PhysPkgWriter,
        parts: &[&dyn Part],
        resolver: &dyn TargetResolver,
    ) -> Result<()> {
        for part in parts {
            phys_writer.write(part.partname(), part.blob())?;

            if !part.rels().is_empty() {
                let rels_uri = part.partname().rels_uri()?;
                phys_writer.write(&rels_uri, part.rels().to_xml(resolver).as_bytes())?;
            }
        }

        Ok(())
    }
}
