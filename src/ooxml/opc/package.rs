//! Objects that implement reading and writing OPC packages.
//!
//! This module provides the main OpcPackage type, which represents an Open Packaging
//! Convention package in memory. The package owns every part in one arena; relationships
//! refer to their targets through [`PartId`] handles into it, so cyclic graphs need no
//! shared ownership.

use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::factory::PartFactory;
use crate::ooxml::opc::packuri::{PACKAGE_URI, PackURI};
use crate::ooxml::opc::part::Part;
use crate::ooxml::opc::phys_pkg::{DirPhysReader, PhysPkgReader, PhysPkgWriter, ZipPhysReader, ZipPhysWriter};
use crate::ooxml::opc::pkgreader::{PackageReader, SerializedPart, SerializedRelationships};
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::{PartId, Relationship, Relationships, TargetResolver};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Options controlling how tolerant opening a package is.
///
/// The defaults match what widely used consumers accept: a relationship to a missing member
/// is kept as a dangling relationship, and a part with no content type is left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Fail the open on a dangling relationship or a part without a content type
    pub strict: bool,

    /// Give parts with a well-known extension their conventional content type when the
    /// manifest has no entry for them
    pub infer_content_types: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_infer_content_types(mut self, infer: bool) -> Self {
        self.infer_content_types = infer;
        self
    }
}

/// Main API class for working with OPC packages.
///
/// Parts live in an arena indexed by [`PartId`]. A removed part leaves an empty slot, so
/// handles of the remaining parts never change.
pub struct OpcPackage {
    /// Package-level relationships
    rels: Relationships,

    /// Part arena
    parts: Vec<Option<Box<dyn Part>>>,

    /// Partname to arena slot
    names: HashMap<PackURI, PartId>,

    /// Relationships of the part whose hook is running, so traversal can pass through it
    checked_out: Option<(PartId, Relationships)>,
}

impl OpcPackage {
    /// Create a new empty OPC package.
    pub fn new() -> Self {
        Self {
            rels: Relationships::new(PACKAGE_URI),
            parts: Vec::new(),
            names: HashMap::new(),
            checked_out: None,
        }
    }

    /// Open an OPC package from a file, or from a directory holding an extracted package.
    ///
    /// Parts are built by [`PartFactory::with_defaults`] and the open is tolerant.
    ///
    /// # Example
    /// ```no_run
    /// use opc_engine::ooxml::opc::package::OpcPackage;
    ///
    /// let pkg = OpcPackage::open("document.docx")?;
    /// println!("{} parts", pkg.part_count());
    /// # Ok::<(), opc_engine::ooxml::opc::error::OpcError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &PartFactory::with_defaults(), &OpenOptions::default())
    }

    /// Open an OPC package with a custom factory and options.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        factory: &PartFactory,
        options: &OpenOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening package");
        if path.is_dir() {
            let mut phys_reader = DirPhysReader::open(path)?;
            Self::from_phys_reader(&mut phys_reader, factory, options)
        } else {
            let mut phys_reader = ZipPhysReader::open(path)?;
            Self::from_phys_reader(&mut phys_reader, factory, options)
        }
    }

    /// Load an OPC package from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut phys_reader = ZipPhysReader::from_bytes(data)?;
        Self::from_phys_reader(&mut phys_reader, &PartFactory::with_defaults(), &OpenOptions::default())
    }

    /// Load an OPC package from a reader.
    ///
    /// # Arguments
    /// * `reader` - A reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut phys_reader = ZipPhysReader::from_reader(reader)?;
        Self::from_phys_reader(&mut phys_reader, &PartFactory::with_defaults(), &OpenOptions::default())
    }

    /// Load an OPC package from any physical package reader.
    pub fn from_phys_reader(
        phys_reader: &mut dyn PhysPkgReader,
        factory: &PartFactory,
        options: &OpenOptions,
    ) -> Result<Self> {
        let pkg_reader = PackageReader::from_phys_reader(phys_reader, options)?;
        Self::unmarshal(pkg_reader, factory)
    }

    /// Build the live graph from the serialized one.
    ///
    /// Every part is constructed first, then relationships are wired by target name, then
    /// the post-load hooks run in discovery order over the complete graph.
    fn unmarshal(pkg_reader: PackageReader, factory: &PartFactory) -> Result<Self> {
        let (pkg_srels, sparts) = pkg_reader.into_parts();
        let mut package = Self::new();
        package.parts.reserve(sparts.len());

        let mut part_srels = Vec::with_capacity(sparts.len());
        for spart in sparts {
            let SerializedPart {
                partname,
                content_type,
                reltype,
                blob,
                srels,
            } = spart;
            let part = factory.load(partname, &content_type, &reltype, blob)?;
            let id = package.insert_part(part);
            part_srels.push((id, srels));
        }

        Self::load_rels(&mut package.rels, pkg_srels, &package.names);
        for (id, srels) in part_srels {
            if let Some(part) = package.parts[id.index()].as_mut() {
                Self::load_rels(part.rels_mut(), srels, &package.names);
            }
        }

        for index in 0..package.parts.len() {
            package.with_checked_out(PartId::new(index), |part, pkg| part.after_unmarshal(pkg))?;
        }

        debug!(parts = package.part_count(), "package loaded");
        Ok(package)
    }

    fn load_rels(
        rels: &mut Relationships,
        srels: SerializedRelationships,
        names: &HashMap<PackURI, PartId>,
    ) {
        for srel in srels {
            let is_external = srel.is_external();
            let target = if is_external {
                None
            } else {
                let target = srel
                    .target_partname()
                    .ok()
                    .and_then(|partname| names.get(&partname).copied());
                if target.is_none() {
                    warn!(r_id = %srel.r_id, target = %srel.target_ref, base_uri = %srel.base_uri, "relationship target not loaded");
                }
                target
            };
            rels.load(srel.r_id, srel.reltype, srel.target_ref, target, is_external);
        }
    }

    fn insert_part(&mut self, part: Box<dyn Part>) -> PartId {
        let id = PartId::new(self.parts.len());
        self.names.insert(part.partname().clone(), id);
        self.parts.push(Some(part));
        id
    }

    /// Run `f` on a part taken out of the arena, with the rest of the package visible.
    ///
    /// Traversal still descends through the checked-out part using a snapshot of its
    /// relationships; only the part itself is not yielded. The part is put back even when
    /// `f` fails.
    fn with_checked_out<F>(&mut self, id: PartId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Box<dyn Part>, &OpcPackage) -> Result<()>,
    {
        let Some(mut part) = self.parts.get_mut(id.index()).and_then(Option::take) else {
            return Ok(());
        };
        self.checked_out = Some((id, part.rels().clone()));
        let result = f(&mut part, self);
        self.checked_out = None;
        self.parts[id.index()] = Some(part);
        result
    }

    /// The part behind `id`, if it is in the arena, and the relationships to descend into.
    fn node(&self, id: PartId) -> Option<(Option<&dyn Part>, &Relationships)> {
        if let Some(part) = self.part(id) {
            return Some((Some(part), part.rels()));
        }
        match &self.checked_out {
            Some((checked_out, rels)) if *checked_out == id => Some((None, rels)),
            _ => None,
        }
    }

    /// Save the package to a physical package writer.
    ///
    /// Runs the pre-save hook of every reachable part in traversal order, then writes the
    /// package relationships and the reachable parts. Parts no relationship leads to are
    /// not written.
    pub fn save(&mut self, phys_writer: &mut dyn PhysPkgWriter) -> Result<()> {
        let ids: Vec<PartId> = self.walk().map(|(id, _)| id).collect();
        for id in ids {
            self.with_checked_out(id, |part, pkg| part.before_marshal(pkg))?;
        }

        let parts: Vec<&dyn Part> = self.iter_parts().collect();
        PackageWriter::write(phys_writer, &self.rels, &parts, &*self)
    }

    /// Save the package to a ZIP file.
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut phys_writer = ZipPhysWriter::create(path)?;
        self.save(&mut phys_writer)?;
        phys_writer.finish()?.flush()?;
        Ok(())
    }

    /// Save the package to an in-memory ZIP archive.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut phys_writer = ZipPhysWriter::in_memory();
        self.save(&mut phys_writer)?;
        Ok(phys_writer.finish()?.into_inner())
    }

    /// Add a new part to the package.
    ///
    /// The part is not reachable until a relationship leads to it. Fails with
    /// [`OpcError::InvalidPackUri`] if a part of the same name exists.
    pub fn add_part(&mut self, part: Box<dyn Part>) -> Result<PartId> {
        let partname = part.partname();
        if partname.is_package() {
            return Err(OpcError::InvalidPackUri(
                "the package URI cannot name a part".to_string(),
            ));
        }
        if self.names.contains_key(partname) {
            return Err(OpcError::InvalidPackUri(format!(
                "a part named '{}' already exists",
                partname
            )));
        }
        Ok(self.insert_part(part))
    }

    /// Remove a part and return it.
    ///
    /// Relationships that pointed at it become dangling and keep their target reference.
    pub fn remove_part(&mut self, partname: &PackURI) -> Result<Box<dyn Part>> {
        let id = self
            .names
            .remove(partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;
        let part = self.parts[id.index()]
            .take()
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;

        let mut detached = self.rels.detach(id);
        for other in self.parts.iter_mut().flatten() {
            detached += other.rels_mut().detach(id);
        }
        debug!(partname = %partname, detached, "part removed");
        Ok(part)
    }

    /// Give a part a new name.
    ///
    /// Relationships to and from the part are re-targeted when the package is saved.
    pub fn rename_part(&mut self, id: PartId, partname: PackURI) -> Result<()> {
        if partname.is_package() {
            return Err(OpcError::InvalidPackUri(
                "the package URI cannot name a part".to_string(),
            ));
        }
        if let Some(&existing) = self.names.get(&partname) {
            if existing == id {
                return Ok(());
            }
            return Err(OpcError::InvalidPackUri(format!(
                "a part named '{}' already exists",
                partname
            )));
        }

        let part = self
            .parts
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| OpcError::PartNotFound(format!("part #{}", id.index())))?;

        self.names.remove(part.partname());
        part.rels_mut().set_base_uri(partname.base_uri());
        part.set_partname(partname.clone());
        self.names.insert(partname, id);
        Ok(())
    }

    /// Get a part by handle.
    pub fn part(&self, id: PartId) -> Option<&dyn Part> {
        self.parts
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|b| &**b as &dyn Part)
    }

    /// Get a mutable reference to a part by handle.
    pub fn part_mut(&mut self, id: PartId) -> Option<&mut dyn Part> {
        self.parts
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|b| &mut **b as &mut dyn Part)
    }

    /// Get a part by its partname.
    pub fn part_by_name(&self, partname: &PackURI) -> Result<&dyn Part> {
        self.part_id(partname)
            .and_then(|id| self.part(id))
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Get the handle of a part by its partname.
    #[inline]
    pub fn part_id(&self, partname: &PackURI) -> Option<PartId> {
        self.names.get(partname).copied()
    }

    /// Check if a part exists in the package.
    #[inline]
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.names.contains_key(partname)
    }

    /// Number of parts held by the package, reachable or not.
    #[inline]
    pub fn part_count(&self) -> usize {
        self.names.len()
    }

    /// Get the package-level relationships.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Relate the package to a part.
    ///
    /// Returns the rId of the existing package relationship of this type to the part, or of
    /// a newly added one. Calling it again with the same arguments returns the same rId.
    pub fn relate_to(&mut self, target: PartId, reltype: &str) -> Result<String> {
        let target_ref = self
            .part(target)
            .map(|part| part.partname().relative_ref(PACKAGE_URI))
            .ok_or_else(|| OpcError::PartNotFound(format!("part #{}", target.index())))?;
        Ok(self
            .rels
            .get_or_add(reltype, target, &target_ref)
            .r_id()
            .to_string())
    }

    /// Relate one part to another, returning the rId on the source part.
    pub fn relate_part(&mut self, source: PartId, target: PartId, reltype: &str) -> Result<String> {
        let target_partname = self
            .part(target)
            .map(|part| part.partname().clone())
            .ok_or_else(|| OpcError::PartNotFound(format!("part #{}", target.index())))?;
        let source_part = self
            .part_mut(source)
            .ok_or_else(|| OpcError::PartNotFound(format!("part #{}", source.index())))?;
        Ok(source_part.relate_to(target, &target_partname, reltype))
    }

    /// Get the part the package relates to by `reltype`.
    ///
    /// Fails with [`OpcError::RelationshipNotFound`] if there is no such relationship, and
    /// with [`OpcError::NotResolvable`] if it is external or its target was never loaded.
    pub fn related_part(&self, reltype: &str) -> Result<&dyn Part> {
        let rel = self.rels.part_with_reltype(reltype)?;
        self.resolve(rel)
    }

    /// Get the part a part relates to by `reltype`.
    pub fn part_related_by(&self, source: PartId, reltype: &str) -> Result<&dyn Part> {
        let source_part = self
            .part(source)
            .ok_or_else(|| OpcError::PartNotFound(format!("part #{}", source.index())))?;
        let rel = source_part.rels().part_with_reltype(reltype)?;
        self.resolve(rel)
    }

    fn resolve(&self, rel: &Relationship) -> Result<&dyn Part> {
        if rel.is_external() {
            return Err(OpcError::NotResolvable(format!(
                "'{}' is an external relationship to '{}'",
                rel.r_id(),
                rel.target_ref()
            )));
        }
        rel.target_part()
            .and_then(|id| self.part(id))
            .ok_or_else(|| {
                OpcError::NotResolvable(format!(
                    "target '{}' of '{}' is not in the package",
                    rel.target_ref(),
                    rel.r_id()
                ))
            })
    }

    /// Get a reference to the main document part.
    ///
    /// For Word documents, this is the document.xml part.
    /// For Excel, the workbook.xml part.
    /// For PowerPoint, the presentation.xml part.
    pub fn main_document_part(&self) -> Result<&dyn Part> {
        self.related_part(relationship_type::OFFICE_DOCUMENT)
    }

    /// Iterate over every part reachable from the package relationships, once each, in
    /// depth-first pre-order. External and dangling relationships are not followed.
    pub fn iter_parts(&self) -> IterParts<'_> {
        IterParts { walk: self.walk() }
    }

    /// Reachable parts in traversal order.
    pub fn parts(&self) -> Vec<&dyn Part> {
        self.iter_parts().collect()
    }

    /// Iterate over every relationship of the reachable graph, in depth-first pre-order.
    ///
    /// External and dangling relationships are yielded too. A relationship back into an
    /// already visited part is yielded without descending again.
    pub fn iter_rels(&self) -> IterRels<'_> {
        IterRels {
            package: self,
            stack: vec![self.rels.iter()],
            visited: FixedBitSet::with_capacity(self.parts.len()),
        }
    }

    fn walk(&self) -> Walk<'_> {
        Walk {
            package: self,
            stack: vec![self.rels.iter()],
            visited: FixedBitSet::with_capacity(self.parts.len()),
        }
    }

    /// Find the next available partname for a part template.
    ///
    /// Returns the smallest positive substitution for `%d` whose name is not taken. The
    /// result depends only on the current parts: asking twice without adding the part gives
    /// the same name.
    ///
    /// # Example
    /// ```
    /// # use opc_engine::ooxml::opc::package::OpcPackage;
    /// let pkg = OpcPackage::new();
    /// let next_image = pkg.next_partname("/word/media/image%d.png")?;
    /// assert_eq!(next_image.as_str(), "/word/media/image1.png");
    /// # Ok::<(), opc_engine::ooxml::opc::error::OpcError>(())
    /// ```
    pub fn next_partname(&self, template: &str) -> Result<PackURI> {
        if !template.contains("%d") {
            return Err(OpcError::InvalidPackUri(format!(
                "partname template '{}' has no %d placeholder",
                template
            )));
        }

        let count = self.part_count();
        for n in 1..=count + 2 {
            let candidate = PackURI::new(template.replacen("%d", &n.to_string(), 1))?;
            if !self.contains_part(&candidate) {
                return Ok(candidate);
            }
        }
        PackURI::new(template.replacen("%d", &(count + 1).to_string(), 1))
    }
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpcPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcPackage")
            .field("parts", &self.part_count())
            .field("rels", &self.rels.len())
            .finish()
    }
}

impl TargetResolver for OpcPackage {
    fn target_partname(&self, id: PartId) -> Option<&PackURI> {
        self.part(id).map(|part| part.partname())
    }
}

/// Pre-order walk over reachable parts with an explicit stack of relationship iterators.
struct Walk<'a> {
    package: &'a OpcPackage,
    stack: Vec<std::slice::Iter<'a, Relationship>>,
    visited: FixedBitSet,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (PartId, &'a dyn Part);

    fn next(&mut self) -> Option<Self::Item> {
        let package = self.package;
        while let Some(rels) = self.stack.last_mut() {
            let Some(rel) = rels.next() else {
                self.stack.pop();
                continue;
            };
            let Some(id) = rel.target_part() else {
                continue;
            };
            let Some((part, rels)) = package.node(id) else {
                continue;
            };
            if self.visited.put(id.index()) {
                continue;
            }
            self.stack.push(rels.iter());
            if let Some(part) = part {
                return Some((id, part));
            }
        }
        None
    }
}

/// Iterator returned by [`OpcPackage::iter_parts`].
pub struct IterParts<'a> {
    walk: Walk<'a>,
}

impl<'a> Iterator for IterParts<'a> {
    type Item = &'a dyn Part;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next().map(|(_, part)| part)
    }
}

/// Iterator returned by [`OpcPackage::iter_rels`].
pub struct IterRels<'a> {
    package: &'a OpcPackage,
    stack: Vec<std::slice::Iter<'a, Relationship>>,
    visited: FixedBitSet,
}

impl<'a> Iterator for IterRels<'a> {
    type Item = &'a Relationship;

    fn next(&mut self) -> Option<Self::Item> {
        let package = self.package;
        while let Some(rels) = self.stack.last_mut() {
            let Some(rel) = rels.next() else {
                self.stack.pop();
                continue;
            };
            if let Some((id, (_, rels))) = rel
                .target_part()
                .and_then(|id| package.node(id).map(|node| (id, node)))
            {
                if !self.visited.put(id.index()) {
                    self.stack.push(rels.iter());
                }
            }
            return Some(rel);
        }
        None
    }
}
