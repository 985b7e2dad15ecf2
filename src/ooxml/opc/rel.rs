//! Relationship-related objects for OPC packages.
//!
//! This module provides types for managing relationships between parts in an OPC package,
//! including internal, external and dangling relationships. Internal targets are held as
//! [`PartId`] handles into the package's part arena, never as owning pointers.

use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use std::borrow::Cow;
use std::collections::HashMap;

/// Handle of a part inside an [`OpcPackage`](crate::ooxml::opc::package::OpcPackage).
///
/// Handles are dense indices and stay valid for the lifetime of the package, even across
/// renames. A handle of a removed part no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

impl PartId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        PartId(index)
    }

    /// Position of the part in the package arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a relationship points inside or outside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

impl TargetMode {
    /// Parse a `TargetMode` attribute value. Anything but `External` is internal.
    #[inline]
    pub fn from_attr(value: &str) -> Self {
        if value == target_mode::EXTERNAL {
            TargetMode::External
        } else {
            TargetMode::Internal
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetMode::Internal => target_mode::INTERNAL,
            TargetMode::External => target_mode::EXTERNAL,
        }
    }
}

/// Maps part handles to their current part names when relationships are serialized.
pub trait TargetResolver {
    /// Current part name of `id`, or None if the part is gone.
    fn target_partname(&self, id: PartId) -> Option<&PackURI>;
}

/// A single relationship from a source to a target.
///
/// The original `target_ref` string is always retained, so an internal relationship whose
/// target never resolved (dangling) still round-trips.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference as read or written: a relative part reference or an external URL
    target_ref: String,

    /// Base URI of the owning source, for resolving `target_ref`
    base_uri: String,

    target_mode: TargetMode,

    /// Resolved target, None for external and dangling relationships
    target_part: Option<PartId>,
}

impl Relationship {
    /// Create a new relationship.
    ///
    /// An external relationship never carries a target part.
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        target_mode: TargetMode,
        target_part: Option<PartId>,
    ) -> Self {
        let target_part = match target_mode {
            TargetMode::Internal => target_part,
            TargetMode::External => None,
        };
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            target_mode,
            target_part,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    ///
    /// For internal relationships, this is a relative part reference.
    /// For external relationships, this is an absolute URL.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    /// Internal relationship whose target could not be resolved.
    #[inline]
    pub fn is_dangling(&self) -> bool {
        !self.is_external() && self.target_part.is_none()
    }

    /// The resolved target part, if any.
    #[inline]
    pub fn target_part(&self) -> Option<PartId> {
        self.target_part
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns an error if this is an external relationship.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidRelationship(format!(
                "Cannot get target_partname for external relationship '{}'",
                self.r_id
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref)
    }

    /// The `Target` value to serialize from a source now based at `base_uri`.
    ///
    /// The original reference is kept while it still names the target from this base.
    fn serialized_target(&self, base_uri: &str, resolver: &dyn TargetResolver) -> Cow<'_, str> {
        if self.is_external() {
            return Cow::Borrowed(&self.target_ref);
        }
        let original = PackURI::from_rel_ref(&self.base_uri, &self.target_ref).ok();
        let current = self
            .target_part
            .and_then(|id| resolver.target_partname(id))
            .or(original.as_ref());

        match current {
            Some(current) if self.base_uri != base_uri || original.as_ref() != Some(current) => {
                Cow::Owned(current.relative_ref(base_uri))
            },
            _ => Cow::Borrowed(&self.target_ref),
        }
    }
}

/// Collection of relationships from a single source (the package or one part).
///
/// Insertion order is preserved for deterministic serialization; a side index gives
/// O(1) lookup by rId.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Base URI for resolving relative references
    base_uri: String,

    rels: Vec<Relationship>,

    /// rId to position in `rels`
    index: HashMap<String, usize>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    ///
    /// # Arguments
    /// * `base_uri` - Base URI of the owning source, for resolving relative references
    pub fn new<S: Into<String>>(base_uri: S) -> Self {
        Self {
            base_uri: base_uri.into(),
            rels: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Move the source. Existing references are re-based when serialized.
    pub(crate) fn set_base_uri(&mut self, base_uri: &str) {
        self.base_uri = base_uri.to_string();
    }

    /// Record a relationship read from a package.
    ///
    /// Duplicate rIds from a malformed source are not rejected: the later record replaces
    /// the earlier one in place.
    pub fn load(
        &mut self,
        r_id: String,
        reltype: String,
        target_ref: String,
        target_part: Option<PartId>,
        is_external: bool,
    ) -> &Relationship {
        let mode = if is_external {
            TargetMode::External
        } else {
            TargetMode::Internal
        };
        let rel = Relationship::new(
            r_id,
            reltype,
            target_ref,
            self.base_uri.clone(),
            mode,
            target_part,
        );
        self.insert(rel)
    }

    /// Record a relationship as given, under the next free rId.
    pub fn add(
        &mut self,
        reltype: &str,
        target_ref: &str,
        target_part: Option<PartId>,
        is_external: bool,
    ) -> &Relationship {
        let r_id = self.next_r_id();
        self.load(
            r_id,
            reltype.to_string(),
            target_ref.to_string(),
            target_part,
            is_external,
        )
    }

    fn insert(&mut self, rel: Relationship) -> &Relationship {
        let pos = match self.index.get(rel.r_id()) {
            Some(&pos) => {
                self.rels[pos] = rel;
                pos
            },
            None => {
                let pos = self.rels.len();
                self.index.insert(rel.r_id.clone(), pos);
                self.rels.push(rel);
                pos
            },
        };
        &self.rels[pos]
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.index.get(r_id).map(|&pos| &self.rels[pos])
    }

    /// Get or add a relationship to a target part.
    ///
    /// Returns the existing relationship when one of the same type already targets this exact
    /// part. Otherwise records a new one, pointing at `target_ref`, under the next free rId.
    pub fn get_or_add(&mut self, reltype: &str, target: PartId, target_ref: &str) -> &Relationship {
        let existing = self
            .rels
            .iter()
            .position(|rel| rel.target_part == Some(target) && rel.reltype == reltype);

        match existing {
            Some(pos) => &self.rels[pos],
            None => self.add(reltype, target_ref, Some(target), false),
        }
    }

    /// Get or add an external relationship, returning its rId.
    ///
    /// Reuses an existing external relationship with the same type and URL.
    pub fn get_or_add_ext_rel(&mut self, reltype: &str, target_ref: &str) -> String {
        if let Some(rel) = self
            .rels
            .iter()
            .find(|rel| rel.is_external() && rel.reltype == reltype && rel.target_ref == target_ref)
        {
            return rel.r_id.clone();
        }

        self.add(reltype, target_ref, None, true).r_id.clone()
    }

    /// Get the next available relationship ID.
    ///
    /// Generates IDs in the format "rId1", "rId2", etc., filling in gaps
    /// if any exist. Uses efficient integer parsing with atoi_simd.
    pub fn next_r_id(&self) -> String {
        let mut used_numbers: Vec<u32> = self
            .index
            .keys()
            .filter_map(|r_id| {
                r_id.strip_prefix("rId")
                    .and_then(|digits| atoi_simd::parse::<u32, false, false>(digits.as_bytes()).ok())
            })
            .collect();

        used_numbers.sort_unstable();

        let mut next_num = 1u32;
        for &num in &used_numbers {
            match num.cmp(&next_num) {
                std::cmp::Ordering::Equal => next_num += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {},
            }
        }

        format!("rId{}", next_num)
    }

    /// Get the first relationship of a specific type, in insertion order.
    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        self.rels
            .iter()
            .find(|rel| rel.reltype == reltype)
            .ok_or_else(|| {
                OpcError::RelationshipNotFound(format!("No relationship of type '{}'", reltype))
            })
    }

    /// Get an iterator over all relationships, in insertion order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Relationship> {
        self.rels.iter()
    }

    /// All relationships as an ordered slice.
    #[inline]
    pub fn as_slice(&self) -> &[Relationship] {
        &self.rels
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Remove a relationship by its ID, keeping the order of the rest.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.index.remove(r_id)?;
        let rel = self.rels.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(rel)
    }

    /// Turn every relationship to `target` into a dangling one. Returns how many changed.
    pub(crate) fn detach(&mut self, target: PartId) -> usize {
        let mut detached = 0;
        for rel in self.rels.iter_mut().filter(|rel| rel.target_part == Some(target)) {
            rel.target_part = None;
            detached += 1;
        }
        detached
    }

    /// Serialize relationships to the XML of a `.rels` member, in insertion order.
    ///
    /// A resolved target keeps its original reference while that still names the target's
    /// current part name; after a rename of either end the reference is recomputed relative
    /// to this collection's base URI. External targets are written verbatim, and so are
    /// dangling ones unless the source moved.
    pub fn to_xml(&self, resolver: &dyn TargetResolver) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(r#"<Relationships xmlns=""#);
        xml.push_str(namespace::OPC_RELATIONSHIPS);
        xml.push_str(r#"">"#);

        for rel in &self.rels {
            let target = rel.serialized_target(&self.base_uri, resolver);

            xml.push_str(r#"<Relationship Id=""#);
            xml.push_str(&escape_xml(&rel.r_id));
            xml.push_str(r#"" Type=""#);
            xml.push_str(&escape_xml(&rel.reltype));
            xml.push_str(r#"" Target=""#);
            xml.push_str(&escape_xml(&target));
            if rel.is_external() {
                xml.push_str(r#"" TargetMode="External"#);
            }
            xml.push_str(r#""/>"#);
        }

        xml.push_str("</Relationships>");

        xml
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/")
    }
}

impl<'a> IntoIterator for &'a Relationships {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.rels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Names(HashMap<PartId, PackURI>);

    impl TargetResolver for Names {
        fn target_partname(&self, id: PartId) -> Option<&PackURI> {
            self.0.get(&id)
        }
    }

    fn names(entries: &[(usize, &str)]) -> Names {
        Names(
            entries
                .iter()
                .map(|(id, name)| (PartId::new(*id), PackURI::new(*name).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn test_relationship_creation() {
        let rel = Relationship::new(
            "rId1".to_string(),
            "http://example.com/rel".to_string(),
            "target.xml".to_string(),
            "/word".to_string(),
            TargetMode::Internal,
            None,
        );

        assert_eq!(rel.r_id(), "rId1");
        assert_eq!(rel.reltype(), "http://example.com/rel");
        assert!(!rel.is_external());
        assert!(rel.is_dangling());
        assert_eq!(rel.target_partname().unwrap().as_str(), "/word/target.xml");
    }

    #[test]
    fn test_external_never_has_target() {
        let rel = Relationship::new(
            "rId1".to_string(),
            "http://example.com/link".to_string(),
            "https://example.com".to_string(),
            "/word".to_string(),
            TargetMode::External,
            Some(PartId::new(0)),
        );
        assert_eq!(rel.target_part(), None);
        assert!(!rel.is_dangling());
        assert!(rel.target_partname().is_err());
    }

    #[test]
    fn test_next_r_id() {
        let mut rels = Relationships::new("/word");
        assert_eq!(rels.next_r_id(), "rId1");

        rels.load("rId1".into(), "t".into(), "a.xml".into(), None, false);
        rels.load("rId3".into(), "t".into(), "b.xml".into(), None, false);
        assert_eq!(rels.next_r_id(), "rId2");

        rels.load("rId2".into(), "t".into(), "c.xml".into(), None, false);
        assert_eq!(rels.next_r_id(), "rId4");
    }

    #[test]
    fn test_load_last_write_wins() {
        let mut rels = Relationships::new("/");
        rels.load("rId1".into(), "a".into(), "one.xml".into(), None, false);
        rels.load("rId2".into(), "b".into(), "two.xml".into(), None, false);
        rels.load("rId1".into(), "c".into(), "three.xml".into(), None, false);

        assert_eq!(rels.len(), 2);
        let ids: Vec<_> = rels.iter().map(|r| r.r_id()).collect();
        assert_eq!(ids, ["rId1", "rId2"]);
        assert_eq!(rels.get("rId1").unwrap().target_ref(), "three.xml");
    }

    #[test]
    fn test_get_or_add() {
        let mut rels = Relationships::new("/word");
        let target = PartId::new(7);

        let r_id1 = rels.get_or_add("type1", target, "target1.xml").r_id().to_string();
        assert_eq!(r_id1, "rId1");

        // Getting the same relationship should return the same rId
        let r_id2 = rels.get_or_add("type1", target, "target1.xml").r_id().to_string();
        assert_eq!(r_id2, "rId1");
        assert_eq!(rels.len(), 1);

        // Different type to the same part is a new relationship
        let r_id3 = rels.get_or_add("type2", target, "target1.xml").r_id().to_string();
        assert_eq!(r_id3, "rId2");
    }

    #[test]
    fn test_get_or_add_ext_rel() {
        let mut rels = Relationships::new("/word");
        let a = rels.get_or_add_ext_rel("hyperlink", "https://a.example");
        let b = rels.get_or_add_ext_rel("hyperlink", "https://a.example");
        let c = rels.get_or_add_ext_rel("hyperlink", "https://b.example");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(rels.get(&a).unwrap().is_external());
    }

    #[test]
    fn test_part_with_reltype_first_match() {
        let mut rels = Relationships::new("/");
        rels.load("rId5".into(), "styles".into(), "first.xml".into(), None, false);
        rels.load("rId2".into(), "styles".into(), "second.xml".into(), None, false);

        assert_eq!(rels.part_with_reltype("styles").unwrap().target_ref(), "first.xml");
        let err = rels.part_with_reltype("numbering").unwrap_err();
        assert!(matches!(err, OpcError::RelationshipNotFound(_)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut rels = Relationships::new("/");
        for n in 1..=4 {
            rels.load(format!("rId{n}"), "t".into(), format!("p{n}.xml"), None, false);
        }
        assert!(rels.remove("rId2").is_some());
        assert!(rels.remove("rId2").is_none());

        let ids: Vec<_> = rels.iter().map(|r| r.r_id()).collect();
        assert_eq!(ids, ["rId1", "rId3", "rId4"]);
        assert_eq!(rels.get("rId4").unwrap().target_ref(), "p4.xml");
    }

    #[test]
    fn test_to_xml_keeps_original_reference() {
        let mut rels = Relationships::new("/word");
        rels.load("rId1".into(), "styles".into(), "./styles.xml".into(), Some(PartId::new(0)), false);
        let xml = rels.to_xml(&names(&[(0, "/word/styles.xml")]));

        assert!(xml.contains(r#"Target="./styles.xml""#));
        assert!(!xml.contains("TargetMode"));
    }

    #[test]
    fn test_to_xml_recomputes_after_rename() {
        let mut rels = Relationships::new("/word");
        rels.load("rId1".into(), "image".into(), "media/image1.png".into(), Some(PartId::new(3)), false);
        let xml = rels.to_xml(&names(&[(3, "/media/picture.png")]));

        assert!(xml.contains(r#"Target="../media/picture.png""#));
    }

    #[test]
    fn test_to_xml_rebases_after_source_move() {
        let mut rels = Relationships::new("/word");
        rels.load("rId1".into(), "styles".into(), "styles.xml".into(), Some(PartId::new(0)), false);
        rels.load("rId2".into(), "image".into(), "media/gone.png".into(), None, false);
        rels.set_base_uri("/");

        let xml = rels.to_xml(&names(&[(0, "/word/styles.xml")]));
        assert!(xml.contains(r#"Target="word/styles.xml""#));
        assert!(xml.contains(r#"Target="word/media/gone.png""#));
    }

    #[test]
    fn test_to_xml_external_and_dangling_verbatim() {
        let mut rels = Relationships::new("/word");
        rels.load("rId1".into(), "hyperlink".into(), "https://example.com/?a=1&b=2".into(), None, true);
        rels.load("rId2".into(), "image".into(), "media/missing.png".into(), None, false);
        let xml = rels.to_xml(&names(&[]));

        assert!(xml.contains(
            r#"<Relationship Id="rId1" Type="hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>"#
        ));
        assert!(xml.contains(r#"<Relationship Id="rId2" Type="image" Target="media/missing.png"/>"#));
        assert!(xml.find("rId1").unwrap() < xml.find("rId2").unwrap());
    }
}
