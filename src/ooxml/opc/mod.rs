//! Open Packaging Conventions (OPC) implementation.
//!
//! An OPC package is a ZIP archive holding parts (XML or binary payloads) joined by typed
//! relationships. This module reads such a package into an in-memory graph, lets callers
//! inspect and modify it, and writes it back out.
//!
//! - [`PackURI`] names parts and resolves relative references
//! - [`Relationships`] holds the typed edges of one source
//! - [`ContentTypeMap`] resolves part names against `[Content_Types].xml`
//! - [`PartFactory`] decides which [`Part`] kind each loaded part becomes
//! - [`OpcPackage`] owns the graph and runs the read and save algorithms
//!
//! Reading tolerates the defects common in third-party packages: a relationship to a
//! missing member is kept as a dangling relationship, and a part missing from the content
//! type manifest is left out. [`OpenOptions::strict`] turns both into errors.

pub mod constants;
pub mod content_types;
pub mod error;
pub mod factory;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

// Re-export commonly used types
pub use content_types::{ContentTypeMap, ContentTypesItem};
pub use error::{OpcError, Result};
pub use factory::{PartConstructor, PartFactory, PartSelector};
pub use package::{IterParts, IterRels, OpcPackage, OpenOptions};
pub use packuri::PackURI;
pub use part::{BlobPart, ImagePart, Part, XmlPart};
pub use phys_pkg::{DirPhysReader, PhysPkgReader, PhysPkgWriter, ZipPhysReader, ZipPhysWriter};
pub use rel::{PartId, Relationship, Relationships, TargetMode, TargetResolver};
