//! opc-engine - read, modify and write Open Packaging Conventions packages
//!
//! Office Open XML documents (.docx, .xlsx, .pptx) are ZIP archives of interrelated parts.
//! This crate loads such a package into an arena-backed relationship graph, lets callers
//! work with individual parts, and saves the package back with unmodified parts byte for
//! byte identical.
//!
//! # Features
//!
//! - **Tolerant reading**: dangling relationships and parts without a content type do not
//!   abort the open
//! - **Cycle-safe traversal**: iterative pre-order walks over arbitrarily deep or cyclic graphs
//! - **Strict relationship types**: ISO Strict relationship types are folded onto their
//!   Transitional forms
//! - **Pluggable parts**: a factory maps content types, and optionally relationship types,
//!   to part kinds
//!
//! # Example - Round trip
//!
//! ```no_run
//! use opc_engine::ooxml::opc::OpcPackage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pkg = OpcPackage::open("report.docx")?;
//!
//! for part in pkg.iter_parts() {
//!     println!("{} {} bytes", part.partname(), part.blob().len());
//! }
//!
//! let next = pkg.next_partname("/word/media/image%d.png")?;
//! assert!(!pkg.contains_part(&next));
//!
//! let bytes = pkg.save_to_bytes()?;
//! let reopened = OpcPackage::from_bytes(bytes)?;
//! assert_eq!(reopened.part_count(), pkg.part_count());
//! # Ok(())
//! # }
//! ```

/// Shared utilities: the crate-level error type, container detection and XML escaping.
pub mod common;

/// OOXML package layer
pub mod ooxml;

// Re-export commonly used types for convenience
pub use common::{Error, Result};
pub use ooxml::opc::{OpcPackage, OpenOptions, PackURI, Part, PartFactory};
