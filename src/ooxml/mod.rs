//! Office Open XML (OOXML) package support.
//!
//! Word (.docx), Excel (.xlsx) and PowerPoint (.pptx) files all share the Open Packaging
//! Conventions container handled by the [`opc`] layer. Format-specific part kinds can be
//! layered on top by registering constructors with a [`PartFactory`].
//!
//! # Example
//!
//! ```rust,no_run
//! use opc_engine::ooxml::OpcPackage;
//!
//! let mut pkg = OpcPackage::open("document.docx")?;
//! let main = pkg.main_document_part()?;
//! println!("{} ({})", main.partname(), main.content_type());
//!
//! pkg.save_to_file("copy.docx")?;
//! # Ok::<(), opc_engine::ooxml::opc::OpcError>(())
//! ```
pub mod opc;

// Re-export commonly used types from OPC layer
pub use opc::{OpcError, OpcPackage, OpenOptions, PackURI, Part, PartFactory};
