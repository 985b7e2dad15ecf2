//! Common types and utilities shared across the crate.
//!
//! This module holds the unified error type, container signature sniffing, XML
//! encoding detection and the XML escaping used by the manifest writers.

// Submodule declarations
pub mod detection;
pub mod encoding;
pub mod error;
pub mod xml;

// Re-exports for convenience
pub use detection::{ContainerKind, sniff_container};
pub use error::{Error, Result};
