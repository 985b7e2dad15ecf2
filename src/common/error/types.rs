//! Unified error types for the opc-engine crate.
//!
//! The engine reports [`crate::ooxml::opc::error::OpcError`]; this type is the
//! coarser surface offered to applications that do not care which layer failed.
use thiserror::Error;

/// Main error type for opc-engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid part name or relationship reference
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The input is not an OPC package at all
    #[error("Not an OPC package: {0}")]
    NotOpcPackage(String),

    /// The package is encrypted and must be decrypted before it can be opened
    #[error("Encrypted package")]
    Encrypted,

    /// Part, relationship or content type not found
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    XmlError(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type for opc-engine operations.
pub type Result<T> = std::result::Result<T, Error>;
