//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from internal
//! error types to the unified Error type.

use super::types::Error;
use crate::ooxml::opc::error::OpcError;

impl From<OpcError> for Error {
    fn from(err: OpcError) -> Self {
        Error::from_opc_error(err)
    }
}

impl Error {
    pub(crate) fn from_opc_error(err: OpcError) -> Self {
        match err {
            OpcError::IoError(e) => Error::Io(e),
            OpcError::ZipError(e) => Error::ZipError(e.to_string()),
            OpcError::NotZipPackage(s) | OpcError::PackageNotFound(s) => Error::NotOpcPackage(s),
            OpcError::EncryptedPackage => Error::Encrypted,
            OpcError::XmlError(s) | OpcError::AttrError(s) => Error::XmlError(s),
            OpcError::QuickXmlError(e) => Error::XmlError(e.to_string()),
            OpcError::InvalidPackUri(s) | OpcError::InvalidRelationship(s) => {
                Error::InvalidFormat(s)
            },
            OpcError::PartNotFound(s)
            | OpcError::RelationshipNotFound(s)
            | OpcError::ContentTypeNotFound(s) => Error::ComponentNotFound(s),
            err @ OpcError::PartConstruction { .. } => Error::XmlError(err.to_string()),
            other => Error::Other(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipError(err.to_string())
    }
}
