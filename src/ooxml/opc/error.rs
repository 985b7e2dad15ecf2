/// Error types for OPC package operations
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    /// The relationship exists but is external or its target never resolved.
    #[error("Relationship not resolvable: {0}")]
    NotResolvable(String),

    #[error("Content type not found for partname: {0}")]
    ContentTypeNotFound(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    /// A registered part constructor rejected the part's content.
    #[error("Cannot construct part '{partname}': {source}")]
    PartConstruction {
        partname: String,
        #[source]
        source: Box<OpcError>,
    },

    #[error("Not a ZIP package: {0}")]
    NotZipPackage(String),

    #[error("Package is encrypted (OLE2 compound file, not a ZIP archive)")]
    EncryptedPackage,

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Quick-XML error: {0}")]
    QuickXmlError(#[from] quick_xml::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("Attribute error: {0}")]
    AttrError(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::AttrError(err.to_string())
    }
}

impl OpcError {
    /// Whether this error is the physical "member not found" signal.
    #[inline]
    pub fn is_member_not_found(&self) -> bool {
        matches!(self, OpcError::PartNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
