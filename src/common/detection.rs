//! Container signature sniffing.
//!
//! OOXML packages are ZIP archives. Password-protected ones are not: Office wraps the
//! encrypted package in an OLE2 compound file, which is recognized here so callers get
//! a precise error instead of a generic ZIP failure.

// Magic number signatures
pub const OLE2_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
pub const ZIP_SIGNATURE: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
/// Signature of an empty ZIP archive (end-of-central-directory record only).
pub const ZIP_EMPTY_SIGNATURE: &[u8] = &[0x50, 0x4B, 0x05, 0x06];

/// Physical container kind, decided from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A ZIP archive (possibly an OPC package).
    Zip,
    /// An OLE2 compound file (an encrypted OOXML package, or a legacy binary document).
    Ole2,
    /// Empty input.
    Empty,
    /// Anything else.
    Unknown,
}

/// Classify a container from its first bytes.
pub fn sniff_container(header: &[u8]) -> ContainerKind {
    if header.is_empty() {
        ContainerKind::Empty
    } else if header.starts_with(OLE2_SIGNATURE) {
        ContainerKind::Ole2
    } else if header.starts_with(ZIP_SIGNATURE) || header.starts_with(ZIP_EMPTY_SIGNATURE) {
        ContainerKind::Zip
    } else {
        ContainerKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_container() {
        assert_eq!(sniff_container(b""), ContainerKind::Empty);
        assert_eq!(sniff_container(b"PK\x03\x04rest"), ContainerKind::Zip);
        assert_eq!(sniff_container(OLE2_SIGNATURE), ContainerKind::Ole2);
        assert_eq!(sniff_container(b"garbage!"), ContainerKind::Unknown);
        // Truncated OLE2 magic is not OLE2.
        assert_eq!(sniff_container(&OLE2_SIGNATURE[..4]), ContainerKind::Unknown);
    }
}
