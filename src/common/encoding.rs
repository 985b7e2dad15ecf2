//! Character encoding detection for XML parts.
//!
//! Office producers write XML parts in UTF-8 almost always, but customXml items written by
//! SharePoint and some third-party tools arrive as UTF-16 with or without a byte order mark.
//! The bytes of a part are never rewritten; these helpers only decode them for inspection.

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use std::borrow::Cow;

/// Detect the encoding of an XML document from its leading bytes.
///
/// Returns the encoding and the length of the byte order mark to skip. A BOM wins; without
/// one, a `<` encoded as a UTF-16 code unit selects UTF-16, and anything else is UTF-8.
///
/// # Examples
/// ```
/// use opc_engine::common::encoding::xml_encoding;
///
/// assert_eq!(xml_encoding(b"\xFF\xFE<\x00").0.name(), "UTF-16LE");
/// assert_eq!(xml_encoding(b"\x00<\x00a").0.name(), "UTF-16BE");
/// assert_eq!(xml_encoding(b"<a/>"), (encoding_rs::UTF_8, 0));
/// ```
#[inline]
pub fn xml_encoding(bytes: &[u8]) -> (&'static Encoding, usize) {
    if let Some(detected) = Encoding::for_bom(bytes) {
        return detected;
    }
    match bytes {
        [b'<', 0, ..] => (UTF_16LE, 0),
        [0, b'<', ..] => (UTF_16BE, 0),
        _ => (UTF_8, 0),
    }
}

/// Decode XML bytes to text without replacement.
///
/// Returns `None` if the bytes are not valid in the detected encoding. UTF-8 input without
/// a BOM is borrowed.
#[inline]
pub fn decode_xml(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let (encoding, bom_len) = xml_encoding(bytes);
    encoding.decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_utf8() {
        assert!(matches!(decode_xml(b"<a/>"), Some(Cow::Borrowed("<a/>"))));
        assert_eq!(decode_xml(b"\xEF\xBB\xBF<a/>").as_deref(), Some("<a/>"));
        assert_eq!(decode_xml(b"<a>\xFF</a>"), None);
    }

    #[test]
    fn test_decode_utf16() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><ds:item/>";
        assert_eq!(decode_xml(&utf16le(xml, true)).as_deref(), Some(xml));
        assert_eq!(decode_xml(&utf16le(xml, false)).as_deref(), Some(xml));

        let mut odd = utf16le("<a/>", true);
        odd.push(b'x');
        assert_eq!(decode_xml(&odd), None);
    }
}
