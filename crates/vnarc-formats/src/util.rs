//! Small helpers shared by the index parsers

use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;

/// Largest entry count any index may declare
pub const MAX_ENTRY_COUNT: u32 = 0xF_FFFF;

/// Whether `count` is a plausible number of index records
pub const fn is_sane_count(count: u32) -> bool {
    count > 0 && count <= MAX_ENTRY_COUNT
}

/// Bytes of a fixed-width field up to the first NUL
pub fn fixed_cstring(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Split a NUL-terminated string off the front of `data`
///
/// Returns the string bytes and the offset just past the terminator.
pub fn split_cstring(data: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = data.get(pos..)?;
    let len = rest.iter().position(|&b| b == 0)?;
    Some((&rest[..len], pos + len + 1))
}

/// Decode CP932 bytes, replacing invalid sequences
pub fn decode_cp932(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _, _) = SHIFT_JIS.decode(bytes);
    text
}

/// Encode a string as CP932
pub fn encode_cp932(text: &str) -> Vec<u8> {
    let (bytes, _, _) = SHIFT_JIS.encode(text);
    bytes.into_owned()
}

/// Entry name from a fixed-width CP932 field
pub fn name_from_field(field: &[u8]) -> String {
    decode_cp932(fixed_cstring(field)).into_owned()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sane_count() {
        assert!(!is_sane_count(0));
        assert!(is_sane_count(1));
        assert!(is_sane_count(0xF_FFFF));
        assert!(!is_sane_count(0x10_0000));
    }

    #[test]
    fn test_fixed_cstring() {
        assert_eq!(fixed_cstring(b"abc\0def"), b"abc");
        assert_eq!(fixed_cstring(b"full"), b"full");
        assert_eq!(fixed_cstring(b"\0"), b"");
    }

    #[test]
    fn test_split_cstring() {
        let data = b"one\0two\0tail";
        assert_eq!(split_cstring(data, 0), Some((&b"one"[..], 4)));
        assert_eq!(split_cstring(data, 4), Some((&b"two"[..], 8)));
        assert_eq!(split_cstring(data, 8), None);
        assert_eq!(split_cstring(data, 100), None);
    }

    #[test]
    fn test_cp932_round_trip() {
        let bytes = encode_cp932("立ち絵.png");
        assert_eq!(bytes.len(), 10);
        assert_eq!(decode_cp932(&bytes), "立ち絵.png");
    }

    #[test]
    fn test_name_from_field() {
        let mut field = [0u8; 0x10];
        field[..7].copy_from_slice(b"bg01.hg");
        assert_eq!(name_from_field(&field), "bg01.hg");
    }
}
