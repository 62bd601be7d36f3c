//! Scrambled class names and obfuscated node coordinates

use crate::bitstream::LsbBitStream;

use super::RioError;

const COMMON_LOWER: &[u8; 16] = b"etaoinsrlcdumhpg";
const COMMON_UPPER: &[u8; 15] = b"CORSUDNTGBAPIME";
const RARE: &[u8; 32] = b"bfkjqvwxyz0123456789_FHJKQVWXYZ.";
const UPPER_ESCAPE: u32 = 15;

const OFFSET_BIAS: u32 = 0xA2FB_6AD1;
const SIZE_MASK: u32 = 0x5C3E_9A17;

/// Undo the offset obfuscation of encrypted archives
pub const fn decode_offset(stored: u32) -> u32 {
    stored.wrapping_sub(OFFSET_BIAS)
}

/// Undo the size obfuscation of encrypted archives
pub const fn decode_size(stored: u32) -> u32 {
    (stored ^ SIZE_MASK).rotate_right(11)
}

/// Decode a bit-packed class name
///
/// The first five bits hold the character count. Each character is a
/// 2-bit selector followed by an index into one of three alphabets; the
/// upper-case alphabet escapes to a raw byte at index 15.
pub fn decode_class_name(packed: &[u8]) -> Result<String, RioError> {
    let mut bits = LsbBitStream::new(packed);
    let mut read = |n| bits.get_bits(n).ok_or(RioError::InvalidClassName);
    let count = read(5)?;
    let mut name = String::with_capacity(count as usize);
    for _ in 0..count {
        let c = match read(2)? {
            0 => COMMON_LOWER[read(4)? as usize],
            1 => match read(4)? {
                UPPER_ESCAPE => read(8)? as u8,
                i => COMMON_UPPER[i as usize],
            },
            2 => RARE[read(5)? as usize],
            _ => return Err(RioError::InvalidClassName),
        };
        name.push(char::from(c));
    }
    Ok(name)
}
