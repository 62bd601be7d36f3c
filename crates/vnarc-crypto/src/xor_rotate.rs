//! AZ System keyed XOR-rotate stream cipher
//!
//! The keystream is a single 32-bit register seeded from the key and the
//! absolute file offset of the data. Its low byte is XOR-ed into each byte
//! and the register is rotated left by one bit afterwards.
//!
//! The cipher is its own inverse, so [`decrypt`] also encrypts.

const KEY_MULTIPLIER: u32 = 0x9E37_0001;

/// Keystream register for `key` positioned at `offset`
fn initial_hash(key: u32, offset: u64) -> u32 {
    let hash = key.wrapping_mul(KEY_MULTIPLIER);
    if offset & 0x3F != 0 {
        hash.rotate_left((offset & 0x1F) as u32)
    } else {
        hash
    }
}

/// Decrypt `data` in place, where `data` starts at `offset` in the archive
///
/// ```
/// use vnarc_crypto::xor_rotate;
///
/// let mut data = [0u8; 2];
/// xor_rotate::decrypt(&mut data, 0, 1);
/// assert_eq!(data, [0x01, 0x03]);
/// ```
pub fn decrypt(data: &mut [u8], offset: u64, key: u32) {
    let mut hash = initial_hash(key, offset);
    for byte in data {
        *byte ^= hash as u8;
        hash = hash.rotate_left(1);
    }
}

/// Decrypt into a new buffer
pub fn decrypt_to_vec(data: &[u8], offset: u64, key: u32) -> Vec<u8> {
    let mut out = data.to_vec();
    decrypt(&mut out, offset, key);
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_keystream_without_rotation() {
        let mut data = [0u8; 4];
        decrypt(&mut data, 0, 1);
        assert_eq!(data, [0x01, 0x03, 0x06, 0x0C]);
    }

    #[test]
    fn test_keystream_with_pre_rotation() {
        let mut data = [0u8; 4];
        decrypt(&mut data, 5, 0x1234_5678);
        assert_eq!(data, [0x16, 0x2D, 0x5A, 0xB5]);
    }

    #[test]
    fn test_aligned_offset_skips_rotation() {
        // 0x40 has no bits in the low six, so it behaves like offset 0
        let mut at_zero = [0u8; 4];
        let mut at_0x40 = [0u8; 4];
        decrypt(&mut at_zero, 0, 0x1234_5678);
        decrypt(&mut at_0x40, 0x40, 0x1234_5678);
        assert_eq!(at_zero, at_0x40);
        assert_eq!(at_0x40, [0x78, 0xF1, 0xE2, 0xC5]);
    }

    #[test]
    fn test_round_trip() {
        let plain = b"AZ system archive index".to_vec();
        let cipher = decrypt_to_vec(&plain, 0x30, 0xDEAD_BEEF);
        assert_ne!(cipher, plain);
        assert_eq!(decrypt_to_vec(&cipher, 0x30, 0xDEAD_BEEF), plain);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decrypt_is_an_involution(
                data in prop::collection::vec(any::<u8>(), 0..256),
                offset in any::<u32>(),
                key in any::<u32>(),
            ) {
                let once = decrypt_to_vec(&data, u64::from(offset), key);
                let twice = decrypt_to_vec(&once, u64::from(offset), key);
                prop_assert_eq!(twice, data);
            }
        }
    }
}
