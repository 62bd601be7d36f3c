//! Entry key derivation from `sysenv.tbl`

use vnarc_crypto::{Sfmt19937, adler32, crc32};

use crate::codec::zlib;
use crate::error::{Error, Result};

/// Bytes of inflated `sysenv.tbl` that seed the key
pub const SEED_LEN: usize = 16;

/// Largest `sysenv.tbl` payload inflated while looking for the seed
const SYSENV_LIMIT: usize = 0x10_0000;

/// Derive an entry key from a 16-byte seed
pub fn generate_content_key(seed: &[u8]) -> u32 {
    let mut sfmt = Sfmt19937::new(crc32(seed));
    let w0 = sfmt.gen_u32();
    let w1 = sfmt.gen_u32();
    let w2 = sfmt.gen_u32();
    let w3 = sfmt.gen_u32();
    ((w3 ^ w2) & w1) ^ w0
}

/// Derive the entry key from a decrypted `sysenv.tbl`
///
/// The table is an Adler32 of the rest followed by zlib data whose first
/// 16 inflated bytes are the seed.
pub fn content_key_from_sysenv(table: &[u8]) -> Result<u32> {
    if table.len() < 4 {
        return Err(Error::UnknownEncryptionScheme("sysenv.tbl too short".into()));
    }
    let (checksum, body) = table.split_at(4);
    let stored = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
    if adler32(body) != stored {
        return Err(Error::UnknownEncryptionScheme(
            "sysenv.tbl checksum mismatch".into(),
        ));
    }
    let inflated = zlib::inflate(body, SYSENV_LIMIT)?;
    let seed = inflated.get(..SEED_LEN).ok_or_else(|| {
        Error::UnknownEncryptionScheme("sysenv.tbl holds no key seed".into())
    })?;
    Ok(generate_content_key(seed))
}
