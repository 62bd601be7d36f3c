//! `ASB\x1A` scripts
//!
//! Layout: signature, packed size, unpacked size, then the AZ-packed body
//! XOR-ed as little-endian words with `script_key ^ unpacked_size`. A tail
//! shorter than one word is stored in the clear.

use crate::codec;
use crate::error::{Error, Result};

/// Script signature
pub const SIGNATURE: &[u8; 4] = b"ASB\x1A";

const HEADER_SIZE: usize = 12;

/// Whether `data` starts with the script signature
pub fn is_asb(data: &[u8]) -> bool {
    data.starts_with(SIGNATURE)
}

fn xor_words(body: &mut [u8], key: u32) {
    for chunk in body.chunks_exact_mut(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key;
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Decrypt and unpack a script
pub fn decode(data: &[u8], script_key: u32) -> Result<Vec<u8>> {
    if !is_asb(data) || data.len() < HEADER_SIZE {
        return Err(Error::CorruptData("ASB header truncated".into()));
    }
    let packed_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let unpacked_len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let mut body = data
        .get(HEADER_SIZE..HEADER_SIZE.saturating_add(packed_len))
        .ok_or_else(|| Error::CorruptData(format!("ASB body of {packed_len} bytes truncated")))?
        .to_vec();
    xor_words(&mut body, script_key ^ unpacked_len);
    Ok(codec::azsys::unpack(&body, unpacked_len as usize)?)
}
