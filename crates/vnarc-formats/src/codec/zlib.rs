//! Bounded zlib inflate

use super::{CodecError, CodecResult, MAX_UNPACKED_SIZE, truncated};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Inflate a whole zlib stream, refusing output larger than `limit`
pub fn inflate(packed: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let limit = limit.min(MAX_UNPACKED_SIZE);
    let mut decoder = ZlibDecoder::new(packed);
    let mut inflated = Vec::new();

    // Read in chunks to enforce the limit
    let mut buffer = [0u8; 8192];
    loop {
        let read = decoder
            .read(&mut buffer)
            .map_err(|e| CodecError::Inflate(e.to_string()))?;
        if read == 0 {
            break;
        }
        if inflated.len() + read > limit {
            return Err(CodecError::TooLarge {
                size: inflated.len() + read,
                limit,
            });
        }
        inflated.extend_from_slice(&buffer[..read]);
    }

    Ok(inflated)
}

/// Inflate exactly `len` bytes from the front of a zlib stream
///
/// Output past `len` is ignored. A stream that ends early is truncated.
pub fn inflate_exact(packed: &[u8], len: usize) -> CodecResult<Vec<u8>> {
    if len > MAX_UNPACKED_SIZE {
        return Err(CodecError::TooLarge {
            size: len,
            limit: MAX_UNPACKED_SIZE,
        });
    }
    let mut decoder = ZlibDecoder::new(packed);
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let read = decoder
            .read(&mut out[filled..])
            .map_err(|e| CodecError::Inflate(e.to_string()))?;
        if read == 0 {
            return Err(truncated(len, filled));
        }
        filled += read;
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn deflate(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish zlib stream")
}
