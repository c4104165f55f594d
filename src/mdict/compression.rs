//! Tagged-block decompression for MDict data regions.

use std::io::Read;

use adler32::adler32;
use flate2::read::ZlibDecoder;
use log::trace;
use lzokay::decompress::decompress as lzokay_decompress;

use super::error::{MdictError, Result};
use super::models::CompressionKind;
use super::utils;

/// Every compressed region on disk starts with a tag byte, three reserved
/// zero bytes and a big-endian adler32 of the decompressed payload.
pub const BLOCK_HEADER_LEN: usize = 8;

/// The stored adler32 of a block (bytes 4..8, big-endian).
pub fn block_checksum(block: &[u8]) -> u32 {
    block.get(4..8).map_or(0, utils::read_u32_be)
}

/// Decompress one tagged block, returning the payload and its tag.
///
/// The adler32 is NOT verified here: callers check it themselves so
/// checksum damage can be reported separately from decoder failures.
/// LZO needs the decompressed size up front; zlib discovers it.
pub fn decompress_block(block: &[u8], expected_size: u64) -> Result<(Vec<u8>, CompressionKind)> {
    if block.len() < BLOCK_HEADER_LEN {
        return Err(MdictError::MalformedBlock(format!(
            "block too small: {} bytes",
            block.len()
        )));
    }
    let kind = CompressionKind::try_from(block[0])?;
    let payload = &block[BLOCK_HEADER_LEN..];
    trace!(
        "decompressing {:?} block: {} -> {} bytes",
        kind,
        payload.len(),
        expected_size
    );

    let decompressed = match kind {
        CompressionKind::None => payload.to_vec(),
        CompressionKind::Lzo => {
            let mut output = vec![0u8; expected_size as usize];
            lzokay_decompress(payload, &mut output)
                .map_err(|e| MdictError::MalformedBlock(format!("LZO decompression failed: {}", e)))?;
            output
        }
        CompressionKind::Zlib => {
            let mut output = Vec::with_capacity(expected_size as usize);
            let mut decoder = ZlibDecoder::new(payload);
            decoder
                .read_to_end(&mut output)
                .map_err(|e| MdictError::MalformedBlock(format!("zlib decompression failed: {}", e)))?;
            output
        }
    };

    if decompressed.len() as u64 != expected_size {
        return Err(MdictError::SizeMismatch {
            context: "decompressed block",
            expected: expected_size,
            found: decompressed.len() as u64,
        });
    }

    Ok((decompressed, kind))
}

/// Decompress a tagged block and verify its stored adler32 against the
/// decompressed payload.
pub fn decode_verified_block(block: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let (decompressed, _) = decompress_block(block, expected_size)?;
    let expected = block_checksum(block);
    let actual = adler32(&decompressed[..])?;
    if actual != expected {
        return Err(MdictError::ChecksumMismatch { expected, actual });
    }
    Ok(decompressed)
}
