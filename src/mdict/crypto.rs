//! RIPEMD-128 key derivation and the MDict fast-decrypt stream cipher.

use log::trace;
use ripemd::{Digest, Ripemd128};

use super::compression::BLOCK_HEADER_LEN;
use super::error::{MdictError, Result};

/// Magic appended to the 4 context bytes before hashing.
const KEY_MAGIC: [u8; 4] = [0x95, 0x36, 0x00, 0x00];

/// RIPEMD-128 digest of `data`.
pub fn ripemd128(data: &[u8]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive a fast-decrypt stream key from 4 bytes of context.
///
/// The key is `RIPEMD-128(context || 95 36 00 00)`. The context differs by
/// callsite: a block's own stored adler32 for key-block-info and record
/// blocks, the header's adler32 for the legacy metadata scheme.
pub fn derive_block_key(context: [u8; 4]) -> [u8; 16] {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&context);
    buf[4..].copy_from_slice(&KEY_MAGIC);
    ripemd128(&buf)
}

/// Decrypt `data` in place with the MDict fast XOR cipher.
///
/// Each byte is nibble-swapped, then XORed with the previous ciphertext
/// byte, its position modulo 256 and a key byte. The initial previous byte
/// is `0x36`. The chained byte is the pre-decryption input, which is what
/// makes the transform invert the writer-side cipher.
pub fn fast_decrypt(data: &mut [u8], key: &[u8]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let current = *byte;
        let swapped = current.rotate_left(4);
        *byte = swapped ^ prev ^ (i as u8) ^ key[i % key.len()];
        prev = current;
    }
}

/// Decrypt an `Encrypted="2"` key-block-info region in place.
///
/// The stream key is derived from the block's own stored adler32 (bytes
/// 4..8); everything after the 8-byte block header is decrypted.
pub fn decrypt_key_block_info(block: &mut [u8]) -> Result<()> {
    decrypt_tagged_block(block, "key block info")
}

/// Decrypt an `Encrypted="1"` record block in place before decompression.
pub fn decrypt_record_block(block: &mut [u8]) -> Result<()> {
    decrypt_tagged_block(block, "record block")
}

fn decrypt_tagged_block(block: &mut [u8], what: &str) -> Result<()> {
    if block.len() < BLOCK_HEADER_LEN {
        return Err(MdictError::MalformedBlock(format!(
            "{} too small to decrypt: {} bytes",
            what,
            block.len()
        )));
    }
    let mut context = [0u8; 4];
    context.copy_from_slice(&block[4..8]);
    let key = derive_block_key(context);
    trace!(
        "fast-decrypting {} ({} payload bytes)",
        what,
        block.len() - BLOCK_HEADER_LEN
    );
    fast_decrypt(&mut block[BLOCK_HEADER_LEN..], &key);
    Ok(())
}

/// Decrypt a key-block-metadata section with the header-derived key.
///
/// Some MDict variants encrypt the 40-byte metadata itself, keyed by the
/// header's adler32 in big-endian. The `Encrypted="2"` scheme leaves the
/// metadata in the clear, so the open path never calls this; it is kept
/// for files produced by those variants.
pub fn decrypt_key_block_meta(data: &mut [u8], header_adler32: u32) {
    let key = derive_block_key(header_adler32.to_be_bytes());
    fast_decrypt(data, &key);
}
