//! Key block metadata, per-block descriptors and keyword extraction.

use std::fs::File;

use adler32::adler32;
use byteorder::{BigEndian, ReadBytesExt};
use log::debug;

use super::compression;
use super::crypto;
use super::error::{MdictError, Result};
use super::models::{EncryptMode, Header, KeyBlockInfo, KeyBlockMeta, KeyEntry};
use super::utils;

/// Read the key block metadata at `header_end_pos`.
///
/// v2.0+ stores 5 numbers (40 bytes) followed by a 4-byte adler32 of those
/// bytes; v1.x stores 4 numbers (16 bytes) with no checksum and no
/// decompressed-info-size field.
pub fn read_meta(file: &mut File, header: &Header) -> Result<KeyBlockMeta> {
    let is_v2 = header.version >= 2.0;
    let width = header.number_width;
    let meta_size = if is_v2 { 40u64 } else { 16u64 };

    let data = utils::read_section(file, header.header_end_pos, meta_size)?;
    let mut reader = &data[..];

    let block_count = utils::read_number(&mut reader, width)?;
    let entry_count = utils::read_number(&mut reader, width)?;
    let info_decomp_size = if is_v2 {
        Some(utils::read_number(&mut reader, width)?)
    } else {
        None
    };
    let info_comp_size = utils::read_number(&mut reader, width)?;
    let blocks_total_size = utils::read_number(&mut reader, width)?;

    let mut checksum_len = 0u64;
    if is_v2 {
        let expected = file.read_u32::<BigEndian>()?;
        let actual = adler32(&data[..])?;
        if actual != expected {
            return Err(MdictError::ChecksumMismatch { expected, actual });
        }
        checksum_len = 4;
    }

    debug!(
        "key block meta: {} blocks, {} entries, info {} bytes, data {} bytes",
        block_count, entry_count, info_comp_size, blocks_total_size
    );

    Ok(KeyBlockMeta {
        block_count,
        entry_count,
        info_decomp_size,
        info_comp_size,
        blocks_total_size,
        info_start_pos: header.header_end_pos + meta_size + checksum_len,
    })
}

/// Read and parse the key block info region into per-block descriptors.
///
/// On v2.0+ the region is a tagged block, decrypted first when the header
/// declares `Encrypted="2"`. On v1.x the region is raw.
pub fn read_info(
    file: &mut File,
    header: &Header,
    meta: &KeyBlockMeta,
) -> Result<Vec<KeyBlockInfo>> {
    let mut data = utils::read_section(file, meta.info_start_pos, meta.info_comp_size)?;

    let decompressed = match meta.info_decomp_size {
        Some(decomp_size) => {
            let encrypted = header.encrypt == EncryptMode::KeyInfo;
            if encrypted {
                crypto::decrypt_key_block_info(&mut data)?;
            }
            match compression::decode_verified_block(&data, decomp_size) {
                Ok(bytes) => bytes,
                // A bad stream key surfaces as garbage that fails the size
                // or checksum invariant; classify it as a decryption
                // failure so callers can tell it from plain corruption.
                Err(e) if encrypted => return Err(MdictError::DecryptionFailure(e.to_string())),
                Err(e) => return Err(e),
            }
        }
        None => data,
    };

    parse_info_entries(&decompressed, header, meta)
}

fn parse_info_entries(
    data: &[u8],
    header: &Header,
    meta: &KeyBlockMeta,
) -> Result<Vec<KeyBlockInfo>> {
    let width = header.number_width;
    let is_v2 = header.version >= 2.0;
    // v2.0+ first/last keys carry a null terminator; v1.x keys do not.
    let term_units = if is_v2 { 1 } else { 0 };

    let mut infos = Vec::with_capacity(meta.block_count as usize);
    let mut reader = data;
    let mut comp_accum = 0u64;
    let mut decomp_accum = 0u64;

    for _ in 0..meta.block_count {
        let _entries_in_block = utils::read_number(&mut reader, width)?;
        let first_key = read_info_key(&mut reader, header, is_v2, term_units)?;
        let last_key = read_info_key(&mut reader, header, is_v2, term_units)?;
        let compressed_size = utils::read_number(&mut reader, width)?;
        let decompressed_size = utils::read_number(&mut reader, width)?;

        infos.push(KeyBlockInfo {
            first_key,
            last_key,
            compressed_size,
            decompressed_size,
            compressed_offset: comp_accum,
            decompressed_offset: decomp_accum,
        });
        comp_accum += compressed_size;
        decomp_accum += decompressed_size;
    }

    if comp_accum != meta.blocks_total_size {
        return Err(MdictError::SizeMismatch {
            context: "key block data region",
            expected: meta.blocks_total_size,
            found: comp_accum,
        });
    }

    debug!("key block info parsed: {} blocks", infos.len());
    Ok(infos)
}

/// Read one length-prefixed first/last key from the info region.
///
/// The length prefix counts text units (bytes for byte encodings, 16-bit
/// units for UTF-16): v2.0+ uses a big-endian u16 prefix, v1.x a single
/// byte.
fn read_info_key(
    reader: &mut &[u8],
    header: &Header,
    is_v2: bool,
    term_units: usize,
) -> Result<String> {
    let prefix_width = if is_v2 { 2 } else { 1 };
    let size = utils::read_small_number(reader, prefix_width)? as usize;
    let unit = utils::unit_width(header.encoding);
    let total = (size + term_units) * unit;
    let bytes = take(reader, total)?;
    Ok(utils::decode_text(&bytes[..size * unit], header.encoding))
}

fn take<'a>(reader: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if reader.len() < n {
        return Err(MdictError::MalformedBlock(format!(
            "truncated key block info: wanted {} bytes, {} left",
            n,
            reader.len()
        )));
    }
    let (head, tail) = reader.split_at(n);
    *reader = tail;
    Ok(head)
}

/// Walk every key block and extract the flat, ordered keyword list.
///
/// Each block is decompressed and checksum-verified independently. A
/// second pass fills each entry's record end offset from its successor;
/// the final entry keeps the 0 sentinel.
pub fn read_entries(
    file: &mut File,
    header: &Header,
    meta: &KeyBlockMeta,
    infos: &[KeyBlockInfo],
    data_start: u64,
) -> Result<Vec<KeyEntry>> {
    let data = utils::read_section(file, data_start, meta.blocks_total_size)?;
    let mut entries: Vec<KeyEntry> = Vec::with_capacity(meta.entry_count as usize);

    for info in infos {
        let start = info.compressed_offset as usize;
        let end = start + info.compressed_size as usize;
        let block = data.get(start..end).ok_or_else(|| {
            MdictError::MalformedBlock(format!("key block [{}, {}) out of bounds", start, end))
        })?;
        let decompressed = compression::decode_verified_block(block, info.decompressed_size)?;
        parse_block_entries(&decompressed, header, &mut entries)?;
    }

    for i in 1..entries.len() {
        entries[i - 1].record_end = entries[i].record_start;
    }

    if entries.len() as u64 != meta.entry_count {
        return Err(MdictError::CountMismatch {
            item_type: "key entries",
            expected: meta.entry_count,
            found: entries.len() as u64,
        });
    }

    debug!(
        "parsed {} key entries from {} key blocks",
        entries.len(),
        infos.len()
    );
    Ok(entries)
}

fn parse_block_entries(
    data: &[u8],
    header: &Header,
    entries: &mut Vec<KeyEntry>,
) -> Result<()> {
    let width = header.number_width;
    let mut reader = data;
    while !reader.is_empty() {
        let record_start = utils::read_number(&mut reader, width)?;
        let (keyword, consumed) = utils::null_terminated(reader, header.encoding, false);
        reader = &reader[consumed..];
        entries.push(KeyEntry {
            keyword,
            record_start,
            record_end: 0,
        });
    }
    Ok(())
}
