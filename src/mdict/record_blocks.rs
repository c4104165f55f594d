//! Record block metadata, descriptors and on-demand record extraction.

use std::fs::File;

use log::debug;

use super::compression;
use super::crypto;
use super::error::{MdictError, Result};
use super::models::{EncryptMode, Header, KeyEntry, RecordBlockInfo, RecordBlockMeta};
use super::utils;

/// Read the record block metadata: 4 numbers of the header's width.
pub fn read_meta(file: &mut File, header: &Header, start_pos: u64) -> Result<RecordBlockMeta> {
    let width = header.number_width;
    let data = utils::read_section(file, start_pos, (4 * width) as u64)?;
    let mut reader = &data[..];

    let meta = RecordBlockMeta {
        block_count: utils::read_number(&mut reader, width)?,
        entry_count: utils::read_number(&mut reader, width)?,
        info_size: utils::read_number(&mut reader, width)?,
        blocks_total_size: utils::read_number(&mut reader, width)?,
    };
    debug!(
        "record block meta: {} blocks, {} entries, info {} bytes, data {} bytes",
        meta.block_count, meta.entry_count, meta.info_size, meta.blocks_total_size
    );
    Ok(meta)
}

/// Read the record block info region: `block_count` pairs of
/// `{compressed_size, decompressed_size}` with accumulated offsets.
pub fn read_info(
    file: &mut File,
    header: &Header,
    meta: &RecordBlockMeta,
    info_start: u64,
) -> Result<Vec<RecordBlockInfo>> {
    let width = header.number_width;
    let data = utils::read_section(file, info_start, meta.info_size)?;
    let mut reader = &data[..];

    let mut infos = Vec::with_capacity(meta.block_count as usize);
    let mut comp_accum = 0u64;
    let mut decomp_accum = 0u64;

    for _ in 0..meta.block_count {
        let compressed_size = utils::read_number(&mut reader, width)?;
        let decompressed_size = utils::read_number(&mut reader, width)?;
        infos.push(RecordBlockInfo {
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
            context: "record block data region",
            expected: meta.blocks_total_size,
            found: comp_accum,
        });
    }
    if !reader.is_empty() {
        return Err(MdictError::SizeMismatch {
            context: "record block info region",
            expected: meta.info_size,
            found: (data.len() - reader.len()) as u64,
        });
    }

    Ok(infos)
}

/// Extract one record's bytes for a key entry.
///
/// Locates the record block whose decompressed range covers the entry's
/// start offset, reads its compressed bytes from disk, decrypts when the
/// header declares `Encrypted="1"`, decompresses, verifies the checksum
/// and slices the entry out of the decompressed buffer.
pub fn extract(
    file: &mut File,
    header: &Header,
    entry: &KeyEntry,
    infos: &[RecordBlockInfo],
    data_start: u64,
) -> Result<Vec<u8>> {
    let idx = infos
        .partition_point(|b| b.decompressed_offset + b.decompressed_size <= entry.record_start);
    let info = infos
        .get(idx)
        .filter(|b| entry.record_start >= b.decompressed_offset)
        .ok_or_else(|| {
            MdictError::MalformedBlock(format!(
                "no record block covers offset {}",
                entry.record_start
            ))
        })?;

    let mut block = utils::read_section(
        file,
        data_start + info.compressed_offset,
        info.compressed_size,
    )?;

    let encrypted = header.encrypt == EncryptMode::Record;
    if encrypted {
        crypto::decrypt_record_block(&mut block)?;
    }
    let decompressed = match compression::decode_verified_block(&block, info.decompressed_size) {
        Ok(bytes) => bytes,
        Err(e) if encrypted => return Err(MdictError::DecryptionFailure(e.to_string())),
        Err(e) => return Err(e),
    };

    let start = (entry.record_start - info.decompressed_offset) as usize;
    if start > decompressed.len() {
        return Err(MdictError::MalformedBlock(format!(
            "record offset {} outside block of {} bytes",
            start,
            decompressed.len()
        )));
    }
    // End offset 0 is the final-entry sentinel: the record runs to the end
    // of its containing block. An end before the start is clamped the same
    // way rather than rejected.
    let mut end = match entry.record_end {
        0 => decompressed.len(),
        e if e >= info.decompressed_offset => (e - info.decompressed_offset) as usize,
        _ => decompressed.len(),
    };
    if end > decompressed.len() || end < start {
        end = decompressed.len();
    }

    Ok(decompressed[start..end].to_vec())
}
