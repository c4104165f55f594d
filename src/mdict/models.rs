//! Data structures describing the decoded MDict format.

use encoding_rs::Encoding;

use super::error::MdictError;

/// The kind of dictionary file: textual entries or embedded resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKind {
    /// `.mdx`: keyword to definition text.
    Mdx,
    /// `.mdd`: keyword to opaque resource bytes (images, CSS, audio).
    Mdd,
}

/// Encryption mode declared by the header's `Encrypted` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptMode {
    /// No encryption.
    None,
    /// Record blocks are encrypted (`Encrypted="1"`).
    Record,
    /// The key-block-info region is encrypted (`Encrypted="2"`).
    KeyInfo,
}

/// Compression tag carried in byte 0 of every block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Lzo,
    Zlib,
}

impl TryFrom<u8> for CompressionKind {
    type Error = MdictError;

    fn try_from(value: u8) -> Result<Self, MdictError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzo),
            2 => Ok(Self::Zlib),
            _ => Err(MdictError::MalformedBlock(format!(
                "unknown compression tag: {}",
                value
            ))),
        }
    }
}

/// Parsed MDict file header. Immutable after parse.
#[derive(Debug)]
pub struct Header {
    /// Declared length of the raw header XML in bytes.
    pub raw_len: u32,
    /// The undecoded UTF-16LE header image.
    pub raw_bytes: Vec<u8>,
    /// Decoded header XML with the `Library_Data` tag variant normalized.
    pub xml: String,
    /// Checksum stored after the XML. A mismatch is logged, not fatal.
    pub stored_adler32: u32,
    /// Engine version as a number; selects field widths.
    pub version: f64,
    /// The raw `GeneratedByEngineVersion` attribute.
    pub engine_version: String,
    /// Keyword and definition text encoding. Forced to UTF-16LE for MDD.
    pub encoding: &'static Encoding,
    pub encrypt: EncryptMode,
    pub title: String,
    pub description: String,
    pub stylesheet: String,
    pub creation_date: String,
    pub data_source_format: String,
    /// On-disk width of metadata integers: 8 for v2.0+, 4 for v1.x.
    pub number_width: usize,
    /// Absolute file offset of the first byte after the header section.
    pub header_end_pos: u64,
}

/// Key block section metadata.
#[derive(Debug)]
pub struct KeyBlockMeta {
    /// Number of key blocks.
    pub block_count: u64,
    /// Total number of keyword entries.
    pub entry_count: u64,
    /// Decompressed size of key block info (v2.0+ only; v1.x info is raw).
    pub info_decomp_size: Option<u64>,
    /// On-disk size of the key block info region.
    pub info_comp_size: u64,
    /// Total on-disk size of all key blocks.
    pub blocks_total_size: u64,
    /// Absolute file offset where key block info begins.
    pub info_start_pos: u64,
}

/// Descriptor for a single key block.
#[derive(Debug)]
pub struct KeyBlockInfo {
    pub first_key: String,
    pub last_key: String,
    /// On-disk size including the 8-byte block header.
    pub compressed_size: u64,
    pub decompressed_size: u64,
    /// Accumulated offset within the key block data region.
    pub compressed_offset: u64,
    /// Accumulated offset within the concatenated decompressed stream.
    pub decompressed_offset: u64,
}

/// A single keyword entry.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub keyword: String,
    /// Start offset in the decompressed record address space.
    pub record_start: u64,
    /// End offset, filled by a second pass from the next entry's start.
    /// Stays 0 on the final entry, meaning "to the end of the containing
    /// record block".
    pub record_end: u64,
}

/// Record block section metadata. Mirrors the key side, sizes only.
#[derive(Debug)]
pub struct RecordBlockMeta {
    pub block_count: u64,
    /// Must equal [`KeyBlockMeta::entry_count`].
    pub entry_count: u64,
    /// On-disk size of the record block info region.
    pub info_size: u64,
    /// Total on-disk size of all record blocks.
    pub blocks_total_size: u64,
}

/// Descriptor for a single record block. No first/last key markers.
#[derive(Debug, Clone, Copy)]
pub struct RecordBlockInfo {
    /// On-disk size including the 8-byte block header.
    pub compressed_size: u64,
    pub decompressed_size: u64,
    pub compressed_offset: u64,
    pub decompressed_offset: u64,
}
