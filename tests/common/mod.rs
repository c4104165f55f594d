//! Synthetic MDX/MDD fixture builder shared by the integration suites.
//!
//! Produces byte-exact dictionary images with the same layout the decoder
//! reads: header, key block meta/info/data, record block meta/info/data.
//! Fixtures are assembled with the same adler32/zlib primitives the
//! decoder consumes, plus the inverse of the fast-decrypt transform for
//! the encrypted variants.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use mdict_host::mdict::crypto;

pub const TAG_NONE: u8 = 0;
pub const TAG_ZLIB: u8 = 2;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FixtureEncoding {
    Utf8,
    Utf16Le,
}

impl FixtureEncoding {
    fn label(self) -> &'static str {
        match self {
            FixtureEncoding::Utf8 => "UTF-8",
            FixtureEncoding::Utf16Le => "UTF-16",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FixtureEncrypt {
    None,
    Record,
    KeyInfo,
}

impl FixtureEncrypt {
    fn attr(self) -> &'static str {
        match self {
            FixtureEncrypt::None => "No",
            FixtureEncrypt::Record => "1",
            FixtureEncrypt::KeyInfo => "2",
        }
    }
}

pub struct FixtureSpec<'a> {
    pub version: &'a str,
    pub encoding: FixtureEncoding,
    pub encrypt: FixtureEncrypt,
    pub title: &'a str,
    /// Block tag used for key blocks, key block info and record blocks.
    pub compression: u8,
    pub entries_per_block: usize,
    /// Keyword to record payload, pre-sorted case-insensitively. Payload
    /// bytes are final (text already encoded, resources raw).
    pub entries: Vec<(String, Vec<u8>)>,
}

impl<'a> FixtureSpec<'a> {
    pub fn new(
        version: &'a str,
        encoding: FixtureEncoding,
        entries: Vec<(String, Vec<u8>)>,
    ) -> Self {
        Self {
            version,
            encoding,
            encrypt: FixtureEncrypt::None,
            title: "Test Dictionary",
            compression: TAG_ZLIB,
            entries_per_block: 2,
            entries,
        }
    }
}

/// A built dictionary image plus the offsets tests need for corruption.
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub key_block_data_start: usize,
    pub key_blocks_len: usize,
}

pub fn encode_text(s: &str, encoding: FixtureEncoding) -> Vec<u8> {
    match encoding {
        FixtureEncoding::Utf8 => s.as_bytes().to_vec(),
        FixtureEncoding::Utf16Le => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
    }
}

pub fn text_entries(
    pairs: &[(&str, &str)],
    encoding: FixtureEncoding,
) -> Vec<(String, Vec<u8>)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), encode_text(v, encoding)))
        .collect()
}

pub fn write_fixture(dir: &Path, name: &str, fixture: &Fixture) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, &fixture.bytes).expect("write fixture");
    path
}

/// The inverse of the reader's fast-decrypt transform: the chained
/// previous byte is the produced ciphertext byte, not the input.
pub fn fast_encrypt(data: &mut [u8], key: &[u8]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let mixed = *byte ^ prev ^ (i as u8) ^ key[i % key.len()];
        *byte = mixed.rotate_left(4);
        prev = *byte;
    }
}

fn adler(data: &[u8]) -> u32 {
    adler32::adler32(data).expect("adler32 over a slice")
}

fn write_num(out: &mut Vec<u8>, value: u64, width: usize) {
    if width == 8 {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&(value as u32).to_be_bytes());
    }
}

/// Wrap a payload in the on-disk block format: tag byte, three reserved
/// zeros, big-endian adler32 of the payload, then the (possibly
/// compressed) payload.
fn compress_payload(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut block = vec![tag, 0, 0, 0];
    block.extend_from_slice(&adler(payload).to_be_bytes());
    match tag {
        TAG_ZLIB => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(payload).expect("zlib write");
            block.extend_from_slice(&encoder.finish().expect("zlib finish"));
        }
        _ => block.extend_from_slice(payload),
    }
    block
}

/// Encrypt a finished block's payload in place, keyed from its stored
/// checksum the same way the reader derives the decryption key.
fn encrypt_tagged(block: &mut [u8]) {
    let mut context = [0u8; 4];
    context.copy_from_slice(&block[4..8]);
    let key = crypto::derive_block_key(context);
    fast_encrypt(&mut block[8..], &key);
}

pub fn build(spec: &FixtureSpec) -> Fixture {
    let version: f64 = spec.version.parse().expect("fixture version");
    let v2 = version >= 2.0;
    let width = if v2 { 8 } else { 4 };
    let utf16 = spec.encoding == FixtureEncoding::Utf16Le;

    // --- header ---
    let xml = format!(
        r#"<Dictionary GeneratedByEngineVersion="{}" Encrypted="{}" Encoding="{}" Title="{}" Description="Synthesized for tests"/>"#,
        spec.version,
        spec.encrypt.attr(),
        spec.encoding.label(),
        spec.title,
    );
    let header_bytes: Vec<u8> = xml.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();

    let mut out = Vec::new();
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&adler(&header_bytes).to_be_bytes());

    // --- record offsets in the decompressed address space ---
    let mut record_starts = Vec::with_capacity(spec.entries.len());
    let mut offset = 0u64;
    for (_, payload) in &spec.entries {
        record_starts.push(offset);
        offset += payload.len() as u64;
    }

    let chunks: Vec<&[(String, Vec<u8>)]> = spec.entries.chunks(spec.entries_per_block).collect();

    // --- key blocks ---
    let mut key_blocks_data = Vec::new();
    let mut key_info_payload = Vec::new();
    let mut entry_index = 0usize;
    for chunk in &chunks {
        let mut block_payload = Vec::new();
        for (keyword, _) in chunk.iter() {
            write_num(&mut block_payload, record_starts[entry_index], width);
            block_payload.extend_from_slice(&encode_text(keyword, spec.encoding));
            block_payload.extend_from_slice(if utf16 { &[0, 0] } else { &[0] });
            entry_index += 1;
        }
        let block = compress_payload(spec.compression, &block_payload);

        // One info record per block: entry count, first/last key with the
        // version-dependent length prefix and terminator, then sizes.
        write_num(&mut key_info_payload, chunk.len() as u64, width);
        for keyword in [&chunk[0].0, &chunk[chunk.len() - 1].0] {
            let units = if utf16 {
                keyword.encode_utf16().count()
            } else {
                keyword.len()
            };
            if v2 {
                key_info_payload.extend_from_slice(&(units as u16).to_be_bytes());
            } else {
                key_info_payload.push(units as u8);
            }
            key_info_payload.extend_from_slice(&encode_text(keyword, spec.encoding));
            if v2 {
                key_info_payload.extend_from_slice(if utf16 { &[0, 0] } else { &[0] });
            }
        }
        write_num(&mut key_info_payload, block.len() as u64, width);
        write_num(&mut key_info_payload, block_payload.len() as u64, width);

        key_blocks_data.extend_from_slice(&block);
    }

    let key_info_region = if v2 {
        let mut block = compress_payload(spec.compression, &key_info_payload);
        if spec.encrypt == FixtureEncrypt::KeyInfo {
            encrypt_tagged(&mut block);
        }
        block
    } else {
        key_info_payload.clone()
    };

    // --- key block meta ---
    let mut meta = Vec::new();
    write_num(&mut meta, chunks.len() as u64, width);
    write_num(&mut meta, spec.entries.len() as u64, width);
    if v2 {
        write_num(&mut meta, key_info_payload.len() as u64, width);
    }
    write_num(&mut meta, key_info_region.len() as u64, width);
    write_num(&mut meta, key_blocks_data.len() as u64, width);
    out.extend_from_slice(&meta);
    if v2 {
        out.extend_from_slice(&adler(&meta).to_be_bytes());
    }
    out.extend_from_slice(&key_info_region);

    let key_block_data_start = out.len();
    let key_blocks_len = key_blocks_data.len();
    out.extend_from_slice(&key_blocks_data);

    // --- record blocks ---
    let mut record_blocks = Vec::new();
    let mut record_info = Vec::new();
    for chunk in &chunks {
        let mut payload = Vec::new();
        for (_, record) in chunk.iter() {
            payload.extend_from_slice(record);
        }
        let mut block = compress_payload(spec.compression, &payload);
        if spec.encrypt == FixtureEncrypt::Record {
            encrypt_tagged(&mut block);
        }
        write_num(&mut record_info, block.len() as u64, width);
        write_num(&mut record_info, payload.len() as u64, width);
        record_blocks.push(block);
    }
    let records_total: usize = record_blocks.iter().map(Vec::len).sum();

    write_num(&mut out, chunks.len() as u64, width);
    write_num(&mut out, spec.entries.len() as u64, width);
    write_num(&mut out, record_info.len() as u64, width);
    write_num(&mut out, records_total as u64, width);
    out.extend_from_slice(&record_info);
    for block in &record_blocks {
        out.extend_from_slice(block);
    }

    Fixture {
        bytes: out,
        key_block_data_start,
        key_blocks_len,
    }
}
