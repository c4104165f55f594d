//! MDX/MDD file decoder: header, block metadata, index construction and
//! keyword lookup.

pub mod compression;
pub mod crypto;
pub mod error;
pub mod header;
pub mod key_blocks;
pub mod models;
pub mod record_blocks;
pub mod utils;

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use encoding_rs::UTF_16LE;
use log::info;

pub use error::{MdictError, Result};
use models::{
    DictKind, Header, KeyBlockInfo, KeyBlockMeta, KeyEntry, RecordBlockInfo, RecordBlockMeta,
};

/// One loaded dictionary file.
///
/// Parses both `.mdx` (definitions) and `.mdd` (resources) files,
/// format versions 1.x and 2.x. All keyword entries and both descriptor
/// arrays are held in memory; record bytes are read on demand from a
/// freshly opened file handle per lookup, so a `Mdict` is immutable and
/// freely shared across threads after [`Mdict::open`] returns.
pub struct Mdict {
    path: PathBuf,
    kind: DictKind,
    header: Header,
    key_block_meta: KeyBlockMeta,
    key_block_infos: Vec<KeyBlockInfo>,
    key_entries: Vec<KeyEntry>,
    record_block_meta: RecordBlockMeta,
    record_block_infos: Vec<RecordBlockInfo>,
    key_block_data_start: u64,
    record_block_data_start: u64,
}

impl Mdict {
    /// Open a dictionary file and build its full key and record index.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the format is
    /// malformed or corrupted, the version is unsupported (3.0+), or a
    /// checksum fails. Nothing is retained on failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening MDict file: {}", path.display());

        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mdd") => DictKind::Mdd,
            _ => DictKind::Mdx,
        };

        let mut file = File::open(path)?;
        let mut header = header::parse(&mut file)?;
        // MDD keywords are resource paths stored as UTF-16LE regardless of
        // what the header claims.
        if kind == DictKind::Mdd {
            header.encoding = UTF_16LE;
        }

        let key_block_meta = key_blocks::read_meta(&mut file, &header)?;
        let key_block_infos = key_blocks::read_info(&mut file, &header, &key_block_meta)?;
        let key_block_data_start = key_block_meta.info_start_pos + key_block_meta.info_comp_size;
        let key_entries = key_blocks::read_entries(
            &mut file,
            &header,
            &key_block_meta,
            &key_block_infos,
            key_block_data_start,
        )?;

        let record_meta_start = key_block_data_start + key_block_meta.blocks_total_size;
        let record_block_meta = record_blocks::read_meta(&mut file, &header, record_meta_start)?;
        if record_block_meta.entry_count != key_block_meta.entry_count {
            return Err(MdictError::CountMismatch {
                item_type: "record entries",
                expected: key_block_meta.entry_count,
                found: record_block_meta.entry_count,
            });
        }
        let record_info_start = record_meta_start + (4 * header.number_width) as u64;
        let record_block_infos =
            record_blocks::read_info(&mut file, &header, &record_block_meta, record_info_start)?;
        let record_block_data_start = record_info_start + record_block_meta.info_size;

        info!(
            "MDict file opened: {} entries, {} key blocks, {} record blocks",
            key_block_meta.entry_count,
            key_block_infos.len(),
            record_block_infos.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            header,
            key_block_meta,
            key_block_infos,
            key_entries,
            record_block_meta,
            record_block_infos,
            key_block_data_start,
            record_block_data_start,
        })
    }

    /// Look up a word with an exact, case-insensitive match.
    ///
    /// MDX definitions are returned decoded in the dictionary's encoding;
    /// MDD payloads are returned as raw resource bytes.
    pub fn lookup(&self, word: &str) -> Result<Vec<u8>> {
        let word = word.trim();
        let folded = word.to_lowercase();
        let idx = self
            .key_entries
            .partition_point(|e| e.keyword.to_lowercase() < folded);
        match self.key_entries.get(idx) {
            Some(entry) if entry.keyword.to_lowercase() == folded => self.lookup_entry(entry),
            _ => Err(MdictError::WordNotFound(word.to_string())),
        }
    }

    /// Fetch the record bytes for a key entry.
    pub fn lookup_entry(&self, entry: &KeyEntry) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let data = record_blocks::extract(
            &mut file,
            &self.header,
            entry,
            &self.record_block_infos,
            self.record_block_data_start,
        )?;
        if self.kind == DictKind::Mdd {
            return Ok(data);
        }
        Ok(utils::decode_text(&data, self.header.encoding).into_bytes())
    }

    /// Collect up to `limit` deduplicated keywords whose case-folded form
    /// starts with the case-folded `prefix`.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        let folded = prefix.trim().to_lowercase();
        if limit == 0 {
            return Vec::new();
        }
        let start = self
            .key_entries
            .partition_point(|e| e.keyword.to_lowercase() < folded);

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        for entry in &self.key_entries[start..] {
            if results.len() >= limit {
                break;
            }
            if !entry.keyword.to_lowercase().starts_with(&folded) {
                break;
            }
            if seen.insert(entry.keyword.clone()) {
                results.push(entry.keyword.clone());
            }
        }
        results
    }

    /// The dictionary name: file name without its extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The header title, falling back to the file name when empty.
    pub fn title(&self) -> String {
        if self.header.title.is_empty() {
            self.name()
        } else {
            self.header.title.clone()
        }
    }

    pub fn description(&self) -> &str {
        &self.header.description
    }

    /// Total number of keyword entries.
    pub fn word_count(&self) -> u64 {
        self.key_block_meta.entry_count
    }

    pub fn is_mdd(&self) -> bool {
        self.kind == DictKind::Mdd
    }

    pub fn kind(&self) -> DictKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn key_block_meta(&self) -> &KeyBlockMeta {
        &self.key_block_meta
    }

    pub fn key_block_infos(&self) -> &[KeyBlockInfo] {
        &self.key_block_infos
    }

    pub fn key_entries(&self) -> &[KeyEntry] {
        &self.key_entries
    }

    pub fn record_block_meta(&self) -> &RecordBlockMeta {
        &self.record_block_meta
    }

    pub fn record_block_infos(&self) -> &[RecordBlockInfo] {
        &self.record_block_infos
    }

    /// Absolute file offset where key block data begins.
    pub fn key_block_data_start(&self) -> u64 {
        self.key_block_data_start
    }

    /// Absolute file offset where record block data begins.
    pub fn record_block_data_start(&self) -> u64 {
        self.record_block_data_start
    }
}
