//! Dictionary registry: loads MDX/MDD pairs and fronts keyword lookup,
//! prefix suggestion and resource fetch across them.
//!
//! The registry is the only shared mutable state in the crate. The
//! ID-to-dictionary map sits behind a readers-writer lock; readers resolve
//! an ID to a shared handle and drop the lock before any record I/O, since
//! loaded dictionary data is immutable.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;

use crate::mdict::{Mdict, MdictError, Result};

/// Summary of one loaded dictionary.
#[derive(Debug, Clone, Serialize)]
pub struct DictInfo {
    pub id: u32,
    pub name: String,
    pub title: String,
    pub description: String,
    pub path: String,
    pub has_mdd: bool,
    pub word_count: u64,
}

/// One hit from a cross-dictionary search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub dict_id: u32,
    pub dict_name: String,
    pub dict_title: String,
    pub word: String,
    pub definition: String,
}

/// One prefix suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestResult {
    pub word: String,
    pub dict_id: u32,
    pub dict_title: String,
}

/// The capability set consumed by every client of the registry (HTTP
/// handlers, the dictionary-source persistence adapter, the audio
/// resolver). One production implementation exists ([`Manager`]); tests
/// substitute doubles.
pub trait DictRegistry: Send + Sync {
    /// Load a dictionary file and return its assigned runtime ID.
    ///
    /// Loading is atomic: a failed parse registers nothing. For an `.mdx`
    /// path a sibling `.mdd` with the same stem is loaded too and attached
    /// as the dictionary's resource source.
    fn load(&self, path: &Path) -> Result<u32>;

    /// Scan a directory and load every `*.mdx` file in name order.
    ///
    /// Files that fail to parse are skipped with a warning; the IDs of the
    /// dictionaries that did load are returned.
    fn load_dir(&self, dir: &Path) -> Result<Vec<u32>>;

    /// Remove a dictionary. Its ID is never reused.
    fn unload(&self, id: u32) -> Result<()>;

    /// Exact case-insensitive lookup in one dictionary.
    fn lookup(&self, id: u32, word: &str) -> Result<Vec<u8>>;

    /// Look the word up in the listed dictionaries (all loaded ones when
    /// `ids` is empty), skipping those where it is absent. Results follow
    /// load order, or the order of `ids` when given. Never fails as a
    /// whole.
    fn search(&self, word: &str, ids: &[u32]) -> Vec<SearchResult>;

    /// Prefix suggestions across all loaded dictionaries in load order,
    /// deduplicated globally by keyword, capped at `limit`.
    fn suggest(&self, prefix: &str, limit: usize) -> Vec<SuggestResult>;

    /// Fetch a resource from the dictionary's MDD (the file itself when it
    /// was loaded as an MDD, or the attached companion). At most one
    /// leading `/` and then one leading `\` are stripped from `path`
    /// before lookup.
    fn get_resource(&self, id: u32, path: &str) -> Result<Vec<u8>>;

    /// Summaries of every loaded dictionary in load order.
    fn list_loaded(&self) -> Vec<DictInfo>;
}

struct DictEntry {
    id: u32,
    mdx: Mdict,
    mdd: Option<Mdict>,
    path: PathBuf,
}

struct Inner {
    // BTreeMap keyed by the monotonic ID keeps iteration in load order.
    dicts: BTreeMap<u32, Arc<DictEntry>>,
    next_id: u32,
}

/// The production [`DictRegistry`] implementation.
pub struct Manager {
    inner: RwLock<Inner>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                dicts: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn entry(&self, id: u32) -> Result<Arc<DictEntry>> {
        self.inner
            .read()
            .dicts
            .get(&id)
            .cloned()
            .ok_or(MdictError::DictNotFound(id))
    }

    fn snapshot(&self) -> Vec<Arc<DictEntry>> {
        self.inner.read().dicts.values().cloned().collect()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl DictRegistry for Manager {
    fn load(&self, path: &Path) -> Result<u32> {
        let mdx = Mdict::open(path)?;

        let mdd = if mdx.is_mdd() {
            None
        } else {
            let mdd_path = path.with_extension("mdd");
            if mdd_path.exists() {
                match Mdict::open(&mdd_path) {
                    Ok(m) => Some(m),
                    Err(e) => {
                        warn!(
                            "failed to load companion MDD {}: {}",
                            mdd_path.display(),
                            e
                        );
                        None
                    }
                }
            } else {
                None
            }
        };

        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        info!(
            "loaded dictionary {} ({}, {} entries{})",
            id,
            path.display(),
            mdx.word_count(),
            if mdd.is_some() { ", with MDD" } else { "" }
        );
        inner.dicts.insert(
            id,
            Arc::new(DictEntry {
                id,
                mdx,
                mdd,
                path: path.to_path_buf(),
            }),
        );
        Ok(id)
    }

    fn load_dir(&self, dir: &Path) -> Result<Vec<u32>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mdx"))
            })
            .collect();
        paths.sort();

        let mut ids = Vec::new();
        for path in paths {
            match self.load(&path) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(ids)
    }

    fn unload(&self, id: u32) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.dicts.remove(&id) {
            Some(entry) => {
                info!("unloaded dictionary {} ({})", id, entry.path.display());
                Ok(())
            }
            None => Err(MdictError::DictNotFound(id)),
        }
    }

    fn lookup(&self, id: u32, word: &str) -> Result<Vec<u8>> {
        let entry = self.entry(id)?;
        entry.mdx.lookup(word)
    }

    fn search(&self, word: &str, ids: &[u32]) -> Vec<SearchResult> {
        let entries: Vec<Arc<DictEntry>> = if ids.is_empty() {
            self.snapshot()
        } else {
            ids.iter().filter_map(|id| self.entry(*id).ok()).collect()
        };

        let mut results = Vec::new();
        for entry in entries {
            match entry.mdx.lookup(word) {
                Ok(definition) => results.push(SearchResult {
                    dict_id: entry.id,
                    dict_name: entry.mdx.name(),
                    dict_title: entry.mdx.title(),
                    word: word.to_string(),
                    definition: String::from_utf8_lossy(&definition).into_owned(),
                }),
                Err(e) => debug!("search miss in dictionary {}: {}", entry.id, e),
            }
        }
        results
    }

    fn suggest(&self, prefix: &str, limit: usize) -> Vec<SuggestResult> {
        let mut results = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for entry in self.snapshot() {
            if results.len() >= limit {
                break;
            }
            for word in entry.mdx.suggest(prefix, limit) {
                if results.len() >= limit {
                    break;
                }
                if seen.insert(word.clone()) {
                    results.push(SuggestResult {
                        word,
                        dict_id: entry.id,
                        dict_title: entry.mdx.title(),
                    });
                }
            }
        }
        results
    }

    fn get_resource(&self, id: u32, path: &str) -> Result<Vec<u8>> {
        let entry = self.entry(id)?;
        let mdd = if entry.mdx.is_mdd() {
            &entry.mdx
        } else {
            entry.mdd.as_ref().ok_or(MdictError::NoMdd)?
        };

        // Strip at most one leading slash, then at most one backslash.
        let normalized = path.strip_prefix('/').unwrap_or(path);
        let normalized = normalized.strip_prefix('\\').unwrap_or(normalized);
        mdd.lookup(normalized).map_err(|e| match e {
            MdictError::WordNotFound(_) => MdictError::ResourceNotFound(path.to_string()),
            other => other,
        })
    }

    fn list_loaded(&self) -> Vec<DictInfo> {
        self.snapshot()
            .into_iter()
            .map(|entry| DictInfo {
                id: entry.id,
                name: entry.mdx.name(),
                title: entry.mdx.title(),
                description: entry.mdx.description().to_string(),
                path: entry.path.to_string_lossy().into_owned(),
                has_mdd: entry.mdd.is_some() || entry.mdx.is_mdd(),
                word_count: entry.mdx.word_count(),
            })
            .collect()
    }
}
