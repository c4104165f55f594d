//! MDX/MDD dictionary hosting core.
//!
//! Decodes MDict dictionary files (`.mdx` for textual entries, `.mdd` for
//! embedded resources) and fronts a set of loaded dictionaries behind a
//! registry offering random-access lookup, prefix suggestion and resource
//! fetch. The registry is the surface consumed by the HTTP layer; this
//! crate owns no routes, persistence or caches of its own.

pub mod manager;
pub mod mdict;

pub use manager::{DictInfo, DictRegistry, Manager, SearchResult, SuggestResult};
pub use mdict::{Mdict, MdictError, Result};
