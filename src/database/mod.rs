//! # Database Module
//!
//! The high-level API for jinn: one [`Database`] owns one collection of
//! JSON records in one file.
//!
//! ## Operation Pipeline
//!
//! ```text
//! find / update / remove
//!     │
//!     ▼
//! ┌────────────────────────────────────────────────────┐
//! │ Scan engine: cached records first, then the        │
//! │ out-of-core suffix in block order                  │
//! └────────────────────────────────────────────────────┘
//!     │ matched records
//!     ▼
//! ┌────────────────────────────────────────────────────┐
//! │ Operator evaluators: query match / update apply    │
//! └────────────────────────────────────────────────────┘
//!     │ mutations
//!     ▼
//! ┌────────────────────────────────────────────────────┐
//! │ Mutation engine: insert, hole marking, compaction, │
//! │ resize — keeps file, cache, and index in sync      │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! Single-owner engine: public operations serialize through an internal
//! mutex, so a `Database` is `Send + Sync` but never runs two operations
//! at once. I/O happens synchronously on the calling thread; the
//! `concurrency` options bound how many contiguous blocks a scan reads
//! per syscall, never the number of threads.

#[allow(clippy::module_inception)]
mod database;
mod find;
mod lifecycle;
mod scan;
mod store;

mod dml;

pub use database::Database;

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DEFAULT_MAX_CACHE_SIZE;
use crate::types::JsonValue;

/// Handler verdict for [`Database::iterate`]: keep going or cancel the
/// scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Comparator over full records, used by sorted finds and removes.
pub type SortComparator = Arc<dyn Fn(&JsonValue, &JsonValue) -> Ordering + Send + Sync>;

/// Field-selection map: a field survives projection only when mapped to
/// `true`; `_id` survives unless mapped to `false`.
pub type Projections = hashbrown::HashMap<String, bool>;

/// Settings fixed at open time.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Seed the working file from a copy of this one on `load`.
    pub copy_of: Option<PathBuf>,
    /// Dictionary-compress block payloads (new files only; existing files
    /// keep their header flag).
    pub compressed: bool,
    /// Cache budget in bytes; tunable later via
    /// [`Database::set_max_cache_size`].
    pub max_cache_size: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            copy_of: None,
            compressed: false,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

#[derive(Clone, Default)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub sort: Option<SortComparator>,
    pub projections: Option<Projections>,
    /// Read-batch bound for the underlying scan.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub limit: Option<usize>,
    /// Read-batch bound for the underlying scan.
    pub concurrency: Option<usize>,
}

#[derive(Clone, Default)]
pub struct RemoveOptions {
    pub limit: Option<usize>,
    /// Select victims in comparator order before the limit applies.
    pub sort: Option<SortComparator>,
    /// Read-batch bound for the underlying scan.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ResizeOptions {
    /// Accepted for interface symmetry; block moves overlap in place and
    /// therefore always run one at a time.
    pub concurrency: Option<usize>,
}
