//! # Jinn Configuration Constants
//!
//! This module centralizes the crate's configuration constants. Values that
//! depend on each other are co-located so a change to one is checked against
//! the others.
//!
//! ## Dependency Graph
//!
//! ```text
//! HEADER_SIZE (22 bytes)
//!       │
//!       └─> block i lives at byte offset HEADER_SIZE + i * block_size;
//!           the file-size invariant is
//!           file_len == HEADER_SIZE + blocks * block_size.
//!
//! DEFAULT_BLOCK_SIZE (128 bytes)
//!       │
//!       └─> only a starting point: the first insert whose encoded length
//!           exceeds the current block size grows it to the next power of
//!           two, so the default merely bounds the smallest useful record.
//!
//! DEFAULT_MAX_CACHE_SIZE (128 MiB)
//!       │
//!       └─> cache capacity in slots is floor(max_cache_size / block_size);
//!           re-read on every admission decision, so runtime changes take
//!           effect lazily rather than forcing an eviction sweep.
//!
//! DEFAULT_SCAN_CONCURRENCY (4)
//!       │
//!       └─> upper bound on how many contiguous blocks the out-of-core scan
//!           reads per syscall. Results are always delivered in block order
//!           regardless of batch size.
//! ```

/// On-disk header length: magic (4) + version (1) + flags (1) +
/// block_size (8) + blocks (8).
pub const HEADER_SIZE: usize = 22;

/// Magic bytes identifying a jinn database file.
pub const MAGIC: &[u8; 4] = b"jinn";

/// Current file format version.
pub const CURRENT_VERSION: u8 = 1;

/// Header flags bit 0: block payloads are dictionary-compressed.
pub const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Block size used when creating a fresh database file.
pub const DEFAULT_BLOCK_SIZE: u64 = 128;

/// Default in-memory cache budget in bytes.
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 128 * 1024 * 1024;

/// Default number of blocks fetched per read during out-of-core scans.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// Field every record is keyed by.
pub const ID_FIELD: &str = "_id";
