//! # Storage Layer
//!
//! Everything that touches bytes lives here:
//!
//! - [`header`]: the 22-byte file header codec (zerocopy, little-endian)
//! - [`block_file`]: random-access block reads/writes/truncation
//! - [`codec`]: record <-> fixed-size block buffer translation
//! - [`smaz`]: the short-string dictionary compressor behind the
//!   `compressed` flag
//! - [`cache`]: the id -> location index, cache vector, and hole sets
//!
//! The file is a 22-byte header followed by a dense array of `blocks`
//! fixed-size blocks. Every mutation in the engine above preserves
//! `file_len == HEADER_SIZE + blocks * block_size` and keeps the cache
//! mirroring the lowest-numbered blocks.

mod block_file;
mod cache;
mod codec;
mod header;
pub mod smaz;

pub use block_file::BlockFile;
pub use cache::{ItemLocation, RecordIndex};
pub use codec::BlockCodec;
pub use header::FileHeader;
