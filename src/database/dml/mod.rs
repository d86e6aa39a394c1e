//! Mutation engine: the operations that change the block array.
//!
//! Every entry point here leaves the store dense and consistent on
//! success: exactly `blocks` records of exactly `block_size` bytes after
//! the header, no interior holes, and the cache mirroring the
//! lowest-numbered blocks.
//!
//! - [`insert`]: write or overwrite one record, growing the block size
//!   when a record outgrows it
//! - [`update`]: find-modify-reinsert pipeline
//! - [`delete`]: hole marking plus the two-phase compaction
//! - [`resize`]: in-place rewrite to a new uniform block size

mod delete;
mod insert;
mod resize;
mod update;
