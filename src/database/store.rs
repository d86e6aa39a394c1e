//! Engine state shared by the scan, mutation, and lifecycle code.
//!
//! `Store` owns the open file, the codec, the global counters, and the
//! in-memory index/cache. The `Database` facade wraps it in a mutex; every
//! method here assumes it is the only one running.

use std::path::{Path, PathBuf};

use eyre::Result;
use tempfile::TempPath;

use crate::config::{DEFAULT_BLOCK_SIZE, DEFAULT_SCAN_CONCURRENCY};
use crate::error::StoreError;
use crate::storage::{BlockCodec, BlockFile, FileHeader, RecordIndex};
use crate::types::JsonValue;

pub(crate) struct Store {
    path: PathBuf,
    /// Deletes the backing file on drop when the database was opened
    /// without a filename.
    _temp: Option<TempPath>,
    copy_of: Option<PathBuf>,
    file: Option<BlockFile>,
    pub(crate) codec: BlockCodec,
    pub(crate) block_size: u64,
    pub(crate) blocks: u64,
    pub(crate) max_cache_size: u64,
    pub(crate) idx: RecordIndex,
}

impl Store {
    pub(crate) fn new(
        path: PathBuf,
        temp: Option<TempPath>,
        copy_of: Option<PathBuf>,
        compressed: bool,
        max_cache_size: u64,
    ) -> Self {
        Self {
            path,
            _temp: temp,
            copy_of,
            file: None,
            codec: BlockCodec::new(compressed),
            block_size: DEFAULT_BLOCK_SIZE,
            blocks: 0,
            max_cache_size,
            idx: RecordIndex::new(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn copy_of(&self) -> Option<&Path> {
        self.copy_of.as_deref()
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.file.is_some()
    }

    pub(crate) fn attach_file(&mut self, file: BlockFile) {
        self.file = Some(file);
    }

    pub(crate) fn release_file(&mut self) -> Option<BlockFile> {
        self.file.take()
    }

    pub(crate) fn file_mut(&mut self) -> Result<&mut BlockFile> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(StoreError::invalid_argument("database is not loaded").into()),
        }
    }

    /// Split borrow for code that streams blocks while mutating the index.
    pub(crate) fn file_and_index(&mut self) -> Result<(&mut BlockFile, &mut RecordIndex)> {
        match self.file.as_mut() {
            Some(file) => Ok((file, &mut self.idx)),
            None => Err(StoreError::invalid_argument("database is not loaded").into()),
        }
    }

    pub(crate) fn header(&self) -> FileHeader {
        FileHeader::new(self.block_size, self.blocks, self.codec.compressed())
    }

    /// One decoded record straight off the disk.
    pub(crate) fn read_record(&mut self, block: u64) -> Result<JsonValue> {
        let block_size = self.block_size;
        let codec = self.codec;
        let mut buf = vec![0u8; block_size as usize];
        self.file_mut()?.read_block(block, block_size, &mut buf)?;
        codec.decode(block, &buf)
    }

    /// Encodes `record` and writes it at `block` under the current block
    /// size.
    pub(crate) fn write_record(&mut self, block: u64, record: &JsonValue) -> Result<()> {
        let block_size = self.block_size;
        let encoded = self.codec.encode(record, block_size)?;
        self.file_mut()?.write_block(block, block_size, &encoded)
    }

    /// Whether one more cache slot still fits the budget. Re-reads
    /// `max_cache_size` so runtime tuning applies to the next admission.
    pub(crate) fn cache_has_room(&self) -> bool {
        (self.idx.cache_len() as u64 + 1) * self.block_size <= self.max_cache_size
    }

    /// Pops cache tail slots until the cache fits the budget again, used
    /// after the block size grows.
    pub(crate) fn evict_to_budget(&mut self) {
        while self.idx.cache_len() as u64 * self.block_size > self.max_cache_size {
            self.idx.pop_cached();
        }
    }

    /// Clamp of the `concurrency` option into a usable read batch.
    pub(crate) fn read_batch(concurrency: Option<usize>) -> usize {
        concurrency.unwrap_or(DEFAULT_SCAN_CONCURRENCY).max(1)
    }

    /// Checks the file-size and cache-prefix invariants after a mutation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&mut self) {
        use crate::config::HEADER_SIZE;

        let expected = HEADER_SIZE as u64 + self.blocks * self.block_size;
        let actual = self.file_mut().unwrap().file_len().unwrap();
        assert_eq!(actual, expected, "file length drifted from block count");

        assert!(self.idx.block_holes().is_empty());
        assert!(self.idx.cache_holes().is_empty());

        let cache_len = self.idx.cache_len() as u64;
        assert!(cache_len <= self.blocks);
        assert!(cache_len * self.block_size <= self.max_cache_size || cache_len == 0);

        let mut cached_blocks: Vec<u64> = Vec::new();
        for (id, loc) in self.idx.locations() {
            assert!(loc.block < self.blocks, "location beyond block array");
            if let Some(slot) = loc.cache_index {
                assert_eq!(self.idx.cached_record(slot).id(), Some(id));
                cached_blocks.push(loc.block);
            }
        }
        cached_blocks.sort_unstable();
        let expected_prefix: Vec<u64> = (0..cache_len).collect();
        assert_eq!(cached_blocks, expected_prefix, "cache is not the block prefix");
    }
}
