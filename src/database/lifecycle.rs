//! # Load and Close
//!
//! `load` turns a path into a running store:
//!
//! 1. Copy the `copy_of` source over the working file, when configured.
//! 2. Open (creating if absent) read-write.
//! 3. Read the header. A file too short to hold one is initialized fresh;
//!    a full-size header with wrong magic or version is surfaced as an
//!    error rather than silently clobbered — unless the file looks like
//!    the legacy newline-delimited format, which is migrated in place.
//! 4. Scan every block in order, indexing each record and caching the
//!    prefix that fits the budget.
//!
//! `close` persists the header (block size, block count, compression
//! flag), syncs, and drops the descriptor and all in-memory state. A
//! failure during the populate scan also drops the descriptor before
//! propagating.

use eyre::{Result, WrapErr};
use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::config::HEADER_SIZE;
use crate::error::StoreError;
use crate::storage::{BlockCodec, BlockFile, FileHeader, ItemLocation};

use super::scan::scan_blocks;
use super::store::Store;
use super::ScanControl;

impl Store {
    pub(crate) fn load(&mut self) -> Result<()> {
        self.idx.clear();
        self.blocks = 0;

        if let Some(source) = self.copy_of().map(|p| p.to_path_buf()) {
            std::fs::copy(&source, self.path()).wrap_err_with(|| {
                format!(
                    "failed to copy '{}' to '{}'",
                    source.display(),
                    self.path().display()
                )
            })?;
        }

        let mut file = BlockFile::open(self.path())?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        let filled = file.read_header_bytes(&mut header_bytes)?;

        if filled < HEADER_SIZE {
            if filled > 0 && header_bytes[0] == b'{' {
                self.attach_file(file);
                return self.fail_closes_file(Self::adopt_legacy);
            }
            // Empty (or stub) file: initialize a fresh header.
            file.write_header(&self.header())?;
            file.truncate_to(0, self.block_size)?;
            self.attach_file(file);
            debug!(path = %self.path().display(), "initialized empty database");
            return Ok(());
        }

        match FileHeader::from_bytes(&header_bytes) {
            Ok(header) => {
                self.block_size = header.block_size();
                self.blocks = header.blocks();
                self.codec = BlockCodec::new(header.compressed());
                self.attach_file(file);
                self.fail_closes_file(Self::populate)
            }
            Err(err) => {
                if matches!(err.downcast_ref::<StoreError>(), Some(StoreError::BadMagic))
                    && header_bytes[0] == b'{'
                {
                    self.attach_file(file);
                    return self.fail_closes_file(Self::adopt_legacy);
                }
                // Descriptor released before the error propagates.
                drop(file);
                Err(err)
            }
        }
    }

    /// Runs `op`; on failure the descriptor is released before the error
    /// propagates so a failed load leaves no open handle behind.
    fn fail_closes_file(&mut self, op: fn(&mut Self) -> Result<()>) -> Result<()> {
        let result = op(self);
        if result.is_err() {
            self.release_file();
        }
        result
    }

    /// Scans all blocks, indexing every record and caching the prefix that
    /// fits the budget.
    fn populate(&mut self) -> Result<()> {
        let batch = Self::read_batch(None);
        let (codec, block_size, blocks, max_cache_size) =
            (self.codec, self.block_size, self.blocks, self.max_cache_size);
        let (file, idx) = self.file_and_index()?;
        let no_holes = HashSet::new();
        scan_blocks(
            file,
            codec,
            block_size,
            0,
            blocks,
            &no_holes,
            batch,
            |block, record| {
                let Some(id) = record.id().map(str::to_string) else {
                    return Err(StoreError::corrupt_block(block, "record has no _id").into());
                };
                idx.set_location(&id, ItemLocation::on_disk(block));
                if block == idx.cache_len() as u64
                    && (idx.cache_len() as u64 + 1) * block_size <= max_cache_size
                {
                    idx.append_cached(&id, record);
                }
                Ok(ScanControl::Continue)
            },
        )?;
        debug!(
            blocks = self.blocks,
            cached = self.idx.cache_len(),
            block_size = self.block_size,
            "database loaded"
        );
        Ok(())
    }

    /// Migrates a legacy newline-delimited file: uniform space-padded JSON
    /// lines, one record each, no header. The file is rewritten in block
    /// format with the line length as the block size.
    fn adopt_legacy(&mut self) -> Result<()> {
        let data = std::fs::read(self.path())
            .wrap_err_with(|| format!("failed to read '{}'", self.path().display()))?;

        let mut lines: Vec<&[u8]> = data.split(|&b| b == b'\n').collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        let expected = lines.first().map(|l| l.len() as u64).unwrap_or(0);
        for line in &lines {
            if line.len() as u64 != expected {
                return Err(StoreError::BlockSizeMismatch {
                    expected,
                    found: line.len() as u64,
                }
                .into());
            }
        }

        let codec = BlockCodec::new(false);
        let mut records = Vec::with_capacity(lines.len());
        let mut block_size = expected;
        for (i, line) in lines.iter().enumerate() {
            let record = codec.decode(i as u64, line)?;
            block_size = block_size.max(codec.encoded_len(&record));
            records.push(record);
        }
        warn!(
            records = records.len(),
            block_size, "migrating legacy newline-delimited file"
        );

        self.codec = codec;
        self.block_size = block_size;
        self.blocks = records.len() as u64;

        for (i, record) in records.iter().enumerate() {
            self.write_record(i as u64, record)?;
        }
        let (blocks, block_size) = (self.blocks, self.block_size);
        let file = self.file_mut()?;
        file.truncate_to(blocks, block_size)?;
        file.write_header(&FileHeader::new(block_size, blocks, false))?;

        for (i, record) in records.into_iter().enumerate() {
            let Some(id) = record.id().map(str::to_string) else {
                return Err(StoreError::corrupt_block(i as u64, "record has no _id").into());
            };
            self.idx.set_location(&id, ItemLocation::on_disk(i as u64));
            if (i as u64) == self.idx.cache_len() as u64 && self.cache_has_room() {
                self.idx.append_cached(&id, record);
            }
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        if self.is_loaded() {
            let header = self.header();
            let file = self.file_mut()?;
            file.write_header(&header)?;
            file.sync()?;
        }
        self.release_file();
        self.idx.clear();
        self.blocks = 0;
        debug!(path = %self.path().display(), "database closed");
        Ok(())
    }
}
