//! # Dynamic Block Resizing
//!
//! Rewrites the file from one uniform block size to another. The on-disk
//! pass only touches blocks beyond the cached prefix; cached records are
//! re-encoded from memory afterwards.
//!
//! Move order is what keeps this safe in place:
//!
//! - **Growing** walks the tail first. Writing block `i` at `i * new`
//!   cannot clobber an unread block `j < i`, because `j * old + old <=
//!   i * old <= i * new`.
//! - **Shrinking** walks the head first: `(i + 1) * new <= (i + 1) * old`
//!   keeps every write below the next unread block, and the file is
//!   truncated at the end.
//!
//! Because each move's source and destination overlap the neighbouring
//! blocks' ranges, moves are strictly sequential; the scan-time read
//! batching knob does not apply here.
//!
//! Growing copies raw bytes and extends the space padding; shrinking
//! re-encodes through the codec so a record that no longer fits fails
//! loudly instead of being silently cut.

use eyre::{ensure, Result};
use tracing::debug;

use crate::config::HEADER_SIZE;
use crate::error::StoreError;

use super::super::store::Store;

impl Store {
    pub(crate) fn resize(&mut self, new_size: u64) -> Result<()> {
        ensure!(
            new_size > 0,
            StoreError::invalid_argument("block size must be non-zero")
        );
        let old_size = self.block_size;
        if new_size == old_size {
            return Ok(());
        }
        debug!(old_size, new_size, blocks = self.blocks, "resizing blocks");

        let cache_len = self.idx.cache_len() as u64;
        if self.blocks > cache_len {
            // Blocks at or past `on_disk` were allocated but never written
            // (an oversize insert resizes before its first write); they
            // have no bytes to move.
            let file_len = self.file_mut()?.file_len()?;
            let on_disk = file_len.saturating_sub(HEADER_SIZE as u64) / old_size;
            let end = self.blocks.min(on_disk);

            if new_size > old_size {
                for block in (cache_len..end).rev() {
                    self.move_block(block, old_size, new_size)?;
                }
            } else {
                for block in cache_len..end {
                    self.reencode_block(block, old_size, new_size)?;
                }
            }
        }

        self.block_size = new_size;
        for slot in 0..self.idx.cache_len() {
            let record = self.idx.cached_record(slot).clone();
            let Some(id) = record.id() else {
                eyre::bail!("cached record in slot {} has no id", slot);
            };
            let Some(loc) = self.idx.location(id) else {
                eyre::bail!("cached record '{}' missing from index", id);
            };
            self.write_record(loc.block, &record)?;
        }

        let blocks = self.blocks;
        self.file_mut()?.truncate_to(blocks, new_size)?;
        self.evict_to_budget();
        Ok(())
    }

    /// Raw grow move: old bytes plus extended space padding.
    fn move_block(&mut self, block: u64, old_size: u64, new_size: u64) -> Result<()> {
        let mut buf = vec![0u8; old_size as usize];
        let file = self.file_mut()?;
        file.read_block(block, old_size, &mut buf)?;
        buf.resize(new_size as usize, b' ');
        file.write_block(block, new_size, &buf)
    }

    /// Shrink move: decode under the old size, re-encode under the new one.
    fn reencode_block(&mut self, block: u64, old_size: u64, new_size: u64) -> Result<()> {
        let codec = self.codec;
        let mut buf = vec![0u8; old_size as usize];
        self.file_mut()?.read_block(block, old_size, &mut buf)?;
        let record = codec.decode(block, &buf)?;
        let encoded = codec.encode(&record, new_size)?;
        self.file_mut()?.write_block(block, new_size, &encoded)
    }
}
