//! # Remove and Hole-Fill Compaction
//!
//! Removal is two-phase. The scan phase marks holes: each victim's block
//! index goes into `block_holes`, its cache slot (if any) into
//! `cache_holes`, and its id leaves the index. The compaction phase
//! (`fill_holes`) then restores density:
//!
//! 1. Pair the holes (ascending) with the same number of highest-numbered
//!    live blocks (descending). Where the donor sits above the hole, copy
//!    it down and repoint its index entry; donors at or below their hole
//!    are tail blocks that simply fall off. A relocated record that was
//!    not cached is promoted into the lowest free cache slot when one is
//!    open.
//! 2. Shrink `blocks` by the hole count and truncate the file.
//! 3. Fill each remaining cache hole below the new cache length from the
//!    tail-most live cache slots, one-to-one, then pop the cache down to
//!    size.
//!
//! After a successful remove both hole sets are empty, the file is dense,
//! and the cache again mirrors the lowest-numbered blocks.

use eyre::Result;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::query::{matches, Query};
use crate::storage::ItemLocation;

use super::super::store::Store;
use super::super::{FindOptions, RemoveOptions, ScanControl};

impl Store {
    pub(crate) fn remove(&mut self, query: &Query, options: &RemoveOptions) -> Result<u64> {
        let limit = options.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(0);
        }

        let victims: Vec<String> = match &options.sort {
            Some(sort) => {
                // Sorted removal delegates victim selection to find so the
                // limit applies in comparator order.
                let find_options = FindOptions {
                    limit: options.limit,
                    sort: Some(sort.clone()),
                    projections: None,
                    concurrency: options.concurrency,
                };
                self.find(query, &find_options)?
                    .iter()
                    .filter_map(|record| record.id().map(str::to_string))
                    .collect()
            }
            None => {
                let mut ids = Vec::new();
                let batch = Self::read_batch(options.concurrency);
                self.iterate(batch, |record| {
                    if matches(query, record) {
                        if let Some(id) = record.id() {
                            ids.push(id.to_string());
                        }
                        if ids.len() >= limit {
                            return ScanControl::Stop;
                        }
                    }
                    ScanControl::Continue
                })?;
                ids
            }
        };

        let mut removed = 0u64;
        for id in &victims {
            let Some(loc) = self.idx.remove_id(id) else {
                continue;
            };
            self.idx.mark_block_hole(loc.block);
            if let Some(slot) = loc.cache_index {
                self.idx.mark_cache_hole(slot);
            }
            removed += 1;
        }

        self.fill_holes()?;
        debug!(removed, blocks = self.blocks, "remove complete");
        Ok(removed)
    }

    /// Compacts marked holes out of the block array and the cache. A no-op
    /// when both hole sets are empty.
    pub(crate) fn fill_holes(&mut self) -> Result<()> {
        if self.idx.block_holes().is_empty() && self.idx.cache_holes().is_empty() {
            return Ok(());
        }

        let mut holes: SmallVec<[u64; 8]> = self.idx.block_holes().iter().copied().collect();
        holes.sort_unstable();
        let donors = self.idx.last_n_live_blocks(holes.len(), self.blocks);

        for (&hole, &donor) in holes.iter().zip(donors.iter()) {
            if donor <= hole {
                continue;
            }
            trace!(donor, hole, "moving tail block into hole");
            let record = self.read_record(donor)?;
            self.write_record(hole, &record)?;
            let Some(id) = record.id().map(str::to_string) else {
                return Err(StoreError::corrupt_block(donor, "record has no _id").into());
            };
            let Some(old_loc) = self.idx.location(&id) else {
                return Err(StoreError::corrupt_block(donor, "record missing from index").into());
            };
            self.idx.set_location(
                &id,
                ItemLocation {
                    block: hole,
                    cache_index: old_loc.cache_index,
                },
            );
            if old_loc.cache_index.is_none() {
                let lowest_hole = self.idx.cache_holes().iter().min().copied();
                if let Some(slot) = lowest_hole {
                    self.idx.place_cached(&id, slot, record);
                }
            }
        }

        self.blocks -= holes.len() as u64;
        let block_size = self.block_size;
        let blocks = self.blocks;
        self.file_mut()?.truncate_to(blocks, block_size)?;
        self.idx.clear_block_holes();

        // Cache repair: any holes left get filled from the live tail, then
        // the cache is popped down to its new length.
        let remaining = self.idx.cache_holes().len();
        let new_cache_len = (self.blocks as usize).min(self.idx.cache_len() - remaining);

        let mut low_holes: SmallVec<[usize; 8]> = self
            .idx
            .cache_holes()
            .iter()
            .copied()
            .filter(|&slot| slot < new_cache_len)
            .collect();
        low_holes.sort_unstable();
        let cache_donors = self.idx.last_n_live_cache_slots(low_holes.len());
        for (&hole, &donor) in low_holes.iter().zip(cache_donors.iter()) {
            if donor > hole {
                self.idx.move_cached(donor, hole);
            }
        }
        while self.idx.cache_len() > new_cache_len {
            self.idx.pop_cached();
        }
        self.idx.clear_cache_holes();
        Ok(())
    }
}
