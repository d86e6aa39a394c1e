//! # Insert
//!
//! Inserting writes one record into its block, overwriting by `_id` when
//! the id is already known. The order of operations matters:
//!
//! 1. Resolve the `_id` (generate a time-ordered UUID when absent).
//! 2. Look up or allocate the record's block (`block = blocks; blocks += 1`).
//! 3. If the encoded record no longer fits, grow the block size first —
//!    via a full [`resize`](super::resize) when other blocks exist, or by
//!    just raising `block_size` on a cold store whose only block is the
//!    one being written.
//! 4. Refresh the cached copy, or admit the record when its block extends
//!    the cached prefix and the budget allows.
//! 5. Encode with space padding and write the block.
//!
//! Sequences insert serially; a failure aborts the remainder.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::{ensure, Result};
use tracing::trace;
use uuid::Uuid;

use crate::config::ID_FIELD;
use crate::error::StoreError;
use crate::storage::ItemLocation;
use crate::types::JsonValue;

use super::super::store::Store;

impl Store {
    pub(crate) fn insert_many(&mut self, records: Vec<JsonValue>) -> Result<()> {
        for record in records {
            self.insert_one(record)?;
        }
        Ok(())
    }

    pub(crate) fn insert_one(&mut self, mut record: JsonValue) -> Result<()> {
        ensure!(
            record.is_object(),
            StoreError::invalid_argument("records must be JSON objects")
        );
        let id = match record.get(ID_FIELD) {
            Some(JsonValue::String(id)) => id.clone(),
            Some(_) => {
                return Err(StoreError::invalid_argument("_id must be a string").into());
            }
            None => {
                let id = fresh_record_id();
                record.set(ID_FIELD, JsonValue::String(id.clone()));
                id
            }
        };

        let loc = match self.idx.location(&id) {
            Some(loc) => loc,
            None => {
                let loc = ItemLocation::on_disk(self.blocks);
                self.idx.set_location(&id, loc);
                self.blocks += 1;
                loc
            }
        };

        let payload = self.codec.payload(&record);
        if payload.len() as u64 > self.block_size {
            let grown = (payload.len() as u64).next_power_of_two();
            if self.blocks > 1 {
                self.resize(grown)?;
            } else {
                // Cold store: the only allocated block is the one about to
                // be written, so no on-disk data needs rewriting.
                ensure!(
                    loc.block == 0,
                    "cold-store block size change with live data in block {}",
                    loc.block
                );
                trace!(block_size = grown, "raising block size on cold store");
                self.block_size = grown;
                self.evict_to_budget();
            }
        }

        // A resize may have evicted cache entries; the location must be
        // re-read before deciding on cache placement.
        let Some(loc) = self.idx.location(&id) else {
            eyre::bail!("location for '{}' vanished during insert", id);
        };
        match loc.cache_index {
            Some(slot) => self.idx.replace_cached(slot, record.clone()),
            None => {
                if self.blocks <= self.idx.cache_len() as u64 + 1 && self.cache_has_room() {
                    self.idx.append_cached(&id, record.clone());
                }
            }
        }

        let block_size = self.block_size;
        let encoded = self.codec.pad(payload, block_size)?;
        self.file_mut()?.write_block(loc.block, block_size, &encoded)
    }
}

/// Time-ordered UUID (v1) for records inserted without an `_id`.
fn fresh_record_id() -> String {
    static NODE_ID: OnceLock<[u8; 6]> = OnceLock::new();
    let node_id = NODE_ID.get_or_init(|| {
        // Stable within the process, distinct enough across processes.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let pid = std::process::id();
        let mut node = [0u8; 6];
        node[..4].copy_from_slice(&nanos.to_le_bytes());
        node[4..].copy_from_slice(&(pid as u16).to_le_bytes());
        node
    });
    Uuid::now_v1(node_id).hyphenated().to_string()
}
