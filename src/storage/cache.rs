//! # Record Index and Cache
//!
//! In-memory side of the store: the `id -> ItemLocation` map, the ordered
//! cache vector holding decoded copies of the lowest-numbered blocks, and
//! the two hole sets that mark positions vacated by deletion until the next
//! compaction pass.
//!
//! ## Invariants maintained here
//!
//! - A cached record's map entry always names its slot:
//!   `cache[loc.cache_index]._id == id`.
//! - Appending a record claims slot `cache.len()`; popping the tail clears
//!   the popped record's `cache_index` when it still points at that slot
//!   (a compaction move may have already relocated it).
//! - Hole sets are ephemeral: they are only non-empty between the marking
//!   phase of a remove and the compaction that consumes them.
//!
//! The map is a hash map; nothing in the engine relies on its iteration
//! order. Scans that need a stable order walk block indices instead.

use hashbrown::{HashMap, HashSet};

use crate::types::JsonValue;

/// Where one record lives: its on-disk block and, when the record is part
/// of the in-memory prefix, its slot in the cache vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLocation {
    pub block: u64,
    pub cache_index: Option<usize>,
}

impl ItemLocation {
    pub fn on_disk(block: u64) -> Self {
        Self {
            block,
            cache_index: None,
        }
    }

    pub fn cached(&self) -> bool {
        self.cache_index.is_some()
    }
}

#[derive(Debug, Default)]
pub struct RecordIndex {
    map: HashMap<String, ItemLocation>,
    cache: Vec<JsonValue>,
    block_holes: HashSet<u64>,
    cache_holes: HashSet<usize>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.cache.clear();
        self.block_holes.clear();
        self.cache_holes.clear();
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn location(&self, id: &str) -> Option<ItemLocation> {
        self.map.get(id).copied()
    }

    pub fn set_location(&mut self, id: &str, loc: ItemLocation) {
        match self.map.get_mut(id) {
            Some(slot) => *slot = loc,
            None => {
                self.map.insert(id.to_string(), loc);
            }
        }
    }

    pub fn remove_id(&mut self, id: &str) -> Option<ItemLocation> {
        self.map.remove(id)
    }

    pub fn locations(&self) -> impl Iterator<Item = (&str, ItemLocation)> {
        self.map.iter().map(|(id, loc)| (id.as_str(), *loc))
    }

    pub fn cache(&self) -> &[JsonValue] {
        &self.cache
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cached_record(&self, slot: usize) -> &JsonValue {
        &self.cache[slot]
    }

    /// Appends `record` to the cache, pointing `id`'s location at the new
    /// tail slot. The location's block must already be set by the caller.
    pub fn append_cached(&mut self, id: &str, record: JsonValue) -> usize {
        let slot = self.cache.len();
        if let Some(loc) = self.map.get_mut(id) {
            loc.cache_index = Some(slot);
        }
        self.cache.push(record);
        slot
    }

    /// Replaces the record stored in `slot` without touching the map.
    pub fn replace_cached(&mut self, slot: usize, record: JsonValue) {
        self.cache[slot] = record;
    }

    /// Writes `record` into an existing slot and points `id` at it. Used
    /// when compaction promotes an on-disk record into a cache hole.
    pub fn place_cached(&mut self, id: &str, slot: usize, record: JsonValue) {
        self.cache[slot] = record;
        if let Some(loc) = self.map.get_mut(id) {
            loc.cache_index = Some(slot);
        }
        self.cache_holes.remove(&slot);
    }

    /// Moves the live record in `from` down into `to`, repointing its map
    /// entry. The vacated slot keeps a stale copy; callers pop it off
    /// before the operation returns.
    pub fn move_cached(&mut self, from: usize, to: usize) {
        self.cache.swap(from, to);
        if let Some(id) = self.cache[to].id().map(str::to_string) {
            if let Some(loc) = self.map.get_mut(&id) {
                loc.cache_index = Some(to);
            }
        }
        self.cache_holes.remove(&to);
    }

    /// Pops the tail slot. When the record living there still points at it,
    /// the record is demoted to on-disk only.
    pub fn pop_cached(&mut self) {
        let Some(record) = self.cache.pop() else {
            return;
        };
        let slot = self.cache.len();
        if let Some(id) = record.id() {
            if let Some(loc) = self.map.get_mut(id) {
                if loc.cache_index == Some(slot) {
                    loc.cache_index = None;
                }
            }
        }
        self.cache_holes.remove(&slot);
    }

    pub fn block_holes(&self) -> &HashSet<u64> {
        &self.block_holes
    }

    pub fn cache_holes(&self) -> &HashSet<usize> {
        &self.cache_holes
    }

    pub fn mark_block_hole(&mut self, block: u64) {
        self.block_holes.insert(block);
    }

    pub fn mark_cache_hole(&mut self, slot: usize) {
        self.cache_holes.insert(slot);
    }

    pub fn clear_block_holes(&mut self) {
        self.block_holes.clear();
    }

    pub fn clear_cache_holes(&mut self) {
        self.cache_holes.clear();
    }

    /// The `n` highest-numbered live blocks below `total_blocks`, in
    /// descending order, skipping marked holes. Compaction pairs these with
    /// the holes they will fill.
    pub fn last_n_live_blocks(&self, n: usize, total_blocks: u64) -> Vec<u64> {
        let mut out = Vec::with_capacity(n);
        let mut block = total_blocks;
        while block > 0 && out.len() < n {
            block -= 1;
            if !self.block_holes.contains(&block) {
                out.push(block);
            }
        }
        out
    }

    /// The `n` highest-numbered live cache slots, in descending order,
    /// skipping cache holes.
    pub fn last_n_live_cache_slots(&self, n: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(n);
        let mut slot = self.cache.len();
        while slot > 0 && out.len() < n {
            slot -= 1;
            if !self.cache_holes.contains(&slot) {
                out.push(slot);
            }
        }
        out
    }
}
