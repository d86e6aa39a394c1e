//! The public `Database` facade.
//!
//! A thin, lock-guarded shell over the engine: every public operation
//! acquires the internal mutex, so two calls on the same database never
//! overlap. Dropping the database closes it best-effort (header flush),
//! and deletes the backing file when it was opened without a filename.

use std::path::{Path, PathBuf};

use eyre::Result;
use parking_lot::Mutex;

use crate::query::{Query, Update};
use crate::types::JsonValue;

use super::store::Store;
use super::{
    FindOptions, OpenOptions, RemoveOptions, ResizeOptions, ScanControl, UpdateOptions,
};

pub struct Database {
    inner: Mutex<Store>,
}

impl Database {
    /// Prepares a database handle. With `path: None` a unique temporary
    /// file is claimed and deleted again when the handle drops. Nothing is
    /// read until [`load`](Self::load).
    pub fn open<P: AsRef<Path>>(path: Option<P>, options: OpenOptions) -> Result<Self> {
        let (path, temp) = match path {
            Some(p) => (p.as_ref().to_path_buf(), None),
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("jinn-")
                    .suffix(".db")
                    .tempfile()?
                    .into_temp_path();
                (temp.to_path_buf(), Some(temp))
            }
        };
        Ok(Self {
            inner: Mutex::new(Store::new(
                path,
                temp,
                options.copy_of,
                options.compressed,
                options.max_cache_size,
            )),
        })
    }

    /// Opens the file, reads (or initializes) the header, and populates
    /// the index and cache from the block array.
    pub fn load(&self) -> Result<()> {
        self.inner.lock().load()
    }

    /// Persists the header and releases the file and all in-memory state.
    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    /// Inserts one record, overwriting by `_id`. A missing `_id` gets a
    /// fresh time-ordered UUID.
    pub fn insert(&self, record: JsonValue) -> Result<()> {
        self.inner.lock().insert_one(record)
    }

    /// Inserts records one after another; the first failure aborts the
    /// remainder.
    pub fn insert_many(&self, records: Vec<JsonValue>) -> Result<()> {
        self.inner.lock().insert_many(records)
    }

    /// Records matching `query`, subject to limit/sort/projections.
    pub fn find(&self, query: &Query, options: &FindOptions) -> Result<Vec<JsonValue>> {
        self.inner.lock().find(query, options)
    }

    /// Every live record, unfiltered and unprojected.
    pub fn find_all(&self) -> Result<Vec<JsonValue>> {
        self.inner.lock().find(&Query::empty(), &FindOptions::default())
    }

    /// Applies `update` to every record matching `query`; returns how many
    /// records were rewritten.
    pub fn update(&self, query: &Query, update: &Update, options: &UpdateOptions) -> Result<u64> {
        self.inner.lock().update(query, update, options)
    }

    /// Removes records matching `query` and compacts the file; returns how
    /// many records were removed.
    pub fn remove(&self, query: &Query, options: &RemoveOptions) -> Result<u64> {
        self.inner.lock().remove(query, options)
    }

    /// Visits every live record exactly once: cached records first, then
    /// the on-disk suffix in block order. Returns `true` unless a handler
    /// returned [`ScanControl::Stop`].
    pub fn iterate<F>(&self, handler: F) -> Result<bool>
    where
        F: FnMut(&JsonValue) -> ScanControl,
    {
        let batch = Store::read_batch(None);
        self.inner.lock().iterate(batch, handler)
    }

    /// [`iterate`](Self::iterate) with an explicit read-batch bound for
    /// the out-of-core phase.
    pub fn iterate_with_batch<F>(&self, batch: usize, handler: F) -> Result<bool>
    where
        F: FnMut(&JsonValue) -> ScanControl,
    {
        self.inner.lock().iterate(batch.max(1), handler)
    }

    /// Rewrites the file to a new uniform block size. A no-op when the
    /// size is unchanged.
    pub fn resize(&self, new_block_size: u64, _options: &ResizeOptions) -> Result<()> {
        self.inner.lock().resize(new_block_size)
    }

    /// Number of blocks (== number of live records).
    pub fn block_count(&self) -> u64 {
        self.inner.lock().blocks
    }

    pub fn block_size(&self) -> u64 {
        self.inner.lock().block_size
    }

    /// Number of records currently mirrored in the cache.
    pub fn cached_count(&self) -> usize {
        self.inner.lock().idx.cache_len()
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.inner.lock().idx.len()
    }

    pub fn is_compressed(&self) -> bool {
        self.inner.lock().codec.compressed()
    }

    pub fn max_cache_size(&self) -> u64 {
        self.inner.lock().max_cache_size
    }

    /// Retunes the cache budget. Takes effect on subsequent admission
    /// decisions; nothing is evicted proactively.
    pub fn set_max_cache_size(&self, bytes: u64) {
        self.inner.lock().max_cache_size = bytes;
    }

    /// The backing file's path (a generated temp path when the database
    /// was opened without a filename).
    pub fn path(&self) -> PathBuf {
        self.inner.lock().path().to_path_buf()
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.inner.lock().check_invariants();
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.inner.lock().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_loaded;
    use crate::parsing::parse_json;

    #[test]
    fn unnamed_database_cleans_up_its_temp_file() {
        let db = Database::open(None::<&Path>, OpenOptions::default()).unwrap();
        db.load().unwrap();
        db.insert(parse_json(r#"{"_id":"t","n":1}"#).unwrap()).unwrap();

        let path = db.path();
        assert!(path.exists());
        drop(db);
        assert!(!path.exists());
    }

    #[test]
    fn copy_of_seeds_the_working_file() {
        let (db, dir) = open_loaded();
        db.insert(parse_json(r#"{"_id":"a","n":1}"#).unwrap()).unwrap();
        db.insert(parse_json(r#"{"_id":"b","n":2}"#).unwrap()).unwrap();
        db.close().unwrap();

        let copy = Database::open(
            Some(dir.path().join("copy.db")),
            OpenOptions {
                copy_of: Some(dir.path().join("test.db")),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        copy.load().unwrap();

        assert_eq!(copy.record_count(), 2);
        // Mutating the copy leaves the original alone.
        copy.remove(&Query::parse(r#"{"_id":"a"}"#).unwrap(), &Default::default())
            .unwrap();
        copy.close().unwrap();

        db.load().unwrap();
        assert_eq!(db.record_count(), 2);
    }

    #[test]
    fn operations_before_load_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(Some(dir.path().join("x.db")), OpenOptions::default()).unwrap();

        assert!(db.insert(parse_json(r#"{"_id":"a"}"#).unwrap()).is_err());
        assert!(db.find_all().is_err());
    }
}
