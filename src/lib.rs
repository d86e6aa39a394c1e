//! # Jinn - Embedded JSON Document Store
//!
//! Jinn keeps a single collection of JSON records in one file and answers
//! NoSQL-style queries over it. The design centers on a fixed-block-size,
//! out-of-core store: a bounded in-memory cache mirrors the front of the
//! block array and scans transparently continue on disk when the working
//! set outgrows memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jinn::{Database, OpenOptions, Query, Update};
//! use jinn::parsing::parse_json;
//!
//! # fn main() -> eyre::Result<()> {
//! let db = Database::open(Some("./people.db"), OpenOptions::default())?;
//! db.load()?;
//!
//! db.insert(parse_json(r#"{"name":"ada","value":1}"#)?)?;
//!
//! let hits = db.find(&Query::parse(r#"{"name":"ada"}"#)?, &Default::default())?;
//! assert_eq!(hits.len(), 1);
//!
//! db.update(
//!     &Query::parse(r#"{"name":"ada"}"#)?,
//!     &Update::parse(r#"{"$inc":{"value":-1}}"#)?,
//!     &Default::default(),
//! )?;
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       Public API (Database)         │
//! ├─────────────────────────────────────┤
//! │  Query/Update Trees │ Scan Engine   │
//! ├─────────────────────┼───────────────┤
//! │  Operator Evaluator │ Mutation      │
//! │  (match / apply)    │ Engine        │
//! ├─────────────────────────────────────┤
//! │   Index & Cache (prefix mirror)     │
//! ├─────────────────────────────────────┤
//! │   Block Codec (JSON + compression)  │
//! ├─────────────────────────────────────┤
//! │   Block File (header + dense array) │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! people.db
//! ├── header (22 B)    magic "jinn", version, flags, block size, blocks
//! ├── block 0          one space-padded record
//! ├── block 1
//! └── ...              exactly `blocks` blocks, no interior holes
//! ```
//!
//! ## Module Overview
//!
//! - [`database`]: lifecycle, find, scan engine, mutation engine
//! - [`query`]: query/update trees, matching, directive application
//! - [`storage`]: header and block codecs, block file, index/cache
//! - [`types`]: the `JsonValue` tagged union
//! - [`parsing`]: JSON parser and canonical writer
//! - [`error`]: the typed failure taxonomy
//!
//! ## Guarantees and non-goals
//!
//! After every successful public operation the file holds exactly
//! `blocks` records of exactly `block_size` bytes, with the cache
//! mirroring the lowest-numbered blocks. There are no transactions, no
//! concurrent writers, and no crash recovery beyond the header flush on
//! close.

pub mod config;
pub mod database;
pub mod error;
pub mod parsing;
pub mod query;
pub mod storage;
pub mod types;

pub use database::{
    Database, FindOptions, OpenOptions, Projections, RemoveOptions, ResizeOptions, ScanControl,
    SortComparator, UpdateOptions,
};
pub use error::StoreError;
pub use query::{Query, Update};
pub use types::JsonValue;
