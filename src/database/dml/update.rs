//! # Update
//!
//! An update is a find-modify-reinsert pipeline: matching records are
//! fetched as fresh decoded copies, the directive is applied to each copy,
//! and the copies are written back through the insert path (overwrite by
//! `_id`). A directive that fails validation aborts before the failing
//! record is written; records already rewritten stay rewritten, matching
//! the engine's no-transaction contract.

use eyre::Result;
use tracing::debug;

use crate::query::{apply_update, Query, Update};

use super::super::store::Store;
use super::super::{FindOptions, UpdateOptions};

impl Store {
    pub(crate) fn update(
        &mut self,
        query: &Query,
        update: &Update,
        options: &UpdateOptions,
    ) -> Result<u64> {
        let find_options = FindOptions {
            limit: options.limit,
            sort: None,
            projections: None,
            concurrency: options.concurrency,
        };
        let found = self.find(query, &find_options)?;

        let mut updated = 0u64;
        for mut record in found {
            apply_update(update, &mut record)?;
            self.insert_one(record)?;
            updated += 1;
        }
        debug!(updated, "update complete");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_loaded;
    use crate::parsing::parse_json;
    use crate::types::JsonValue;

    #[test]
    fn inc_round_trip() {
        let (db, _dir) = open_loaded();
        db.insert(parse_json(r#"{"_id":"c1","name":"c","value":1}"#).unwrap())
            .unwrap();

        let count = db
            .update(
                &Query::parse(r#"{"name":"c"}"#).unwrap(),
                &Update::parse(r#"{"$inc":{"value":-1}}"#).unwrap(),
                &Default::default(),
            )
            .unwrap();

        assert_eq!(count, 1);
        let found = db
            .find(&Query::parse(r#"{"name":"c"}"#).unwrap(), &Default::default())
            .unwrap();
        assert_eq!(found[0].get("value").and_then(JsonValue::as_f64), Some(0.0));
    }

    #[test]
    fn update_respects_limit() {
        let (db, _dir) = open_loaded();
        for i in 0..4 {
            db.insert(parse_json(&format!(r#"{{"_id":"{}","n":0}}"#, i)).unwrap())
                .unwrap();
        }

        let options = UpdateOptions {
            limit: Some(2),
            ..Default::default()
        };
        let count = db
            .update(
                &Query::empty(),
                &Update::parse(r#"{"$set":{"n":1}}"#).unwrap(),
                &options,
            )
            .unwrap();

        assert_eq!(count, 2);
        let touched = db
            .find(&Query::parse(r#"{"n":1}"#).unwrap(), &Default::default())
            .unwrap();
        assert_eq!(touched.len(), 2);
    }

    #[test]
    fn update_can_grow_records_across_a_resize() {
        let (db, _dir) = open_loaded();
        for i in 0..3 {
            db.insert(parse_json(&format!(r#"{{"_id":"{}","v":"x"}}"#, i)).unwrap())
                .unwrap();
        }
        let old_size = db.block_size();

        let big = "y".repeat(old_size as usize);
        let count = db
            .update(
                &Query::parse(r#"{"_id":"1"}"#).unwrap(),
                &Update::from_value(
                    &parse_json(&format!(r#"{{"$set":{{"v":"{}"}}}}"#, big)).unwrap(),
                )
                .unwrap(),
                &Default::default(),
            )
            .unwrap();

        assert_eq!(count, 1);
        assert!(db.block_size() > old_size);
        // Untouched records survive the block-size change.
        let other = db
            .find(&Query::parse(r#"{"_id":"2"}"#).unwrap(), &Default::default())
            .unwrap();
        assert_eq!(other[0].get("v").and_then(JsonValue::as_str), Some("x"));
        db.assert_invariants();
    }

    #[test]
    fn failed_directive_leaves_the_record_untouched() {
        let (db, _dir) = open_loaded();
        db.insert(parse_json(r#"{"_id":"a","v":"text"}"#).unwrap())
            .unwrap();

        let err = db.update(
            &Query::parse(r#"{"_id":"a"}"#).unwrap(),
            &Update::parse(r#"{"$inc":{"v":1}}"#).unwrap(),
            &Default::default(),
        );
        assert!(err.is_err());

        let found = db
            .find(&Query::parse(r#"{"_id":"a"}"#).unwrap(), &Default::default())
            .unwrap();
        assert_eq!(found[0].get("v").and_then(JsonValue::as_str), Some("text"));
    }
}
