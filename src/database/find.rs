//! # Find
//!
//! Query execution over the hybrid scan.
//!
//! The `{_id: "<literal>"}` shape short-circuits to a single index lookup
//! and at most one block read. Everything else walks the scan engine,
//! matching each record and collecting clones.
//!
//! With a limit and no comparator the scan stops as soon as the limit is
//! reached. With both, results are kept bounded top-k style: every time
//! the buffer overflows the limit it is sorted and the largest entry is
//! dropped. The comparator always sees full records; projections are
//! applied only after selection, so a projection that drops the sort key
//! still sorts correctly.

use eyre::Result;

use crate::query::{matches, Query};
use crate::types::JsonValue;

use super::store::Store;
use super::{FindOptions, Projections, ScanControl};

impl Store {
    pub(crate) fn find(&mut self, query: &Query, options: &FindOptions) -> Result<Vec<JsonValue>> {
        let limit = options.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(id) = query.as_id_lookup() {
            let Some(loc) = self.idx.location(id) else {
                return Ok(Vec::new());
            };
            let record = match loc.cache_index {
                Some(slot) => self.idx.cached_record(slot).clone(),
                None => self.read_record(loc.block)?,
            };
            return Ok(vec![apply_projection(record, options.projections.as_ref())]);
        }

        let batch = Self::read_batch(options.concurrency);
        let mut results: Vec<JsonValue> = Vec::new();

        match &options.sort {
            None => {
                self.iterate(batch, |record| {
                    if matches(query, record) {
                        results.push(apply_projection(
                            record.clone(),
                            options.projections.as_ref(),
                        ));
                        if results.len() >= limit {
                            return ScanControl::Stop;
                        }
                    }
                    ScanControl::Continue
                })?;
                Ok(results)
            }
            Some(sort) => {
                self.iterate(batch, |record| {
                    if matches(query, record) {
                        results.push(record.clone());
                        if results.len() > limit {
                            // Bounded top-k: sort and drop the largest.
                            results.sort_by(|a, b| (**sort)(a, b));
                            results.pop();
                        }
                    }
                    ScanControl::Continue
                })?;
                results.sort_by(|a, b| (**sort)(a, b));
                Ok(results
                    .into_iter()
                    .map(|record| apply_projection(record, options.projections.as_ref()))
                    .collect())
            }
        }
    }
}

/// Include-only projection. A field survives only when the map names it
/// with `true`; `_id` survives unless the map names it with `false`.
fn apply_projection(record: JsonValue, projections: Option<&Projections>) -> JsonValue {
    let Some(projections) = projections else {
        return record;
    };
    let pairs = match record {
        JsonValue::Object(pairs) => pairs,
        other => return other,
    };
    let keep_id = projections
        .get(crate::config::ID_FIELD)
        .copied()
        .unwrap_or(true);
    let projected = pairs
        .into_iter()
        .filter(|(key, _)| {
            if key == crate::config::ID_FIELD {
                keep_id
            } else {
                projections.get(key.as_str()).copied().unwrap_or(false)
            }
        })
        .collect();
    JsonValue::Object(projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{open_loaded, open_loaded_with_cache};
    use crate::database::SortComparator;
    use crate::parsing::{parse_json, to_json_string};
    use std::sync::Arc;

    fn seed(db: &crate::database::Database, count: usize) {
        for i in 0..count {
            db.insert(
                parse_json(&format!(
                    r#"{{"_id":"{:02}","n":{},"color":"{}"}}"#,
                    i,
                    i,
                    if i % 2 == 0 { "red" } else { "blue" }
                ))
                .unwrap(),
            )
            .unwrap();
        }
    }

    fn by_n_descending() -> SortComparator {
        Arc::new(|a: &JsonValue, b: &JsonValue| {
            let an = a.get("n").and_then(JsonValue::as_f64).unwrap_or(0.0);
            let bn = b.get("n").and_then(JsonValue::as_f64).unwrap_or(0.0);
            bn.partial_cmp(&an).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    #[test]
    fn id_fast_path_hits_cache_and_disk() {
        let (db, _dir) = open_loaded_with_cache(250);
        seed(&db, 8);
        assert!(db.cached_count() < 8);

        for i in [0, 7] {
            let q = Query::parse(&format!(r#"{{"_id":"{:02}"}}"#, i)).unwrap();
            let found = db.find(&q, &Default::default()).unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].get("n").and_then(JsonValue::as_f64), Some(i as f64));
        }

        let q = Query::parse(r#"{"_id":"99"}"#).unwrap();
        assert!(db.find(&q, &Default::default()).unwrap().is_empty());
    }

    #[test]
    fn limit_without_sort_stops_early() {
        let (db, _dir) = open_loaded();
        seed(&db, 8);

        let options = FindOptions {
            limit: Some(2),
            ..Default::default()
        };
        let found = db
            .find(&Query::parse(r#"{"color":"red"}"#).unwrap(), &options)
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn limit_with_sort_keeps_the_smallest_under_the_comparator() {
        let (db, _dir) = open_loaded();
        seed(&db, 8);

        let options = FindOptions {
            limit: Some(3),
            sort: Some(by_n_descending()),
            ..Default::default()
        };
        let found = db.find(&Query::empty(), &options).unwrap();

        let ns: Vec<f64> = found
            .iter()
            .map(|r| r.get("n").and_then(JsonValue::as_f64).unwrap())
            .collect();
        assert_eq!(ns, vec![7.0, 6.0, 5.0]);
    }

    #[test]
    fn projection_is_include_only_with_id_special_cased() {
        let (db, _dir) = open_loaded();
        db.insert(parse_json(r#"{"_id":"a","x":1,"y":2}"#).unwrap())
            .unwrap();

        let mut projections = Projections::new();
        projections.insert("x".to_string(), true);
        let options = FindOptions {
            projections: Some(projections),
            ..Default::default()
        };
        let found = db.find(&Query::parse(r#"{"_id":"a"}"#).unwrap(), &options).unwrap();
        assert_eq!(to_json_string(&found[0]), r#"{"_id":"a","x":1}"#);

        let mut projections = Projections::new();
        projections.insert("x".to_string(), true);
        projections.insert("_id".to_string(), false);
        let options = FindOptions {
            projections: Some(projections),
            ..Default::default()
        };
        let found = db.find(&Query::parse(r#"{"_id":"a"}"#).unwrap(), &options).unwrap();
        assert_eq!(to_json_string(&found[0]), r#"{"x":1}"#);
    }

    #[test]
    fn sort_sees_full_records_even_when_projected_away() {
        let (db, _dir) = open_loaded();
        seed(&db, 4);

        let mut projections = Projections::new();
        projections.insert("color".to_string(), true);
        let options = FindOptions {
            limit: Some(2),
            sort: Some(by_n_descending()),
            projections: Some(projections),
            ..Default::default()
        };
        let found = db.find(&Query::empty(), &options).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), Some("03"));
        assert!(found[0].get("n").is_none());
    }
}
