//! Update directive evaluation.
//!
//! `apply_update` mutates a decoded copy of a record in place; the caller
//! re-inserts the copy afterwards, so a failure here leaves the stored
//! record untouched.
//!
//! Semantics notes (full rationale in DESIGN.md):
//!
//! - `$inc` on a missing field seeds it with the increment; on a
//!   non-numeric field it is an error.
//! - `$min`/`$max` replace only when the pair is ordered by [`order_cmp`];
//!   a missing field is seeded with the argument.
//! - `$push`/`$addToSet` create the array when the field is missing;
//!   `$pop`/`$pull` on a missing field are no-ops. All four error on a
//!   non-array field.
//! - `$slice: n` drops the first `n` elements after appending.

use std::cmp::Ordering;

use eyre::Result;

use crate::error::StoreError;
use crate::types::{deep_eq, order_cmp, JsonValue};

use super::matcher::{leaf_op_matches, matches};
use super::{PullArg, PushArg, Update, UpdateOp};

/// Applies every operation of `update` to `record`, in directive order.
pub fn apply_update(update: &Update, record: &mut JsonValue) -> Result<()> {
    for op in update.ops() {
        match op {
            UpdateOp::Set(pairs) => {
                for (field, value) in pairs {
                    record.set(field, value.clone());
                }
            }
            UpdateOp::Unset(fields) => {
                for field in fields {
                    record.remove(field);
                }
            }
            UpdateOp::Inc(pairs) => {
                for (field, amount) in pairs {
                    apply_inc(record, field, *amount)?;
                }
            }
            UpdateOp::Min(pairs) => {
                for (field, bound) in pairs {
                    apply_bound(record, field, bound, Ordering::Less);
                }
            }
            UpdateOp::Max(pairs) => {
                for (field, bound) in pairs {
                    apply_bound(record, field, bound, Ordering::Greater);
                }
            }
            UpdateOp::Push(pairs) => {
                for (field, arg) in pairs {
                    apply_push(record, field, arg)?;
                }
            }
            UpdateOp::AddToSet(pairs) => {
                for (field, candidates) in pairs {
                    apply_add_to_set(record, field, candidates)?;
                }
            }
            UpdateOp::Pop(pairs) => {
                for (field, direction) in pairs {
                    apply_pop(record, field, *direction)?;
                }
            }
            UpdateOp::Pull(pairs) => {
                for (field, arg) in pairs {
                    apply_pull(record, field, arg)?;
                }
            }
            UpdateOp::Replace(field, value) => {
                record.set(field, value.clone());
            }
        }
    }
    Ok(())
}

fn apply_inc(record: &mut JsonValue, field: &str, amount: f64) -> Result<()> {
    match record.get_mut(field) {
        Some(JsonValue::Number(n)) => {
            *n += amount;
            Ok(())
        }
        Some(_) => Err(StoreError::invalid_argument(format!(
            "$inc target '{}' is not a number",
            field
        ))
        .into()),
        None => {
            record.set(field, JsonValue::Number(amount));
            Ok(())
        }
    }
}

fn apply_bound(record: &mut JsonValue, field: &str, bound: &JsonValue, keep_if: Ordering) {
    match record.get(field) {
        Some(current) => {
            if order_cmp(bound, current) == Some(keep_if) {
                record.set(field, bound.clone());
            }
        }
        None => record.set(field, bound.clone()),
    }
}

fn array_field<'a>(
    record: &'a mut JsonValue,
    field: &str,
    create: bool,
) -> Result<Option<&'a mut Vec<JsonValue>>> {
    if record.get(field).is_none() {
        if !create {
            return Ok(None);
        }
        record.set(field, JsonValue::Array(Vec::new()));
    }
    match record.get_mut(field) {
        Some(JsonValue::Array(items)) => Ok(Some(items)),
        _ => Err(StoreError::invalid_argument(format!(
            "field '{}' is not an array",
            field
        ))
        .into()),
    }
}

fn apply_push(record: &mut JsonValue, field: &str, arg: &PushArg) -> Result<()> {
    let Some(items) = array_field(record, field, true)? else {
        return Ok(());
    };
    items.extend(arg.each.iter().cloned());
    if arg.sort {
        items.sort_by(|a, b| order_cmp(a, b).unwrap_or(Ordering::Equal));
    }
    if let Some(n) = arg.slice {
        items.drain(..n.min(items.len()));
    }
    Ok(())
}

fn apply_add_to_set(record: &mut JsonValue, field: &str, candidates: &[JsonValue]) -> Result<()> {
    let Some(items) = array_field(record, field, true)? else {
        return Ok(());
    };
    for candidate in candidates {
        if !items.iter().any(|i| deep_eq(i, candidate)) {
            items.push(candidate.clone());
        }
    }
    Ok(())
}

fn apply_pop(record: &mut JsonValue, field: &str, direction: i64) -> Result<()> {
    let Some(items) = array_field(record, field, false)? else {
        return Ok(());
    };
    if items.is_empty() {
        return Ok(());
    }
    match direction {
        n if n > 0 => {
            items.pop();
        }
        n if n < 0 => {
            items.remove(0);
        }
        _ => {}
    }
    Ok(())
}

fn apply_pull(record: &mut JsonValue, field: &str, arg: &PullArg) -> Result<()> {
    let Some(items) = array_field(record, field, false)? else {
        return Ok(());
    };
    items.retain(|element| !pull_matches(element, arg));
    Ok(())
}

fn pull_matches(element: &JsonValue, arg: &PullArg) -> bool {
    match arg {
        PullArg::Ops(ops) => ops.iter().all(|op| leaf_op_matches(Some(element), op)),
        PullArg::Query(query) => element.is_object() && matches(query, element),
        PullArg::Literal(value) => deep_eq(element, value),
    }
}
