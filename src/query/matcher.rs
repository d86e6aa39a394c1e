//! Query evaluation against a decoded record.
//!
//! Everything here is pure: one record in, one boolean out. Ordering
//! operators use [`order_cmp`], which only orders compatible variants, so
//! a `$lt` between a number and a string is simply false rather than an
//! error.

use std::cmp::Ordering;

use crate::types::{deep_eq, order_cmp, JsonValue};

use super::{FieldCond, FieldOp, Query, QueryTerm};

/// True when `record` satisfies every term of `query`.
pub fn matches(query: &Query, record: &JsonValue) -> bool {
    query.terms().iter().all(|term| match term {
        QueryTerm::Or(queries) => queries.iter().any(|q| matches(q, record)),
        QueryTerm::And(queries) => queries.iter().all(|q| matches(q, record)),
        QueryTerm::Not(query) => !matches(query, record),
        QueryTerm::Field { field, cond } => field_matches(record.get(field), cond),
    })
}

fn field_matches(value: Option<&JsonValue>, cond: &FieldCond) -> bool {
    match cond {
        FieldCond::Equals(expected) => value.is_some_and(|v| deep_eq(v, expected)),
        FieldCond::Matches(pattern) => {
            value.is_some_and(|v| pattern.is_match(&v.coerce_to_string()))
        }
        FieldCond::Ops(ops) => ops.iter().all(|op| leaf_op_matches(value, op)),
    }
}

/// Evaluates one leaf operator. Shared with `$pull`, which runs operators
/// against array elements.
pub(crate) fn leaf_op_matches(value: Option<&JsonValue>, op: &FieldOp) -> bool {
    match op {
        FieldOp::Lt(arg) => ordered(value, arg, Ordering::is_lt),
        FieldOp::Lte(arg) => ordered(value, arg, Ordering::is_le),
        FieldOp::Gt(arg) => ordered(value, arg, Ordering::is_gt),
        FieldOp::Gte(arg) => ordered(value, arg, Ordering::is_ge),
        FieldOp::In(items) => value.is_some_and(|v| items.iter().any(|i| deep_eq(i, v))),
        FieldOp::Nin(items) => !value.is_some_and(|v| items.iter().any(|i| deep_eq(i, v))),
        FieldOp::Ne(arg) => !value.is_some_and(|v| deep_eq(v, arg)),
        // Deliberately `missing == expected`: `$exists: true` selects
        // records where the field is absent. See DESIGN.md.
        FieldOp::Exists(expected) => value.is_none() == *expected,
        FieldOp::Regex(pattern) => {
            value.is_some_and(|v| pattern.is_match(&v.coerce_to_string()))
        }
    }
}

fn ordered(value: Option<&JsonValue>, arg: &JsonValue, pred: fn(Ordering) -> bool) -> bool {
    value
        .and_then(|v| order_cmp(v, arg))
        .is_some_and(pred)
}
