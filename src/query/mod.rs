//! # Query and Update Trees
//!
//! Queries and update directives arrive as trees, not as a parsed text
//! language. The trees are closed enums so operator dispatch is a `match`
//! instead of a string lookup at evaluation time; the compilers in this
//! module translate the `$`-operator surface form (a [`JsonValue`] object)
//! into them once, up front.
//!
//! ## Queries
//!
//! ```text
//! {"$or": [{"color": "red"}, {"color": "yellow"}], "size": {"$gt": 4}}
//!          │                                        │
//!          ▼                                        ▼
//! QueryTerm::Or([...])                 QueryTerm::Field { cond: Ops([Gt(4)]) }
//! ```
//!
//! A query object's terms are implicitly AND-combined. Field values that
//! are plain literals (or operator-free objects) compile to deep-equality
//! conditions; `$regex` strings compile to [`regex::Regex`] patterns.
//! Unknown `$`-operators inside a field object are ignored; if none of an
//! object's keys is a recognized operator the whole object is matched by
//! deep equality.
//!
//! ## Update directives
//!
//! `$set`, `$unset`, `$inc`, `$min`, `$max`, `$push` (with
//! `$each`/`$sort`/`$slice`), `$addToSet`, `$pop`, and `$pull` compile to
//! [`UpdateOp`]s. Any unrecognized top-level key is a full-field
//! replacement.

mod matcher;
mod update;

pub use matcher::matches;
pub use update::apply_update;

use eyre::Result;
use regex::Regex;

use crate::error::StoreError;
use crate::parsing::parse_json;
use crate::types::JsonValue;

/// A compiled query: a conjunction of terms.
#[derive(Debug, Clone, Default)]
pub struct Query {
    terms: Vec<QueryTerm>,
}

#[derive(Debug, Clone)]
pub enum QueryTerm {
    Or(Vec<Query>),
    And(Vec<Query>),
    Not(Box<Query>),
    Field { field: String, cond: FieldCond },
}

#[derive(Debug, Clone)]
pub enum FieldCond {
    /// Deep equality against a literal (or operator-free object).
    Equals(JsonValue),
    /// The field, coerced to a string, must match the pattern.
    Matches(Regex),
    /// Conjunction of leaf operators.
    Ops(Vec<FieldOp>),
}

#[derive(Debug, Clone)]
pub enum FieldOp {
    Lt(JsonValue),
    Lte(JsonValue),
    Gt(JsonValue),
    Gte(JsonValue),
    In(Vec<JsonValue>),
    Nin(Vec<JsonValue>),
    Ne(JsonValue),
    /// Matches when `(field is missing) == expected`; see DESIGN.md for
    /// why the flag reads inverted.
    Exists(bool),
    Regex(Regex),
}

impl Query {
    /// The empty query; matches every record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// OR-combines several queries, as `remove` accepts an array of them.
    pub fn any_of(queries: Vec<Query>) -> Self {
        Self {
            terms: vec![QueryTerm::Or(queries)],
        }
    }

    /// A single-field regex query, for callers that hold a compiled
    /// pattern rather than a `$regex` string.
    pub fn field_regex(field: impl Into<String>, pattern: Regex) -> Self {
        Self {
            terms: vec![QueryTerm::Field {
                field: field.into(),
                cond: FieldCond::Matches(pattern),
            }],
        }
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Convenience: parse JSON text and compile it.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&parse_json(text)?)
    }

    /// Compiles a query written in the `$`-operator surface form.
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let JsonValue::Object(pairs) = value else {
            return Err(StoreError::invalid_argument("query must be an object").into());
        };
        let mut terms = Vec::with_capacity(pairs.len());
        for (key, val) in pairs {
            terms.push(compile_term(key, val)?);
        }
        Ok(Self { terms })
    }

    /// True when the query is the single fast-path shape
    /// `{_id: "<literal>"}` with no `$` in the id.
    pub fn as_id_lookup(&self) -> Option<&str> {
        match self.terms.as_slice() {
            [QueryTerm::Field { field, cond }] if field == crate::config::ID_FIELD => match cond {
                FieldCond::Equals(JsonValue::String(id)) if !id.contains('$') => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

fn compile_term(key: &str, value: &JsonValue) -> Result<QueryTerm> {
    match key {
        "$or" => Ok(QueryTerm::Or(compile_query_list(key, value)?)),
        "$and" => Ok(QueryTerm::And(compile_query_list(key, value)?)),
        "$not" => Ok(QueryTerm::Not(Box::new(Query::from_value(value)?))),
        field => Ok(QueryTerm::Field {
            field: field.to_string(),
            cond: compile_cond(value)?,
        }),
    }
}

fn compile_query_list(op: &str, value: &JsonValue) -> Result<Vec<Query>> {
    let JsonValue::Array(items) = value else {
        return Err(
            StoreError::invalid_argument(format!("{} expects an array of queries", op)).into(),
        );
    };
    items.iter().map(Query::from_value).collect()
}

fn compile_cond(value: &JsonValue) -> Result<FieldCond> {
    let JsonValue::Object(pairs) = value else {
        return Ok(FieldCond::Equals(value.clone()));
    };
    let ops = compile_leaf_ops(pairs)?;
    if ops.is_empty() {
        // No recognized operator anywhere: match the object itself.
        Ok(FieldCond::Equals(value.clone()))
    } else {
        Ok(FieldCond::Ops(ops))
    }
}

/// Compiles the recognized leaf operators out of an operator object,
/// ignoring unknown keys. Shared with `$pull`, which applies the same
/// operators to array elements.
pub(crate) fn compile_leaf_ops(pairs: &[(String, JsonValue)]) -> Result<Vec<FieldOp>> {
    let mut ops = Vec::new();
    for (key, arg) in pairs {
        match key.as_str() {
            "$lt" => ops.push(FieldOp::Lt(arg.clone())),
            "$lte" => ops.push(FieldOp::Lte(arg.clone())),
            "$gt" => ops.push(FieldOp::Gt(arg.clone())),
            "$gte" => ops.push(FieldOp::Gte(arg.clone())),
            "$ne" => ops.push(FieldOp::Ne(arg.clone())),
            "$in" => ops.push(FieldOp::In(expect_array("$in", arg)?)),
            "$nin" => ops.push(FieldOp::Nin(expect_array("$nin", arg)?)),
            "$exists" => match arg {
                JsonValue::Bool(b) => ops.push(FieldOp::Exists(*b)),
                _ => {
                    return Err(
                        StoreError::invalid_argument("$exists expects a boolean").into()
                    )
                }
            },
            "$regex" => match arg {
                JsonValue::String(pattern) => {
                    let compiled = Regex::new(pattern).map_err(|e| {
                        StoreError::invalid_argument(format!("bad $regex pattern: {}", e))
                    })?;
                    ops.push(FieldOp::Regex(compiled));
                }
                _ => {
                    return Err(StoreError::invalid_argument("$regex expects a string").into())
                }
            },
            _ => {}
        }
    }
    Ok(ops)
}

fn expect_array(op: &str, arg: &JsonValue) -> Result<Vec<JsonValue>> {
    match arg {
        JsonValue::Array(items) => Ok(items.clone()),
        _ => Err(StoreError::invalid_argument(format!("{} expects an array", op)).into()),
    }
}

/// A compiled update directive.
#[derive(Debug, Clone, Default)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set(Vec<(String, JsonValue)>),
    Unset(Vec<String>),
    Inc(Vec<(String, f64)>),
    Min(Vec<(String, JsonValue)>),
    Max(Vec<(String, JsonValue)>),
    Push(Vec<(String, PushArg)>),
    AddToSet(Vec<(String, Vec<JsonValue>)>),
    Pop(Vec<(String, i64)>),
    Pull(Vec<(String, PullArg)>),
    /// Unrecognized top-level key: replace the whole field.
    Replace(String, JsonValue),
}

/// Argument to `$push`: one or more values, with optional post-append
/// ascending sort and head-trim.
#[derive(Debug, Clone)]
pub struct PushArg {
    pub each: Vec<JsonValue>,
    pub sort: bool,
    /// Number of elements removed from the front after appending.
    pub slice: Option<usize>,
}

/// Argument to `$pull`: which array elements to drop.
#[derive(Debug, Clone)]
pub enum PullArg {
    /// Leaf operators applied directly to each element.
    Ops(Vec<FieldOp>),
    /// A sub-query matched against object elements.
    Query(Query),
    /// Deep equality against a literal.
    Literal(JsonValue),
}

impl Update {
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&parse_json(text)?)
    }

    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let JsonValue::Object(pairs) = value else {
            return Err(StoreError::invalid_argument("update must be an object").into());
        };
        let mut ops = Vec::with_capacity(pairs.len());
        for (key, arg) in pairs {
            ops.push(compile_update_op(key, arg)?);
        }
        Ok(Self { ops })
    }
}

fn compile_update_op(key: &str, arg: &JsonValue) -> Result<UpdateOp> {
    match key {
        "$set" => Ok(UpdateOp::Set(expect_object(key, arg)?.to_vec())),
        "$unset" => Ok(UpdateOp::Unset(
            expect_object(key, arg)?.iter().map(|(k, _)| k.clone()).collect(),
        )),
        "$inc" => {
            let mut incs = Vec::new();
            for (field, amount) in expect_object(key, arg)? {
                match amount.as_f64() {
                    Some(n) => incs.push((field.clone(), n)),
                    None => {
                        return Err(StoreError::invalid_argument(format!(
                            "$inc amount for '{}' must be a number",
                            field
                        ))
                        .into())
                    }
                }
            }
            Ok(UpdateOp::Inc(incs))
        }
        "$min" => Ok(UpdateOp::Min(expect_object(key, arg)?.to_vec())),
        "$max" => Ok(UpdateOp::Max(expect_object(key, arg)?.to_vec())),
        "$push" => {
            let mut pushes = Vec::new();
            for (field, entry) in expect_object(key, arg)? {
                pushes.push((field.clone(), compile_push_arg(entry)?));
            }
            Ok(UpdateOp::Push(pushes))
        }
        "$addToSet" => {
            let mut adds = Vec::new();
            for (field, entry) in expect_object(key, arg)? {
                let candidates = match entry.get("$each") {
                    Some(JsonValue::Array(items)) => items.clone(),
                    Some(_) => {
                        return Err(
                            StoreError::invalid_argument("$each expects an array").into()
                        )
                    }
                    None => vec![entry.clone()],
                };
                adds.push((field.clone(), candidates));
            }
            Ok(UpdateOp::AddToSet(adds))
        }
        "$pop" => {
            let mut pops = Vec::new();
            for (field, amount) in expect_object(key, arg)? {
                match amount.as_f64() {
                    Some(n) => pops.push((field.clone(), n as i64)),
                    None => {
                        return Err(StoreError::invalid_argument(format!(
                            "$pop direction for '{}' must be a number",
                            field
                        ))
                        .into())
                    }
                }
            }
            Ok(UpdateOp::Pop(pops))
        }
        "$pull" => {
            let mut pulls = Vec::new();
            for (field, entry) in expect_object(key, arg)? {
                pulls.push((field.clone(), compile_pull_arg(entry)?));
            }
            Ok(UpdateOp::Pull(pulls))
        }
        other => Ok(UpdateOp::Replace(other.to_string(), arg.clone())),
    }
}

fn compile_push_arg(value: &JsonValue) -> Result<PushArg> {
    let Some(each) = value.get("$each") else {
        return Ok(PushArg {
            each: vec![value.clone()],
            sort: false,
            slice: None,
        });
    };
    let JsonValue::Array(each) = each else {
        return Err(StoreError::invalid_argument("$each expects an array").into());
    };
    let sort = match value.get("$sort") {
        None => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => *n != 0.0,
        Some(_) => return Err(StoreError::invalid_argument("$sort expects a flag").into()),
    };
    let slice = match value.get("$slice") {
        None => None,
        Some(JsonValue::Number(n)) if *n >= 0.0 => Some(*n as usize),
        Some(_) => {
            return Err(
                StoreError::invalid_argument("$slice expects a non-negative number").into(),
            )
        }
    };
    Ok(PushArg {
        each: each.clone(),
        sort,
        slice,
    })
}

fn compile_pull_arg(value: &JsonValue) -> Result<PullArg> {
    let JsonValue::Object(pairs) = value else {
        return Ok(PullArg::Literal(value.clone()));
    };
    // A {$gt: 5}-style argument constrains scalar elements directly;
    // anything with plain field keys is a sub-query over object elements.
    if pairs.iter().all(|(k, _)| k.starts_with('$')) {
        let ops = compile_leaf_ops(pairs)?;
        if !ops.is_empty() {
            return Ok(PullArg::Ops(ops));
        }
    }
    Ok(PullArg::Query(Query::from_value(value)?))
}

fn expect_object<'a>(op: &str, arg: &'a JsonValue) -> Result<&'a [(String, JsonValue)]> {
    match arg {
        JsonValue::Object(pairs) => Ok(pairs),
        _ => Err(StoreError::invalid_argument(format!("{} expects an object", op)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_fast_path_detection() {
        assert_eq!(
            Query::parse(r#"{"_id":"abc"}"#).unwrap().as_id_lookup(),
            Some("abc")
        );
        assert!(Query::parse(r#"{"_id":"$weird"}"#)
            .unwrap()
            .as_id_lookup()
            .is_none());
        assert!(Query::parse(r#"{"_id":"a","x":1}"#)
            .unwrap()
            .as_id_lookup()
            .is_none());
        assert!(Query::parse(r#"{"_id":{"$gt":"a"}}"#)
            .unwrap()
            .as_id_lookup()
            .is_none());
    }

    #[test]
    fn operator_free_object_compiles_to_equality() {
        let q = Query::parse(r#"{"addr":{"city":"oslo"}}"#).unwrap();
        match &q.terms()[0] {
            QueryTerm::Field { cond: FieldCond::Equals(v), .. } => assert!(v.is_object()),
            other => panic!("unexpected term: {:?}", other),
        }
    }

    #[test]
    fn unknown_operators_are_ignored_when_known_ones_exist() {
        let q = Query::parse(r#"{"n":{"$gt":1,"$frobnicate":2}}"#).unwrap();
        match &q.terms()[0] {
            QueryTerm::Field { cond: FieldCond::Ops(ops), .. } => assert_eq!(ops.len(), 1),
            other => panic!("unexpected term: {:?}", other),
        }
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(Query::parse(r#"{"$or":{"a":1}}"#).is_err());
        assert!(Query::parse(r#"{"n":{"$in":5}}"#).is_err());
        assert!(Query::parse(r#"{"n":{"$regex":7}}"#).is_err());
        assert!(Update::parse(r#"{"$inc":{"n":"one"}}"#).is_err());
        assert!(Update::parse(r#"{"$push":{"a":{"$each":1}}}"#).is_err());
    }

    #[test]
    fn unknown_update_key_is_a_replacement() {
        let u = Update::parse(r#"{"name":"new"}"#).unwrap();
        assert!(matches!(&u.ops()[0], UpdateOp::Replace(k, _) if k == "name"));
    }

    #[test]
    fn pull_argument_classification() {
        let u = Update::parse(r#"{"$pull":{"xs":{"$gte":10}}}"#).unwrap();
        let UpdateOp::Pull(pulls) = &u.ops()[0] else {
            panic!()
        };
        assert!(matches!(pulls[0].1, PullArg::Ops(_)));

        let u = Update::parse(r#"{"$pull":{"xs":{"kind":"stale"}}}"#).unwrap();
        let UpdateOp::Pull(pulls) = &u.ops()[0] else {
            panic!()
        };
        assert!(matches!(pulls[0].1, PullArg::Query(_)));

        let u = Update::parse(r#"{"$pull":{"xs":3}}"#).unwrap();
        let UpdateOp::Pull(pulls) = &u.ops()[0] else {
            panic!()
        };
        assert!(matches!(pulls[0].1, PullArg::Literal(_)));
    }
}
