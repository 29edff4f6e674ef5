//! Filter evaluation for in-memory document matching.
//!
//! Filters are opaque BSON documents in the store's query syntax:
//! plain values match by equality, operator documents (`{"$gt": 5}`)
//! apply comparisons, and `{"$regex": "pattern"}` matches string
//! values. Numeric types are normalized before comparison so an
//! `Int32` filter matches an `Int64` field.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use docglue_core::error::{DriverError, DriverResult};

/// Comparable normalization of a BSON scalar.
///
/// Integers and doubles collapse to `f64` so cross-width comparisons
/// behave the way the store's do.
#[derive(Debug, PartialEq)]
enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
}

impl<'a> Comparable<'a> {
    fn from_bson(bson: &'a Bson) -> Option<Self> {
        match bson {
            Bson::Null => Some(Comparable::Null),
            Bson::Boolean(value) => Some(Comparable::Bool(*value)),
            Bson::Int32(value) => Some(Comparable::Number(*value as f64)),
            Bson::Int64(value) => Some(Comparable::Number(*value as f64)),
            Bson::Double(value) => Some(Comparable::Number(*value)),
            Bson::String(value) => Some(Comparable::String(value)),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// True when `document` satisfies every clause of `filter`. An empty
/// filter matches everything.
pub(crate) fn matches(document: &Document, filter: &Document) -> DriverResult<bool> {
    for (field, condition) in filter.iter() {
        if !field_matches(document.get(field), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_matches(actual: Option<&Bson>, condition: &Bson) -> DriverResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators.iter() {
                if !operator_matches(actual, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(values_equal(actual, expected)),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document.iter().any(|(key, _)| key.starts_with('$'))
}

fn operator_matches(actual: Option<&Bson>, operator: &str, operand: &Bson) -> DriverResult<bool> {
    match operator {
        "$gt" => Ok(ordering_of(actual, operand) == Some(Ordering::Greater)),
        "$gte" => Ok(matches!(
            ordering_of(actual, operand),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        "$lt" => Ok(ordering_of(actual, operand) == Some(Ordering::Less)),
        "$lte" => Ok(matches!(
            ordering_of(actual, operand),
            Some(Ordering::Less | Ordering::Equal)
        )),
        "$ne" => Ok(!values_equal(actual, operand)),
        "$regex" => regex_matches(actual, operand),
        other => Err(DriverError::OperationFailed(format!(
            "unsupported filter operator: {other}"
        ))),
    }
}

fn regex_matches(actual: Option<&Bson>, operand: &Bson) -> DriverResult<bool> {
    let pattern = match operand {
        Bson::String(pattern) => pattern.as_str(),
        other => {
            return Err(DriverError::OperationFailed(format!(
                "$regex expects a string pattern, got: {other}"
            )));
        }
    };
    let regex = Regex::new(pattern)
        .map_err(|err| DriverError::OperationFailed(format!("invalid $regex pattern: {err}")))?;
    Ok(match actual {
        Some(Bson::String(value)) => regex.is_match(value),
        _ => false,
    })
}

fn ordering_of(actual: Option<&Bson>, expected: &Bson) -> Option<Ordering> {
    let actual = Comparable::from_bson(actual?)?;
    let expected = Comparable::from_bson(expected)?;
    actual.compare(&expected)
}

/// Equality with numeric normalization; non-scalar values fall back to
/// structural BSON equality.
fn values_equal(actual: Option<&Bson>, expected: &Bson) -> bool {
    let Some(actual) = actual else {
        return matches!(expected, Bson::Null);
    };
    match (Comparable::from_bson(actual), Comparable::from_bson(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}
