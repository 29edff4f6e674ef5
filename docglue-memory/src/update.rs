//! Update-spec application for the in-memory driver.
//!
//! Supports the operators the driver contract requires: `$set`,
//! `$inc` (absent fields treated as zero) and `$addToSet` (set-union,
//! duplicates suppressed, element order not guaranteed).

use bson::{Bson, Document};

use docglue_core::error::{DriverError, DriverResult};

/// Applies every operator clause of `update` to `document` in place.
pub(crate) fn apply(document: &mut Document, update: &Document) -> DriverResult<()> {
    for (operator, spec) in update.iter() {
        let spec = spec.as_document().ok_or_else(|| {
            DriverError::OperationFailed(format!("update operator {operator} expects a document"))
        })?;
        match operator.as_str() {
            "$set" => {
                for (field, value) in spec.iter() {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$inc" => {
                for (field, delta) in spec.iter() {
                    let next = incremented(document.get(field), delta)?;
                    document.insert(field.clone(), next);
                }
            }
            "$addToSet" => {
                for (field, value) in spec.iter() {
                    add_to_set(document, field, value)?;
                }
            }
            other => {
                return Err(DriverError::OperationFailed(format!(
                    "unsupported update operator: {other}"
                )));
            }
        }
    }
    Ok(())
}

fn add_to_set(document: &mut Document, field: &str, value: &Bson) -> DriverResult<()> {
    if !document.contains_key(field) {
        document.insert(field.to_string(), Bson::Array(vec![value.clone()]));
        return Ok(());
    }
    match document.get_mut(field) {
        Some(Bson::Array(members)) => {
            if !members.iter().any(|member| member == value) {
                members.push(value.clone());
            }
            Ok(())
        }
        _ => Err(DriverError::OperationFailed(format!(
            "cannot apply $addToSet to non-array field: {field}"
        ))),
    }
}

/// Numeric increment; an absent current value counts as zero. Integer
/// arithmetic is kept integral, anything involving a double widens.
fn incremented(current: Option<&Bson>, delta: &Bson) -> DriverResult<Bson> {
    let delta_num = as_number(delta).ok_or_else(|| {
        DriverError::OperationFailed(format!("$inc expects a numeric amount, got: {delta}"))
    })?;
    let current_num = match current {
        None => Number::Int(0),
        Some(value) => as_number(value).ok_or_else(|| {
            DriverError::OperationFailed(format!("cannot apply $inc to non-numeric value: {value}"))
        })?,
    };
    Ok(match (current_num, delta_num) {
        (Number::Int(a), Number::Int(b)) => Bson::Int64(a + b),
        (a, b) => Bson::Double(a.as_f64() + b.as_f64()),
    })
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }
}

fn as_number(value: &Bson) -> Option<Number> {
    match value {
        Bson::Int32(v) => Some(Number::Int(*v as i64)),
        Bson::Int64(v) => Some(Number::Int(*v)),
        Bson::Double(v) => Some(Number::Float(*v)),
        _ => None,
    }
}
