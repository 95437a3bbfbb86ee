//! Algorithm output reconciliation
//!
//! Turns an [`AlgorithmOutput`] into values ordered like the configured variable
//! fields:
//! - set: rejected, element order is undefined
//! - mapping: values looked up by field name; names missing from the mapping are
//!   dropped here (not defaulted), which then shows up as a count mismatch
//! - sequence: taken positionally
//! - scalar: one-element sequence
//!
//! The element count must equal the number of variable fields.

use serde_json::Value;
use thiserror::Error;

use crate::algorithm::AlgorithmOutput;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("A 'set' type of data was returned and isn't supported. Please use a list or a tuple instead")]
    UnsupportedSet,

    #[error("Incorrect number of values returned. Expected {expected} and received {received}")]
    CountMismatch { expected: usize, received: usize },
}

/// Reconcile `output` against `variable_names`
pub fn reconcile(
    output: &AlgorithmOutput,
    variable_names: &[String],
) -> Result<Vec<Value>, ReconcileError> {
    let values = match output {
        AlgorithmOutput::Set(_) => return Err(ReconcileError::UnsupportedSet),
        AlgorithmOutput::Mapping(map) => variable_names
            .iter()
            .filter_map(|name| map.get(name).cloned())
            .collect(),
        AlgorithmOutput::Sequence(values) => values.clone(),
        AlgorithmOutput::Scalar(value) => vec![value.clone()],
    };

    if values.len() != variable_names.len() {
        return Err(ReconcileError::CountMismatch {
            expected: variable_names.len(),
            received: values.len(),
        });
    }

    Ok(values)
}

/// Text stored in the CSV for a reconciled value
///
/// Strings are written without JSON quotes; everything else uses its JSON form.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
