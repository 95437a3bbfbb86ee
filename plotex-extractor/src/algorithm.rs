//! Trait algorithm contract
//!
//! An algorithm receives the decoded pixels of one plot image and returns a
//! value in one of four shapes. The shape is fixed when the output is built
//! (`From` conversions below), so the reconciler only has to match on it.

use image::DynamicImage;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

/// Shape-tagged algorithm output
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmOutput {
    /// A single value
    Scalar(Value),
    /// Values in variable-field order
    Sequence(Vec<Value>),
    /// Values keyed by variable-field name
    Mapping(Map<String, Value>),
    /// Unordered values; never accepted by the reconciler
    Set(Vec<Value>),
}

impl AlgorithmOutput {
    /// Short name of the shape, for log messages
    pub fn shape_name(&self) -> &'static str {
        match self {
            AlgorithmOutput::Scalar(_) => "scalar",
            AlgorithmOutput::Sequence(_) => "sequence",
            AlgorithmOutput::Mapping(_) => "mapping",
            AlgorithmOutput::Set(_) => "set",
        }
    }

    /// Build a set-shaped output from any hashable collection
    pub fn set<T, I>(values: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        AlgorithmOutput::Set(values.into_iter().map(Into::into).collect())
    }
}

/// Classification of a raw JSON value: arrays are sequences, objects are
/// mappings, everything else is a scalar.
impl From<Value> for AlgorithmOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => AlgorithmOutput::Sequence(items),
            Value::Object(map) => AlgorithmOutput::Mapping(map),
            other => AlgorithmOutput::Scalar(other),
        }
    }
}

impl From<f64> for AlgorithmOutput {
    fn from(value: f64) -> Self {
        AlgorithmOutput::Scalar(Value::from(value))
    }
}

impl From<i64> for AlgorithmOutput {
    fn from(value: i64) -> Self {
        AlgorithmOutput::Scalar(Value::from(value))
    }
}

impl From<&str> for AlgorithmOutput {
    fn from(value: &str) -> Self {
        AlgorithmOutput::Scalar(Value::from(value))
    }
}

impl From<String> for AlgorithmOutput {
    fn from(value: String) -> Self {
        AlgorithmOutput::Scalar(Value::from(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for AlgorithmOutput {
    fn from(values: Vec<T>) -> Self {
        AlgorithmOutput::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Eq + Hash> From<HashSet<T>> for AlgorithmOutput {
    fn from(values: HashSet<T>) -> Self {
        AlgorithmOutput::set(values)
    }
}

impl<T: Into<Value> + Ord> From<BTreeSet<T>> for AlgorithmOutput {
    fn from(values: BTreeSet<T>) -> Self {
        AlgorithmOutput::set(values)
    }
}

/// Serialized as the plain JSON value (used for `calculated_value` in the sidecar)
impl Serialize for AlgorithmOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AlgorithmOutput::Scalar(value) => value.serialize(serializer),
            AlgorithmOutput::Sequence(values) | AlgorithmOutput::Set(values) => {
                values.serialize(serializer)
            }
            AlgorithmOutput::Mapping(map) => map.serialize(serializer),
        }
    }
}

/// Pluggable pixel -> trait computation
pub trait TraitAlgorithm {
    /// Compute trait value(s) from the plot's pixels
    fn calculate(&self, pixels: &DynamicImage) -> anyhow::Result<AlgorithmOutput>;
}

impl<F> TraitAlgorithm for F
where
    F: Fn(&DynamicImage) -> anyhow::Result<AlgorithmOutput>,
{
    fn calculate(&self, pixels: &DynamicImage) -> anyhow::Result<AlgorithmOutput> {
        self(pixels)
    }
}

/// Placeholder used by the binary until an algorithm is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct NotImplemented;

impl TraitAlgorithm for NotImplemented {
    fn calculate(&self, _pixels: &DynamicImage) -> anyhow::Result<AlgorithmOutput> {
        anyhow::bail!("Not implemented yet")
    }
}
