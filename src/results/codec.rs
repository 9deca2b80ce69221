//! Round-trip primitives for the persisted results encoding
//!
//! The external text encoding is JSON. Two fidelity rules hold across a
//! write/read cycle: numeric values keep their int-vs-float typing, and
//! threshold-bearing keys are spelled with exactly two decimal places no
//! matter what precision the producer supplied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One tracked numeric observation.
///
/// Untagged so `3` and `3.0` stay distinct through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integral observation.
    Int(i64),
    /// Real-valued observation.
    Float(f64),
}

impl MetricValue {
    /// Numeric view; integers promote losslessly.
    #[must_use]
    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// A named, append-ordered per-iteration metric sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSeries(Vec<MetricValue>);

impl MetricSeries {
    /// The complete ordered history.
    #[must_use]
    pub fn all(&self) -> &[MetricValue] {
        &self.0
    }

    /// The most recent observation, if any was recorded.
    #[must_use]
    pub fn last(&self) -> Option<&MetricValue> {
        self.0.last()
    }

    /// Number of recorded iterations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Into<MetricValue>> FromIterator<V> for MetricSeries {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<MetricValue>> for MetricSeries {
    fn from(values: Vec<MetricValue>) -> Self {
        Self(values)
    }
}

/// Canonical two-decimal spelling of a similarity threshold.
#[must_use]
pub fn canonical_threshold(value: f64) -> String {
    format!("{value:.2}")
}

/// Re-spell a textual threshold key canonically (`"0.6"` -> `"0.60"`).
///
/// # Errors
///
/// [`Error::MalformedResults`] when the key is not numeric.
pub fn canonical_threshold_key(raw: &str) -> Result<String> {
    raw.trim()
        .parse::<f64>()
        .map(canonical_threshold)
        .map_err(|_| Error::MalformedResults(format!("non-numeric threshold key '{raw}'")))
}

/// View a value as a JSON object, naming the section on failure.
pub(crate) fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is not an object")))
}

/// Decode a numeric list into a series, naming the entry on failure.
pub(crate) fn as_series(value: &Value, context: &str) -> Result<MetricSeries> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is not a list")))?;
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n
                .as_i64()
                .map(MetricValue::Int)
                .or_else(|| n.as_f64().map(MetricValue::Float))
                .ok_or_else(|| {
                    Error::MalformedResults(format!("'{context}' holds an unrepresentable number"))
                }),
            _ => Err(Error::MalformedResults(format!(
                "'{context}' holds a non-numeric entry"
            ))),
        })
        .collect()
}

/// Decode a list of strings, naming the entry on failure.
pub(crate) fn as_string_list(value: &Value, context: &str) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is not a list")))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(ToString::to_string).ok_or_else(|| {
                Error::MalformedResults(format!("'{context}' holds a non-string entry"))
            })
        })
        .collect()
}

/// Encode a series back to a JSON list, preserving int/float typing.
pub(crate) fn series_to_value(series: &MetricSeries) -> Value {
    Value::Array(
        series
            .all()
            .iter()
            .map(|value| match value {
                MetricValue::Int(v) => Value::from(*v),
                MetricValue::Float(v) => Value::from(*v),
            })
            .collect(),
    )
}
