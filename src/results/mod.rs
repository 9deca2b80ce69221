//! The experimental-results record of one training run
//!
//! Five sections: `scalars` (static run metadata), `tracked`
//! (per-iteration series), `final` (terminal-iteration snapshots),
//! `regularizers` (descriptive strings per activated regularizer), and
//! the `reg_defs`/`score_defs` definition maps. A record is immutable
//! after construction, built either from a live run's raw metric dump or
//! by decoding a persisted JSON document, and persisted only by explicit
//! save. Encoding then decoding reproduces every field exactly,
//! including int-vs-float typing and canonical two-decimal threshold
//! keys.

mod codec;
mod final_state;
mod tracked;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use codec::{canonical_threshold, canonical_threshold_key, MetricSeries, MetricValue};
pub use final_state::{FinalMetrics, TokenGroup};
pub use tracked::{
    normalize_name, KernelQuality, TrackedItem, TrackedKernel, TrackedMetrics, TrackedTopTokens,
};

/// Static metadata of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunScalars {
    dir: String,
    label: String,
    dataset_iterations: i64,
    nb_topics: i64,
    document_passes: i64,
    background_topics: Vec<String>,
    domain_topics: Vec<String>,
    modalities: BTreeMap<String, MetricValue>,
}

impl RunScalars {
    /// Create the scalar section from the run's core counts.
    #[must_use]
    pub fn new(
        dir: impl Into<String>,
        label: impl Into<String>,
        dataset_iterations: i64,
        nb_topics: i64,
        document_passes: i64,
    ) -> Self {
        Self {
            dir: dir.into(),
            label: label.into(),
            dataset_iterations,
            nb_topics,
            document_passes,
            background_topics: Vec::new(),
            domain_topics: Vec::new(),
            modalities: BTreeMap::new(),
        }
    }

    /// Attach the background and domain topic-name lists.
    #[must_use]
    pub fn with_topics<I, J, S, T>(mut self, background: I, domain: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.background_topics = background.into_iter().map(Into::into).collect();
        self.domain_topics = domain.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the per-modality weights.
    #[must_use]
    pub fn with_modalities(mut self, modalities: BTreeMap<String, MetricValue>) -> Self {
        self.modalities = modalities;
        self
    }

    /// Collection directory the run trained on.
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// The model's artifact label.
    #[must_use]
    pub fn model_label(&self) -> &str {
        &self.label
    }

    /// Number of passes over the whole collection.
    #[must_use]
    pub const fn dataset_iterations(&self) -> i64 {
        self.dataset_iterations
    }

    /// Number of topics in the model.
    #[must_use]
    pub const fn nb_topics(&self) -> i64 {
        self.nb_topics
    }

    /// Number of passes over each document.
    #[must_use]
    pub const fn document_passes(&self) -> i64 {
        self.document_passes
    }

    /// Background topic names.
    #[must_use]
    pub fn background_topics(&self) -> &[String] {
        &self.background_topics
    }

    /// Domain topic names.
    #[must_use]
    pub fn domain_topics(&self) -> &[String] {
        &self.domain_topics
    }

    /// Per-modality weights, int/float typing preserved.
    #[must_use]
    pub const fn modalities(&self) -> &BTreeMap<String, MetricValue> {
        &self.modalities
    }
}

/// The complete, immutable results record of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentalResults {
    scalars: RunScalars,
    tracked: TrackedMetrics,
    finals: FinalMetrics,
    regularizers: Vec<String>,
    reg_defs: BTreeMap<String, String>,
    score_defs: BTreeMap<String, String>,
}

impl ExperimentalResults {
    /// Build a record from a raw nested dump with the five top-level
    /// sections.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedResults`] when a section is missing or violates
    /// the ingestion schema.
    pub fn from_dict(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::MalformedResults("record is not an object".to_string()))?;
        let scalars: RunScalars = serde_json::from_value(section(map, "scalars")?.clone())
            .map_err(|e| Error::MalformedResults(format!("scalars: {e}")))?;
        let tracked = TrackedMetrics::from_value(section(map, "tracked")?)?;
        let finals = FinalMetrics::from_value(section(map, "final")?)?;
        let regularizers = codec::as_string_list(section(map, "regularizers")?, "regularizers")?;
        let reg_defs = definition_map(section(map, "reg_defs")?, "reg_defs")?;
        let score_defs = definition_map(section(map, "score_defs")?, "score_defs")?;
        Ok(Self {
            scalars,
            tracked,
            finals,
            regularizers,
            reg_defs,
            score_defs,
        })
    }

    /// Build a record from a live run's tracked-metric state.
    ///
    /// `tracked` and `finals` take the same raw shapes a persisted
    /// record carries; the remaining sections arrive already typed.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedResults`] when either raw section violates the
    /// ingestion schema.
    pub fn from_run(
        scalars: RunScalars,
        tracked: &Value,
        finals: &Value,
        regularizers: Vec<String>,
        reg_defs: BTreeMap<String, String>,
        score_defs: BTreeMap<String, String>,
    ) -> Result<Self> {
        Ok(Self {
            scalars,
            tracked: TrackedMetrics::from_value(tracked)?,
            finals: FinalMetrics::from_value(finals)?,
            regularizers,
            reg_defs,
            score_defs,
        })
    }

    /// Decode a record from its JSON text encoding.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] on unparseable text, [`Error::MalformedResults`]
    /// on schema violations.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_dict(&value)
    }

    /// Load a persisted record.
    ///
    /// # Errors
    ///
    /// IO errors, plus everything [`from_json_str`](Self::from_json_str)
    /// reports.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The record's external form with canonical keys.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "scalars".into(),
            serde_json::to_value(&self.scalars).unwrap_or(Value::Null),
        );
        map.insert("tracked".into(), self.tracked.to_value());
        map.insert("final".into(), self.finals.to_value());
        map.insert(
            "regularizers".into(),
            Value::Array(
                self.regularizers
                    .iter()
                    .map(|r| Value::String(r.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "reg_defs".into(),
            Value::Object(
                self.reg_defs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );
        map.insert(
            "score_defs".into(),
            Value::Object(
                self.score_defs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );
        Value::Object(map)
    }

    /// Encode the record to JSON text.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] when encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Persist the record, creating parent directories as needed.
    ///
    /// Saving is always explicit; a record is never flushed on its own.
    ///
    /// # Errors
    ///
    /// IO errors and encoding failures.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The scalar section.
    #[must_use]
    pub const fn scalars(&self) -> &RunScalars {
        &self.scalars
    }

    /// The per-iteration tracked metrics.
    #[must_use]
    pub const fn tracked(&self) -> &TrackedMetrics {
        &self.tracked
    }

    /// The terminal-iteration snapshots.
    #[must_use]
    pub const fn final_metrics(&self) -> &FinalMetrics {
        &self.finals
    }

    /// Descriptive strings of the activated regularizers.
    #[must_use]
    pub fn regularizers(&self) -> &[String] {
        &self.regularizers
    }

    /// Regularizer type to short internal name.
    #[must_use]
    pub const fn reg_defs(&self) -> &BTreeMap<String, String> {
        &self.reg_defs
    }

    /// Score definition to short internal name.
    #[must_use]
    pub const fn score_defs(&self) -> &BTreeMap<String, String> {
        &self.score_defs
    }
}

impl Serialize for ExperimentalResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExperimentalResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_dict(&value).map_err(D::Error::custom)
    }
}

fn section<'a>(map: &'a Map<String, Value>, name: &str) -> Result<&'a Value> {
    map.get(name)
        .ok_or_else(|| Error::MalformedResults(format!("missing section '{name}'")))
}

fn definition_map(value: &Value, context: &str) -> Result<BTreeMap<String, String>> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is not an object")))?;
    map.iter()
        .map(|(key, entry)| {
            entry
                .as_str()
                .map(|name| (key.clone(), name.to_string()))
                .ok_or_else(|| {
                    Error::MalformedResults(format!("'{context}.{key}' is not a string"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_record() -> Value {
        json!({
            "scalars": {
                "dir": "a-dataset-dir",
                "label": "a-model-label",
                "dataset_iterations": 3,
                "nb_topics": 5,
                "document_passes": 2,
                "background_topics": ["t0", "t1"],
                "domain_topics": ["t2", "t3", "t4"],
                "modalities": {"dcn": 1, "icn": 5}
            },
            "tracked": {"perplexity": [1, 2, 3]},
            "final": {"background-tokens": ["l1"]},
            "regularizers": ["reg1_params_pformat"],
            "reg_defs": {"type-a": "reg1"},
            "score_defs": {"perplexity": "prl"}
        })
    }

    #[test]
    fn test_from_dict_requires_every_section() {
        let mut record = minimal_record();
        record.as_object_mut().unwrap().remove("reg_defs");
        let err = ExperimentalResults::from_dict(&record).unwrap_err();
        assert!(matches!(err, Error::MalformedResults(msg) if msg.contains("reg_defs")));
    }

    #[test]
    fn test_scalars_accessors() {
        let results = ExperimentalResults::from_dict(&minimal_record()).unwrap();
        assert_eq!(results.scalars().dir(), "a-dataset-dir");
        assert_eq!(results.scalars().model_label(), "a-model-label");
        assert_eq!(results.scalars().nb_topics(), 5);
        assert_eq!(results.scalars().document_passes(), 2);
        assert_eq!(
            results.scalars().modalities().get("dcn"),
            Some(&MetricValue::Int(1))
        );
    }

    #[test]
    fn test_serde_round_trip_equality() {
        let results = ExperimentalResults::from_dict(&minimal_record()).unwrap();
        let text = results.to_json().unwrap();
        let decoded = ExperimentalResults::from_json_str(&text).unwrap();
        assert_eq!(results, decoded);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("a-model-label.json");
        let results = ExperimentalResults::from_dict(&minimal_record()).unwrap();
        results.save_json(&path).unwrap();
        let loaded = ExperimentalResults::from_json_file(&path).unwrap();
        assert_eq!(results, loaded);
    }

    #[test]
    fn test_integer_scalars_stay_integral() {
        let results = ExperimentalResults::from_dict(&minimal_record()).unwrap();
        let encoded = results.to_value();
        assert!(encoded["scalars"]["dataset_iterations"].is_i64());
        assert!(encoded["scalars"]["modalities"]["icn"].is_i64());
    }
}
