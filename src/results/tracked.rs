//! Per-iteration tracked metrics and their alias-resolving lookup
//!
//! Tracked metrics arrive as a dynamically-keyed nested map: plain
//! series, modality-suffixed sparsity series, threshold-suffixed ratio
//! series, kernel groups keyed by similarity threshold, top-token groups
//! keyed by group size, tau trajectories, and regularizer dynamics. The
//! ingestion validates each shape, canonicalizes threshold spellings, and
//! builds one alias table so every documented spelling of a name resolves
//! to the same underlying object.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::results::codec::{
    as_object, as_series, canonical_threshold_key, series_to_value, MetricSeries,
};

const KERNEL_SECTION: &str = "topic-kernel";
const TOP_TOKENS_SECTION: &str = "top-tokens";
const TAU_SECTION: &str = "tau-trajectories";
const REG_DYNAMICS_SECTION: &str = "regularization-dynamic-parameters";

/// Normalize a metric name for alias lookup.
///
/// Hyphens and underscores are interchangeable and modality markers are
/// dropped, so `sparsity-phi-@dc` and `sparsity_phi_dc` meet in one
/// spelling.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_").replace('@', "")
}

/// Compact digit forms of a canonical threshold: `"0.60"` yields `60`
/// and the trailing-zero-stripped `6`.
fn threshold_digit_aliases(canonical: &str) -> Vec<String> {
    let Some(fraction) = canonical.split('.').nth(1) else {
        return vec![canonical.to_string()];
    };
    let mut forms = vec![fraction.to_string()];
    let stripped = fraction.trim_end_matches('0');
    if !stripped.is_empty() && stripped != fraction {
        forms.push(stripped.to_string());
    }
    forms
}

/// Coherence, contrast, and purity series of one kernel view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KernelQuality {
    coherence: MetricSeries,
    contrast: MetricSeries,
    purity: MetricSeries,
}

impl KernelQuality {
    /// Bundle the three quality series.
    #[must_use]
    pub const fn new(
        coherence: MetricSeries,
        contrast: MetricSeries,
        purity: MetricSeries,
    ) -> Self {
        Self {
            coherence,
            contrast,
            purity,
        }
    }

    /// Kernel coherence history.
    #[must_use]
    pub const fn coherence(&self) -> &MetricSeries {
        &self.coherence
    }

    /// Kernel contrast history.
    #[must_use]
    pub const fn contrast(&self) -> &MetricSeries {
        &self.contrast
    }

    /// Kernel purity history.
    #[must_use]
    pub const fn purity(&self) -> &MetricSeries {
        &self.purity
    }

    fn from_value(value: &Value, context: &str) -> Result<Self> {
        let map = as_object(value, context)?;
        Ok(Self {
            coherence: member_series(map, "coherence", context)?,
            contrast: member_series(map, "contrast", context)?,
            purity: member_series(map, "purity", context)?,
        })
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("coherence".into(), series_to_value(&self.coherence));
        map.insert("contrast".into(), series_to_value(&self.contrast));
        map.insert("purity".into(), series_to_value(&self.purity));
        Value::Object(map)
    }
}

fn member_series(map: &Map<String, Value>, key: &str, context: &str) -> Result<MetricSeries> {
    let value = map
        .get(key)
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is missing '{key}'")))?;
    as_series(value, &format!("{context}.{key}"))
}

/// The metrics group of one similarity threshold.
///
/// `average` is the model-wide aggregate, distinct from the named
/// per-topic entries.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedKernel {
    average: KernelQuality,
    size: MetricSeries,
    topics: BTreeMap<String, KernelQuality>,
}

impl TrackedKernel {
    /// Assemble a kernel group from its aggregate series and per-topic
    /// entries.
    #[must_use]
    pub const fn new(
        average: KernelQuality,
        size: MetricSeries,
        topics: BTreeMap<String, KernelQuality>,
    ) -> Self {
        Self {
            average,
            size,
            topics,
        }
    }

    /// The model-wide aggregate quality series.
    #[must_use]
    pub const fn average(&self) -> &KernelQuality {
        &self.average
    }

    /// Kernel size history.
    #[must_use]
    pub const fn size(&self) -> &MetricSeries {
        &self.size
    }

    /// The quality series of one topic.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the topic was never tracked.
    pub fn topic(&self, name: &str) -> Result<&KernelQuality> {
        self.topics
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    /// Tracked topic names, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.keys().map(String::as_str).collect()
    }

    fn from_value(value: &Value, context: &str) -> Result<Self> {
        let map = as_object(value, context)?;
        let average = KernelQuality::new(
            member_series(map, "avg_coh", context)?,
            member_series(map, "avg_con", context)?,
            member_series(map, "avg_pur", context)?,
        );
        let size = member_series(map, "size", context)?;
        let topics_value = map
            .get("topics")
            .ok_or_else(|| Error::MalformedResults(format!("'{context}' is missing 'topics'")))?;
        let mut topics = BTreeMap::new();
        for (topic, entry) in as_object(topics_value, &format!("{context}.topics"))? {
            topics.insert(
                topic.clone(),
                KernelQuality::from_value(entry, &format!("{context}.topics.{topic}"))?,
            );
        }
        Ok(Self::new(average, size, topics))
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("avg_coh".into(), series_to_value(self.average.coherence()));
        map.insert("avg_con".into(), series_to_value(self.average.contrast()));
        map.insert("avg_pur".into(), series_to_value(self.average.purity()));
        map.insert("size".into(), series_to_value(&self.size));
        let topics: Map<String, Value> = self
            .topics
            .iter()
            .map(|(topic, quality)| (topic.clone(), quality.to_value()))
            .collect();
        map.insert("topics".into(), Value::Object(topics));
        Value::Object(map)
    }
}

/// The tracked series of one top-token group size.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTopTokens {
    average_coherence: MetricSeries,
    topics: BTreeMap<String, MetricSeries>,
}

impl TrackedTopTokens {
    /// Assemble a top-token group.
    #[must_use]
    pub const fn new(
        average_coherence: MetricSeries,
        topics: BTreeMap<String, MetricSeries>,
    ) -> Self {
        Self {
            average_coherence,
            topics,
        }
    }

    /// The model-wide average-coherence history.
    #[must_use]
    pub const fn average_coherence(&self) -> &MetricSeries {
        &self.average_coherence
    }

    /// One topic's coherence history.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the topic was never tracked.
    pub fn topic(&self, name: &str) -> Result<&MetricSeries> {
        self.topics
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    /// Tracked topic names, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.keys().map(String::as_str).collect()
    }

    fn from_value(value: &Value, context: &str) -> Result<Self> {
        let map = as_object(value, context)?;
        let average_coherence = member_series(map, "avg_coh", context)?;
        let topics_value = map
            .get("topics")
            .ok_or_else(|| Error::MalformedResults(format!("'{context}' is missing 'topics'")))?;
        let mut topics = BTreeMap::new();
        for (topic, entry) in as_object(topics_value, &format!("{context}.topics"))? {
            topics.insert(
                topic.clone(),
                as_series(entry, &format!("{context}.topics.{topic}"))?,
            );
        }
        Ok(Self::new(average_coherence, topics))
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "avg_coh".into(),
            series_to_value(&self.average_coherence),
        );
        let topics: Map<String, Value> = self
            .topics
            .iter()
            .map(|(topic, series)| (topic.clone(), series_to_value(series)))
            .collect();
        map.insert("topics".into(), Value::Object(topics));
        Value::Object(map)
    }
}

/// What an alias resolves to inside the tracked section.
#[derive(Debug, Clone)]
enum TrackedHandle {
    Series(String),
    Kernel(String),
    TopTokens(String),
}

/// A resolved tracked-metric lookup.
#[derive(Debug, Clone, Copy)]
pub enum TrackedItem<'a> {
    /// A plain or threshold/modality-suffixed series.
    Series(&'a MetricSeries),
    /// A kernel group.
    Kernel(&'a TrackedKernel),
    /// A top-token group.
    TopTokens(&'a TrackedTopTokens),
}

/// All per-iteration metrics of one training run.
#[derive(Debug, Clone, Default)]
pub struct TrackedMetrics {
    series: BTreeMap<String, MetricSeries>,
    kernels: BTreeMap<String, TrackedKernel>,
    top_tokens: BTreeMap<String, TrackedTopTokens>,
    tau_trajectories: BTreeMap<String, MetricSeries>,
    reg_dynamics: BTreeMap<String, BTreeMap<String, MetricSeries>>,
    aliases: HashMap<String, TrackedHandle>,
}

impl TrackedMetrics {
    /// Decode and validate the `tracked` section of a results record.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedResults`] on any entry that is neither a numeric
    /// series, a kernel group, a top-token group, nor one of the fixed
    /// nested sections.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = as_object(value, "tracked")?;
        let mut tracked = Self::default();
        for (key, entry) in map {
            match key.as_str() {
                KERNEL_SECTION => {
                    for (threshold, kernel) in as_object(entry, KERNEL_SECTION)? {
                        let canonical = canonical_threshold_key(threshold)?;
                        let context = format!("{KERNEL_SECTION}.{canonical}");
                        tracked
                            .kernels
                            .insert(canonical, TrackedKernel::from_value(kernel, &context)?);
                    }
                }
                TOP_TOKENS_SECTION => {
                    for (size, group) in as_object(entry, TOP_TOKENS_SECTION)? {
                        let context = format!("{TOP_TOKENS_SECTION}.{size}");
                        tracked.top_tokens.insert(
                            size.clone(),
                            TrackedTopTokens::from_value(group, &context)?,
                        );
                    }
                }
                TAU_SECTION => {
                    for (matrix, series) in as_object(entry, TAU_SECTION)? {
                        tracked.tau_trajectories.insert(
                            matrix.clone(),
                            as_series(series, &format!("{TAU_SECTION}.{matrix}"))?,
                        );
                    }
                }
                REG_DYNAMICS_SECTION => {
                    for (reg_type, params) in as_object(entry, REG_DYNAMICS_SECTION)? {
                        let context = format!("{REG_DYNAMICS_SECTION}.{reg_type}");
                        let mut dynamics = BTreeMap::new();
                        for (param, series) in as_object(params, &context)? {
                            dynamics.insert(
                                param.clone(),
                                as_series(series, &format!("{context}.{param}"))?,
                            );
                        }
                        tracked.reg_dynamics.insert(reg_type.clone(), dynamics);
                    }
                }
                _ => {
                    let canonical = canonical_series_key(key);
                    let series = as_series(entry, &canonical)?;
                    tracked.series.insert(canonical, series);
                }
            }
        }
        tracked.rebuild_aliases();
        Ok(tracked)
    }

    /// Encode the section back to its external form with canonical keys.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, series) in &self.series {
            map.insert(key.clone(), series_to_value(series));
        }
        if !self.kernels.is_empty() {
            let kernels: Map<String, Value> = self
                .kernels
                .iter()
                .map(|(threshold, kernel)| (threshold.clone(), kernel.to_value()))
                .collect();
            map.insert(KERNEL_SECTION.into(), Value::Object(kernels));
        }
        if !self.top_tokens.is_empty() {
            let tops: Map<String, Value> = self
                .top_tokens
                .iter()
                .map(|(size, group)| (size.clone(), group.to_value()))
                .collect();
            map.insert(TOP_TOKENS_SECTION.into(), Value::Object(tops));
        }
        if !self.tau_trajectories.is_empty() {
            let tau: Map<String, Value> = self
                .tau_trajectories
                .iter()
                .map(|(matrix, series)| (matrix.clone(), series_to_value(series)))
                .collect();
            map.insert(TAU_SECTION.into(), Value::Object(tau));
        }
        if !self.reg_dynamics.is_empty() {
            let dynamics: Map<String, Value> = self
                .reg_dynamics
                .iter()
                .map(|(reg_type, params)| {
                    let params: Map<String, Value> = params
                        .iter()
                        .map(|(param, series)| (param.clone(), series_to_value(series)))
                        .collect();
                    (reg_type.clone(), Value::Object(params))
                })
                .collect();
            map.insert(REG_DYNAMICS_SECTION.into(), Value::Object(dynamics));
        }
        Value::Object(map)
    }

    /// Resolve any documented spelling of a tracked name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] for names never declared; no default is
    /// ever substituted.
    pub fn get(&self, name: &str) -> Result<TrackedItem<'_>> {
        let resolved = match self.aliases.get(&normalize_name(name)) {
            Some(TrackedHandle::Series(key)) => self.series.get(key).map(TrackedItem::Series),
            Some(TrackedHandle::Kernel(key)) => self.kernels.get(key).map(TrackedItem::Kernel),
            Some(TrackedHandle::TopTokens(key)) => {
                self.top_tokens.get(key).map(TrackedItem::TopTokens)
            }
            None => None,
        };
        resolved.ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    /// Resolve a name that must be a plain series.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the name is unknown or names a
    /// kernel or top-token group instead.
    pub fn series(&self, name: &str) -> Result<&MetricSeries> {
        match self.get(name)? {
            TrackedItem::Series(series) => Ok(series),
            TrackedItem::Kernel(_) | TrackedItem::TopTokens(_) => {
                Err(Error::UnknownMetric(name.to_string()))
            }
        }
    }

    /// Resolve a name that must be a kernel group (`kernel60`,
    /// `kernel6`, or the full threshold-keyed name).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the name is unknown or not a kernel.
    pub fn kernel(&self, name: &str) -> Result<&TrackedKernel> {
        match self.get(name)? {
            TrackedItem::Kernel(kernel) => Ok(kernel),
            TrackedItem::Series(_) | TrackedItem::TopTokens(_) => {
                Err(Error::UnknownMetric(name.to_string()))
            }
        }
    }

    /// Resolve a name that must be a top-token group (`top100` or the
    /// full size-keyed name).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the name is unknown or not a
    /// top-token group.
    pub fn top_tokens(&self, name: &str) -> Result<&TrackedTopTokens> {
        match self.get(name)? {
            TrackedItem::TopTokens(group) => Ok(group),
            TrackedItem::Series(_) | TrackedItem::Kernel(_) => {
                Err(Error::UnknownMetric(name.to_string()))
            }
        }
    }

    /// One matrix's tau-coefficient history (`phi` or `theta`).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the matrix was never tracked.
    pub fn tau_trajectory(&self, matrix: &str) -> Result<&MetricSeries> {
        self.tau_trajectories
            .get(matrix)
            .ok_or_else(|| Error::UnknownMetric(format!("tau-trajectories.{matrix}")))
    }

    /// One regularizer's dynamic-parameter histories.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when the regularizer tracked no dynamics.
    pub fn regularizer_dynamics(&self, reg_type: &str) -> Result<&BTreeMap<String, MetricSeries>> {
        self.reg_dynamics
            .get(reg_type)
            .ok_or_else(|| Error::UnknownMetric(format!("{REG_DYNAMICS_SECTION}.{reg_type}")))
    }

    /// Canonical names of the plain series, sorted.
    #[must_use]
    pub fn series_names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    /// Canonical kernel thresholds, sorted.
    #[must_use]
    pub fn kernel_thresholds(&self) -> Vec<&str> {
        self.kernels.keys().map(String::as_str).collect()
    }

    /// Top-token group sizes, sorted.
    #[must_use]
    pub fn top_token_sizes(&self) -> Vec<&str> {
        self.top_tokens.keys().map(String::as_str).collect()
    }

    fn rebuild_aliases(&mut self) {
        let mut aliases = HashMap::new();
        for key in self.series.keys() {
            register(&mut aliases, key, TrackedHandle::Series(key.clone()));
            for alias in series_key_aliases(key) {
                register(&mut aliases, &alias, TrackedHandle::Series(key.clone()));
            }
        }
        for threshold in self.kernels.keys() {
            let handle = TrackedHandle::Kernel(threshold.clone());
            register(
                &mut aliases,
                &format!("{KERNEL_SECTION}-{threshold}"),
                handle.clone(),
            );
            for digits in threshold_digit_aliases(threshold) {
                register(&mut aliases, &format!("kernel{digits}"), handle.clone());
                register(&mut aliases, &format!("kernel_{digits}"), handle.clone());
            }
        }
        for size in self.top_tokens.keys() {
            let handle = TrackedHandle::TopTokens(size.clone());
            register(
                &mut aliases,
                &format!("{TOP_TOKENS_SECTION}-{size}"),
                handle.clone(),
            );
            register(&mut aliases, &format!("top{size}"), handle.clone());
            register(&mut aliases, &format!("top_{size}"), handle.clone());
        }
        self.aliases = aliases;
    }
}

// the alias table is derived state; equality is over the data maps
impl PartialEq for TrackedMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.series == other.series
            && self.kernels == other.kernels
            && self.top_tokens == other.top_tokens
            && self.tau_trajectories == other.tau_trajectories
            && self.reg_dynamics == other.reg_dynamics
    }
}

fn register(aliases: &mut HashMap<String, TrackedHandle>, spelling: &str, handle: TrackedHandle) {
    aliases.entry(normalize_name(spelling)).or_insert(handle);
}

/// Compact spellings for suffix-bearing plain series keys.
fn series_key_aliases(canonical: &str) -> Vec<String> {
    let mut aliases = Vec::new();
    if let Some((family, suffix)) = canonical.rsplit_once('-') {
        if let Some(modality) = suffix.strip_prefix('@') {
            // sparsity-phi-@dc -> sparsity_phi_d
            if let Some(first) = modality.chars().next() {
                aliases.push(format!("{family}-{first}"));
            }
        } else if suffix.parse::<f64>().is_ok() {
            for digits in threshold_digit_aliases(suffix) {
                aliases.push(format!("{family}-{digits}"));
            }
        }
    }
    aliases
}

/// Canonicalize a plain-series key: a trailing fractional threshold is
/// re-spelled with two decimals (`background-tokens-ratio-0.3` ->
/// `background-tokens-ratio-0.30`).
fn canonical_series_key(key: &str) -> String {
    if let Some((family, suffix)) = key.rsplit_once('-') {
        if suffix.contains('.') && suffix.parse::<f64>().is_ok() {
            if let Ok(canonical) = canonical_threshold_key(suffix) {
                return format!("{family}-{canonical}");
            }
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::codec::MetricValue;
    use serde_json::json;

    fn kernel_fixture() -> TrackedKernel {
        let average = KernelQuality::new(
            [1i64, 2].into_iter().collect(),
            [3i64, 4].into_iter().collect(),
            [5i64, 6].into_iter().collect(),
        );
        let size: MetricSeries = [120i64, 100].into_iter().collect();
        let topics: BTreeMap<String, KernelQuality> = [
            (
                "t00".to_string(),
                KernelQuality::new(
                    [10i64, 2, 3].into_iter().collect(),
                    [67i64, 36].into_iter().collect(),
                    [12i64, 89].into_iter().collect(),
                ),
            ),
            (
                "t01".to_string(),
                KernelQuality::new(
                    [1i64, 2, 3].into_iter().collect(),
                    [6i64, 3].into_iter().collect(),
                    [1i64, 8].into_iter().collect(),
                ),
            ),
            (
                "t02".to_string(),
                KernelQuality::new(
                    [10i64, 11].into_iter().collect(),
                    [656i64, 32].into_iter().collect(),
                    [17i64, 856].into_iter().collect(),
                ),
            ),
        ]
        .into_iter()
        .collect();
        TrackedKernel::new(average, size, topics)
    }

    #[test]
    fn test_kernel_aggregation_views() {
        let kernel = kernel_fixture();
        assert_eq!(
            kernel.average().coherence().all(),
            [MetricValue::Int(1), MetricValue::Int(2)]
        );
        assert_eq!(kernel.average().purity().last(), Some(&MetricValue::Int(6)));
        assert_eq!(
            kernel.topic("t00").unwrap().contrast().all(),
            [MetricValue::Int(67), MetricValue::Int(36)]
        );
        assert_eq!(
            kernel.topic("t02").unwrap().purity().all(),
            [MetricValue::Int(17), MetricValue::Int(856)]
        );
        assert_eq!(
            kernel.topic("t01").unwrap().coherence().last(),
            Some(&MetricValue::Int(3))
        );
    }

    #[test]
    fn test_unknown_topic_fails() {
        let kernel = kernel_fixture();
        assert!(matches!(
            kernel.topic("t99"),
            Err(Error::UnknownMetric(name)) if name == "t99"
        ));
    }

    fn tracked_fixture() -> TrackedMetrics {
        TrackedMetrics::from_value(&json!({
            "perplexity": [1, 2, 3],
            "sparsity-phi-@dc": [-2, -4, -6],
            "sparsity-theta": [2, 4, 6],
            "background-tokens-ratio-0.3": [0.4, 0.3, 0.2],
            "topic-kernel": {
                "0.6": {
                    "avg_coh": [1, 2],
                    "avg_con": [3, 4],
                    "avg_pur": [5, 6],
                    "size": [120, 100],
                    "topics": {
                        "t00": {"coherence": [10, 2, 3], "contrast": [67, 36], "purity": [12, 89]}
                    }
                }
            },
            "top-tokens": {
                "100": {"avg_coh": [10, 20, 30], "topics": {"t00": [12, 32, 3]}}
            },
            "tau-trajectories": {"phi": [1, 2, 3], "theta": [5, 6, 7]}
        }))
        .unwrap()
    }

    #[test]
    fn test_threshold_keys_canonicalized_on_ingestion() {
        let tracked = tracked_fixture();
        assert_eq!(tracked.kernel_thresholds(), ["0.60"]);
        assert!(tracked
            .series_names()
            .contains(&"background-tokens-ratio-0.30"));
    }

    #[test]
    fn test_alias_spellings_resolve_to_one_object() {
        let tracked = tracked_fixture();
        let by_compact = tracked.kernel("kernel60").unwrap();
        let by_stripped = tracked.kernel("kernel6").unwrap();
        let by_full = tracked.kernel("topic-kernel-0.60").unwrap();
        assert!(std::ptr::eq(by_compact, by_stripped));
        assert!(std::ptr::eq(by_compact, by_full));

        let top = tracked.top_tokens("top100").unwrap();
        assert!(std::ptr::eq(top, tracked.top_tokens("top_tokens_100").unwrap()));

        let ratio = tracked.series("background_tokens_ratio_3").unwrap();
        assert!(std::ptr::eq(
            ratio,
            tracked.series("background-tokens-ratio-0.30").unwrap()
        ));
        let sparsity = tracked.series("sparsity_phi_d").unwrap();
        assert!(std::ptr::eq(sparsity, tracked.series("sparsity-phi-@dc").unwrap()));
    }

    #[test]
    fn test_unknown_name_is_an_error_not_a_default() {
        let tracked = tracked_fixture();
        assert!(matches!(
            tracked.get("dibou"),
            Err(Error::UnknownMetric(name)) if name == "dibou"
        ));
        assert!(tracked.series("kernel60").is_err());
    }

    #[test]
    fn test_round_trip_preserves_values_and_canonical_keys() {
        let tracked = tracked_fixture();
        let encoded = tracked.to_value();
        assert!(encoded.get("background-tokens-ratio-0.30").is_some());
        assert_eq!(encoded["tau-trajectories"]["theta"], json!([5, 6, 7]));
        let decoded = TrackedMetrics::from_value(&encoded).unwrap();
        assert_eq!(decoded.to_value(), encoded);
    }

    #[test]
    fn test_malformed_entry_rejected() {
        let result = TrackedMetrics::from_value(&json!({"perplexity": "not-a-series"}));
        assert!(matches!(result, Err(Error::MalformedResults(_))));
    }
}
