//! Terminal-iteration snapshots of a training run
//!
//! Captured once, at the last iteration: the top tokens of every topic
//! per group size, the kernel token sets per similarity threshold, and
//! the background token list. Groups answer to the same compact aliases
//! as their tracked counterparts (`kernel60`, `top100`).

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::results::codec::canonical_threshold_key;
use crate::results::tracked::normalize_name;

const KERNEL_SECTION: &str = "topic-kernel";
const TOP_TOKENS_SECTION: &str = "top-tokens";
const BACKGROUND_SECTION: &str = "background-tokens";

/// Token lists keyed by topic name.
pub type TokenGroup = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
enum FinalHandle {
    Kernel(String),
    TopTokens(String),
}

/// The `final` section of a results record.
#[derive(Debug, Clone, Default)]
pub struct FinalMetrics {
    kernels: BTreeMap<String, TokenGroup>,
    top_tokens: BTreeMap<String, TokenGroup>,
    background_tokens: Vec<String>,
    aliases: HashMap<String, FinalHandle>,
}

impl FinalMetrics {
    /// Decode and validate the `final` section.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedResults`] on unknown sub-sections or token lists
    /// that are not lists of strings.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::MalformedResults("'final' is not an object".to_string()))?;
        let mut finals = Self::default();
        for (key, entry) in map {
            match key.as_str() {
                KERNEL_SECTION => {
                    for (threshold, topics) in object(entry, KERNEL_SECTION)? {
                        let canonical = canonical_threshold_key(threshold)?;
                        let context = format!("final.{KERNEL_SECTION}.{canonical}");
                        finals
                            .kernels
                            .insert(canonical, token_group(topics, &context)?);
                    }
                }
                TOP_TOKENS_SECTION => {
                    for (size, topics) in object(entry, TOP_TOKENS_SECTION)? {
                        let context = format!("final.{TOP_TOKENS_SECTION}.{size}");
                        finals
                            .top_tokens
                            .insert(size.clone(), token_group(topics, &context)?);
                    }
                }
                BACKGROUND_SECTION => {
                    finals.background_tokens =
                        crate::results::codec::as_string_list(entry, BACKGROUND_SECTION)?;
                }
                other => {
                    return Err(Error::MalformedResults(format!(
                        "unrecognized final sub-section '{other}'"
                    )));
                }
            }
        }
        finals.rebuild_aliases();
        Ok(finals)
    }

    /// Encode the section back to its external form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            KERNEL_SECTION.into(),
            Value::Object(
                self.kernels
                    .iter()
                    .map(|(threshold, topics)| (threshold.clone(), group_to_value(topics)))
                    .collect(),
            ),
        );
        map.insert(
            TOP_TOKENS_SECTION.into(),
            Value::Object(
                self.top_tokens
                    .iter()
                    .map(|(size, topics)| (size.clone(), group_to_value(topics)))
                    .collect(),
            ),
        );
        map.insert(
            BACKGROUND_SECTION.into(),
            Value::Array(
                self.background_tokens
                    .iter()
                    .map(|token| Value::String(token.clone()))
                    .collect(),
            ),
        );
        Value::Object(map)
    }

    /// Resolve a kernel token group by threshold or compact alias.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when no kernel answers to the name.
    pub fn kernel(&self, name: &str) -> Result<&TokenGroup> {
        match self.aliases.get(&normalize_name(name)) {
            Some(FinalHandle::Kernel(key)) => self
                .kernels
                .get(key)
                .ok_or_else(|| Error::UnknownMetric(name.to_string())),
            _ => Err(Error::UnknownMetric(name.to_string())),
        }
    }

    /// Resolve a top-token group by size or compact alias.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when no group answers to the name.
    pub fn top_tokens(&self, name: &str) -> Result<&TokenGroup> {
        match self.aliases.get(&normalize_name(name)) {
            Some(FinalHandle::TopTokens(key)) => self
                .top_tokens
                .get(key)
                .ok_or_else(|| Error::UnknownMetric(name.to_string())),
            _ => Err(Error::UnknownMetric(name.to_string())),
        }
    }

    /// One topic's tokens within a kernel or top-token group.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMetric`] when either the group or the topic is
    /// unknown.
    pub fn topic_tokens(&self, group: &str, topic: &str) -> Result<&[String]> {
        let tokens = match self.aliases.get(&normalize_name(group)) {
            Some(FinalHandle::Kernel(key)) => {
                self.kernels.get(key).and_then(|topics| topics.get(topic))
            }
            Some(FinalHandle::TopTokens(key)) => {
                self.top_tokens.get(key).and_then(|topics| topics.get(topic))
            }
            None => None,
        };
        tokens
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownMetric(format!("{group}.{topic}")))
    }

    /// Tokens attributed to the background topics.
    #[must_use]
    pub fn background_tokens(&self) -> &[String] {
        &self.background_tokens
    }

    /// Compact kernel names in threshold order (`kernel60`, `kernel80`).
    #[must_use]
    pub fn kernels(&self) -> Vec<String> {
        self.kernels
            .keys()
            .map(|threshold| {
                let fraction = threshold.split('.').nth(1).unwrap_or(threshold);
                format!("kernel{fraction}")
            })
            .collect()
    }

    /// Logical kernel definitions (`topic-kernel-0.60`, ...).
    #[must_use]
    pub fn kernel_defs(&self) -> Vec<String> {
        self.kernels
            .keys()
            .map(|threshold| format!("{KERNEL_SECTION}-{threshold}"))
            .collect()
    }

    /// Logical top-token definitions in ascending size order
    /// (`top-tokens-10`, `top-tokens-100`).
    #[must_use]
    pub fn top_defs(&self) -> Vec<String> {
        let mut sizes: Vec<&String> = self.top_tokens.keys().collect();
        sizes.sort_by_key(|size| size.parse::<u64>().unwrap_or(u64::MAX));
        sizes
            .iter()
            .map(|size| format!("{TOP_TOKENS_SECTION}-{size}"))
            .collect()
    }

    fn rebuild_aliases(&mut self) {
        let mut aliases = HashMap::new();
        for threshold in self.kernels.keys() {
            let handle = FinalHandle::Kernel(threshold.clone());
            for spelling in kernel_spellings(threshold) {
                aliases
                    .entry(normalize_name(&spelling))
                    .or_insert_with(|| handle.clone());
            }
        }
        for size in self.top_tokens.keys() {
            let handle = FinalHandle::TopTokens(size.clone());
            for spelling in [
                format!("{TOP_TOKENS_SECTION}-{size}"),
                format!("top{size}"),
                format!("top_{size}"),
                size.clone(),
            ] {
                aliases
                    .entry(normalize_name(&spelling))
                    .or_insert_with(|| handle.clone());
            }
        }
        self.aliases = aliases;
    }
}

// the alias table is derived state; equality is over the data maps
impl PartialEq for FinalMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.kernels == other.kernels
            && self.top_tokens == other.top_tokens
            && self.background_tokens == other.background_tokens
    }
}

fn kernel_spellings(threshold: &str) -> Vec<String> {
    let mut spellings = vec![
        format!("{KERNEL_SECTION}-{threshold}"),
        threshold.to_string(),
    ];
    if let Some(fraction) = threshold.split('.').nth(1) {
        spellings.push(format!("kernel{fraction}"));
        spellings.push(format!("kernel_{fraction}"));
        let stripped = fraction.trim_end_matches('0');
        if !stripped.is_empty() && stripped != fraction {
            spellings.push(format!("kernel{stripped}"));
            spellings.push(format!("kernel_{stripped}"));
        }
    }
    spellings
}

fn object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::MalformedResults(format!("'final.{context}' is not an object")))
}

fn token_group(value: &Value, context: &str) -> Result<TokenGroup> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::MalformedResults(format!("'{context}' is not an object")))?;
    let mut group = TokenGroup::new();
    for (topic, tokens) in map {
        group.insert(
            topic.clone(),
            crate::results::codec::as_string_list(tokens, &format!("{context}.{topic}"))?,
        );
    }
    Ok(group)
}

fn group_to_value(group: &TokenGroup) -> Value {
    Value::Object(
        group
            .iter()
            .map(|(topic, tokens)| {
                (
                    topic.clone(),
                    Value::Array(tokens.iter().map(|t| Value::String(t.clone())).collect()),
                )
            })
            .collect(),
    )
}
