//! Deterministic artifact labeling and sweep planning
//!
//! Every parameter vector gets a filesystem-safe label derived from a
//! labeling scheme: an optional constant prefix plus the values of a
//! chosen subset of parameter names. The planner reconciles the labeled
//! enumeration against the two artifact indices to decide which vectors
//! still need computing, and disambiguates colliding labels with
//! zero-padded version suffixes.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::artifacts::ArtifactIndex;
use crate::params::{ParameterGrid, ParameterRegistry, ParameterSpace};

/// Parameter names that may be projected into an artifact label.
///
/// Names outside this vocabulary are silently dropped from a requested
/// scheme.
pub const ALLOWED_LABELING_PARAMETERS: [&str; 13] = [
    "collection_passes",
    "nb_topics",
    "document_passes",
    "background_topics_pct",
    "ideology_class_weight",
    "sparse_phi.deactivate",
    "sparse_phi.kind",
    "sparse_phi.start",
    "sparse_phi.end",
    "sparse_theta.deactivate",
    "sparse_theta.kind",
    "sparse_theta.start",
    "sparse_theta.end",
];

/// Which names of one bucket to project into the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSelection {
    /// Every name of the bucket that is valid labeling vocabulary.
    All,
    /// No name from the bucket.
    None,
    /// An explicit subset; names outside the vocabulary are dropped.
    Names(Vec<String>),
}

impl LabelSelection {
    fn expand(&self, bucket: &[&str]) -> Vec<String> {
        match self {
            Self::All => bucket
                .iter()
                .filter(|name| ALLOWED_LABELING_PARAMETERS.contains(*name))
                .map(|name| (*name).to_string())
                .collect(),
            Self::None => Vec::new(),
            Self::Names(names) => names
                .iter()
                .filter(|name| ALLOWED_LABELING_PARAMETERS.contains(&name.as_str()))
                .cloned()
                .collect(),
        }
    }
}

/// The projection of parameter values into label text.
///
/// The chosen explorable and static names merge into one
/// lexicographically-ordered list; the mapping from (scheme, vector) to
/// label is a pure function.
#[derive(Debug, Clone)]
pub struct LabelingScheme {
    prefix: String,
    params: Vec<String>,
}

impl LabelingScheme {
    /// Define a scheme from per-bucket selections against a space.
    #[must_use]
    pub fn define(
        prefix: impl Into<String>,
        explorables: &LabelSelection,
        statics: &LabelSelection,
        space: &ParameterSpace,
    ) -> Self {
        let mut params = explorables.expand(&space.explorables());
        params.extend(statics.expand(&space.constants()));
        params.sort();
        params.dedup();
        Self {
            prefix: prefix.into(),
            params,
        }
    }

    /// The names this scheme projects, in label order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The constant prefix, possibly empty.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn fragments(&self, registry: &ParameterRegistry, grid: &ParameterGrid) -> Vec<Vec<String>> {
        (0..grid.len())
            .filter_map(|index| grid.vector(index))
            .map(|vector| {
                self.params
                    .iter()
                    .filter_map(|name| registry.value(&vector, name))
                    .map(|value| value.to_string())
                    .collect()
            })
            .collect()
    }

    fn join(&self, version: Option<&str>, fragments: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(fragments.len() + 2);
        if !self.prefix.is_empty() {
            parts.push(&self.prefix);
        }
        if let Some(version) = version {
            parts.push(version);
        }
        parts.extend(fragments.iter().map(String::as_str));
        parts.join("_")
    }
}

/// Minimum zero-padded width of version suffixes.
const VERSION_DIGITS: usize = 3;

/// Assigns labels to a full enumeration and reconciles them against the
/// artifact indices.
#[derive(Debug, Clone)]
pub struct ArtifactLabeler {
    scheme: LabelingScheme,
}

impl ArtifactLabeler {
    /// Create a labeler for the given scheme.
    #[must_use]
    pub const fn new(scheme: LabelingScheme) -> Self {
        Self { scheme }
    }

    /// The scheme in use.
    #[must_use]
    pub const fn scheme(&self) -> &LabelingScheme {
        &self.scheme
    }

    /// Labels computed before any version disambiguation, one per
    /// enumeration index.
    #[must_use]
    pub fn maximal_labels(&self, registry: &ParameterRegistry, grid: &ParameterGrid) -> Vec<String> {
        self.scheme
            .fragments(registry, grid)
            .iter()
            .map(|fragments| self.scheme.join(None, fragments))
            .collect()
    }

    /// Plan the sweep: final labels, skip set, and required list.
    ///
    /// With `overwrite` set, index reconciliation is bypassed entirely:
    /// every vector is required and existing same-named artifacts will be
    /// replaced. Otherwise a vector present in both indices is skipped, a
    /// vector present in exactly one is warned about but kept, and the
    /// required list preserves enumeration order.
    ///
    /// Index membership reflects on-disk state at planning time; an
    /// artifact appearing afterwards is not detected.
    #[must_use]
    pub fn plan(
        &self,
        registry: &ParameterRegistry,
        grid: &ParameterGrid,
        result_index: &dyn ArtifactIndex,
        matrix_index: &dyn ArtifactIndex,
        overwrite: bool,
    ) -> SweepPlan {
        let fragments = self.scheme.fragments(registry, grid);
        let maximal: Vec<String> = fragments
            .iter()
            .map(|fragments| self.scheme.join(None, fragments))
            .collect();
        let labels = self.versioned(&maximal, &fragments);

        if overwrite {
            let required = labels.iter().cloned().enumerate().collect();
            return SweepPlan {
                labels,
                required,
                skipped: BTreeSet::new(),
                results_only: BTreeSet::new(),
                matrices_only: BTreeSet::new(),
            };
        }

        let mut skipped = BTreeSet::new();
        let mut results_only = BTreeSet::new();
        let mut matrices_only = BTreeSet::new();
        for (index, label) in maximal.iter().enumerate() {
            match (result_index.contains(label), matrix_index.contains(label)) {
                (true, true) => {
                    skipped.insert(index);
                }
                (true, false) => {
                    results_only.insert(index);
                }
                (false, true) => {
                    matrices_only.insert(index);
                }
                (false, false) => {}
            }
        }
        for (indices, kind) in [(&results_only, "train results"), (&matrices_only, "phi matrix")] {
            if !indices.is_empty() {
                let overlapping: Vec<&str> =
                    indices.iter().map(|i| maximal[*i].as_str()).collect();
                warn!(
                    kind,
                    labels = ?overlapping,
                    "existing artifacts overlap with required labels for one kind only; \
                     the vectors stay scheduled"
                );
            }
        }
        if !skipped.is_empty() {
            info!(count = skipped.len(), "skipping fully materialized vectors");
        }

        let required = labels
            .iter()
            .cloned()
            .enumerate()
            .filter(|(index, _)| !skipped.contains(index))
            .collect();
        SweepPlan {
            labels,
            required,
            skipped,
            results_only,
            matrices_only,
        }
    }

    /// Disambiguate colliding maximal labels with version suffixes.
    ///
    /// Counters are per label value, owned by this call, and assigned in
    /// order of first occurrence; a label no other vector collapses to
    /// keeps its maximal form.
    fn versioned(&self, maximal: &[String], fragments: &[Vec<String>]) -> Vec<String> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for label in maximal {
            *occurrences.entry(label).or_insert(0) += 1;
        }
        let mut counters: HashMap<&str, usize> = HashMap::new();
        maximal
            .iter()
            .zip(fragments)
            .map(|(label, fragments)| {
                if occurrences[label.as_str()] < 2 {
                    return label.clone();
                }
                let counter = counters.entry(label).or_insert(0);
                *counter += 1;
                let version = format!("v{:0width$}", *counter, width = VERSION_DIGITS);
                self.scheme.join(Some(&version), fragments)
            })
            .collect()
    }
}

/// The reconciled outcome of labeling one full enumeration.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    labels: Vec<String>,
    required: Vec<(usize, String)>,
    skipped: BTreeSet<usize>,
    results_only: BTreeSet<usize>,
    matrices_only: BTreeSet<usize>,
}

impl SweepPlan {
    /// Final label per enumeration index, collision-resolved.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The final label at one enumeration index.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Vectors still to be trained: `(enumeration index, label)` in
    /// original order.
    #[must_use]
    pub fn required(&self) -> &[(usize, String)] {
        &self.required
    }

    /// Indices skipped because both artifacts already exist; feed these
    /// to [`ParameterGrid::set_omitted`].
    #[must_use]
    pub const fn omitted_indices(&self) -> &BTreeSet<usize> {
        &self.skipped
    }

    /// Indices whose result record exists but whose weight matrix does
    /// not.
    #[must_use]
    pub const fn results_only(&self) -> &BTreeSet<usize> {
        &self.results_only
    }

    /// Indices whose weight matrix exists but whose result record does
    /// not.
    #[must_use]
    pub const fn matrices_only(&self) -> &BTreeSet<usize> {
        &self.matrices_only
    }

    /// Whether the vector at `index` still needs computing.
    #[must_use]
    pub fn is_required(&self, index: usize) -> bool {
        !self.skipped.contains(&index)
    }
}
