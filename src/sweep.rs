//! Sequential sweep orchestration over the external trainer
//!
//! The orchestrator validates the space, plans labels against the
//! on-disk artifact state, and then walks the required vectors one at a
//! time: the trainer is stateful and not reentrant, so exactly one model
//! is alive at any instant. Interrupting a sweep leaves every persisted
//! record valid; the in-flight vector's partial output is a known risk.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::artifacts::ArtifactIndex;
use crate::error::{Error, Result};
use crate::labeling::{ArtifactLabeler, LabelSelection, LabelingScheme, SweepPlan};
use crate::params::{ParamValue, ParameterGrid, ParameterRegistry, ParameterSpace, ParameterVector};
use crate::results::{ExperimentalResults, MetricValue, RunScalars};
use crate::trajectory::{abbreviate, RegularizerSettings, TrajectoryResolver};

/// Modality name of ordinary document tokens.
pub const DEFAULT_CLASS_NAME: &str = "@default_class";

/// Modality name of ideology class labels.
pub const IDEOLOGY_CLASS_NAME: &str = "@ideology_class";

/// Everything the trainer needs to construct one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    label: String,
    nb_topics: i64,
    collection_passes: i64,
    document_passes: i64,
    background_topics_pct: f64,
    modality_weights: BTreeMap<String, ParamValue>,
    score_defs: BTreeMap<String, String>,
    regularizer_names: BTreeMap<String, String>,
    regularizer_settings: BTreeMap<String, RegularizerSettings>,
}

impl ModelSpec {
    /// The artifact label assigned to this vector.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of topics.
    #[must_use]
    pub const fn nb_topics(&self) -> i64 {
        self.nb_topics
    }

    /// Passes over the whole collection.
    #[must_use]
    pub const fn collection_passes(&self) -> i64 {
        self.collection_passes
    }

    /// Passes over each document.
    #[must_use]
    pub const fn document_passes(&self) -> i64 {
        self.document_passes
    }

    /// Fraction of topics reserved as background.
    #[must_use]
    pub const fn background_topics_pct(&self) -> f64 {
        self.background_topics_pct
    }

    /// Non-zero per-modality weights.
    #[must_use]
    pub const fn modality_weights(&self) -> &BTreeMap<String, ParamValue> {
        &self.modality_weights
    }

    /// Score definition to short internal name.
    #[must_use]
    pub const fn score_defs(&self) -> &BTreeMap<String, String> {
        &self.score_defs
    }

    /// Regularizer type to unique short name.
    #[must_use]
    pub const fn regularizer_names(&self) -> &BTreeMap<String, String> {
        &self.regularizer_names
    }

    /// Regularizer settings, trajectories already resolved.
    #[must_use]
    pub const fn regularizer_settings(&self) -> &BTreeMap<String, RegularizerSettings> {
        &self.regularizer_settings
    }
}

/// Training-run specification handed to the trainer alongside a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainSpecs {
    collection_passes: i64,
}

impl TrainSpecs {
    /// Create specs for the given number of collection passes.
    #[must_use]
    pub const fn new(collection_passes: i64) -> Self {
        Self { collection_passes }
    }

    /// Passes over the whole collection.
    #[must_use]
    pub const fn collection_passes(&self) -> i64 {
        self.collection_passes
    }
}

/// The raw metric state a completed training run hands back.
///
/// `tracked` and `finals` carry the same nested shapes the persisted
/// record encodes; the orchestrator wraps them into an
/// [`ExperimentalResults`] without reinterpreting them.
#[derive(Debug, Clone)]
pub struct RunDump {
    /// Raw per-iteration tracked metrics.
    pub tracked: Value,
    /// Raw terminal-iteration snapshots.
    pub finals: Value,
    /// Descriptive string per activated regularizer.
    pub regularizers: Vec<String>,
    /// Background topic names of the trained model.
    pub background_topics: Vec<String>,
    /// Domain topic names of the trained model.
    pub domain_topics: Vec<String>,
}

/// The stateful external training collaborator.
pub trait Trainer {
    /// Handle to a constructed, not-yet-trained model.
    type Model;

    /// Construct a model for one parameter vector.
    ///
    /// # Errors
    ///
    /// Collaborator-defined construction failures.
    fn construct_model(&mut self, spec: &ModelSpec) -> Result<Self::Model>;

    /// Create the training-run specification.
    fn create_train_specs(&self, collection_passes: i64) -> TrainSpecs;

    /// Train the model and hand back its raw metric state.
    ///
    /// # Errors
    ///
    /// Collaborator-defined training failures.
    fn train(
        &mut self,
        model: &mut Self::Model,
        specs: &TrainSpecs,
        cache_theta: bool,
    ) -> Result<RunDump>;
}

/// The per-collection workspace holding artifact indices and persistence.
pub trait ExperimentWorkspace {
    /// The collection directory this sweep targets.
    fn collection_dir(&self) -> &str;

    /// Index of already-persisted result records.
    fn result_index(&self) -> &dyn ArtifactIndex;

    /// Index of already-persisted weight matrices.
    fn matrix_index(&self) -> &dyn ArtifactIndex;

    /// Persist one run's results record and, optionally, its weight
    /// matrix.
    ///
    /// # Errors
    ///
    /// IO failures of the underlying storage.
    fn save(&mut self, results: &ExperimentalResults, save_matrix: bool) -> Result<()>;
}

/// Lifecycle status of one sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Planned but not yet started.
    Pending,
    /// Currently training.
    Running,
    /// Trained and persisted.
    Success,
    /// Aborted by a trainer or persistence failure.
    Failed,
}

/// Bookkeeping entry for one parameter vector's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRunRecord {
    label: String,
    vector_index: usize,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl SweepRunRecord {
    /// Create a pending record for one labeled vector.
    #[must_use]
    pub fn new(label: impl Into<String>, vector_index: usize) -> Self {
        Self {
            label: label.into(),
            vector_index,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// The run's artifact label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stable enumeration index of the vector.
    #[must_use]
    pub const fn vector_index(&self) -> usize {
        self.vector_index
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// When training started, if it did.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the run finished, if it did.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Knobs of one tuning invocation.
#[derive(Debug, Clone)]
pub struct TuneOptions {
    prefix_label: String,
    append_explorables: LabelSelection,
    append_static: LabelSelection,
    force_overwrite: bool,
    cache_theta: bool,
    save_matrices: bool,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            prefix_label: String::new(),
            append_explorables: LabelSelection::All,
            append_static: LabelSelection::None,
            force_overwrite: false,
            cache_theta: true,
            save_matrices: true,
        }
    }
}

impl TuneOptions {
    /// Start from the default labeling and persistence behavior.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant prefix for every produced label.
    #[must_use]
    pub fn prefix_label(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_label = prefix.into();
        self
    }

    /// Which explorable names the labels embed.
    #[must_use]
    pub fn append_explorables(mut self, selection: LabelSelection) -> Self {
        self.append_explorables = selection;
        self
    }

    /// Which static names the labels embed.
    #[must_use]
    pub fn append_static(mut self, selection: LabelSelection) -> Self {
        self.append_static = selection;
        self
    }

    /// Overwrite colliding on-disk artifacts instead of skipping them.
    #[must_use]
    pub const fn force_overwrite(mut self, overwrite: bool) -> Self {
        self.force_overwrite = overwrite;
        self
    }

    /// Whether the trainer caches the theta matrix while training.
    #[must_use]
    pub const fn cache_theta(mut self, cache: bool) -> Self {
        self.cache_theta = cache;
        self
    }

    /// Whether each run's weight matrix is persisted alongside its
    /// results record.
    #[must_use]
    pub const fn save_matrices(mut self, save: bool) -> Self {
        self.save_matrices = save;
        self
    }
}

/// Outcome counts of one completed sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    /// Vectors the full enumeration contained.
    pub planned: usize,
    /// Vectors skipped as fully materialized.
    pub skipped: usize,
    /// Vectors trained and persisted.
    pub trained: usize,
}

/// Drives a grid search over the collaborating trainer and workspace.
pub struct TuningOrchestrator<T: Trainer, W: ExperimentWorkspace> {
    trainer: T,
    workspace: W,
    regularizer_settings: BTreeMap<String, RegularizerSettings>,
    score_defs: BTreeMap<String, String>,
    runs: Vec<SweepRunRecord>,
}

impl<T: Trainer, W: ExperimentWorkspace> TuningOrchestrator<T, W> {
    /// Create an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(trainer: T, workspace: W) -> Self {
        Self {
            trainer,
            workspace,
            regularizer_settings: BTreeMap::new(),
            score_defs: standard_score_defs(),
            runs: Vec::new(),
        }
    }

    /// Replace the active regularizer settings.
    #[must_use]
    pub fn with_regularizers(mut self, settings: BTreeMap<String, RegularizerSettings>) -> Self {
        self.regularizer_settings = settings;
        self
    }

    /// Replace the tracked score definitions.
    #[must_use]
    pub fn with_score_defs(mut self, score_defs: BTreeMap<String, String>) -> Self {
        self.score_defs = score_defs;
        self
    }

    /// Bookkeeping records of every run attempted so far.
    #[must_use]
    pub fn runs(&self) -> &[SweepRunRecord] {
        &self.runs
    }

    /// Run the sweep: plan labels, then train every required vector in
    /// enumeration order.
    ///
    /// # Errors
    ///
    /// Definition errors surface before any training starts; trainer and
    /// persistence failures abort the sweep at the failing vector,
    /// leaving earlier persisted records valid.
    pub fn tune(&mut self, space: &ParameterSpace, options: &TuneOptions) -> Result<SweepSummary> {
        let registry = space.registry();
        let grid = space.grid();
        let scheme = LabelingScheme::define(
            options.prefix_label.clone(),
            &options.append_explorables,
            &options.append_static,
            space,
        );
        info!(params = ?scheme.params(), "labeling artifacts from parameter values");
        let labeler = ArtifactLabeler::new(scheme);
        let plan = labeler.plan(
            &registry,
            &grid,
            self.workspace.result_index(),
            self.workspace.matrix_index(),
            options.force_overwrite,
        );
        if options.force_overwrite {
            info!("overwriting any existing results and phi matrices with colliding names");
        }
        info!(
            total = grid.len(),
            required = plan.required().len(),
            "taking samples for grid search"
        );

        let planned = grid.len();
        let mut grid = grid;
        grid.set_omitted(plan.omitted_indices().clone());
        let resolver = TrajectoryResolver::new(space.trajectory_families());
        let trained = self.train_required(&registry, &grid, &plan, &resolver, options)?;
        Ok(SweepSummary {
            planned,
            skipped: plan.omitted_indices().len(),
            trained,
        })
    }

    fn train_required(
        &mut self,
        registry: &ParameterRegistry,
        grid: &ParameterGrid,
        plan: &SweepPlan,
        resolver: &TrajectoryResolver,
        options: &TuneOptions,
    ) -> Result<usize> {
        let mut trained = 0;
        for (index, vector) in grid.iter() {
            let Some(label) = plan.label(index).map(ToString::to_string) else {
                continue;
            };
            let record_slot = self.runs.len();
            self.runs.push(SweepRunRecord::new(label.clone(), index));
            self.runs[record_slot].start();

            match self.train_one(registry, &vector, &label, resolver, options) {
                Ok(()) => {
                    self.runs[record_slot].complete(RunStatus::Success);
                    trained += 1;
                    debug!(label = %label, "run persisted");
                }
                Err(err) => {
                    self.runs[record_slot].complete(RunStatus::Failed);
                    return Err(err);
                }
            }
        }
        Ok(trained)
    }

    fn train_one(
        &mut self,
        registry: &ParameterRegistry,
        vector: &ParameterVector,
        label: &str,
        resolver: &TrajectoryResolver,
        options: &TuneOptions,
    ) -> Result<()> {
        let settings = resolver.resolve_all(registry, vector, &self.regularizer_settings);
        let spec = self.build_model_spec(registry, vector, label, settings)?;
        let mut model = self.trainer.construct_model(&spec)?;
        let train_specs = self.trainer.create_train_specs(spec.collection_passes());
        let dump = self
            .trainer
            .train(&mut model, &train_specs, options.cache_theta)?;

        let scalars = RunScalars::new(
            self.workspace.collection_dir(),
            label,
            spec.collection_passes(),
            spec.nb_topics(),
            spec.document_passes(),
        )
        .with_topics(dump.background_topics.clone(), dump.domain_topics.clone())
        .with_modalities(
            spec.modality_weights()
                .iter()
                .filter_map(|(name, weight)| {
                    metric_value(weight).map(|value| (name.clone(), value))
                })
                .collect(),
        );
        let results = ExperimentalResults::from_run(
            scalars,
            &dump.tracked,
            &dump.finals,
            dump.regularizers.clone(),
            spec.regularizer_names().clone(),
            spec.score_defs().clone(),
        )?;
        self.workspace.save(&results, options.save_matrices)
    }

    fn build_model_spec(
        &self,
        registry: &ParameterRegistry,
        vector: &ParameterVector,
        label: &str,
        regularizer_settings: BTreeMap<String, RegularizerSettings>,
    ) -> Result<ModelSpec> {
        let nb_topics = int_param(registry, vector, label, "nb_topics")?;
        let collection_passes = int_param(registry, vector, label, "collection_passes")?;
        let document_passes = int_param(registry, vector, label, "document_passes")?;
        let background_topics_pct = registry
            .value(vector, "background_topics_pct")
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);

        // zero-weight modalities are excluded from the model entirely
        let modality_weights: BTreeMap<String, ParamValue> = [
            (DEFAULT_CLASS_NAME, "default_class_weight"),
            (IDEOLOGY_CLASS_NAME, "ideology_class_weight"),
        ]
        .into_iter()
        .filter_map(|(modality, parameter)| {
            registry
                .value(vector, parameter)
                .filter(|weight| weight.as_f64().is_some_and(|w| w != 0.0))
                .map(|weight| (modality.to_string(), weight))
        })
        .collect();

        let regularizer_names = regularizer_settings
            .iter()
            .map(|(reg_type, settings)| {
                let name = settings
                    .get("name")
                    .and_then(ParamValue::as_str)
                    .map_or_else(|| abbreviate(reg_type), ToString::to_string);
                (reg_type.clone(), name)
            })
            .collect();

        Ok(ModelSpec {
            label: label.to_string(),
            nb_topics,
            collection_passes,
            document_passes,
            background_topics_pct,
            modality_weights,
            score_defs: self.score_defs.clone(),
            regularizer_names,
            regularizer_settings,
        })
    }
}

fn int_param(
    registry: &ParameterRegistry,
    vector: &ParameterVector,
    label: &str,
    name: &str,
) -> Result<i64> {
    registry
        .value(vector, name)
        .and_then(|value| value.as_int())
        .ok_or_else(|| Error::Training {
            label: label.to_string(),
            reason: format!("'{name}' did not resolve to an integer"),
        })
}

const fn metric_value(value: &ParamValue) -> Option<MetricValue> {
    match value {
        ParamValue::Int(v) => Some(MetricValue::Int(*v)),
        ParamValue::Float(v) => Some(MetricValue::Float(*v)),
        ParamValue::Str(_) => None,
    }
}

/// The evaluation definitions tracked when the caller supplies none.
#[must_use]
pub fn standard_score_defs() -> BTreeMap<String, String> {
    [
        ("perplexity", "prl"),
        ("sparsity-phi-@dc", "sppd"),
        ("sparsity-theta", "spt"),
        ("topic-kernel-0.60", "tk60"),
        ("topic-kernel-0.80", "tk80"),
        ("top-tokens-10", "top10"),
        ("top-tokens-100", "top100"),
        ("background-tokens-ratio-0.30", "btr30"),
    ]
    .into_iter()
    .map(|(def, name)| (def.to_string(), name.to_string()))
    .collect()
}
