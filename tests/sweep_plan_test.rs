//! Sweep planning integration tests
//!
//! Cover the space definition invariants, label determinism and
//! collision handling, artifact reconciliation, and a full sweep over a
//! disk-backed workspace followed by a re-plan that skips everything.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::json;

use afinar::artifacts::{ArtifactIndex, ArtifactKind, DirArtifactIndex, MemoryArtifactIndex};
use afinar::labeling::{ArtifactLabeler, LabelSelection, LabelingScheme};
use afinar::params::{ParamValue, ParameterSpace};
use afinar::sweep::{
    ExperimentWorkspace, ModelSpec, RunDump, Trainer, TrainSpecs, TuneOptions, TuningOrchestrator,
};
use afinar::results::ExperimentalResults;
use afinar::{Error, Result};

// =============================================================================
// Space definition
// =============================================================================

#[test]
fn test_grid_length_is_cartesian_product() {
    let space = ParameterSpace::builder()
        .fixed("collection_passes", 100)
        .explore("nb_topics", [20, 40, 60, 80, 100])
        .explore("document_passes", [1, 5, 10, 15])
        .explore("background_topics_pct", [0.1, 0.2])
        .build()
        .unwrap();
    assert_eq!(space.grid().len(), 5 * 4 * 2);
}

#[test]
fn test_vector_values_come_from_declared_lists() {
    let space = ParameterSpace::builder()
        .fixed("collection_passes", 100)
        .explore("nb_topics", [20, 40])
        .explore("document_passes", [1, 5, 10])
        .build()
        .unwrap();
    let grid = space.grid();
    for (_, vector) in grid.iter() {
        for (position, name) in grid.names().iter().enumerate() {
            let declared = space.explorable_values(name).unwrap();
            assert!(declared.contains(vector.get(position).unwrap()));
        }
    }
}

#[test]
fn test_duplicate_and_missing_definitions_fail_fast() {
    let duplicate = ParameterSpace::builder()
        .fixed("nb_topics", 20)
        .explore("nb_topics", [20, 40])
        .fixed("collection_passes", 100)
        .fixed("document_passes", 5)
        .build();
    assert!(matches!(
        duplicate,
        Err(Error::DuplicateParameter(name)) if name == "nb_topics"
    ));

    let missing = ParameterSpace::builder().explore("nb_topics", [20]).build();
    match missing {
        Err(Error::MissingRequiredParameters(names)) => {
            assert_eq!(names, vec!["collection_passes", "document_passes"]);
        }
        other => panic!("expected missing-parameters failure, got {other:?}"),
    }
}

// =============================================================================
// Labeling
// =============================================================================

fn labeled_space() -> ParameterSpace {
    ParameterSpace::builder()
        .explore("nb_topics", [20, 40])
        .explore("collection_passes", [100, 200])
        .fixed("document_passes", 5)
        .build()
        .unwrap()
}

#[test]
fn test_labels_are_deterministic_across_plans() {
    let space = labeled_space();
    let labeler = ArtifactLabeler::new(LabelingScheme::define(
        "rq1",
        &LabelSelection::All,
        &LabelSelection::All,
        &space,
    ));
    let registry = space.registry();
    let grid = space.grid();
    let results = MemoryArtifactIndex::with_labels(["rq1_100_5_20"]);
    let matrices = MemoryArtifactIndex::with_labels(["rq1_100_5_20"]);

    let first = labeler.plan(&registry, &grid, &results, &matrices, false);
    let second = labeler.plan(&registry, &grid, &results, &matrices, false);
    assert_eq!(first.labels(), second.labels());
    assert_eq!(first.required(), second.required());
    // scheme order is lexicographic: collection_passes, document_passes,
    // nb_topics
    assert_eq!(first.label(0), Some("rq1_100_5_20"));
}

#[test]
fn test_collisions_get_version_suffixes_and_partials_stay_required() {
    let space = labeled_space();
    // nb_topics is the only projected name, so the two collection-pass
    // values collapse pairwise
    let labeler = ArtifactLabeler::new(LabelingScheme::define(
        "rq1",
        &LabelSelection::Names(vec!["nb_topics".into()]),
        &LabelSelection::None,
        &space,
    ));
    let registry = space.registry();
    let grid = space.grid();

    let empty = MemoryArtifactIndex::new();
    let plan = labeler.plan(&registry, &grid, &empty, &empty, false);
    assert_eq!(
        plan.labels(),
        &["rq1_v001_20", "rq1_v001_40", "rq1_v002_20", "rq1_v002_40"]
    );

    // membership is decided on the maximal (unversioned) labels
    let results = MemoryArtifactIndex::with_labels(["rq1_20"]);
    let matrices = MemoryArtifactIndex::with_labels(["rq1_20", "rq1_40"]);
    let plan = labeler.plan(&registry, &grid, &results, &matrices, false);
    let skipped: Vec<usize> = plan.omitted_indices().iter().copied().collect();
    assert_eq!(skipped, vec![0, 2]);
    // rq1_40 exists as a matrix only: warned about, still required
    let required: Vec<usize> = plan.required().iter().map(|(i, _)| *i).collect();
    assert_eq!(required, vec![1, 3]);
    assert_eq!(plan.matrices_only().iter().copied().collect::<Vec<_>>(), vec![1, 3]);
}

// =============================================================================
// End-to-end sweep over a disk-backed workspace
// =============================================================================

struct StubTrainer;

impl Trainer for StubTrainer {
    type Model = String;

    fn construct_model(&mut self, spec: &ModelSpec) -> Result<Self::Model> {
        Ok(spec.label().to_string())
    }

    fn create_train_specs(&self, collection_passes: i64) -> TrainSpecs {
        TrainSpecs::new(collection_passes)
    }

    fn train(
        &mut self,
        _model: &mut Self::Model,
        specs: &TrainSpecs,
        _cache_theta: bool,
    ) -> Result<RunDump> {
        let passes = specs.collection_passes();
        Ok(RunDump {
            tracked: json!({
                "perplexity": (1..=passes).collect::<Vec<i64>>(),
                "collection-passes": [passes]
            }),
            finals: json!({"background-tokens": ["bg"]}),
            regularizers: vec!["stub".to_string()],
            background_topics: vec!["t0".to_string()],
            domain_topics: vec!["t1".to_string()],
        })
    }
}

/// Workspace persisting records under `results/` and matrix stubs under
/// `models/`, with indices scanned once at construction.
struct FileWorkspace {
    root: PathBuf,
    results: DirArtifactIndex,
    matrices: DirArtifactIndex,
}

impl FileWorkspace {
    fn open(root: PathBuf) -> Result<Self> {
        let results = DirArtifactIndex::scan(&root, ArtifactKind::ResultRecord)?;
        let matrices = DirArtifactIndex::scan(&root, ArtifactKind::WeightMatrix)?;
        Ok(Self {
            root,
            results,
            matrices,
        })
    }
}

impl ExperimentWorkspace for FileWorkspace {
    fn collection_dir(&self) -> &str {
        self.root.to_str().unwrap_or_default()
    }

    fn result_index(&self) -> &dyn ArtifactIndex {
        &self.results
    }

    fn matrix_index(&self) -> &dyn ArtifactIndex {
        &self.matrices
    }

    fn save(&mut self, results: &ExperimentalResults, save_matrix: bool) -> Result<()> {
        let label = results.scalars().model_label();
        results.save_json(self.results.path_for(label))?;
        if save_matrix {
            let path = self.matrices.path_for(label);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, b"phi-matrix-stub")?;
        }
        Ok(())
    }
}

#[test]
fn test_sweep_persists_artifacts_and_replan_skips_them() {
    // surfaces the planner's skip/overlap logging under RUST_LOG
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let dir = tempfile::tempdir().unwrap();
    let space = ParameterSpace::builder()
        .fixed("collection_passes", 2)
        .explore("nb_topics", [20, 40])
        .fixed("document_passes", 1)
        .build()
        .unwrap();
    let options = TuneOptions::new().prefix_label("e2e");

    let workspace = FileWorkspace::open(dir.path().to_path_buf()).unwrap();
    let mut orchestrator = TuningOrchestrator::new(StubTrainer, workspace);
    let summary = orchestrator.tune(&space, &options).unwrap();
    assert_eq!(summary.trained, 2);

    let record_path = dir.path().join("results").join("e2e_20.json");
    let loaded = ExperimentalResults::from_json_file(&record_path).unwrap();
    assert_eq!(loaded.scalars().model_label(), "e2e_20");
    assert_eq!(loaded.scalars().nb_topics(), 20);
    assert!(dir.path().join("models").join("e2e_40.phi").is_file());

    // a fresh workspace scans the artifacts the first sweep wrote and
    // the re-plan trains nothing
    let workspace = FileWorkspace::open(dir.path().to_path_buf()).unwrap();
    let mut orchestrator = TuningOrchestrator::new(StubTrainer, workspace);
    let summary = orchestrator.tune(&space, &options).unwrap();
    assert_eq!(summary.trained, 0);
    assert_eq!(summary.skipped, 2);

    // forcing overwrite retrains the full grid against the same disk
    // state
    let workspace = FileWorkspace::open(dir.path().to_path_buf()).unwrap();
    let mut orchestrator = TuningOrchestrator::new(StubTrainer, workspace);
    let summary = orchestrator
        .tune(&space, &options.clone().force_overwrite(true))
        .unwrap();
    assert_eq!(summary.trained, 2);
    assert_eq!(summary.skipped, 0);
}

#[test]
fn test_regularizer_settings_round_through_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let space = ParameterSpace::builder()
        .fixed("collection_passes", 2)
        .explore("nb_topics", [20])
        .fixed("document_passes", 1)
        .build()
        .unwrap();
    let settings: BTreeMap<String, BTreeMap<String, ParamValue>> = [(
        "smooth-theta".to_string(),
        [("tau".to_string(), ParamValue::Float(1.0))]
            .into_iter()
            .collect(),
    )]
    .into_iter()
    .collect();

    let workspace = FileWorkspace::open(dir.path().to_path_buf()).unwrap();
    let mut orchestrator =
        TuningOrchestrator::new(StubTrainer, workspace).with_regularizers(settings);
    orchestrator.tune(&space, &TuneOptions::new()).unwrap();

    let loaded =
        ExperimentalResults::from_json_file(dir.path().join("results").join("20.json")).unwrap();
    assert_eq!(loaded.reg_defs().get("smooth-theta"), Some(&"smth".to_string()));
    assert_eq!(loaded.regularizers(), ["stub"]);
}
