//! Property-based tests for afinar
//!
//! Invariants under test:
//! - Cartesian completeness of the parameter grid
//! - Determinism and collision-uniqueness of artifact labels
//! - Round-trip fidelity of the results codec, including canonical
//!   threshold keys and int-vs-float typing
//! - Run with ProptestConfig::with_cases(100)

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use afinar::artifacts::MemoryArtifactIndex;
use afinar::labeling::{ArtifactLabeler, LabelSelection, LabelingScheme};
use afinar::params::{ParameterSpace, ParameterSpaceBuilder};
use afinar::results::ExperimentalResults;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Generate explorable axes for the three required parameters.
fn arb_required_axes() -> impl Strategy<Value = (Vec<i64>, Vec<i64>, Vec<i64>)> {
    (
        proptest::collection::vec(1i64..500, 1..4),
        proptest::collection::vec(1i64..500, 1..4),
        proptest::collection::vec(1i64..500, 1..4),
    )
}

fn space_from_axes(axes: &(Vec<i64>, Vec<i64>, Vec<i64>)) -> ParameterSpace {
    ParameterSpaceBuilder::new()
        .explore("nb_topics", axes.0.clone())
        .explore("collection_passes", axes.1.clone())
        .explore("document_passes", axes.2.clone())
        .build()
        .expect("required parameters are all declared")
}

/// Generate a series mixing integral and fractional observations.
fn arb_series() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(
        prop_oneof![
            (-1000i64..1000).prop_map(Value::from),
            (-1000.0f64..1000.0).prop_map(Value::from),
        ],
        1..12,
    )
}

/// Generate a threshold in hundredths, so the canonical spelling is
/// exact.
fn arb_threshold() -> impl Strategy<Value = f64> {
    (1u32..100).prop_map(|hundredths| f64::from(hundredths) / 100.0)
}

fn scalars_stub() -> Value {
    json!({
        "dir": "d",
        "label": "l",
        "dataset_iterations": 3,
        "nb_topics": 5,
        "document_passes": 2,
        "background_topics": [],
        "domain_topics": [],
        "modalities": {}
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Cartesian Completeness Properties
    // ========================================================================

    /// Property: grid length equals the product of axis lengths
    #[test]
    fn prop_grid_len_is_axis_product(axes in arb_required_axes()) {
        let space = space_from_axes(&axes);
        let expected = axes.0.len() * axes.1.len() * axes.2.len();
        prop_assert_eq!(space.grid().len(), expected);
        prop_assert_eq!(space.grid().iter().count(), expected);
    }

    /// Property: every enumerated value belongs to its declared list
    #[test]
    fn prop_vector_values_belong_to_axes(axes in arb_required_axes()) {
        let space = space_from_axes(&axes);
        let grid = space.grid();
        for (_, vector) in grid.iter() {
            for (position, name) in grid.names().iter().enumerate() {
                let declared = space.explorable_values(name).unwrap();
                prop_assert!(declared.contains(vector.get(position).unwrap()));
            }
        }
    }

    /// Property: a name declared in both buckets always fails validation
    #[test]
    fn prop_duplicate_name_always_rejected(value in 1i64..100, others in arb_required_axes()) {
        let result = ParameterSpaceBuilder::new()
            .fixed("nb_topics", value)
            .explore("nb_topics", others.0.clone())
            .explore("collection_passes", others.1.clone())
            .explore("document_passes", others.2.clone())
            .build();
        prop_assert!(result.is_err());
    }

    // ========================================================================
    // Labeling Properties
    // ========================================================================

    /// Property: planning twice over identical inputs yields identical
    /// label sequences
    #[test]
    fn prop_labels_deterministic(axes in arb_required_axes(), prefix in "[a-z]{0,6}") {
        let space = space_from_axes(&axes);
        let labeler = ArtifactLabeler::new(LabelingScheme::define(
            prefix,
            &LabelSelection::All,
            &LabelSelection::None,
            &space,
        ));
        let registry = space.registry();
        let grid = space.grid();
        let empty = MemoryArtifactIndex::new();
        let first = labeler.plan(&registry, &grid, &empty, &empty, false);
        let second = labeler.plan(&registry, &grid, &empty, &empty, false);
        prop_assert_eq!(first.labels(), second.labels());
    }

    /// Property: final labels are unique across a plan, and every final
    /// label differs from its maximal label only by the version fragment
    #[test]
    fn prop_final_labels_unique(axes in arb_required_axes()) {
        let space = space_from_axes(&axes);
        // project one dimension only, so repeated values collide
        let labeler = ArtifactLabeler::new(LabelingScheme::define(
            "p",
            &LabelSelection::Names(vec!["nb_topics".to_string()]),
            &LabelSelection::None,
            &space,
        ));
        let registry = space.registry();
        let grid = space.grid();
        let empty = MemoryArtifactIndex::new();
        let plan = labeler.plan(&registry, &grid, &empty, &empty, false);

        let unique: HashSet<&String> = plan.labels().iter().collect();
        prop_assert_eq!(unique.len(), plan.labels().len());

        let maximal = labeler.maximal_labels(&registry, &grid);
        for (label, maximal) in plan.labels().iter().zip(&maximal) {
            prop_assert_eq!(&strip_version(label), maximal);
        }
    }

    // ========================================================================
    // Codec Properties
    // ========================================================================

    /// Property: encode-then-decode reproduces the record exactly
    #[test]
    fn prop_record_round_trips(series in arb_series(), threshold in arb_threshold()) {
        let record = json!({
            "scalars": scalars_stub(),
            "tracked": {
                "perplexity": series.clone(),
                (format!("background-tokens-ratio-{threshold}")): series
            },
            "final": {"background-tokens": []},
            "regularizers": [],
            "reg_defs": {},
            "score_defs": {}
        });
        let results = ExperimentalResults::from_dict(&record).unwrap();
        let decoded = ExperimentalResults::from_json_str(&results.to_json().unwrap()).unwrap();
        prop_assert_eq!(&results, &decoded);
        prop_assert_eq!(results.to_value(), decoded.to_value());
    }

    /// Property: threshold keys always encode with two decimals
    #[test]
    fn prop_threshold_keys_canonical(threshold in arb_threshold()) {
        let record = json!({
            "scalars": scalars_stub(),
            "tracked": {(format!("background-tokens-ratio-{threshold}")): [0.5]},
            "final": {"background-tokens": []},
            "regularizers": [],
            "reg_defs": {},
            "score_defs": {}
        });
        let results = ExperimentalResults::from_dict(&record).unwrap();
        let encoded = results.to_value();
        let canonical = format!("background-tokens-ratio-{threshold:.2}");
        prop_assert!(encoded["tracked"].get(&canonical).is_some());
    }

    /// Property: integral observations never decode as floats
    #[test]
    fn prop_int_typing_survives(values in proptest::collection::vec(-1000i64..1000, 1..10)) {
        let record = json!({
            "scalars": scalars_stub(),
            "tracked": {"perplexity": values},
            "final": {"background-tokens": []},
            "regularizers": [],
            "reg_defs": {},
            "score_defs": {}
        });
        let results = ExperimentalResults::from_dict(&record).unwrap();
        let decoded: Value = serde_json::from_str(&results.to_json().unwrap()).unwrap();
        for entry in decoded["tracked"]["perplexity"].as_array().unwrap() {
            prop_assert!(entry.is_i64());
        }
    }
}

/// Drop the version fragment (`v` + digits) from a final label.
fn strip_version(label: &str) -> String {
    let fragments: Vec<&str> = label
        .split('_')
        .filter(|fragment| {
            !(fragment.len() > 1
                && fragment.starts_with('v')
                && fragment[1..].chars().all(|c| c.is_ascii_digit()))
        })
        .collect();
    fragments.join("_")
}
