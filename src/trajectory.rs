//! Coefficient-trajectory resolution for sparsity regularizers
//!
//! Two regularizer families support time-varying tau coefficients:
//! phi-matrix and theta-matrix sparsing. For each, the four resolved
//! sub-field values collapse into a `<kind>_<start>_<end>` descriptor that
//! replaces the family's generic coefficient setting, plus an activation
//! start iteration taken from the deactivation point. Every other family
//! passes through untouched.

use std::collections::BTreeMap;

use tracing::debug;

use crate::params::{ParamValue, ParameterRegistry, ParameterVector, TrajectoryPoint};

/// Regularizer families that support tau-coefficient trajectories.
pub const TRAJECTORY_FAMILIES: [&str; 2] = ["sparse_phi", "sparse_theta"];

/// Settings of a single regularizer: parameter name to value.
pub type RegularizerSettings = BTreeMap<String, ParamValue>;

/// A resolved coefficient trajectory for one regularizer family.
#[derive(Debug, Clone, PartialEq)]
pub struct TauTrajectory {
    /// `<kind>_<start>_<end>`, e.g. `linear_-3_-13`.
    pub descriptor: String,
    /// Iteration at which the schedule activates.
    pub activation_start: ParamValue,
}

impl TauTrajectory {
    /// Collapse a resolved trajectory point into its descriptor form.
    #[must_use]
    pub fn from_point(point: &TrajectoryPoint) -> Self {
        Self {
            descriptor: format!("{}_{}_{}", point.kind, point.start, point.end),
            activation_start: point.deactivate.clone(),
        }
    }
}

/// Expands declared trajectory specs into concrete regularizer settings.
///
/// Only the families in [`TRAJECTORY_FAMILIES`] are resolvable; declaring
/// a trajectory for any other family leaves that regularizer's settings
/// unchanged.
#[derive(Debug, Clone)]
pub struct TrajectoryResolver {
    families: Vec<String>,
}

impl TrajectoryResolver {
    /// Keep the declared families that support trajectories.
    #[must_use]
    pub fn new(declared: &[String]) -> Self {
        let (families, ignored): (Vec<String>, Vec<String>) = declared
            .iter()
            .cloned()
            .partition(|family| TRAJECTORY_FAMILIES.contains(&family.as_str()));
        if !ignored.is_empty() {
            debug!(families = ?ignored, "declared trajectories without coefficient support");
        }
        Self { families }
    }

    /// Whether `family` resolves to a trajectory in this sweep.
    #[must_use]
    pub fn is_resolvable(&self, family: &str) -> bool {
        self.families.iter().any(|f| f == family)
    }

    /// Update one regularizer's settings for the current vector.
    ///
    /// When the regularizer's family carries a declared trajectory, the
    /// returned settings have `tau` replaced by the trajectory descriptor
    /// and `start` set to the activation iteration; otherwise the input
    /// settings are returned unchanged.
    #[must_use]
    pub fn resolve(
        &self,
        registry: &ParameterRegistry,
        vector: &ParameterVector,
        reg_type: &str,
        settings: &RegularizerSettings,
    ) -> RegularizerSettings {
        let family = reg_type.replace('-', "_");
        if !self.is_resolvable(&family) {
            return settings.clone();
        }
        let Some(point) = registry.trajectory_point(vector, &family) else {
            return settings.clone();
        };
        let trajectory = TauTrajectory::from_point(&point);
        let mut resolved = settings.clone();
        resolved.insert("tau".to_string(), ParamValue::Str(trajectory.descriptor));
        resolved.insert("start".to_string(), trajectory.activation_start);
        resolved
    }

    /// Resolve every regularizer's settings for the current vector.
    #[must_use]
    pub fn resolve_all(
        &self,
        registry: &ParameterRegistry,
        vector: &ParameterVector,
        settings: &BTreeMap<String, RegularizerSettings>,
    ) -> BTreeMap<String, RegularizerSettings> {
        settings
            .iter()
            .map(|(reg_type, specs)| {
                (
                    reg_type.clone(),
                    self.resolve(registry, vector, reg_type, specs),
                )
            })
            .collect()
    }
}

/// Derive a short name for a regularizer type.
///
/// Types of three or more hyphen-separated tokens abbreviate to their
/// initials; two-token types keep the first two letters of each token
/// (`sparse-theta` -> `spth`, `label-regularization-phi-dom-def` ->
/// `lrpdd`).
#[must_use]
pub fn abbreviate(reg_type: &str) -> String {
    let tokens: Vec<&str> = reg_type.split('-').collect();
    let width = if tokens.len() > 2 { 1 } else { 2 };
    tokens
        .iter()
        .map(|token| token.chars().take(width).collect::<String>())
        .collect()
}

/// Short names for a set of regularizer types, keyed by type.
#[must_use]
pub fn abbreviation_map<'a, I>(reg_types: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    reg_types
        .into_iter()
        .map(|reg_type| (reg_type.to_string(), abbreviate(reg_type)))
        .collect()
}
