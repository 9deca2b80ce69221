//! Parameter space definition and the resolved parameter registry
//!
//! A space separates parameters held constant for a whole sweep from
//! parameters whose value lists span the search grid. Trajectory-bearing
//! entries contribute four sub-fields each, normalized into the same two
//! buckets under dotted names (`sparse_phi.deactivate`, ...).

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::params::grid::{ParameterGrid, ParameterVector};
use crate::params::value::ParamValue;

/// Parameters that must be present across the two buckets of every space.
pub const REQUIRED_PARAMETERS: [&str; 3] = ["nb_topics", "collection_passes", "document_passes"];

/// The four sub-fields of a trajectory-bearing parameter.
pub const TRAJECTORY_FIELDS: [&str; 4] = ["deactivate", "kind", "start", "end"];

/// One declaration of a parameter: held fixed, or spanning a value list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpan {
    /// A single value held constant across the sweep.
    Static(ParamValue),
    /// A list of values contributing one grid dimension.
    Explorable(Vec<ParamValue>),
}

impl ParamSpan {
    /// Declare a static value.
    pub fn fixed(value: impl Into<ParamValue>) -> Self {
        Self::Static(value.into())
    }

    /// Declare an explorable value list.
    pub fn over<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Self::Explorable(values.into_iter().map(Into::into).collect())
    }
}

/// A coefficient-trajectory declaration for one regularizer family.
///
/// Each of the four sub-fields may itself be static or explorable; the
/// space builder flattens them into the ordinary buckets under dotted
/// names so they participate in grid enumeration like any other
/// parameter.
#[derive(Debug, Clone)]
pub struct TrajectorySpec {
    family: String,
    deactivate: ParamSpan,
    kind: ParamSpan,
    start: ParamSpan,
    end: ParamSpan,
}

impl TrajectorySpec {
    /// Declare a trajectory for the given regularizer family.
    pub fn new(
        family: impl Into<String>,
        deactivate: ParamSpan,
        kind: ParamSpan,
        start: ParamSpan,
        end: ParamSpan,
    ) -> Self {
        Self {
            family: family.into(),
            deactivate,
            kind,
            start,
            end,
        }
    }

    /// The regularizer family this trajectory belongs to.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    fn fields(self) -> [(String, ParamSpan); 4] {
        [
            (format!("{}.deactivate", self.family), self.deactivate),
            (format!("{}.kind", self.family), self.kind),
            (format!("{}.start", self.family), self.start),
            (format!("{}.end", self.family), self.end),
        ]
    }
}

/// The concrete four values of a trajectory resolved against one vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    /// Iteration at which the coefficient schedule activates.
    pub deactivate: ParamValue,
    /// Interpolation kind (`linear`, `quadratic`, ...).
    pub kind: ParamValue,
    /// Coefficient value at activation.
    pub start: ParamValue,
    /// Coefficient value at the terminal iteration.
    pub end: ParamValue,
}

/// Builder for [`ParameterSpace`].
///
/// Validation happens in [`build`](Self::build): a name may appear in
/// exactly one bucket, and the three required parameters must be present
/// across the two buckets.
#[derive(Debug, Default)]
pub struct ParameterSpaceBuilder {
    statics: BTreeMap<String, ParamValue>,
    explorables: BTreeMap<String, Vec<ParamValue>>,
    trajectories: Vec<String>,
}

impl ParameterSpaceBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter held constant across the sweep.
    #[must_use]
    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.statics.insert(name.into(), value.into());
        self
    }

    /// Declare a parameter spanning a list of values.
    #[must_use]
    pub fn explore<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.explorables
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a trajectory-bearing parameter; its four sub-fields are
    /// normalized into the ordinary buckets under dotted names.
    #[must_use]
    pub fn trajectory(mut self, spec: TrajectorySpec) -> Self {
        self.trajectories.push(spec.family().to_string());
        for (name, span) in spec.fields() {
            match span {
                ParamSpan::Static(value) => {
                    self.statics.insert(name, value);
                }
                ParamSpan::Explorable(values) => {
                    self.explorables.insert(name, values);
                }
            }
        }
        self
    }

    /// Validate the declarations and produce the space.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateParameter`] when a name appears in both buckets,
    /// [`Error::MissingRequiredParameters`] when any of
    /// [`REQUIRED_PARAMETERS`] is absent from both.
    pub fn build(self) -> Result<ParameterSpace> {
        for name in self.statics.keys() {
            if self.explorables.contains_key(name) {
                return Err(Error::DuplicateParameter(name.clone()));
            }
        }
        let missing: Vec<String> = REQUIRED_PARAMETERS
            .iter()
            .filter(|name| {
                !self.statics.contains_key(**name) && !self.explorables.contains_key(**name)
            })
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingRequiredParameters(missing));
        }
        Ok(ParameterSpace {
            statics: self.statics,
            explorables: self.explorables,
            trajectories: self.trajectories,
        })
    }
}

/// A validated parameter space: static values plus explorable value lists.
///
/// Explorable names are exposed in sorted order; that order fixes the
/// position of every value inside a [`ParameterVector`].
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    statics: BTreeMap<String, ParamValue>,
    explorables: BTreeMap<String, Vec<ParamValue>>,
    trajectories: Vec<String>,
}

impl ParameterSpace {
    /// Start declaring a space.
    #[must_use]
    pub fn builder() -> ParameterSpaceBuilder {
        ParameterSpaceBuilder::new()
    }

    /// Names of the static parameters.
    #[must_use]
    pub fn constants(&self) -> Vec<&str> {
        self.statics.keys().map(String::as_str).collect()
    }

    /// Names of the explorable parameters, in sorted (positional) order.
    #[must_use]
    pub fn explorables(&self) -> Vec<&str> {
        self.explorables.keys().map(String::as_str).collect()
    }

    /// The static value bound to `name`, if any.
    #[must_use]
    pub fn static_value(&self, name: &str) -> Option<&ParamValue> {
        self.statics.get(name)
    }

    /// The explorable value list bound to `name`, if any.
    #[must_use]
    pub fn explorable_values(&self, name: &str) -> Option<&[ParamValue]> {
        self.explorables.get(name).map(Vec::as_slice)
    }

    /// Families declared through [`TrajectorySpec`]s.
    #[must_use]
    pub fn trajectory_families(&self) -> &[String] {
        &self.trajectories
    }

    /// The cartesian grid over the explorable value lists.
    #[must_use]
    pub fn grid(&self) -> ParameterGrid {
        ParameterGrid::new(
            self.explorables.keys().cloned().collect(),
            self.explorables.values().cloned().collect(),
        )
    }

    /// Resolve the per-name lookup registry for this space.
    #[must_use]
    pub fn registry(&self) -> ParameterRegistry {
        ParameterRegistry::resolve(self)
    }
}

/// Where a resolvable parameter name draws its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSource {
    /// Bound to a static value.
    Static(ParamValue),
    /// Bound to a vector position (sorted explorable order).
    Explorable(usize),
    /// Synthesized four-field trajectory object for a declared family.
    Trajectory(String),
    /// Built-in fallback used when the space never declares the name.
    Default(ParamValue),
}

/// Per-sweep lookup table from parameter name to value source.
///
/// Resolved once when a sweep initializes; afterwards every extraction is
/// a single map lookup, with no name dissection at query time.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    sources: BTreeMap<String, ParamSource>,
}

impl ParameterRegistry {
    fn resolve(space: &ParameterSpace) -> Self {
        let mut sources = BTreeMap::new();
        for (name, value) in &space.statics {
            sources.insert(name.clone(), ParamSource::Static(value.clone()));
        }
        for (position, name) in space.explorables.keys().enumerate() {
            sources.insert(name.clone(), ParamSource::Explorable(position));
        }
        for family in &space.trajectories {
            sources.insert(family.clone(), ParamSource::Trajectory(family.clone()));
        }
        for (name, fallback) in [
            ("default_class_weight", ParamValue::Float(1.0)),
            ("ideology_class_weight", ParamValue::Float(0.0)),
        ] {
            sources
                .entry(name.to_string())
                .or_insert(ParamSource::Default(fallback));
        }
        Self { sources }
    }

    /// The source registered for `name`, if any.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&ParamSource> {
        self.sources.get(name)
    }

    /// Extract the scalar value of `name` for the given vector.
    ///
    /// Returns `None` for unregistered names and for bare trajectory
    /// family names, which resolve through
    /// [`trajectory_point`](Self::trajectory_point) instead.
    #[must_use]
    pub fn value(&self, vector: &ParameterVector, name: &str) -> Option<ParamValue> {
        match self.sources.get(name)? {
            ParamSource::Static(value) | ParamSource::Default(value) => Some(value.clone()),
            ParamSource::Explorable(position) => vector.get(*position).cloned(),
            ParamSource::Trajectory(_) => None,
        }
    }

    /// Resolve the four concrete sub-field values of a declared family.
    #[must_use]
    pub fn trajectory_point(
        &self,
        vector: &ParameterVector,
        family: &str,
    ) -> Option<TrajectoryPoint> {
        match self.sources.get(family)? {
            ParamSource::Trajectory(family) => Some(TrajectoryPoint {
                deactivate: self.value(vector, &format!("{family}.deactivate"))?,
                kind: self.value(vector, &format!("{family}.kind"))?,
                start: self.value(vector, &format!("{family}.start"))?,
                end: self.value(vector, &format!("{family}.end"))?,
            }),
            _ => None,
        }
    }
}
