//! Parameter space definition, validation, and cartesian enumeration
//!
//! A sweep is declared as two buckets, parameters held static and
//! parameters to explore, plus optional coefficient-trajectory entries
//! whose four sub-fields are normalized into the same buckets. The
//! validated space produces a [`ParameterGrid`] (the cartesian product
//! over sorted explorable names) and a [`ParameterRegistry`] (a per-name
//! lookup table resolved once per sweep).

mod grid;
mod space;
mod value;

pub use grid::{ParameterGrid, ParameterVector};
pub use space::{
    ParamSource, ParamSpan, ParameterRegistry, ParameterSpace, ParameterSpaceBuilder,
    TrajectoryPoint, TrajectorySpec, REQUIRED_PARAMETERS, TRAJECTORY_FIELDS,
};
pub use value::ParamValue;
