//! # Afinar: Grid-Search Hyperparameter Sweep Engine
//!
//! Afinar explores a multi-dimensional hyperparameter space for
//! iterative topic-model training runs, avoids redundant recomputation
//! by detecting already-materialized artifacts on disk, and captures
//! each run's time-series metrics in a structured, alias-tolerant,
//! round-trip-safe results record.
//!
//! ## Subsystems
//!
//! - [`params`]: validated static/explorable parameter spaces with
//!   cartesian grid enumeration and a per-sweep lookup registry
//! - [`labeling`]: deterministic, collision-resolved artifact labels and
//!   the sweep plan reconciled against on-disk artifact indices
//! - [`trajectory`]: coefficient-trajectory resolution for the sparsity
//!   regularizer families
//! - [`sweep`]: the sequential orchestrator over the external trainer
//! - [`results`]: the five-section experimental-results record and its
//!   fidelity-preserving JSON codec
//!
//! ## Example
//!
//! ```rust
//! use afinar::params::ParameterSpace;
//!
//! let space = ParameterSpace::builder()
//!     .fixed("collection_passes", 100)
//!     .explore("nb_topics", [20, 40, 60])
//!     .explore("document_passes", [1, 5])
//!     .build()?;
//!
//! // 3 topic counts x 2 document-pass counts
//! assert_eq!(space.grid().len(), 6);
//! # Ok::<(), afinar::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod error;
pub mod labeling;
pub mod params;
pub mod results;
pub mod sweep;
pub mod trajectory;

pub use error::{Error, Result};
