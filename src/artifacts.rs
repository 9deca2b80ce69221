//! Artifact indices over the products of past training runs
//!
//! Every produced label materializes up to two artifacts under a
//! per-collection root: a result record (`results/<label>.json`) and a
//! weight-matrix dump (`models/<label>.phi`). An index answers which
//! labels already exist for one artifact kind; the sweep planner queries
//! both kinds once, at planning time, against on-disk state.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// The two kinds of persisted artifacts a training run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Structured experimental-results record.
    ResultRecord,
    /// Persisted weight-matrix dump.
    WeightMatrix,
}

impl ArtifactKind {
    /// Directory name under the collection root holding this kind.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::ResultRecord => "results",
            Self::WeightMatrix => "models",
        }
    }

    /// File extension of this kind's artifacts.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::ResultRecord => "json",
            Self::WeightMatrix => "phi",
        }
    }
}

/// A queryable set of labels already present for one artifact kind.
pub trait ArtifactIndex {
    /// Whether an artifact with this label exists.
    fn contains(&self, label: &str) -> bool;

    /// All known labels, sorted.
    fn labels(&self) -> Vec<String>;
}

/// An index seeded from an explicit label set.
#[derive(Debug, Default, Clone)]
pub struct MemoryArtifactIndex {
    labels: BTreeSet<String>,
}

impl MemoryArtifactIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index holding the given labels.
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Record a label as existing.
    pub fn insert(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }
}

impl ArtifactIndex for MemoryArtifactIndex {
    fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }
}

/// An index scanning one directory for artifacts of a fixed kind.
///
/// Labels derive from file stems: `results/gav_100_20.json` indexes the
/// label `gav_100_20`. The scan happens once at construction; the index
/// reflects on-disk state at that instant.
#[derive(Debug, Clone)]
pub struct DirArtifactIndex {
    dir: PathBuf,
    kind: ArtifactKind,
    labels: BTreeSet<String>,
}

impl DirArtifactIndex {
    /// Scan `collection_root`'s subdirectory for the given artifact kind.
    ///
    /// A missing directory indexes as empty rather than failing: a fresh
    /// collection has produced no artifacts yet.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory exists but cannot be read.
    pub fn scan(collection_root: impl AsRef<Path>, kind: ArtifactKind) -> Result<Self> {
        let dir = collection_root.as_ref().join(kind.dir_name());
        let mut labels = BTreeSet::new();
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some(kind.extension()) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        labels.insert(stem.to_string());
                    }
                }
            }
        }
        debug!(dir = %dir.display(), count = labels.len(), "scanned artifact directory");
        Ok(Self { dir, kind, labels })
    }

    /// The scanned directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The artifact kind this index covers.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The path an artifact with `label` would occupy.
    #[must_use]
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.{}", self.kind.extension()))
    }
}

impl ArtifactIndex for DirArtifactIndex {
    fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }
}
