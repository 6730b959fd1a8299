//! Error taxonomy for the diff pipeline.
//!
//! Fatal conditions are variants of [`DiffError`]. A layer directory that could not be
//! deleted is not fatal by default and is reported as a [`PruneWarning`] instead.

use std::fmt;
use std::path::PathBuf;

pub type DiffResult<T> = std::result::Result<T, DiffError>;

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no manifests found in {path}")]
    ManifestEmpty { path: PathBuf },

    #[error("failed to create archive {path}: {source}")]
    ArchiveCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to package {path}: {source}")]
    ArchivePackaging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract image archive {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{engine} {command} failed: {output}")]
    EngineInvocation {
        engine: String,
        command: String,
        output: String,
    },

    #[error("{engine} is not available: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("invalid image reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("failed to write layer record {path}: {source}")]
    RecordWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} shared layer(s) could not be removed: {}", .failures.len(), join_warnings(.failures))]
    PruneFailed { failures: Vec<PruneWarning> },

    #[error("failed to prepare scratch directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A shared layer whose files are still on disk after pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneWarning {
    /// Layer id exactly as listed in the manifest, not the name written to `existlayers`.
    pub layer: String,
    /// Path that was left on disk, or the raw id when it could not be resolved.
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for PruneWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layer {} ({}): {}",
            self.layer,
            self.path.display(),
            self.reason
        )
    }
}

fn join_warnings(warnings: &[PruneWarning]) -> String {
    warnings
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
