//! Per-run scratch space.
//!
//! Every run gets its own `.layerdiff-XXXXXX` directory under the chosen work dir, so two
//! runs never share extraction paths. The directory goes away on [`Workspace::cleanup`],
//! or on drop when a run bails out early.

use crate::error::{DiffError, DiffResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = ".layerdiff-";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create_in(parent: &Path) -> DiffResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| DiffError::Workspace {
                path: parent.to_path_buf(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory receiving the engine's saved tarballs.
    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    pub fn old_image_dir(&self) -> PathBuf {
        self.dir.path().join("extracted_image_old")
    }

    pub fn new_image_dir(&self) -> PathBuf {
        self.dir.path().join("extracted_image_new")
    }

    /// Creates an empty subdirectory, failing if it already exists.
    pub fn prepare(&self, dir: &Path) -> DiffResult<()> {
        fs::create_dir(dir).map_err(|source| DiffError::Workspace {
            path: dir.to_path_buf(),
            source,
        })
    }

    /// Removes the scratch directory. Failures are logged and otherwise ignored.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => log::debug!("Removed scratch directory {}", path.display()),
            Err(e) => log::warn!(
                "Failed to remove scratch directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    /// Leaves the scratch directory on disk and returns its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}
