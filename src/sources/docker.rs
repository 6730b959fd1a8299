use crate::error::DiffResult;
use crate::notifier::Notifier;
use std::path::{Path, PathBuf};

use super::{EngineCli, Source};

/// Docker implementation of the Source trait
pub struct DockerSource {
    cli: EngineCli,
}

impl DockerSource {
    /// Fails with [`crate::DiffError::EngineUnavailable`] when `docker --version` does not run.
    pub fn new() -> DiffResult<Self> {
        Ok(Self {
            cli: EngineCli::detect("docker")?,
        })
    }
}

impl Source for DockerSource {
    fn name(&self) -> &str {
        self.cli.binary()
    }

    fn get_image_tarball(
        &self,
        image_name: &str,
        dest_dir: &Path,
        pull: bool,
        notifier: &Notifier,
    ) -> DiffResult<PathBuf> {
        self.cli.save_image(image_name, dest_dir, pull, notifier)
    }
}
