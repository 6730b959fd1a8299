use crate::error::DiffResult;
use crate::notifier::Notifier;
use std::path::{Path, PathBuf};

/// Source trait for obtaining image tarballs from a container engine
pub trait Source {
    /// Returns the name of the source for identification purposes
    fn name(&self) -> &str;

    /// Exports `image_name` as a tarball inside `dest_dir`, pulling it first when `pull`
    /// is set. Without a pull the engine must already hold the image.
    ///
    /// Returns the tarball path. The caller owns `dest_dir` and removes the tarball once
    /// it has been extracted.
    fn get_image_tarball(
        &self,
        image_name: &str,
        dest_dir: &Path,
        pull: bool,
        notifier: &Notifier,
    ) -> DiffResult<PathBuf>;
}
