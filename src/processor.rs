//! End-to-end "old image + new image → diff archive" pipeline.
//!
//! [`DiffProcessor`] drives one run:
//! 1. derive the archive name from both references (rejecting untagged references before
//!    anything is pulled),
//! 2. fetch (pull unless disabled, then save) and extract each image through a
//!    [`Source`] into a private [`Workspace`],
//! 3. intersect the two manifest layer lists,
//! 4. prune the shared layers out of the new image tree and write `existlayers`,
//! 5. package what is left of the new tree into `<output_dir>/<name>.tar.gz`,
//! 6. remove the workspace (unless asked to keep it).
//!
//! A failing stage stops the run; the error carries the stage in its context chain and
//! the underlying [`crate::DiffError`] can be recovered with `downcast_ref`.

use crate::error::{DiffError, PruneWarning};
use crate::extracted_image::ExtractedImage;
use crate::layers::{self, PruneOptions};
use crate::manifest::LayerId;
use crate::naming;
use crate::notifier::Notifier;
use crate::packager::{self, PackOptions, PackStats};
use crate::sources::Source;
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Directory that receives the diff archive.
    pub output_dir: PathBuf,
    /// Parent of the per-run scratch directory.
    pub work_dir: PathBuf,
    pub prune: PruneOptions,
    pub pack: PackOptions,
    pub keep_scratch: bool,
    /// Pull both images before saving them. When unset the engine's local copies are used.
    pub pull: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            work_dir: PathBuf::from("."),
            prune: PruneOptions::default(),
            pack: PackOptions::default(),
            keep_scratch: false,
            pull: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub archive_path: PathBuf,
    /// Layers present in both manifests, in old-image order.
    pub shared_layers: Vec<LayerId>,
    /// Layers of the new image that ended up in the archive, in new-image order.
    pub unique_layers: Vec<LayerId>,
    pub removed_layers: Vec<String>,
    pub warnings: Vec<PruneWarning>,
    pub stats: PackStats,
    /// Set when the scratch directory was kept on disk.
    pub scratch_dir: Option<PathBuf>,
}

pub struct DiffProcessor<S: Source> {
    source: S,
    notifier: Notifier,
    options: DiffOptions,
}

impl<S: Source> DiffProcessor<S> {
    pub fn new(source: S, notifier: Notifier, options: DiffOptions) -> Self {
        Self {
            source,
            notifier,
            options,
        }
    }

    /// Runs the whole pipeline for `old_image` → `new_image`.
    pub fn diff(&self, old_image: &str, new_image: &str) -> Result<DiffSummary> {
        self.notifier.info(&format!(
            "Comparing {} -> {} using {} source",
            old_image,
            new_image,
            self.source.name()
        ));

        let archive_name = naming::diff_archive_name(old_image, new_image)
            .context("Failed to derive diff archive name")?;
        fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.options.output_dir.display()
            )
        })?;
        let archive_path = self.options.output_dir.join(&archive_name);
        if archive_path.exists() {
            return Err(DiffError::ArchiveCreate {
                path: archive_path,
                source: io::Error::from(io::ErrorKind::AlreadyExists),
            })
            .context("Refusing to overwrite an existing diff archive");
        }

        let workspace = Workspace::create_in(&self.options.work_dir)
            .context("Failed to create scratch directory")?;
        self.notifier
            .debug(&format!("Scratch directory: {}", workspace.path().display()));

        let result = self.run_stages(&workspace, old_image, new_image, &archive_path);

        let scratch_dir = if self.options.keep_scratch {
            let kept = workspace.keep();
            self.notifier
                .info(&format!("Keeping scratch directory {}", kept.display()));
            Some(kept)
        } else {
            self.notifier.debug("Removing scratch directory");
            workspace.cleanup();
            None
        };
        self.notifier.finish();

        let mut summary = result?;
        summary.scratch_dir = scratch_dir;
        Ok(summary)
    }

    fn run_stages(
        &self,
        workspace: &Workspace,
        old_image: &str,
        new_image: &str,
        archive_path: &Path,
    ) -> Result<DiffSummary> {
        let old = self
            .fetch_image(
                old_image,
                &workspace.downloads_dir().join("old"),
                &workspace.old_image_dir(),
                workspace,
            )
            .with_context(|| format!("Error pulling or extracting old image {}", old_image))?;
        let new = self
            .fetch_image(
                new_image,
                &workspace.downloads_dir().join("new"),
                &workspace.new_image_dir(),
                workspace,
            )
            .with_context(|| format!("Error pulling or extracting new image {}", new_image))?;

        self.notifier.info("Comparing layers...");
        let shared = layers::intersect(old.layers(), new.layers());
        let unique = layers::unique_layers(new.layers(), &shared);
        self.notifier.debug(&format!(
            "{} shared layers, {} unique to {}",
            shared.len(),
            unique.len(),
            new_image
        ));

        self.notifier.info("Pruning shared layers...");
        let report = layers::prune(new.root(), &shared, &self.options.prune)
            .context("Error pruning shared layers from new image")?;
        for warning in &report.warnings {
            self.notifier
                .warn(&format!("Shared layer left in place: {warning}"));
        }
        self.notifier.debug(&format!(
            "Recorded {} shared layers in {}",
            report.recorded.len(),
            report.record_path.display()
        ));

        self.notifier.info(&format!(
            "Packaging {} unique layers into {}...",
            unique.len(),
            archive_path.display()
        ));
        let stats = packager::package_directory(new.root(), archive_path, &self.options.pack)
            .context("Error compressing diff layers")?;
        self.notifier.debug(&format!(
            "Archived {} entries ({} bytes of file data)",
            stats.entries(),
            stats.bytes
        ));

        Ok(DiffSummary {
            archive_path: archive_path.to_path_buf(),
            shared_layers: shared,
            unique_layers: unique,
            removed_layers: report.removed,
            warnings: report.warnings,
            stats,
            scratch_dir: None,
        })
    }

    fn fetch_image(
        &self,
        image_name: &str,
        download_dir: &Path,
        extract_dir: &Path,
        workspace: &Workspace,
    ) -> Result<ExtractedImage> {
        let tarball = self.source.get_image_tarball(
            image_name,
            download_dir,
            self.options.pull,
            &self.notifier,
        )?;

        self.notifier.info(&format!("Extracting {}...", image_name));
        workspace.prepare(extract_dir)?;
        let image = ExtractedImage::from_tarball(&tarball, extract_dir, &self.notifier)?;

        if let Err(e) = fs::remove_file(&tarball) {
            self.notifier.warn(&format!(
                "Failed to remove temporary tar file {}: {}",
                tarball.display(),
                e
            ));
        }

        Ok(image)
    }
}
