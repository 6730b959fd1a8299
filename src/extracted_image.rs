//! An image archive unpacked onto disk.
//!
//! [`ExtractedImage`] points at a directory that holds `manifest.json` plus one entry per
//! manifest layer (`<hash>/layer.tar` for classic `docker save` output, `blobs/sha256/<hash>`
//! for OCI layouts). The layer list is read once, at construction, from the first manifest
//! record. The directory itself belongs to whoever created it; dropping an
//! `ExtractedImage` never deletes anything.

use crate::error::{DiffError, DiffResult};
use crate::layers::locate_layer;
use crate::manifest::{self, LayerId, MANIFEST_FILE};
use crate::notifier::Notifier;
use crate::tar_extractor;
use anyhow::anyhow;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ExtractedImage {
    root: PathBuf,
    layers: Vec<LayerId>,
}

impl ExtractedImage {
    /// Unpacks `tarball_path` into `extract_dir` and reads its manifest.
    pub fn from_tarball(
        tarball_path: &Path,
        extract_dir: &Path,
        notifier: &Notifier,
    ) -> DiffResult<Self> {
        notifier.debug(&format!(
            "Extracting image tarball {} into {}",
            tarball_path.display(),
            extract_dir.display()
        ));

        tar_extractor::extract_tar(tarball_path, extract_dir).map_err(|source| {
            DiffError::Extraction {
                path: tarball_path.to_path_buf(),
                source,
            }
        })?;

        if !extract_dir.join(MANIFEST_FILE).is_file() {
            return Err(DiffError::Extraction {
                path: tarball_path.to_path_buf(),
                source: anyhow!(
                    "{} not found. This does not appear to be a valid OCI/Docker image tarball.",
                    MANIFEST_FILE
                ),
            });
        }

        let image = Self::open(extract_dir)?;
        notifier.debug(&format!(
            "Image at {} declares {} layers",
            extract_dir.display(),
            image.layers.len()
        ));
        Ok(image)
    }

    /// Wraps a directory that is already extracted.
    pub fn open(root: &Path) -> DiffResult<Self> {
        let layers = manifest::read_layers(&root.join(MANIFEST_FILE))?;
        Ok(Self {
            root: root.to_path_buf(),
            layers,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Layer ids in manifest order (base → top).
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    /// Path of the directory (or blob) holding `layer_id`, if it stays inside the root.
    pub fn layer_path(&self, layer_id: &str) -> Option<PathBuf> {
        locate_layer(layer_id).map(|location| self.root.join(location.relative_path))
    }
}
