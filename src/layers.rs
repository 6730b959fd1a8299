//! Comparing layer lists and pruning shared layers out of an extracted image.
//!
//! [`intersect`] is pure: it only looks at the two manifest layer lists.
//! [`prune`] is the mutation step: it deletes the shared layers from the new image's
//! extraction root and records their names in an `existlayers` file next to the manifest.

use crate::error::{DiffError, DiffResult, PruneWarning};
use crate::manifest::LayerId;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Side file listing the shared layers, written at the new image's root.
pub const RECORD_FILE: &str = "existlayers";

/// Payload file name inside a classic `docker save` layer directory.
pub const LAYER_PAYLOAD: &str = "layer.tar";

/// How layer names are laid out in the [`RECORD_FILE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// Names written back to back with no separator.
    #[default]
    Concatenated,
    /// One name per line, newline terminated.
    Lines,
}

/// What a failed layer deletion means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrunePolicy {
    /// Log a warning and keep going; the run succeeds with the layer left in place.
    #[default]
    Tolerant,
    /// Attempt every layer, then fail with [`DiffError::PruneFailed`].
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    pub policy: PrunePolicy,
    pub record_format: RecordFormat,
}

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Names written to the record file, in emission order.
    pub recorded: Vec<String>,
    /// Names whose files are gone from the tree.
    pub removed: Vec<String>,
    pub warnings: Vec<PruneWarning>,
    pub record_path: PathBuf,
}

/// Returns the layers of `layers_old` that also appear in `layers_new`, in `layers_old` order.
pub fn intersect(layers_old: &[LayerId], layers_new: &[LayerId]) -> Vec<LayerId> {
    let new_set: HashSet<&str> = layers_new.iter().map(String::as_str).collect();
    layers_old
        .iter()
        .filter(|layer| new_set.contains(layer.as_str()))
        .cloned()
        .collect()
}

/// Returns the layers of `layers_new` that are not in `shared`, in `layers_new` order.
pub fn unique_layers(layers_new: &[LayerId], shared: &[LayerId]) -> Vec<LayerId> {
    let shared_set: HashSet<&str> = shared.iter().map(String::as_str).collect();
    layers_new
        .iter()
        .filter(|layer| !shared_set.contains(layer.as_str()))
        .cloned()
        .collect()
}

/// Where a layer lives inside the image root, and the name it is recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerLocation {
    pub relative_path: PathBuf,
    pub name: String,
}

/// Resolves a manifest layer id to the path that holds it.
///
/// `<dir>/layer.tar` resolves to `<dir>`; anything else (e.g. `blobs/sha256/<hash>`)
/// resolves to the path itself. Returns `None` for ids that would leave the image root.
pub fn locate_layer(layer_id: &str) -> Option<LayerLocation> {
    let trimmed = layer_id
        .strip_suffix(&format!("/{}", LAYER_PAYLOAD))
        .unwrap_or(layer_id);

    let mut relative_path = PathBuf::new();
    for comp in Path::new(trimmed).components() {
        match comp {
            Component::Normal(c) => relative_path.push(c),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let name = relative_path.file_name()?.to_string_lossy().to_string();
    Some(LayerLocation {
        relative_path,
        name,
    })
}

fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Deletes every shared layer from `new_image_root` and writes the [`RECORD_FILE`].
///
/// Only failing to create the record file is fatal under [`PrunePolicy::Tolerant`].
pub fn prune(
    new_image_root: &Path,
    shared: &[LayerId],
    options: &PruneOptions,
) -> DiffResult<PruneReport> {
    let record_path = new_image_root.join(RECORD_FILE);
    let mut record = File::create(&record_path).map_err(|source| DiffError::RecordWrite {
        path: record_path.clone(),
        source,
    })?;

    let mut report = PruneReport {
        record_path: record_path.clone(),
        ..PruneReport::default()
    };

    for layer_id in shared {
        let Some(location) = locate_layer(layer_id) else {
            log::warn!("Refusing to prune layer outside image root: {}", layer_id);
            report.warnings.push(PruneWarning {
                layer: layer_id.clone(),
                path: PathBuf::from(layer_id),
                reason: "layer path escapes the image root".to_string(),
            });
            continue;
        };

        let target = new_image_root.join(&location.relative_path);
        match remove_path(&target) {
            Ok(()) => {
                log::info!("Shared layer {} deleted", location.name);
                report.removed.push(location.name.clone());
            }
            Err(e) => {
                log::warn!("Error deleting layer {}: {}", location.name, e);
                report.warnings.push(PruneWarning {
                    layer: layer_id.clone(),
                    path: target,
                    reason: e.to_string(),
                });
            }
        }

        let entry = match options.record_format {
            RecordFormat::Concatenated => location.name.clone(),
            RecordFormat::Lines => format!("{}\n", location.name),
        };
        if let Err(e) = record.write_all(entry.as_bytes()) {
            log::warn!(
                "Error writing {} to {}: {}",
                location.name,
                record_path.display(),
                e
            );
        }
        report.recorded.push(location.name);
    }

    if let Err(e) = record.flush() {
        log::warn!("Error flushing {}: {}", record_path.display(), e);
    }

    if options.policy == PrunePolicy::Strict && !report.warnings.is_empty() {
        return Err(DiffError::PruneFailed {
            failures: report.warnings,
        });
    }

    Ok(report)
}
