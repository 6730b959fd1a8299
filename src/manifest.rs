//! Reading the layer list out of an image `manifest.json`.
//!
//! `docker save` writes the manifest as a JSON array of records. Only the first record is
//! authoritative here; its `Layers` field is returned in declared (base → top) order.

use crate::error::{DiffError, DiffResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// File name of the manifest at the root of an extracted image.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A layer path as declared in the manifest, e.g. `"<hash>/layer.tar"`.
pub type LayerId = String;

/// One manifest record. Keys other than `Layers` (`Config`, `RepoTags`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Layers", default)]
    pub layers: Vec<LayerId>,
}

/// Parses manifest text into its record sequence.
pub fn parse_manifests(content: &str) -> serde_json::Result<Vec<Manifest>> {
    serde_json::from_str(content)
}

/// Returns the `Layers` of the first manifest record in `manifest_path`.
pub fn read_layers(manifest_path: &Path) -> DiffResult<Vec<LayerId>> {
    let content = fs::read_to_string(manifest_path).map_err(|source| DiffError::ManifestRead {
        path: manifest_path.to_path_buf(),
        source,
    })?;

    let manifests = parse_manifests(&content).map_err(|source| DiffError::ManifestParse {
        path: manifest_path.to_path_buf(),
        source,
    })?;

    let first = manifests
        .into_iter()
        .next()
        .ok_or_else(|| DiffError::ManifestEmpty {
            path: manifest_path.to_path_buf(),
        })?;

    log::debug!(
        "Read {} layers from {}",
        first.layers.len(),
        manifest_path.display()
    );

    Ok(first.layers)
}
