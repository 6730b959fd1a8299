//! Packaging a directory tree into a gzip-compressed tar archive.
//!
//! The walk is depth-first in file-name order, so two runs over the same tree produce
//! the same entry sequence. Entry paths are relative to the packaged root and the root
//! itself is never emitted.

use crate::error::{DiffError, DiffResult};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tar_rs as tar;
use walkdir::WalkDir;

/// Suffix of every archive written by [`package_directory`].
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Clone, Copy, Default)]
pub struct PackOptions {
    /// Normalise owners and timestamps in tar headers and zero the gzip mtime.
    pub reproducible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackStats {
    pub directories: u64,
    pub files: u64,
    pub symlinks: u64,
    pub bytes: u64,
}

impl PackStats {
    pub fn entries(&self) -> u64 {
        self.directories + self.files + self.symlinks
    }
}

/// Writes every entry under `source_root` into a new archive at `output_path`.
///
/// `output_path` must not exist yet. On a packaging error the partial archive is left
/// on disk for the caller to inspect or delete.
pub fn package_directory(
    source_root: &Path,
    output_path: &Path,
    options: &PackOptions,
) -> DiffResult<PackStats> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_path)
        .map_err(|source| DiffError::ArchiveCreate {
            path: output_path.to_path_buf(),
            source,
        })?;

    let encoder = if options.reproducible {
        GzBuilder::new()
            .mtime(0)
            .write(file, Compression::default())
    } else {
        GzEncoder::new(file, Compression::default())
    };

    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    if options.reproducible {
        builder.mode(tar::HeaderMode::Deterministic);
    }

    // Dropping the builder on the error path still finishes both writers.
    let packed = append_tree(&mut builder, source_root, output_path)
        .and_then(|stats| finish(builder).map(|()| stats));

    packed.map_err(|source| DiffError::ArchivePackaging {
        path: source_root.to_path_buf(),
        source,
    })
}

fn finish(builder: tar::Builder<GzEncoder<File>>) -> io::Result<()> {
    let encoder = builder.into_inner()?;
    let mut file = encoder.finish()?;
    file.flush()?;
    file.sync_all()
}

fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    source_root: &Path,
    output_path: &Path,
) -> io::Result<PackStats> {
    let mut stats = PackStats::default();

    for entry in WalkDir::new(source_root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if entry.depth() == 0 || entry.path() == output_path {
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(source_root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        log::trace!("Adding {} to archive", relative_path.display());
        builder.append_path_with_name(entry.path(), relative_path)?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            stats.directories += 1;
        } else if file_type.is_symlink() {
            stats.symlinks += 1;
        } else {
            stats.files += 1;
            stats.bytes += entry.metadata().map_err(io::Error::from)?.len();
        }
    }

    Ok(stats)
}
