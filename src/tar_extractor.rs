use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar_rs as tar;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Normalizes a path from a tar archive so it stays inside the extraction root
fn normalize_tar_path(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    out
}

fn is_gzip(tar_path: &Path) -> Result<bool> {
    let file = File::open(tar_path)
        .with_context(|| format!("Failed to open tar file: {}", tar_path.display()))?;
    let mut magic_bytes = [0u8; 2];
    BufReader::new(file)
        .read_exact(&mut magic_bytes)
        .context("Failed to read magic bytes from tar file")?;
    Ok(magic_bytes == GZIP_MAGIC)
}

fn link_or_copy(target: &Path, dest: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!("hardlink target missing: {}", target.display()));
    }
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest)
            .with_context(|| format!("Failed to remove existing file: {}", dest.display()))?;
    }
    if let Err(e) = fs::hard_link(target, dest) {
        log::debug!(
            "hardlink failed ({}), falling back to copy: {} -> {}",
            e,
            target.display(),
            dest.display()
        );
        fs::copy(target, dest)
            .with_context(|| format!("Failed to copy {} to {}", target.display(), dest.display()))?;
    }
    Ok(())
}

/// Extracts an image archive (plain or gzipped) into `extract_dir`.
///
/// Directories, regular files and symlinks are recreated as-is. Hardlinks are
/// resolved after every regular file is on disk. Other entry types are skipped.
pub fn extract_tar(tar_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = File::open(tar_path)
        .with_context(|| format!("Failed to open tar file: {}", tar_path.display()))?;

    let mut archive: tar::Archive<Box<dyn Read>> = if is_gzip(tar_path)? {
        tar::Archive::new(Box::new(GzDecoder::new(file)))
    } else {
        tar::Archive::new(Box::new(file))
    };

    fs::create_dir_all(extract_dir)
        .with_context(|| format!("Failed to create directory: {}", extract_dir.display()))?;

    let mut pending_hardlinks: Vec<(PathBuf, PathBuf)> = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result.context("Failed to read tar entry")?;
        let entry_type = entry.header().entry_type();

        let rel_path = normalize_tar_path(&entry.path().context("Failed to get entry path")?);
        if rel_path.as_os_str().is_empty() {
            continue;
        }
        let dest = extract_dir.join(&rel_path);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            if !parent.is_dir() {
                bail!("Parent path exists but is not a directory: {}", parent.display());
            }
        }

        match entry_type {
            tar::EntryType::Directory => {
                fs::create_dir_all(&dest)
                    .with_context(|| format!("Failed to create directory: {}", dest.display()))?;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                #[cfg(unix)]
                let mode = entry.header().mode().ok();

                log::trace!("Creating file: {}", dest.display());
                let mut out_file = File::create(&dest)
                    .with_context(|| format!("Failed to create file: {}", dest.display()))?;
                std::io::copy(&mut entry, &mut out_file)
                    .with_context(|| format!("Failed to write file: {}", dest.display()))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Some(mode) = mode {
                        // Owner must keep read access so the file can be packaged later
                        let perms = fs::Permissions::from_mode(mode | 0o400);
                        if let Err(e) = fs::set_permissions(&dest, perms) {
                            log::warn!("Failed to set permissions on {}: {}", dest.display(), e);
                        }
                    }
                }
            }
            tar::EntryType::Symlink => {
                let link_name = entry
                    .link_name()
                    .context("Failed to get symlink target")?
                    .ok_or_else(|| anyhow!("Symlink without target: {}", rel_path.display()))?;

                #[cfg(unix)]
                {
                    if fs::symlink_metadata(&dest).is_ok() {
                        fs::remove_file(&dest).ok();
                    }
                    std::os::unix::fs::symlink(&link_name, &dest).with_context(|| {
                        format!(
                            "Failed to create symlink {} -> {}",
                            dest.display(),
                            link_name.display()
                        )
                    })?;
                }

                #[cfg(not(unix))]
                {
                    log::warn!(
                        "Symlink support not implemented on this platform: {} -> {}",
                        dest.display(),
                        link_name.display()
                    );
                }
            }
            tar::EntryType::Link => {
                let link_name = entry
                    .link_name()
                    .context("Failed to get hardlink target")?
                    .ok_or_else(|| anyhow!("Hardlink without target: {}", rel_path.display()))?;
                let target = extract_dir.join(normalize_tar_path(&link_name));
                pending_hardlinks.push((dest, target));
            }
            other => {
                log::debug!("Skipping unsupported entry type: {:?}", other);
            }
        }
    }

    for (dest, target) in pending_hardlinks {
        if let Err(e) = link_or_copy(&target, &dest) {
            log::warn!(
                "Skipping broken hardlink {} -> {}: {}",
                dest.display(),
                target.display(),
                e
            );
        }
    }

    Ok(())
}
