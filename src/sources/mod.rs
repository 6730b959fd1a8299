pub mod docker;
pub mod nerdctl;
pub mod source;

pub use docker::DockerSource;
pub use nerdctl::NerdctlSource;
pub use source::Source;

use crate::error::{DiffError, DiffResult};
use crate::notifier::Notifier;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Fallback tarball stem when the pull output carries no usable id.
const DEFAULT_TARBALL_STEM: &str = "image";

/// A container engine driven through its command line (`docker`, `nerdctl`, ...).
#[derive(Debug, Clone)]
pub(crate) struct EngineCli {
    binary: &'static str,
}

impl EngineCli {
    /// Fails with [`DiffError::EngineUnavailable`] unless `<binary> --version` succeeds.
    pub(crate) fn detect(binary: &'static str) -> DiffResult<Self> {
        let output = Command::new(binary)
            .arg("--version")
            .output()
            .map_err(|e| DiffError::EngineUnavailable {
                engine: binary.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DiffError::EngineUnavailable {
                engine: binary.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(Self { binary })
    }

    pub(crate) fn binary(&self) -> &'static str {
        self.binary
    }

    /// Runs the engine and returns stdout followed by stderr.
    fn run(&self, args: &[&str]) -> DiffResult<String> {
        let command = args.join(" ");
        let output = Command::new(self.binary).args(args).output().map_err(|e| {
            DiffError::EngineInvocation {
                engine: self.binary.to_string(),
                command: command.clone(),
                output: e.to_string(),
            }
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(DiffError::EngineInvocation {
                engine: self.binary.to_string(),
                command,
                output: combined.trim().to_string(),
            });
        }

        Ok(combined)
    }

    /// Saves `image_name` as `<dest_dir>/<id>.tar`, pulling it first when `pull` is set.
    ///
    /// Without a pull the image must already be held by the engine and the tarball is
    /// named `image.tar`.
    pub(crate) fn save_image(
        &self,
        image_name: &str,
        dest_dir: &Path,
        pull: bool,
        notifier: &Notifier,
    ) -> DiffResult<PathBuf> {
        let pull_output = if pull {
            notifier.info(&format!("Pulling {} with {}...", image_name, self.binary));
            Some(self.run(&["pull", image_name])?)
        } else {
            notifier.debug(&format!("Using local copy of {}", image_name));
            None
        };
        let stem = tarball_stem(pull_output.as_deref());

        fs::create_dir_all(dest_dir).map_err(|source| DiffError::Workspace {
            path: dest_dir.to_path_buf(),
            source,
        })?;
        let tarball_path = dest_dir.join(format!("{}.tar", stem));
        let tarball_arg = tarball_path.to_string_lossy().to_string();

        notifier.info(&format!("Saving {} to tarball...", image_name));
        notifier.debug(&format!("Tarball path: {}", tarball_path.display()));
        self.run(&["save", "-o", &tarball_arg, image_name])?;

        Ok(tarball_path)
    }
}

/// File stem for the saved tarball: the sanitised pull-output id, or `image`.
fn tarball_stem(pull_output: Option<&str>) -> String {
    pull_output
        .and_then(image_id_from_pull_output)
        .map(|id| sanitize_file_stem(&id))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_TARBALL_STEM.to_string())
}

/// Third whitespace-separated token of the first line of `<engine> pull` output.
pub fn image_id_from_pull_output(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .nth(2)
        .map(|token| token.to_string())
}

/// Replaces characters that cannot appear in a single path segment.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
