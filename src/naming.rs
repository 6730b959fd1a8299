use crate::error::{DiffError, DiffResult};
use crate::packager::ARCHIVE_SUFFIX;
use std::fmt;

/// Number of digest hex characters used in place of a tag.
const SHORT_DIGEST_LEN: usize = 12;

/// An image reference split into repository and tag.
///
/// The tag is the text after the last `:` of the final path segment, so a registry
/// port (`localhost:5000/app:v1`) stays part of the repository. Digest references
/// (`app@sha256:<hex>`) use the short digest as their tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn parse(reference: &str) -> DiffResult<Self> {
        let invalid = |reason: &str| DiffError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (repository, tag) = if let Some((repository, digest)) = reference.split_once('@') {
            let tag = short_digest(digest).ok_or_else(|| invalid("malformed digest"))?;
            (repository, tag)
        } else {
            let name_start = reference.rfind('/').map_or(0, |i| i + 1);
            let tag_sep = reference[name_start..]
                .rfind(':')
                .map(|i| name_start + i)
                .ok_or_else(|| invalid("missing ':' tag separator"))?;
            (&reference[..tag_sep], &reference[tag_sep + 1..])
        };

        if repository.is_empty() {
            return Err(invalid("empty repository"));
        }
        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// First hex characters of `[<algorithm>:]<hex>`, or `None` unless the hex part is
/// non-empty ASCII hex.
fn short_digest(digest: &str) -> Option<&str> {
    let hex = digest.split_once(':').map_or(digest, |(_, hex)| hex);
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(&hex[..hex.len().min(SHORT_DIGEST_LEN)])
}

/// Derives `<new repo with / as _>__<old tag>__<new tag>__diff.tar.gz`.
pub fn diff_archive_name(old_image: &str, new_image: &str) -> DiffResult<String> {
    let old = ImageReference::parse(old_image)?;
    let new = ImageReference::parse(new_image)?;

    Ok(format!(
        "{}__{}__{}__diff{}",
        new.repository.replace('/', "_"),
        old.tag,
        new.tag,
        ARCHIVE_SUFFIX
    ))
}
