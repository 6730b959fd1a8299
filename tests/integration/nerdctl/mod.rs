//! Nerdctl integration tests
//!
//! Same checks as the docker tests, through the nerdctl CLI.

#[cfg(all(test, feature = "nerdctl"))]
mod tests {
    use crate::integration::common::*;
    use layerdiff::notifier::Notifier;
    use layerdiff::sources::{NerdctlSource, Source};
    use layerdiff::DiffError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_nerdctl_source_creation() {
        let nerdctl_source = NerdctlSource::new();
        assert!(
            nerdctl_source.is_ok(),
            "Should be able to create NerdctlSource"
        );
        assert_eq!(nerdctl_source.unwrap().name(), "nerdctl");
    }

    #[test]
    fn test_nerdctl_pull_and_save_hello_world() {
        let nerdctl_source = NerdctlSource::new().expect("Should create NerdctlSource");
        let notifier = Notifier::new(0);
        let downloads = TempDir::new().unwrap();

        let tarball = nerdctl_source
            .get_image_tarball(TEST_IMAGES[0], downloads.path(), true, &notifier)
            .expect("Should pull and save image");

        assert!(fs::metadata(&tarball).unwrap().len() > 0);
    }

    #[test]
    fn test_nerdctl_nonexistent_image() {
        let nerdctl_source = NerdctlSource::new().expect("Should create NerdctlSource");
        let notifier = Notifier::new(0);
        let downloads = TempDir::new().unwrap();

        let err = nerdctl_source
            .get_image_tarball(NONEXISTENT_IMAGE, downloads.path(), true, &notifier)
            .unwrap_err();
        assert!(matches!(err, DiffError::EngineInvocation { .. }));
    }
}
