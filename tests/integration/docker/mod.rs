//! Docker integration tests
//!
//! Pull and save real images through the docker CLI.

#[cfg(all(test, feature = "docker"))]
mod tests {
    use crate::integration::common::*;
    use layerdiff::notifier::Notifier;
    use layerdiff::sources::{DockerSource, Source};
    use layerdiff::{DiffError, ExtractedImage};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_docker_source_creation() {
        let docker_source = DockerSource::new();
        assert!(
            docker_source.is_ok(),
            "Should be able to create DockerSource"
        );
        assert_eq!(docker_source.unwrap().name(), "docker");
    }

    #[test]
    fn test_docker_pull_and_save() {
        let docker_source = DockerSource::new().expect("Should create DockerSource");
        let notifier = Notifier::new(0);
        let downloads = TempDir::new().unwrap();

        for image_name in TEST_IMAGES {
            let tarball = docker_source
                .get_image_tarball(image_name, downloads.path(), true, &notifier)
                .expect("Should pull and save image");

            assert!(tarball.starts_with(downloads.path()));
            assert!(fs::metadata(&tarball).unwrap().len() > 0);

            let extracted = TempDir::new().unwrap();
            let image = ExtractedImage::from_tarball(&tarball, extracted.path(), &notifier)
                .expect("Saved image should extract");
            assert!(!image.layers().is_empty());
        }
    }

    #[test]
    fn test_docker_save_without_pull() {
        let docker_source = DockerSource::new().expect("Should create DockerSource");
        let notifier = Notifier::new(0);
        let downloads = TempDir::new().unwrap();

        docker_source
            .get_image_tarball(TEST_IMAGES[0], downloads.path(), true, &notifier)
            .expect("Should pull the image once");

        let local = TempDir::new().unwrap();
        let tarball = docker_source
            .get_image_tarball(TEST_IMAGES[0], local.path(), false, &notifier)
            .expect("Should save the local copy");
        assert_eq!(tarball, local.path().join("image.tar"));
        assert!(fs::metadata(&tarball).unwrap().len() > 0);
    }

    #[test]
    fn test_docker_nonexistent_image() {
        let docker_source = DockerSource::new().expect("Should create DockerSource");
        let notifier = Notifier::new(0);
        let downloads = TempDir::new().unwrap();

        let err = docker_source
            .get_image_tarball(NONEXISTENT_IMAGE, downloads.path(), true, &notifier)
            .unwrap_err();
        assert!(matches!(err, DiffError::EngineInvocation { .. }));
    }
}
