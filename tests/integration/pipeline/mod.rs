//! End-to-end pipeline tests
//!
//! Images are served by `MockSource` from tarballs written on the fly, so these run
//! without a container engine.

#[cfg(test)]
mod tests {
    use crate::integration::common::*;
    use layerdiff::layers::RECORD_FILE;
    use layerdiff::{
        DiffError, DiffOptions, DiffProcessor, Notifier, PackOptions, PruneOptions, RecordFormat,
    };
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const OLD: &str = "repo/img:v1";
    const NEW: &str = "repo/img:v2";

    struct Fixture {
        _images: TempDir,
        output: TempDir,
        work: TempDir,
        source: Option<MockSource>,
    }

    impl Fixture {
        fn new(old_layers: &[&str], new_layers: &[&str]) -> Self {
            let images = TempDir::new().unwrap();
            let old_tar = images.path().join("old.tar");
            let new_tar = images.path().join("new.tar");
            write_image_tarball(&old_tar, OLD, old_layers);
            write_image_tarball(&new_tar, NEW, new_layers);

            let source = MockSource::new()
                .with_image(OLD, &old_tar)
                .with_image(NEW, &new_tar);

            Self {
                _images: images,
                output: TempDir::new().unwrap(),
                work: TempDir::new().unwrap(),
                source: Some(source),
            }
        }

        fn options(&self) -> DiffOptions {
            DiffOptions {
                output_dir: self.output.path().to_path_buf(),
                work_dir: self.work.path().to_path_buf(),
                ..DiffOptions::default()
            }
        }

        fn processor(&mut self, options: DiffOptions) -> DiffProcessor<MockSource> {
            DiffProcessor::new(self.source.take().unwrap(), Notifier::new(0), options)
        }
    }

    fn scratch_entries(work: &Path) -> usize {
        fs::read_dir(work).unwrap().count()
    }

    #[test]
    fn test_diff_keeps_only_new_layers() {
        let mut fixture = Fixture::new(&["l1", "l2", "l3"], &["l1", "l2", "l4"]);
        let options = fixture.options();
        let processor = fixture.processor(options);

        let summary = processor.diff(OLD, NEW).unwrap();

        assert_eq!(summary.shared_layers, vec!["l1/layer.tar", "l2/layer.tar"]);
        assert_eq!(summary.unique_layers, vec!["l4/layer.tar"]);
        assert_eq!(summary.removed_layers, vec!["l1", "l2"]);
        assert!(summary.warnings.is_empty());
        assert_eq!(
            summary.archive_path,
            fixture.output.path().join("repo_img__v1__v2__diff.tar.gz")
        );

        let entries = read_archive(&summary.archive_path);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "existlayers",
                "l4",
                "l4/VERSION",
                "l4/json",
                "l4/layer.tar",
                "manifest.json"
            ]
        );
        assert_eq!(entries[0].1, b"l1l2");
        assert_eq!(entries[4].1, layer_payload(&[("opt/l4.txt", "l4")]));

        assert_eq!(scratch_entries(fixture.work.path()), 0);
    }

    #[test]
    fn test_pull_flag_reaches_source() {
        let mut fixture = Fixture::new(&["l1"], &["l1", "l2"]);
        let fetches = fixture.source.as_ref().unwrap().fetch_log();
        let options = DiffOptions {
            pull: false,
            ..fixture.options()
        };
        let processor = fixture.processor(options);

        let summary = processor.diff(OLD, NEW).unwrap();

        assert_eq!(summary.unique_layers, vec!["l2/layer.tar"]);
        assert_eq!(
            *fetches.borrow(),
            vec![(OLD.to_string(), false), (NEW.to_string(), false)]
        );

        let mut fixture = Fixture::new(&["l1"], &["l1", "l2"]);
        let fetches = fixture.source.as_ref().unwrap().fetch_log();
        let options = fixture.options();
        fixture.processor(options).diff(OLD, NEW).unwrap();
        assert!(fetches.borrow().iter().all(|(_, pull)| *pull));
    }

    #[test]
    fn test_diff_with_no_shared_layers_packages_everything() {
        let mut fixture = Fixture::new(&["a1"], &["b1", "b2"]);
        let options = fixture.options();
        let processor = fixture.processor(options);

        let summary = processor.diff(OLD, NEW).unwrap();

        assert!(summary.shared_layers.is_empty());
        let names = archive_names(&summary.archive_path);
        assert!(names.contains(&"b1/layer.tar".to_string()));
        assert!(names.contains(&"b2/layer.tar".to_string()));
        assert_eq!(names[0], "b1");

        let entries = read_archive(&summary.archive_path);
        let record = entries
            .iter()
            .find(|(name, _)| name == RECORD_FILE)
            .expect("record file is packaged");
        assert!(record.1.is_empty());
    }

    #[test]
    fn test_diff_line_record_format() {
        let mut fixture = Fixture::new(&["l1", "l2"], &["l1", "l2", "l3"]);
        let mut options = fixture.options();
        options.prune = PruneOptions {
            record_format: RecordFormat::Lines,
            ..PruneOptions::default()
        };
        options.keep_scratch = true;
        let processor = fixture.processor(options);

        let summary = processor.diff(OLD, NEW).unwrap();

        let scratch = summary.scratch_dir.clone().unwrap();
        let record = scratch.join("extracted_image_new").join(RECORD_FILE);
        assert_eq!(fs::read_to_string(record).unwrap(), "l1\nl2\n");
        assert!(!scratch.join("extracted_image_new").join("l1").exists());
        assert!(scratch.join("extracted_image_old").join("l1").exists());
    }

    #[test]
    fn test_repeated_runs_produce_same_entries() {
        let mut first = Fixture::new(&["l1", "l2", "l3"], &["l1", "l2", "l4"]);
        let mut second = Fixture::new(&["l1", "l2", "l3"], &["l1", "l2", "l4"]);
        let reproducible = |fixture: &Fixture| DiffOptions {
            pack: PackOptions { reproducible: true },
            ..fixture.options()
        };

        let first_options = reproducible(&first);
        let second_options = reproducible(&second);
        let a = first.processor(first_options).diff(OLD, NEW).unwrap();
        let b = second.processor(second_options).diff(OLD, NEW).unwrap();

        assert_eq!(read_archive(&a.archive_path), read_archive(&b.archive_path));
        assert_eq!(
            fs::read(&a.archive_path).unwrap(),
            fs::read(&b.archive_path).unwrap()
        );
    }

    #[test]
    fn test_invalid_reference_fails_before_pulling() {
        let mut fixture = Fixture::new(&["l1"], &["l1"]);
        let options = fixture.options();
        let processor = fixture.processor(options);

        let err = processor.diff("repo/img", NEW).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::InvalidReference { .. })
        ));
        assert_eq!(scratch_entries(fixture.work.path()), 0);
    }

    #[test]
    fn test_existing_archive_is_not_overwritten() {
        let mut fixture = Fixture::new(&["l1"], &["l1", "l2"]);
        let existing = fixture.output.path().join("repo_img__v1__v2__diff.tar.gz");
        fs::write(&existing, b"previous run").unwrap();
        let options = fixture.options();
        let processor = fixture.processor(options);

        let err = processor.diff(OLD, NEW).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::ArchiveCreate { .. })
        ));
        assert_eq!(fs::read(&existing).unwrap(), b"previous run");
    }

    #[test]
    fn test_engine_failure_cleans_scratch() {
        let mut fixture = Fixture::new(&["l1"], &["l1"]);
        let options = fixture.options();
        let processor = fixture.processor(options);

        let err = processor.diff(OLD, "repo/img:missing").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::EngineInvocation { .. })
        ));
        assert!(format!("{err:#}").contains("new image repo/img:missing"));
        assert_eq!(scratch_entries(fixture.work.path()), 0);
        assert_eq!(scratch_entries(fixture.output.path()), 0);
    }

    #[test]
    fn test_empty_manifest_stops_pipeline() {
        let images = TempDir::new().unwrap();
        let old_tar = images.path().join("old.tar");
        let new_tar = images.path().join("new.tar");
        write_image_tarball(&old_tar, OLD, &["l1"]);
        write_raw_manifest_tarball(&new_tar, "[]");
        let output = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();

        let source = MockSource::new()
            .with_image(OLD, &old_tar)
            .with_image(NEW, &new_tar);
        let processor = DiffProcessor::new(
            source,
            Notifier::new(0),
            DiffOptions {
                output_dir: output.path().to_path_buf(),
                work_dir: work.path().to_path_buf(),
                ..DiffOptions::default()
            },
        );

        let err = processor.diff(OLD, NEW).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiffError>(),
            Some(DiffError::ManifestEmpty { .. })
        ));
        assert_eq!(scratch_entries(work.path()), 0);
        assert_eq!(scratch_entries(output.path()), 0);
    }
}
