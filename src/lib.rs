pub mod error;
pub mod extracted_image;
pub mod layers;
pub mod manifest;
pub mod naming;
pub mod notifier;
pub mod packager;
pub mod processor;
pub mod sources;
pub mod tar_extractor;
pub mod workspace;

// Re-exports for easy access
pub use error::{DiffError, DiffResult, PruneWarning};
pub use extracted_image::ExtractedImage;
pub use layers::{intersect, prune, PruneOptions, PrunePolicy, PruneReport, RecordFormat};
pub use manifest::{read_layers, LayerId};
pub use naming::{diff_archive_name, ImageReference};
pub use notifier::Notifier;
pub use packager::{package_directory, PackOptions, PackStats};
pub use processor::{DiffOptions, DiffProcessor, DiffSummary};
pub use sources::DockerSource;
pub use sources::NerdctlSource;
pub use sources::Source;
