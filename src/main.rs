use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use env_logger::Env;
use log::debug;
use std::path::PathBuf;

use layerdiff::notifier::VerbosityLevel;
use layerdiff::{
    DiffError, DiffOptions, DiffProcessor, DiffSummary, DockerSource, NerdctlSource, Notifier,
    PackOptions, PruneOptions, PrunePolicy, RecordFormat, Source,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Engine {
    Docker,
    Nerdctl,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum RecordLayout {
    /// Layer names back to back, no separator
    Concatenated,
    /// One layer name per line
    Lines,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Old image reference (e.g., repo/app:v1)")]
    old_image: Option<String>,

    #[arg(help = "New image reference (e.g., repo/app:v2)")]
    new_image: Option<String>,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "docker",
        env = "LAYERDIFF_ENGINE",
        help = "Container engine used to pull and save images"
    )]
    engine: Engine,

    #[arg(
        short,
        long,
        default_value = ".",
        env = "LAYERDIFF_OUTPUT_DIR",
        help = "Directory receiving the diff archive"
    )]
    output_dir: PathBuf,

    #[arg(
        short,
        long,
        default_value = ".",
        env = "LAYERDIFF_WORK_DIR",
        help = "Directory holding the per-run scratch directory"
    )]
    work_dir: PathBuf,

    #[arg(
        long,
        value_enum,
        default_value = "concatenated",
        help = "Layout of the existlayers record"
    )]
    record_format: RecordLayout,

    #[arg(long, help = "Fail the run if any shared layer cannot be deleted")]
    strict_prune: bool,

    #[arg(long, help = "Normalise archive headers so identical trees give identical bytes")]
    reproducible: bool,

    #[arg(long, help = "Keep the scratch directory after the run")]
    keep_scratch: bool,

    #[arg(
        long,
        help = "Save images already held by the engine instead of pulling them first"
    )]
    no_pull: bool,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

impl Cli {
    fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            output_dir: self.output_dir.clone(),
            work_dir: self.work_dir.clone(),
            prune: PruneOptions {
                policy: if self.strict_prune {
                    PrunePolicy::Strict
                } else {
                    PrunePolicy::Tolerant
                },
                record_format: match self.record_format {
                    RecordLayout::Concatenated => RecordFormat::Concatenated,
                    RecordLayout::Lines => RecordFormat::Lines,
                },
            },
            pack: PackOptions {
                reproducible: self.reproducible,
            },
            keep_scratch: self.keep_scratch,
            pull: !self.no_pull,
        }
    }
}

fn run<S: Source>(source: S, cli: &Cli, old_image: &str, new_image: &str) -> Result<()> {
    let notifier = Notifier::new(cli.verbose);
    let processor = DiffProcessor::new(source, notifier, cli.diff_options());

    println!("Old image: {}", old_image);
    println!("New image: {}", new_image);

    let summary = processor.diff(old_image, new_image)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &DiffSummary) {
    println!(
        "Shared layers: {} (removed {})",
        summary.shared_layers.len(),
        summary.removed_layers.len()
    );
    for warning in &summary.warnings {
        println!("Not removed: {}", warning);
    }
    println!("New layers: {}", summary.unique_layers.len());
    if let Some(scratch_dir) = &summary.scratch_dir {
        println!("Scratch directory kept at: {}", scratch_dir.display());
    }
    println!("Save diff layers to: {}", summary.archive_path.display());
    println!("Done");
}

fn engine_missing(err: &DiffError) -> bool {
    matches!(err, DiffError::EngineUnavailable { .. })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(VerbosityLevel::from(cli.verbose).to_log_level())
        .init();

    let (Some(old_image), Some(new_image)) = (cli.old_image.clone(), cli.new_image.clone())
    else {
        Cli::command().print_help()?;
        return Ok(());
    };

    debug!("Engine: {:?}", cli.engine);
    debug!("Output directory: {}", cli.output_dir.display());
    debug!("Work directory: {}", cli.work_dir.display());

    match cli.engine {
        Engine::Docker => match DockerSource::new() {
            Ok(source) => run(source, &cli, &old_image, &new_image),
            Err(e) if engine_missing(&e) => {
                println!("Docker is not installed. Please install Docker before running this program. ({e})");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Engine::Nerdctl => match NerdctlSource::new() {
            Ok(source) => run(source, &cli, &old_image, &new_image),
            Err(e) if engine_missing(&e) => {
                println!("nerdctl is not installed. Please install nerdctl before running this program. ({e})");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
    }
}
