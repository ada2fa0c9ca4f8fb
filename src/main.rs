use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::time::Instant;

mod pipeline;
mod reader;

use merger_common::MovieConfig;
use reader::SnapshotReader;

/// Renders galaxy-merger snapshots into surface-density frames and encodes them as a movie
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional path to a config.toml overriding the built-in settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List the particle groups and datasets of one snapshot, then exit
    #[arg(long, value_name = "SNAPSHOT_INDEX")]
    inspect: Option<u32>,

    /// Render the frames but do not encode the movie
    #[arg(long)]
    skip_encode: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Galaxy Merger Movie...");

    // --- Load Configuration ---
    let config = MovieConfig::load_or_default(args.config.as_deref())?;
    match &args.config {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("Using built-in configuration."),
    }

    // --- Explore a snapshot file ---
    if let Some(index) = args.inspect {
        let reader = SnapshotReader::new(&config);
        info!("Contents of {}:", config.input.snapshot_path(index).display());
        for (group, members) in reader.describe(index)? {
            info!("  {}: {}", group, members.join(", "));
        }
        return Ok(());
    }

    let start_time = Instant::now();
    let summary = pipeline::run(&config, args.skip_encode)?;

    if let Some(summary) = summary {
        info!(
            "Encoded {} frames of {}x{} ({:.2} s at {} fps)",
            summary.frame_count,
            summary.width,
            summary.height,
            summary.duration_secs(),
            summary.fps
        );
        info!("The output video is {}", config.video.output.display());
    }
    info!("Finished in {:.2?}.", start_time.elapsed());
    Ok(())
}
