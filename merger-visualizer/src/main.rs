use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use merger_common::MovieConfig;
use merger_visualizer::{encode_video, VideoSettings};
use std::path::PathBuf;
use std::time::Instant;

/// Encodes an existing directory of rendered frames into the movie
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional path to a config.toml overriding the built-in settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the frame images (defaults to render.output_dir)
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Number of frames to encode (defaults to one per configured snapshot)
    #[arg(long)]
    frames: Option<usize>,

    /// Output video file path (.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frames per second for the output video
    #[arg(long)]
    fps: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    let mut config = MovieConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.frames_dir {
        config.render.output_dir = dir;
    }
    if let Some(output) = args.output {
        config.video.output = output;
    }
    if let Some(fps) = args.fps {
        config.video.fps = fps;
    }
    config.validate()?;

    let frame_count = args.frames.unwrap_or_else(|| config.input.frame_count());
    let frames = config.render.frame_paths(frame_count);

    info!("Starting frame encoder...");
    info!("Frames: {} from {}", frame_count, config.render.output_dir.display());
    info!("Output video: {}", config.video.output.display());

    let start_time = Instant::now();
    let summary = encode_video(&frames, &config.video.output, &VideoSettings::from_config(&config.video))?;

    info!(
        "Wrote {} frames ({:.2} s at {} fps) in {:.2?}",
        summary.frame_count,
        summary.duration_secs(),
        summary.fps,
        start_time.elapsed()
    );
    info!("The output video is {}", config.video.output.display());
    Ok(())
}
