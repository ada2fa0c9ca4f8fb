use crate::reader::SnapshotReader;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use merger_common::MovieConfig;
use merger_visualizer::{encode_video, save_frame, FrameRenderer, VideoSettings, VideoSummary};
use std::fs;
use std::path::PathBuf;

/// Reads every configured snapshot in index order and writes one frame image per snapshot.
///
/// Returns the frame paths in the order they must be encoded. Any failure stops the loop.
pub fn render_frames(config: &MovieConfig, reader: &SnapshotReader, renderer: &FrameRenderer) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.render.output_dir).with_context(|| {
        format!("Failed to create frame directory: {}", config.render.output_dir.display())
    })?;

    let frame_count = config.input.frame_count();
    let progress = ProgressBar::new(frame_count as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")?
            .progress_chars("#>-"),
    );

    let mut frames = Vec::with_capacity(frame_count);
    for (frame_index, snapshot_index) in config.input.snapshot_indices().enumerate() {
        debug!("Opening snapshot {}", snapshot_index);
        let particles = reader.read(snapshot_index)?;

        let image = renderer.render_snapshot(&particles);
        let path = config.render.frame_path(frame_index);
        save_frame(&image, &path)?;
        debug!("Frame {} ({} particles) -> {}", frame_index, particles.len(), path.display());

        frames.push(path);
        progress.inc(1);
    }
    progress.finish_with_message(format!("Rendered {} frames", frames.len()));

    Ok(frames)
}

/// Runs the whole pipeline: render all frames, then encode them unless `skip_encode` is set.
pub fn run(config: &MovieConfig, skip_encode: bool) -> Result<Option<VideoSummary>> {
    let reader = SnapshotReader::new(config);
    let renderer = FrameRenderer::new(config)?;

    info!(
        "Rendering {} frames from {} into {}",
        config.input.frame_count(),
        config.input.data_dir.display(),
        config.render.output_dir.display()
    );
    let frames = render_frames(config, &reader, &renderer)?;

    if skip_encode {
        info!("Skipping video encoding; {} frames are in {}", frames.len(), config.render.output_dir.display());
        return Ok(None);
    }

    let summary = encode_video(&frames, &config.video.output, &VideoSettings::from_config(&config.video))?;
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::fixtures::*;

    fn small_config(dir: &std::path::Path) -> MovieConfig {
        let mut config = config_in(dir);
        config.input.last_snapshot = 4;
        config.render.width = 160;
        config.render.height = 120;
        config
    }

    fn write_series(config: &MovieConfig) {
        for index in config.input.snapshot_indices() {
            let mut groups = disk_and_bulge();
            if index > 0 {
                groups.push(new_stars(index as usize));
            }
            write_snapshot(config, index, &groups);
        }
    }

    #[test]
    fn renders_one_frame_per_snapshot_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        write_series(&config);

        let reader = SnapshotReader::new(&config);
        let renderer = FrameRenderer::new(&config).unwrap();
        let frames = render_frames(&config, &reader, &renderer).unwrap();

        assert_eq!(frames, config.render.frame_paths(3));
        for path in &frames {
            let image = image::open(path).unwrap();
            assert_eq!((image.width(), image.height()), (160, 120));
        }
    }

    #[test]
    fn rerendering_gives_identical_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        write_series(&config);

        let reader = SnapshotReader::new(&config);
        let renderer = FrameRenderer::new(&config).unwrap();
        let first: Vec<Vec<u8>> = render_frames(&config, &reader, &renderer)
            .unwrap()
            .iter()
            .map(|p| fs::read(p).unwrap())
            .collect();
        let second: Vec<Vec<u8>> = render_frames(&config, &reader, &renderer)
            .unwrap()
            .iter()
            .map(|p| fs::read(p).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn full_run_writes_movie() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        write_series(&config);

        let summary = run(&config, false).unwrap().unwrap();
        assert_eq!(summary.frame_count, 3);
        assert_eq!((summary.width, summary.height), (160, 120));
        assert!((summary.duration_secs() - 3.0 / 20.0).abs() < 1e-12);
        assert!(config.video.output.exists());
    }

    #[test]
    fn missing_snapshot_halts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        write_series(&config);
        fs::remove_file(config.input.snapshot_path(2)).unwrap();

        assert!(run(&config, true).is_err());
        assert!(config.render.frame_path(0).exists());
        assert!(!config.render.frame_path(1).exists());
    }
}
