use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use merger_common::VideoConfig;
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Encoder settings for the output movie
#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub fps: u32,
    pub bitrate_bps: u32,
    /// Track name stored in the MP4 container.
    pub description: String,
}

impl VideoSettings {
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            fps: config.fps,
            bitrate_bps: config.bitrate_bps,
            description: String::from("Galaxy merger stellar surface density"),
        }
    }
}

/// What was written to the movie file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSummary {
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoSummary {
    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps as f64
    }
}

/// Converts a frame to planar YUV 4:2:0 with BT.601 coefficients.
///
/// Each chroma sample is the mean over its 2x2 block of pixels.
pub fn rgb_to_yuv420(image: &RgbImage) -> Vec<u8> {
    let width = image.width() as usize;
    let chroma_w = (width + 1) / 2;
    let chroma_len = chroma_w * ((image.height() as usize + 1) / 2);

    let mut yuv = Vec::with_capacity(width * image.height() as usize + 2 * chroma_len);
    let mut u_sums = vec![0f32; chroma_len];
    let mut v_sums = vec![0f32; chroma_len];
    let mut samples = vec![0u8; chroma_len];

    for (x, y, &Rgb([r, g, b])) in image.enumerate_pixels() {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        yuv.push((0.299 * r + 0.587 * g + 0.114 * b).round() as u8);

        let block = (y as usize / 2) * chroma_w + x as usize / 2;
        u_sums[block] += -0.169 * r - 0.331 * g + 0.5 * b;
        v_sums[block] += 0.5 * r - 0.419 * g - 0.081 * b;
        samples[block] += 1;
    }

    for sums in [&u_sums, &v_sums] {
        yuv.extend(
            sums.iter()
                .zip(&samples)
                .map(|(sum, &n)| (sum / n as f32 + 128.0).round() as u8),
        );
    }
    yuv
}

fn read_frame(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to read frame image: {}", path.display()))?;
    Ok(image.to_rgb8())
}

/// Encodes the frame images, in list order, into an H.264 MP4 file.
///
/// The movie takes its size from the first frame; every other frame must match it.
/// The summary counts only frames the encoder emitted data for.
pub fn encode_video(frames: &[PathBuf], output: &Path, settings: &VideoSettings) -> Result<VideoSummary> {
    let first_path = frames.first().context("No frame images to encode")?;
    let first = read_frame(first_path)?;
    let (width, height) = first.dimensions();
    if width % 2 != 0 || height % 2 != 0 {
        anyhow::bail!(
            "Frame {} is {}x{}; H.264 needs even dimensions.",
            first_path.display(),
            width,
            height
        );
    }
    info!("Encoding {} frames of {}x{} at {} fps", frames.len(), width, height, settings.fps);

    let mut encoder = Encoder::with_api_config(
        OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(settings.fps as f32))
            .bitrate(BitRate::from_bps(settings.bitrate_bps)),
    )
    .context("Failed to initialize H.264 encoder")?;

    let progress = ProgressBar::new(frames.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]")?
            .progress_chars("#>-"),
    );

    // Collected H.264 bitstream of all frames
    let mut h264_data = Vec::new();
    let mut frame_count = 0;

    for (index, path) in frames.iter().enumerate() {
        let image = if index == 0 { first.clone() } else { read_frame(path)? };
        if image.dimensions() != (width, height) {
            anyhow::bail!(
                "Frame {} is {}x{}, expected {}x{} like the first frame.",
                path.display(),
                image.width(),
                image.height(),
                width,
                height
            );
        }

        let yuv_source = YUVBuffer::from_vec(rgb_to_yuv420(&image), width as usize, height as usize);
        let bitstream = encoder
            .encode(&yuv_source)
            .with_context(|| format!("Failed to encode frame {}", path.display()))?;
        let written = h264_data.len();
        bitstream.write_vec(&mut h264_data);
        if h264_data.len() > written {
            frame_count += 1;
            debug!("Encoded {}", path.display());
        } else {
            warn!("Encoder skipped frame {}", path.display());
        }
        progress.inc(1);
    }
    progress.finish_with_message(format!("Encoded {} frames", frame_count));

    // Wrap the bitstream in an MP4 container
    let mut video_buffer = Cursor::new(Vec::new());
    {
        let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
        mp4muxer.init_video(width as i32, height as i32, false, &settings.description);
        mp4muxer.write_video_with_fps(&h264_data, settings.fps);
        mp4muxer.close();
    }

    fs::write(output, video_buffer.into_inner())
        .with_context(|| format!("Failed to write video file to {}", output.display()))?;

    Ok(VideoSummary { frame_count, width, height, fps: settings.fps })
}
