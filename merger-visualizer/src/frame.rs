use crate::colormap::{ColorScale, UNDER_COLOR};
use crate::density::DensityGrid;
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::debug;
use merger_common::{MovieConfig, ParticleSet, RenderParams};
use std::fs;
use std::path::Path;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const TICK_LEN: f32 = 5.0;

// DejaVu Sans, see assets/DejaVuSans-LICENSE.txt
static BUNDLED_FONT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/DejaVuSans.ttf"));

/// Loads the label font: the configured TrueType file if one is set, else the bundled one.
pub fn load_font(path: Option<&Path>) -> Result<FontArc> {
    let Some(path) = path else {
        return FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| anyhow::anyhow!("Bundled font is invalid: {}", e));
    };

    let data = fs::read(path)
        .with_context(|| format!("Failed to read font file: {}", path.display()))?;
    let font = FontArc::try_from_vec(data)
        .map_err(|e| anyhow::anyhow!("Invalid font file '{}': {}", path.display(), e))?;
    debug!("Using font {}", path.display());
    Ok(font)
}

/// Pixel geometry of the figure: a square plot area with a colorbar to its right.
#[derive(Debug, Clone, Copy)]
struct Layout {
    left: i32,
    top: i32,
    side: u32,
    cbar_x: i32,
    cbar_w: u32,
    cbar_h: u32,
    tri_h: u32,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        let side = (height as f32 * 0.8).min(width as f32 * 0.6) as u32;
        let tri_h = (side as f32 * 0.05) as u32;
        let left = (width as f32 * 0.125) as i32;
        Layout {
            left,
            top: (height.saturating_sub(side) / 2) as i32,
            side,
            cbar_x: left + side as i32 + (width as f32 * 0.04) as i32,
            cbar_w: ((width as f32 * 0.03) as u32).max(4),
            cbar_h: side - tri_h,
            tri_h,
        }
    }

    fn bottom(&self) -> i32 {
        self.top + self.side as i32
    }

    #[cfg(test)]
    fn right(&self) -> i32 {
        self.left + self.side as i32
    }

    // Data coordinate to pixel, horizontal axis
    fn x_px(&self, v: f64, range: [f64; 2]) -> f32 {
        self.left as f32 + ((v - range[0]) / (range[1] - range[0])) as f32 * self.side as f32
    }

    // Data coordinate to pixel, vertical axis (up is positive)
    fn y_px(&self, v: f64, range: [f64; 2]) -> f32 {
        self.top as f32 + ((range[1] - v) / (range[1] - range[0])) as f32 * self.side as f32
    }

    fn cbar_y_px(&self, v: f64, scale: &ColorScale) -> f32 {
        self.top as f32 + ((scale.vmax - v) / (scale.vmax - scale.vmin)) as f32 * self.cbar_h as f32
    }
}

/// Round tick positions covering `[lo, hi]`, at most `max_ticks` of them.
pub fn ticks(lo: f64, hi: f64, max_ticks: usize) -> Vec<f64> {
    let span = hi - lo;
    if !(span > 0.0) || max_ticks == 0 {
        return Vec::new();
    }
    let magnitude = 10f64.powf((span / max_ticks as f64).log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| span / step <= max_ticks as f64)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step - 1e-9).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn format_tick(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

/// Draws surface-density frames with fixed axes, colour bounds and annotations.
pub struct FrameRenderer {
    params: RenderParams,
    title: String,
    scale: ColorScale,
    font: FontArc,
}

impl FrameRenderer {
    /// Creates a renderer from the configuration, loading the label font.
    pub fn new(config: &MovieConfig) -> Result<Self> {
        let font = load_font(config.render.font_path.as_deref())?;
        Ok(Self::with_font(config.params(), config.render.title.clone(), font))
    }

    pub fn with_font(params: RenderParams, title: String, font: FontArc) -> Self {
        let scale = ColorScale::from_params(&params);
        Self { params, title, scale, font }
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Bins a particle set and draws its frame.
    pub fn render_snapshot(&self, particles: &ParticleSet) -> RgbImage {
        let grid = DensityGrid::from_particles(particles, &self.params);
        debug!(
            "Snapshot {}: {} of {} cells above the resolution floor",
            particles.snapshot_index,
            grid.resolved_cells(&self.params),
            grid.bins() * grid.bins()
        );
        self.render(&grid, particles.snapshot_index)
    }

    /// Draws the frame of a density grid. The time label is taken from `snapshot_index`.
    pub fn render(&self, grid: &DensityGrid, snapshot_index: u32) -> RgbImage {
        let layout = Layout::new(self.params.width, self.params.height);
        let mut canvas = RgbImage::from_pixel(self.params.width, self.params.height, BACKGROUND);

        self.draw_density(&mut canvas, grid, &layout);
        self.draw_colorbar(&mut canvas, &layout);
        self.draw_axes(&mut canvas, &layout);
        self.draw_labels(&mut canvas, &layout, snapshot_index);

        canvas
    }

    fn x_range(&self) -> [f64; 2] {
        self.params.second_axis_range
    }

    // The histogram's first axis is -y, so the displayed y range is its mirror
    fn y_range(&self) -> [f64; 2] {
        [-self.params.first_axis_range[1], -self.params.first_axis_range[0]]
    }

    fn draw_density(&self, canvas: &mut RgbImage, grid: &DensityGrid, layout: &Layout) {
        let bins = grid.bins();
        if bins == 0 || layout.side == 0 {
            return;
        }
        let colors: Vec<Rgb<u8>> = (0..bins * bins)
            .map(|i| self.scale.color(grid.masked_log(i / bins, i % bins, &self.params)))
            .collect();

        let side = layout.side as usize;
        for py in 0..side {
            let row = py * bins / side;
            for px in 0..side {
                let col = px * bins / side;
                let x = layout.left as u32 + px as u32;
                let y = layout.top as u32 + py as u32;
                if x < canvas.width() && y < canvas.height() {
                    canvas.put_pixel(x, y, colors[row * bins + col]);
                }
            }
        }
    }

    fn draw_colorbar(&self, canvas: &mut RgbImage, layout: &Layout) {
        let x0 = layout.cbar_x as f32;
        let x1 = (layout.cbar_x + layout.cbar_w as i32) as f32;

        for dy in 0..layout.cbar_h {
            let value = self.scale.vmax
                - (dy as f64 + 0.5) / layout.cbar_h as f64 * (self.scale.vmax - self.scale.vmin);
            let color = self.scale.color(Some(value));
            let y = (layout.top + dy as i32) as f32;
            draw_line_segment_mut(canvas, (x0, y), (x1 - 1.0, y), color);
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(layout.cbar_x, layout.top).of_size(layout.cbar_w, layout.cbar_h.max(1)),
            INK,
        );

        // Extension triangle below the bar shows the under-range colour
        if layout.tri_h > 0 {
            let base = layout.top + layout.cbar_h as i32;
            let tip = (layout.cbar_x + layout.cbar_w as i32 / 2, base + layout.tri_h as i32);
            draw_polygon_mut(
                canvas,
                &[
                    Point::new(layout.cbar_x, base),
                    Point::new(layout.cbar_x + layout.cbar_w as i32 - 1, base),
                    Point::new(tip.0, tip.1),
                ],
                UNDER_COLOR,
            );
            let tip = (tip.0 as f32, tip.1 as f32);
            draw_line_segment_mut(canvas, (x0, base as f32), tip, INK);
            draw_line_segment_mut(canvas, (x1 - 1.0, base as f32), tip, INK);
        }

        for v in ticks(self.scale.vmin, self.scale.vmax, 7) {
            let y = layout.cbar_y_px(v, &self.scale);
            draw_line_segment_mut(canvas, (x1, y), (x1 + TICK_LEN, y), INK);
        }
    }

    fn draw_axes(&self, canvas: &mut RgbImage, layout: &Layout) {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(layout.left, layout.top).of_size(layout.side.max(1), layout.side.max(1)),
            INK,
        );

        let bottom = layout.bottom() as f32;
        for v in ticks(self.x_range()[0], self.x_range()[1], 7) {
            let x = layout.x_px(v, self.x_range());
            draw_line_segment_mut(canvas, (x, bottom), (x, bottom + TICK_LEN), INK);
        }
        let left = layout.left as f32;
        for v in ticks(self.y_range()[0], self.y_range()[1], 7) {
            let y = layout.y_px(v, self.y_range());
            draw_line_segment_mut(canvas, (left - TICK_LEN, y), (left, y), INK);
        }
    }

    fn draw_labels(&self, canvas: &mut RgbImage, layout: &Layout, snapshot_index: u32) {
        let font = &self.font;
        let tick_scale = PxScale::from(14.0);
        let label_scale = PxScale::from(16.0);
        let title_scale = PxScale::from(18.0);

        // Tick labels
        let bottom = layout.bottom() + TICK_LEN as i32 + 3;
        for v in ticks(self.x_range()[0], self.x_range()[1], 7) {
            let text = format_tick(v);
            let (w, _) = text_size(tick_scale, font, &text);
            let x = layout.x_px(v, self.x_range()) as i32 - w as i32 / 2;
            draw_text_mut(canvas, INK, x, bottom, tick_scale, font, &text);
        }
        for v in ticks(self.y_range()[0], self.y_range()[1], 7) {
            let text = format_tick(v);
            let (w, h) = text_size(tick_scale, font, &text);
            let x = layout.left - TICK_LEN as i32 - 3 - w as i32;
            let y = layout.y_px(v, self.y_range()) as i32 - h as i32 / 2;
            draw_text_mut(canvas, INK, x, y, tick_scale, font, &text);
        }
        let cbar_right = layout.cbar_x + layout.cbar_w as i32 + TICK_LEN as i32 + 3;
        let mut cbar_label_x = cbar_right;
        for v in ticks(self.scale.vmin, self.scale.vmax, 7) {
            let text = format_tick(v);
            let (w, h) = text_size(tick_scale, font, &text);
            let y = layout.cbar_y_px(v, &self.scale) as i32 - h as i32 / 2;
            draw_text_mut(canvas, INK, cbar_right, y, tick_scale, font, &text);
            cbar_label_x = cbar_label_x.max(cbar_right + w as i32);
        }

        // Axis labels and title
        let center_x = layout.left + layout.side as i32 / 2;
        let (w, h) = text_size(label_scale, font, "x [kpc]");
        draw_text_mut(canvas, INK, center_x - w as i32 / 2, bottom + h as i32 + 8, label_scale, font, "x [kpc]");

        let (w, h) = text_size(title_scale, font, &self.title);
        draw_text_mut(canvas, INK, center_x - w as i32 / 2, layout.top - h as i32 - 10, title_scale, font, &self.title);

        let center_y = layout.top + layout.side as i32 / 2;
        let y_label = rotated_text(font, label_scale, "y [kpc]");
        let y_label_x = layout.left - TICK_LEN as i32 - 45 - y_label.width() as i32;
        image::imageops::overlay(
            canvas,
            &y_label,
            y_label_x.max(0) as i64,
            (center_y - y_label.height() as i32 / 2) as i64,
        );

        let cbar_label = rotated_text(font, label_scale, "Log Surface Density [Msun/pc^2]");
        image::imageops::overlay(
            canvas,
            &cbar_label,
            (cbar_label_x + 8) as i64,
            (layout.top + layout.cbar_h as i32 / 2 - cbar_label.height() as i32 / 2) as i64,
        );

        // Time label, 5 kpc in from the top-left corner of the window
        let time = format!("time = {:.0} Million yr", self.params.time_myr(snapshot_index));
        let (_, h) = text_size(label_scale, font, &time);
        let x = layout.x_px(self.x_range()[0] + 5.0, self.x_range()) as i32;
        let y = layout.y_px(self.y_range()[1] - 5.0, self.y_range()) as i32 - h as i32;
        draw_text_mut(canvas, INK, x, y, label_scale, font, &time);
    }
}

// Text rendered on its own canvas and turned to read bottom-to-top
fn rotated_text(font: &FontArc, scale: PxScale, text: &str) -> RgbImage {
    let (w, h) = text_size(scale, font, text);
    let mut label = RgbImage::from_pixel(w + 4, h + 4, BACKGROUND);
    draw_text_mut(&mut label, INK, 2, 2, scale, font, text);
    image::imageops::rotate270(&label)
}

/// Writes a frame as PNG.
pub fn save_frame(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("Failed to write frame image: {}", path.display()))
}
