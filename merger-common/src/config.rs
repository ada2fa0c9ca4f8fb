use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::params::RenderParams;
use std::path::{Path, PathBuf};

// Where the snapshot files live and which indices make up the movie
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub data_dir: PathBuf,
    pub file_prefix: String,
    pub index_digits: usize,
    pub extension: String,
    pub first_snapshot: u32,
    pub last_snapshot: u32,
    pub snapshot_stride: u32,
}

// Particle types to read from each snapshot, loaded from the [particles] table
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ParticlesConfig {
    /// Groups whose particles all carry `particle_mass` (disk and bulge stars).
    pub fixed_mass_types: Vec<String>,
    /// Group with a per-particle mass dataset (newly formed stars).
    /// It does not exist yet in snapshot 0 and is skipped there.
    pub star_forming_type: Option<String>,
    pub coordinates_dataset: String,
    pub mass_dataset: String,
    /// Mass of one fixed-mass particle, in internal units.
    pub particle_mass: f64,
    /// Solar masses per internal mass unit (1e10 Msun / h, h = 0.73).
    pub mass_unit_msun: f64,
}

// Histogram, colour scale and figure layout, loaded from the [render] table
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub bins: usize,
    /// Side length used for the cell area, in kpc.
    pub window_kpc: f64,
    /// Histogram range along -y, in kpc.
    pub first_axis_range: [f64; 2],
    /// Histogram range along x, in kpc.
    pub second_axis_range: [f64; 2],
    /// Extra factor applied to particle masses when binning. The default reproduces
    /// the colour levels of the reference frames.
    pub density_scale: f64,
    /// Cells holding less than this many particle masses are drawn as under-range.
    pub floor_particles: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub width: u32,
    pub height: u32,
    pub myr_per_snapshot: f64,
    pub title: String,
    pub output_dir: PathBuf,
    pub frame_prefix: String,
    pub frame_digits: usize,
    /// TrueType font for labels. The visualizer's bundled font is used when unset.
    pub font_path: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct VideoConfig {
    pub output: PathBuf,
    pub fps: u32,
    pub bitrate_bps: u32,
}

// Main configuration structure, loaded from an optional TOML file.
// Every missing field falls back to the constants of the reference movie.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MovieConfig {
    pub input: InputConfig,
    pub particles: ParticlesConfig,
    pub render: RenderConfig,
    pub video: VideoConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            data_dir: PathBuf::from("GalaxyMergerExample/data"),
            file_prefix: String::from("stars_snapshot_"),
            index_digits: 3,
            extension: String::from("hdf5"),
            first_snapshot: 0,
            last_snapshot: 400,
            snapshot_stride: 2,
        }
    }
}

impl Default for ParticlesConfig {
    fn default() -> Self {
        ParticlesConfig {
            fixed_mass_types: vec![String::from("PartType2"), String::from("PartType3")],
            star_forming_type: Some(String::from("PartType4")),
            coordinates_dataset: String::from("Coordinates"),
            mass_dataset: String::from("Mass"),
            particle_mass: 2.0e-8,
            mass_unit_msun: 1.0e10 / 0.73,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            bins: 100,
            window_kpc: 60.0,
            first_axis_range: [-20.0, 40.0],
            second_axis_range: [-40.0, 20.0],
            density_scale: 1.0e10 / 0.73,
            floor_particles: 10.0,
            vmin: 5.5,
            vmax: 12.0,
            width: 800,
            height: 600,
            myr_per_snapshot: 10.0,
            title: String::from("Stars"),
            output_dir: PathBuf::from("images"),
            frame_prefix: String::from("stars_"),
            frame_digits: 3,
            font_path: None,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            output: PathBuf::from("stars.mp4"),
            fps: 20,
            bitrate_bps: 5_000_000,
        }
    }
}

impl InputConfig {
    /// Path of the snapshot file with the given simulation index.
    pub fn snapshot_path(&self, snapshot_index: u32) -> PathBuf {
        self.data_dir.join(format!(
            "{}{:0width$}.{}",
            self.file_prefix,
            snapshot_index,
            self.extension,
            width = self.index_digits
        ))
    }

    /// Snapshot indices in frame order: frame `k` shows the `k`-th index yielded.
    pub fn snapshot_indices(&self) -> impl Iterator<Item = u32> {
        (self.first_snapshot..=self.last_snapshot).step_by(self.snapshot_stride.max(1) as usize)
    }

    pub fn frame_count(&self) -> usize {
        self.snapshot_indices().count()
    }
}

impl RenderConfig {
    /// Path of the rendered image for a frame index, zero-padded so the files sort in frame order.
    pub fn frame_path(&self, frame_index: usize) -> PathBuf {
        self.output_dir.join(format!(
            "{}{:0width$}.png",
            self.frame_prefix,
            frame_index,
            width = self.frame_digits
        ))
    }

    /// Paths of `count` consecutive frames starting at frame 0.
    pub fn frame_paths(&self, count: usize) -> Vec<PathBuf> {
        (0..count).map(|i| self.frame_path(i)).collect()
    }
}

impl MovieConfig {
    /// Loads the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: MovieConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.snapshot_stride == 0 {
            anyhow::bail!("snapshot_stride must be greater than 0.");
        }
        if self.input.first_snapshot > self.input.last_snapshot {
            anyhow::bail!(
                "first_snapshot ({}) must not exceed last_snapshot ({}).",
                self.input.first_snapshot,
                self.input.last_snapshot
            );
        }
        if self.particles.fixed_mass_types.is_empty() && self.particles.star_forming_type.is_none() {
            anyhow::bail!("At least one particle type must be selected.");
        }
        if self.render.bins == 0 {
            anyhow::bail!("bins must be greater than 0.");
        }
        if self.render.window_kpc <= 0.0 {
            anyhow::bail!("window_kpc must be positive.");
        }
        for (name, range) in [
            ("first_axis_range", self.render.first_axis_range),
            ("second_axis_range", self.render.second_axis_range),
        ] {
            if !(range[0] < range[1]) {
                anyhow::bail!("{} must be increasing, got [{}, {}].", name, range[0], range[1]);
            }
        }
        if !(self.render.vmin < self.render.vmax) {
            anyhow::bail!("vmin ({}) must be below vmax ({}).", self.render.vmin, self.render.vmax);
        }
        // H.264 4:2:0 needs even frame dimensions
        if self.render.width == 0 || self.render.height == 0
            || self.render.width % 2 != 0 || self.render.height % 2 != 0
        {
            anyhow::bail!(
                "Frame size must be non-zero and even, got {}x{}.",
                self.render.width,
                self.render.height
            );
        }
        if self.video.fps == 0 {
            anyhow::bail!("fps must be greater than 0.");
        }
        Ok(())
    }

    /// Converts the configuration into the parameters used while rendering.
    pub fn params(&self) -> RenderParams {
        let render = &self.render;

        // Cell area in pc^2; the side is taken from the full window and the bin count
        let cell_side_pc = 2.0 * 1000.0 * render.window_kpc / render.bins as f64;
        let cell_area_pc2 = cell_side_pc * cell_side_pc;

        let particle_mass_msun = self.particles.particle_mass * self.particles.mass_unit_msun;
        let min_density = render.floor_particles * particle_mass_msun / cell_area_pc2;

        RenderParams {
            bins: render.bins,
            first_axis_range: render.first_axis_range,
            second_axis_range: render.second_axis_range,
            cell_area_pc2,
            density_scale: render.density_scale,
            particle_mass_msun,
            min_density,
            vmin: render.vmin,
            vmax: render.vmax,
            width: render.width,
            height: render.height,
            myr_per_snapshot: render.myr_per_snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_reference_movie() {
        let config = MovieConfig::default();
        config.validate().unwrap();

        assert_eq!(config.input.frame_count(), 201);
        assert_eq!(config.input.snapshot_indices().last(), Some(400));
        assert_eq!(
            config.input.snapshot_path(42),
            PathBuf::from("GalaxyMergerExample/data/stars_snapshot_042.hdf5")
        );
        assert_eq!(config.render.frame_path(7), PathBuf::from("images/stars_007.png"));
        assert_eq!(config.render.frame_path(200), PathBuf::from("images/stars_200.png"));
    }

    #[test]
    fn frame_paths_sort_in_frame_order() {
        let config = MovieConfig::default();
        let paths = config.render.frame_paths(config.input.frame_count());
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
        assert_eq!(paths.len(), 201);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: MovieConfig = toml::from_str(
            r#"
            [input]
            data_dir = "other/data"
            last_snapshot = 10

            [video]
            fps = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.input.data_dir, PathBuf::from("other/data"));
        assert_eq!(config.input.snapshot_stride, 2);
        assert_eq!(config.input.frame_count(), 6);
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.render.bins, 100);
        assert_eq!(config.particles.star_forming_type.as_deref(), Some("PartType4"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = MovieConfig::default();
        config.render.vmin = 12.0;
        assert!(config.validate().is_err());

        let mut config = MovieConfig::default();
        config.render.width = 801;
        assert!(config.validate().is_err());

        let mut config = MovieConfig::default();
        config.input.snapshot_stride = 0;
        assert!(config.validate().is_err());

        let mut config = MovieConfig::default();
        config.render.second_axis_range = [20.0, -40.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_the_file_name() {
        let err = MovieConfig::load("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }

    #[test]
    fn derived_params_match_reference_constants() {
        let params = MovieConfig::default().params();
        assert!((params.cell_area_pc2 - 1.44e6).abs() < 1e-6);
        let mass = 2.0e-8 * 1.0e10 / 0.73;
        assert!((params.particle_mass_msun - mass).abs() < 1e-9);
        assert!((params.min_density - 10.0 * mass / 1.44e6).abs() < 1e-15);
    }
}
