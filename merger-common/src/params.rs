/// Rendering parameters derived from the configuration, used for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    // Histogram
    pub bins: usize,
    pub first_axis_range: [f64; 2], // along -y, kpc
    pub second_axis_range: [f64; 2], // along x, kpc
    pub cell_area_pc2: f64,
    pub density_scale: f64,

    // Masking
    pub particle_mass_msun: f64,
    pub min_density: f64, // Resolution floor, Msun/pc^2 (before density_scale)

    // Colour scale (log10 Msun/pc^2)
    pub vmin: f64,
    pub vmax: f64,

    // Figure
    pub width: u32,
    pub height: u32,
    pub myr_per_snapshot: f64,
}

impl RenderParams {
    /// Density contributed to a cell by one particle of the given mass.
    #[inline(always)]
    pub fn weight(&self, mass_msun: f64) -> f64 {
        mass_msun * self.density_scale / self.cell_area_pc2
    }

    /// Simulated time shown on the frame of a snapshot, in Myr.
    pub fn time_myr(&self, snapshot_index: u32) -> f64 {
        snapshot_index as f64 * self.myr_per_snapshot
    }
}
