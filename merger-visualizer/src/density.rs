use merger_common::{ParticleSet, RenderParams, Vec3};

/// Mass-weighted 2D histogram of a snapshot's particles.
///
/// Cells are stored row-major. Rows run along the first axis (-y) and columns along
/// the second axis (x), so row 0 is drawn at the top of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    bins: usize,
    cells: Vec<f64>,
}

/// Lower edge `k` of a range split into `bins` equal bins; edge `bins` is `hi` itself.
///
/// Computed as `lo + k * step`, the same way numpy's `linspace` builds histogram edges.
#[inline(always)]
pub fn bin_edge(k: usize, range: [f64; 2], bins: usize) -> f64 {
    let [lo, hi] = range;
    if k >= bins {
        return hi;
    }
    k as f64 * ((hi - lo) / bins as f64) + lo
}

/// Bin of `value` in a range split into `bins` equal bins.
///
/// Bins are half-open `[edge_k, edge_k+1)` except the last, which also takes `hi`.
/// Values outside the range (and NaN) fall in no bin. A value equal to an interior edge
/// belongs to the bin that edge opens.
#[inline(always)]
pub fn bin_index(value: f64, range: [f64; 2], bins: usize) -> Option<usize> {
    let [lo, hi] = range;
    if bins == 0 || !(value >= lo && value <= hi) {
        return None;
    }
    if value == hi {
        return Some(bins - 1);
    }
    let mut idx = (((value - lo) / (hi - lo) * bins as f64).floor() as usize).min(bins - 1);
    // The division can round across an edge; settle against the edges themselves
    while idx > 0 && value < bin_edge(idx, range, bins) {
        idx -= 1;
    }
    while idx + 1 < bins && value >= bin_edge(idx + 1, range, bins) {
        idx += 1;
    }
    Some(idx)
}

/// Histogram coordinates of a particle: (-y, x), matching the displayed orientation.
#[inline(always)]
fn projected(pos: Vec3) -> (f64, f64) {
    (-pos.y, pos.x)
}

impl DensityGrid {
    pub fn empty(bins: usize) -> Self {
        Self { bins, cells: vec![0.0; bins * bins] }
    }

    /// Bins every particle of the set, weighting by its mass over the cell area.
    pub fn from_particles(particles: &ParticleSet, params: &RenderParams) -> Self {
        let mut grid = Self::empty(params.bins);
        for (pos, mass) in particles.iter() {
            grid.deposit(pos, mass, params);
        }
        grid
    }

    /// Adds one particle. Returns false when it lies outside the window.
    pub fn deposit(&mut self, pos: Vec3, mass_msun: f64, params: &RenderParams) -> bool {
        let (u, v) = projected(pos);
        match (
            bin_index(u, params.first_axis_range, self.bins),
            bin_index(v, params.second_axis_range, self.bins),
        ) {
            (Some(row), Some(col)) => {
                self.cells[row * self.bins + col] += params.weight(mass_msun);
                true
            }
            _ => false,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.bins + col]
    }

    /// Sum over all cells, before masking.
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// log10 of a cell's density, or None when the cell is not above the resolution floor.
    #[inline(always)]
    pub fn masked_log(&self, row: usize, col: usize, params: &RenderParams) -> Option<f64> {
        let value = self.get(row, col);
        if value > params.min_density {
            Some(value.log10())
        } else {
            None
        }
    }

    /// Number of cells above the resolution floor.
    pub fn resolved_cells(&self, params: &RenderParams) -> usize {
        self.cells.iter().filter(|&&v| v > params.min_density).count()
    }
}
