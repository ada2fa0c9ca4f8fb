use crate::vecmath::Vec3;
use anyhow::Result;

/// The particles of one snapshot selected for rendering, concatenated across particle types.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    /// The simulation index of the snapshot the particles were read from.
    pub snapshot_index: u32,
    /// Particle positions in kpc.
    pub positions: Vec<Vec3>,
    /// Particle masses in Msun, parallel to `positions`.
    pub masses: Vec<f64>,
    /// Particle type names and how many particles each contributed, in read order.
    pub groups: Vec<(String, usize)>,
}

impl ParticleSet {
    pub fn new(snapshot_index: u32) -> Self {
        Self { snapshot_index, ..Default::default() }
    }

    /// Appends a particle type that stores one mass per particle.
    pub fn push_group(&mut self, name: &str, positions: Vec<Vec3>, masses: Vec<f64>) -> Result<()> {
        if positions.len() != masses.len() {
            anyhow::bail!(
                "Particle type '{}' has {} positions but {} masses.",
                name,
                positions.len(),
                masses.len()
            );
        }
        self.groups.push((name.to_string(), positions.len()));
        self.positions.extend(positions);
        self.masses.extend(masses);
        Ok(())
    }

    /// Appends a particle type whose particles all have the same mass.
    pub fn push_uniform_group(&mut self, name: &str, positions: Vec<Vec3>, mass: f64) {
        let count = positions.len();
        self.groups.push((name.to_string(), count));
        self.positions.extend(positions);
        self.masses.extend(std::iter::repeat(mass).take(count));
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Vec3, f64)> + '_ {
        self.positions.iter().copied().zip(self.masses.iter().copied())
    }
}
