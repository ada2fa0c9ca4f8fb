pub mod config;
pub mod params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{MovieConfig, InputConfig, ParticlesConfig, RenderConfig, VideoConfig};
pub use params::RenderParams;
pub use snapshot::ParticleSet;
pub use vecmath::Vec3;
