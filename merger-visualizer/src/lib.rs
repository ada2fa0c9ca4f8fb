//! Surface-density frames and movie encoding for galaxy-merger snapshots.
//!
//! [`density`] bins particles into a mass-weighted grid, [`frame`] draws that grid as
//! an annotated image and [`video`] turns the saved images into an H.264 MP4.

pub mod colormap;
pub mod density;
pub mod frame;
pub mod video;

pub use colormap::ColorScale;
pub use density::DensityGrid;
pub use frame::{save_frame, FrameRenderer};
pub use video::{encode_video, VideoSettings, VideoSummary};
