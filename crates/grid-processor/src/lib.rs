//! Resolution reduction for decoded reflectivity fields.
//!
//! A native MRMS CONUS grid holds roughly 24.5 million cells. Rendering it
//! one pixel per cell is wasteful for a map overlay, so the field is shrunk
//! by an integer factor with [`downsample`] before colorization.

pub mod downsample;

pub use downsample::{downsample, downsampled_shape};
