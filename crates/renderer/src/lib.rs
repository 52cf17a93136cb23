//! Reflectivity overlay rendering.
//!
//! - Classification of dBZ values into the fixed 17-bin color table
//! - RGBA raster images
//! - PNG encoding (indexed with tRNS when possible, RGBA otherwise)

pub mod png;
pub mod raster;
pub mod reflectivity;

use radar_common::RadarError;
use thiserror::Error;

pub use raster::RasterImage;
pub use reflectivity::{classify, colorize, Color, ColorBin, REFLECTIVITY_BINS};

/// Errors raised while building or encoding rasters.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("raster {width}x{height} expects {expected} bytes, got {actual}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

impl From<RenderError> for RadarError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidDimensions { .. } => RadarError::InvalidArgument(err.to_string()),
            RenderError::Encode(_) => RadarError::CacheIo(err.to_string()),
        }
    }
}
