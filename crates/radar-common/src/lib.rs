//! Common types shared by the radar overlay crates.

pub mod bounds;
pub mod error;
pub mod grid;

pub use bounds::MapBounds;
pub use error::{RadarError, RadarResult};
pub use grid::GridField;
