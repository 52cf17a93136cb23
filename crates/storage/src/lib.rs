//! On-disk cache for the radar overlay service.
//!
//! Holds the compressed upstream source files (one per basename, kept
//! indefinitely) and the single "latest" record: the last successfully
//! rendered raster plus the UTC time it was rendered.

pub mod radar_cache;

pub use radar_cache::{
    CacheStats, CacheStore, LATEST_RASTER_FILE, LATEST_TIMESTAMP_FILE, TIMESTAMP_FORMAT,
};
