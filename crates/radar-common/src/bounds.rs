//! Geographic extent of the rendered overlay.

use serde::{Serialize, Serializer};

/// Lat/lon extent the overlay image is stretched over by map clients.
///
/// Serializes as `[south, west, north, east]`, the order Leaflet-style
/// `imageOverlay` bounds expect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl MapBounds {
    /// Continental US extent covered by the MRMS CONUS mosaic.
    pub const CONUS: MapBounds = MapBounds {
        south: 20.0,
        west: -130.0,
        north: 55.0,
        east: -60.0,
    };

    pub fn as_array(&self) -> [f64; 4] {
        [self.south, self.west, self.north, self.east]
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::CONUS
    }
}

impl Serialize for MapBounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_array().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conus_serializes_as_south_west_north_east() {
        let json = serde_json::to_string(&MapBounds::CONUS).unwrap();
        assert_eq!(json, "[20.0,-130.0,55.0,-60.0]");
    }
}
