//! Reflectivity color classification.
//!
//! dBZ values are classified into a fixed ordered table of half-open bins
//! `[low, high)`. Values outside [-50, 80], missing values and anything
//! matching no bin are fully transparent.

use radar_common::GridField;
use rayon::prelude::*;
use tracing::debug;

use crate::RasterImage;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// One entry of the classification table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBin {
    pub low: f32,
    pub high: f32,
    pub color: Color,
}

impl ColorBin {
    const fn new(low: f32, high: f32, color: Color) -> Self {
        Self { low, high, color }
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        self.low <= value && value < self.high
    }
}

/// Lowest value considered a real measurement.
pub const VALID_MIN_DBZ: f32 = -50.0;
/// Highest value considered a real measurement.
pub const VALID_MAX_DBZ: f32 = 80.0;

/// The NWS-style reflectivity ramp.
pub const REFLECTIVITY_BINS: [ColorBin; 17] = [
    ColorBin::new(-999.0, -10.0, Color::TRANSPARENT),
    ColorBin::new(-10.0, 0.0, Color::rgba(157, 160, 255, 180)),
    ColorBin::new(0.0, 5.0, Color::rgba(96, 122, 255, 200)),
    ColorBin::new(5.0, 10.0, Color::rgba(40, 156, 255, 200)),
    ColorBin::new(10.0, 15.0, Color::rgba(0, 219, 255, 200)),
    ColorBin::new(15.0, 20.0, Color::rgba(0, 255, 170, 200)),
    ColorBin::new(20.0, 25.0, Color::rgba(0, 255, 80, 200)),
    ColorBin::new(25.0, 30.0, Color::rgba(132, 255, 0, 200)),
    ColorBin::new(30.0, 35.0, Color::rgba(231, 255, 0, 200)),
    ColorBin::new(35.0, 40.0, Color::rgba(255, 238, 0, 200)),
    ColorBin::new(40.0, 45.0, Color::rgba(255, 206, 0, 200)),
    ColorBin::new(45.0, 50.0, Color::rgba(255, 150, 0, 200)),
    ColorBin::new(50.0, 55.0, Color::rgba(255, 100, 0, 200)),
    ColorBin::new(55.0, 60.0, Color::rgba(255, 40, 40, 200)),
    ColorBin::new(60.0, 65.0, Color::rgba(204, 0, 0, 200)),
    ColorBin::new(65.0, 70.0, Color::rgba(143, 0, 0, 200)),
    ColorBin::new(70.0, 80.0, Color::rgba(90, 0, 0, 200)),
];

/// Color for a single value. Depends on nothing but the value.
#[inline]
pub fn classify(value: f32) -> Color {
    // NaN fails both comparisons, so test validity positively
    if !(VALID_MIN_DBZ..=VALID_MAX_DBZ).contains(&value) {
        return Color::TRANSPARENT;
    }
    REFLECTIVITY_BINS
        .iter()
        .find(|bin| bin.contains(value))
        .map(|bin| bin.color)
        .unwrap_or(Color::TRANSPARENT)
}

/// One RGBA pixel per field cell, same dimensions as the field.
pub fn colorize(field: &GridField) -> RasterImage {
    let (rows, cols) = field.shape();
    let mut pixels = vec![0u8; rows * cols * 4];

    pixels
        .par_chunks_mut(cols * 4)
        .zip(field.values().par_chunks(cols))
        .for_each(|(out_row, in_row)| {
            for (pixel, &value) in out_row.chunks_exact_mut(4).zip(in_row) {
                pixel.copy_from_slice(&classify(value).to_array());
            }
        });

    let image = RasterImage {
        width: cols,
        height: rows,
        pixels,
    };
    debug!(
        width = cols,
        height = rows,
        colored = image.opaque_count(),
        "Colorized reflectivity field"
    );
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_is_transparent() {
        for v in [-60.0, -50.1, 80.1, 100.0, f32::NAN, f32::INFINITY, -999.0] {
            assert_eq!(classify(v), Color::TRANSPARENT, "value {v}");
        }
    }

    #[test]
    fn test_exactly_80_is_transparent() {
        // Passes the range guard but the last bin is [70, 80)
        assert_eq!(classify(80.0), Color::TRANSPARENT);
        assert_eq!(classify(79.99), Color::rgba(90, 0, 0, 200));
    }

    #[test]
    fn test_bin_edges_are_half_open() {
        assert_eq!(classify(-10.0), Color::rgba(157, 160, 255, 180));
        assert_eq!(classify(-10.001), Color::TRANSPARENT);
        assert_eq!(classify(0.0), Color::rgba(96, 122, 255, 200));
        assert_eq!(classify(4.999), Color::rgba(96, 122, 255, 200));
        assert_eq!(classify(5.0), Color::rgba(40, 156, 255, 200));
        assert_eq!(classify(65.0), Color::rgba(143, 0, 0, 200));
    }

    #[test]
    fn test_low_valid_values_use_transparent_first_bin() {
        assert_eq!(classify(-50.0), Color::TRANSPARENT);
        assert_eq!(classify(-20.0), Color::TRANSPARENT);
    }

    #[test]
    fn test_table_is_contiguous() {
        for pair in REFLECTIVITY_BINS.windows(2) {
            assert_eq!(pair[0].high, pair[1].low);
        }
    }

    #[test]
    fn test_two_cell_field_out_of_range() {
        let field = GridField::new(1, 2, vec![-60.0, 100.0]).unwrap();
        let image = colorize(&field);

        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_colorize_dimensions_and_purity() {
        let values: Vec<f32> = (0..24).map(|i| i as f32 * 4.0 - 12.0).collect();
        let field = GridField::new(4, 6, values).unwrap();

        let first = colorize(&field);
        let second = colorize(&field);

        assert_eq!((first.width(), first.height()), (6, 4));
        assert_eq!(first.pixels(), second.pixels());
        assert_eq!(first.pixel(3, 1), Some(classify(field.get(1, 3).unwrap()).to_array()));
    }
}
