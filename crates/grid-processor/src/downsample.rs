//! Block-mean downsampling.
//!
//! Each output cell is the mean of the finite values in its `factor x factor`
//! source block. Remainder rows and columns that do not fill a whole block
//! are dropped, never padded.

use radar_common::{GridField, RadarError, RadarResult};
use rayon::prelude::*;
use tracing::debug;

/// Output shape for a field of `rows x cols` reduced by `factor`.
///
/// Returns `None` for a zero factor.
pub fn downsampled_shape(rows: usize, cols: usize, factor: u32) -> Option<(usize, usize)> {
    let k = factor as usize;
    (k > 0).then(|| (rows / k, cols / k))
}

/// Reduce a field's resolution by block averaging.
///
/// - `factor == 1` returns the field unchanged.
/// - `factor == 0` is an `InvalidArgument`.
/// - A factor larger than either dimension would leave no whole block and is
///   also an `InvalidArgument`.
/// - A block whose cells are all `NaN` produces `NaN`.
pub fn downsample(field: GridField, factor: u32) -> RadarResult<GridField> {
    let (rows, cols) = field.shape();
    let (out_rows, out_cols) = downsampled_shape(rows, cols, factor).ok_or_else(|| {
        RadarError::invalid_argument("downsample factor must be at least 1, got 0")
    })?;

    if factor == 1 {
        return Ok(field);
    }

    if out_rows == 0 || out_cols == 0 {
        return Err(RadarError::invalid_argument(format!(
            "downsample factor {} exceeds field dimensions {}x{}",
            factor, rows, cols
        )));
    }

    let k = factor as usize;
    let src = field.values();
    let mut output = vec![f32::NAN; out_rows * out_cols];

    output
        .par_chunks_mut(out_cols)
        .enumerate()
        .for_each(|(out_y, out_row)| {
            for (out_x, cell) in out_row.iter_mut().enumerate() {
                *cell = mean_of_block(src, cols, out_y * k, out_x * k, k);
            }
        });

    debug!(
        from_rows = rows,
        from_cols = cols,
        to_rows = out_rows,
        to_cols = out_cols,
        factor,
        "Downsampled field"
    );

    GridField::new(out_rows, out_cols, output)
}

/// Mean of the finite values in the `k x k` block at (row0, col0).
///
/// If all values are NaN, returns NaN.
#[inline]
fn mean_of_block(src: &[f32], cols: usize, row0: usize, col0: usize, k: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u32;

    for row in row0..row0 + k {
        let start = row * cols + col0;
        for &v in &src[start..start + k] {
            if v.is_finite() {
                sum += v as f64;
                count += 1;
            }
        }
    }

    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(rows: usize, cols: usize, values: Vec<f32>) -> GridField {
        GridField::new(rows, cols, values).unwrap()
    }

    #[test]
    fn test_downsample_2x_mean() {
        // 4x4 grid with values 1-16
        let data: Vec<f32> = (1..=16).map(|x| x as f32).collect();
        let result = downsample(field(4, 4, data), 2).unwrap();

        assert_eq!(result.shape(), (2, 2));
        // Top-left 2x2 block: 1,2,5,6 -> mean = 3.5
        assert!((result.values()[0] - 3.5).abs() < 0.001);
        // Top-right 2x2 block: 3,4,7,8 -> mean = 5.5
        assert!((result.values()[1] - 5.5).abs() < 0.001);
        // Bottom-right 2x2 block: 11,12,15,16 -> mean = 13.5
        assert!((result.values()[3] - 13.5).abs() < 0.001);
    }

    #[test]
    fn test_uniform_8x8_by_4() {
        let result = downsample(field(8, 8, vec![25.0; 64]), 4).unwrap();

        assert_eq!(result.shape(), (2, 2));
        assert!(result.values().iter().all(|&v| v == 25.0));
    }

    #[test]
    fn test_factor_one_is_identity() {
        let data: Vec<f32> = vec![1.0, f32::NAN, 3.0, 4.0, 5.0, 6.0];
        let original = field(2, 3, data);
        let result = downsample(original.clone(), 1).unwrap();

        assert_eq!(result.shape(), original.shape());
        for (a, b) in result.values().iter().zip(original.values()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_factor_zero_is_invalid() {
        let err = downsample(field(2, 2, vec![0.0; 4]), 0).unwrap_err();
        assert!(matches!(err, RadarError::InvalidArgument(_)));
    }

    #[test]
    fn test_factor_larger_than_field_is_invalid() {
        let err = downsample(field(3, 8, vec![0.0; 24]), 4).unwrap_err();
        assert!(matches!(err, RadarError::InvalidArgument(_)));
    }

    #[test]
    fn test_remainder_is_truncated_not_averaged() {
        // 3x3 with a huge last row/column that must not leak into the 1x1 output
        let data = vec![
            1.0, 1.0, 1000.0, //
            1.0, 1.0, 1000.0, //
            1000.0, 1000.0, 1000.0,
        ];
        let result = downsample(field(3, 3, data), 2).unwrap();

        assert_eq!(result.shape(), (1, 1));
        assert_eq!(result.values()[0], 1.0);
    }

    #[test]
    fn test_mean_ignores_nan() {
        let data = vec![1.0, f32::NAN, 3.0, 4.0];
        let result = downsample(field(2, 2, data), 2).unwrap();

        // Mean of 1, 3, 4 (ignoring NaN) = 8/3
        assert!((result.values()[0] - 2.667).abs() < 0.01);
    }

    #[test]
    fn test_all_nan_block_stays_nan() {
        // 2 rows x 4 cols -> 1x2 blocks: left all NaN, right mixed
        let data = vec![
            f32::NAN, f32::NAN, 2.0, 4.0, //
            f32::NAN, f32::NAN, 6.0, f32::NAN,
        ];
        let result = downsample(field(2, 4, data), 2).unwrap();

        assert!(result.values()[0].is_nan());
        assert_eq!(result.values()[1], 4.0);
    }

    #[test]
    fn test_downsampled_shape() {
        assert_eq!(downsampled_shape(3500, 7000, 8), Some((437, 875)));
        assert_eq!(downsampled_shape(10, 10, 0), None);
    }
}
