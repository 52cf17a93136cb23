//! Grid generators producing predictable reflectivity-like fields.
//!
//! All grids are row-major, row 0 first.

/// Creates a test grid where each cell is `col * 1000 + row`.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a grid filled with one value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a zero grid with NaN at the given (col, row) positions.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Creates a radar-like field: a single storm cell peaking at `peak_dbz` in
/// the grid centre, falling off linearly, with the MRMS "missing" sentinel
/// (-999) outside the echo.
pub fn create_storm_cell_grid(width: usize, height: usize, peak_dbz: f32) -> Vec<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = cx.min(cy).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 + 0.5 - cx;
            let dy = row as f32 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt() / radius;
            if d >= 1.0 {
                data.push(-999.0);
            } else {
                data.push((peak_dbz * (1.0 - d)).round());
            }
        }
    }
    data
}

/// -60 (below the valid range), then the midpoint of every bin from
/// [-10, 0) through [65, 70), then 72.5 for [70, 80), then 100 (above range).
pub fn create_bin_sweep() -> Vec<f32> {
    let mut values = vec![-60.0, -5.0, 2.5];
    values.extend((0..14).map(|i| 7.5 + 5.0 * i as f32));
    values.push(100.0);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_with_nans() {
        let grid = create_grid_with_nans(3, 2, &[(1, 1), (5, 5)]);
        assert!(grid[4].is_nan());
        assert_eq!(grid.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn test_storm_cell_has_echo_and_sentinels() {
        let grid = create_storm_cell_grid(16, 16, 60.0);
        assert!(grid.contains(&-999.0));
        let peak = grid.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(peak > 50.0 && peak <= 60.0);
    }

    #[test]
    fn test_bin_sweep_spans_table() {
        let sweep = create_bin_sweep();
        assert_eq!(sweep.len(), 18);
        assert_eq!(sweep[16], 72.5);
        assert_eq!(sweep[17], 100.0);
    }
}
