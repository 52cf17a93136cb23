//! Decoded two-dimensional reflectivity fields.

use crate::{RadarError, RadarResult};

/// A row-major 2D field of reflectivity values (dBZ).
///
/// Missing data is stored as `NaN`. Dimensions are always non-zero and
/// `values.len() == rows * cols`; the constructors enforce both.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl GridField {
    /// Build a field from row-major values.
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> RadarResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(RadarError::invalid_argument(format!(
                "field dimensions must be non-zero, got {}x{}",
                rows, cols
            )));
        }
        if values.len() != rows * cols {
            return Err(RadarError::invalid_argument(format!(
                "field {}x{} expects {} values, got {}",
                rows,
                cols,
                rows * cols,
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Build a field from an N-dimensional shape, keeping the trailing two
    /// axes as (rows, cols).
    ///
    /// Leading axes (time, level) must all be of size 1. Picking a slice out of
    /// a larger leading axis is not supported.
    pub fn from_shape(values: Vec<f32>, shape: &[usize]) -> RadarResult<Self> {
        match shape {
            [] | [_] => Err(RadarError::invalid_argument(format!(
                "expected at least 2 dimensions, got shape {:?}",
                shape
            ))),
            [leading @ .., rows, cols] => {
                let extra: usize = leading.iter().product();
                if extra != 1 {
                    return Err(RadarError::invalid_argument(format!(
                        "cannot collapse shape {:?} to 2D: leading axes hold {} slices",
                        shape, extra
                    )));
                }
                Self::new(*rows, *cols, values)
            }
        }
    }

    /// Field filled with a single value.
    pub fn filled(rows: usize, cols: usize, value: f32) -> RadarResult<Self> {
        Self::new(rows, cols, vec![value; rows * cols])
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Value at (row, col), or None when out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    /// One row as a slice.
    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.values[start..start + self.cols]
    }

    /// Reverse row order in place (south-up to north-up).
    pub fn flip_rows(&mut self) {
        let cols = self.cols;
        let rows = self.rows;
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (head, tail) = self.values.split_at_mut(bottom * cols);
            head[top * cols..(top + 1) * cols].swap_with_slice(&mut tail[..cols]);
        }
    }

    /// Number of finite (non-missing) cells.
    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }
}
