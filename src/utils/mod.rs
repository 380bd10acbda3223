//! # Utilities
//!
//! Small numeric helpers shared by the likelihood engine and the samplers.

use faer::Mat;

/// Lossy but panic-free conversion used for averaging counts.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Whether `value` lies in the closed unit interval.
#[must_use]
pub fn is_probability(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for j in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

/// Extract column `col` of `matrix` as an owned vector.
#[must_use]
pub fn column_values(matrix: &Mat<f64>, col: usize) -> Vec<f64> {
    (0..matrix.nrows()).map(|row| matrix[(row, col)]).collect()
}

/// Extract row `row` of `matrix` as an owned vector.
#[must_use]
pub fn row_values(matrix: &Mat<f64>, row: usize) -> Vec<f64> {
    (0..matrix.ncols()).map(|col| matrix[(row, col)]).collect()
}
