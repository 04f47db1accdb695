//! Plane rotations and axis-ratio squeezes on nalgebra 2x2 matrices
//!
//! Offsets drawn in a galaxy's principal-axis frame are carried to the sky
//! frame through these; the inverse mapping goes through [`solve_linear`]
//! so a degenerate frame surfaces as an error instead of NaNs.

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("frame matrix is singular (det = {determinant:.3e})")]
pub struct SingularMatrixError {
    pub determinant: f64,
}

/// Determinants below this magnitude are treated as singular
const SINGULAR_DETERMINANT: f64 = 1e-10;

/// Solve `matrix * x = rhs` by LU decomposition
pub fn solve_linear(
    matrix: &Matrix2<f64>,
    rhs: &Vector2<f64>,
) -> Result<Vector2<f64>, SingularMatrixError> {
    let determinant = matrix.determinant();
    if !(determinant.abs() >= SINGULAR_DETERMINANT) {
        return Err(SingularMatrixError { determinant });
    }
    matrix
        .lu()
        .solve(rhs)
        .ok_or(SingularMatrixError { determinant })
}

/// Counter-clockwise rotation by `angle` radians
pub fn rotation_matrix(angle: f64) -> Matrix2<f64> {
    let (sin, cos) = angle.sin_cos();
    Matrix2::new(cos, -sin, sin, cos)
}

/// Diagonal stretch, `x` by `sx` and `y` by `sy`
pub fn scale_matrix(sx: f64, sy: f64) -> Matrix2<f64> {
    Matrix2::from_diagonal(&Vector2::new(sx, sy))
}
