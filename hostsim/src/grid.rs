//! Image-plane pixel coordinate grid
//!
//! Pixel `[i, j]` sits at `(x, y) = (c[i], c[j])` arcseconds with
//! `c[k] = k*dsx - n*dsx/2 + dsx/2`, so the grid is centred on the origin and
//! an odd-sized grid has a pixel exactly at (0, 0).

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::ValidationError;

/// Fixed image-plane coordinates, shared read-only by every system in a run
#[derive(Debug, Clone)]
pub struct PixelGrid {
    x: Array2<f64>,
    y: Array2<f64>,
    pixel_size: f64,
}

impl PixelGrid {
    /// Build an `side` x `side` grid with `pixel_size` arcsec spacing
    pub fn new(pixel_size: f64, side: usize) -> Result<Self, ValidationError> {
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(ValidationError::NonPositivePixelSize(pixel_size));
        }
        if side == 0 {
            return Err(ValidationError::EmptyGrid);
        }

        let coords = axis_coordinates(pixel_size, side);
        let x = Array2::from_shape_fn((side, side), |(i, _)| coords[i]);
        let y = Array2::from_shape_fn((side, side), |(_, j)| coords[j]);

        Ok(Self { x, y, pixel_size })
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f64> {
        self.y.view()
    }

    /// Pixel size in arcseconds
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Pixels along each side
    pub fn side(&self) -> usize {
        self.x.nrows()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.x.dim()
    }

    /// Full width of the grid in arcseconds
    pub fn extent(&self) -> f64 {
        self.pixel_size * self.side() as f64
    }
}

/// Pixel-centre coordinates along one axis
pub fn axis_coordinates(pixel_size: f64, side: usize) -> Array1<f64> {
    let half_width = side as f64 * pixel_size / 2.0;
    Array1::from_shape_fn(side, |k| k as f64 * pixel_size - half_width + pixel_size / 2.0)
}
