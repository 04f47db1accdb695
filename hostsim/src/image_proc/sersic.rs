//! Elliptical Sersic surface-brightness profile
//!
//! Intensities are relative: the profile equals 1 at the effective radius and
//! `exp(b_n)` at the centre. Absolute normalization comes later from the
//! catalog magnitude, so nothing here integrates or normalizes flux.

use lens_math::{regularized_gamma_p, sersic_bn};
use ndarray::{Array2, ArrayView2, Zip};

use crate::error::ValidationError;

/// One Sersic component (bulge or disk) in the source plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SersicProfile {
    /// Centroid x (arcsec)
    pub x0: f64,
    /// Centroid y (arcsec)
    pub y0: f64,
    /// Effective (half-light) radius (arcsec)
    pub effective_radius: f64,
    /// Axis ratio b/a
    pub axis_ratio: f64,
    /// Position angle (degrees)
    pub position_angle: f64,
    /// Sersic index
    pub sersic_index: f64,
    bn: f64,
}

fn invalid(parameter: &'static str, value: f64) -> ValidationError {
    ValidationError::InvalidParameter { parameter, value }
}

impl SersicProfile {
    pub fn new(
        x0: f64,
        y0: f64,
        effective_radius: f64,
        axis_ratio: f64,
        position_angle: f64,
        sersic_index: f64,
    ) -> Result<Self, ValidationError> {
        if !x0.is_finite() {
            return Err(invalid("centroid x", x0));
        }
        if !y0.is_finite() {
            return Err(invalid("centroid y", y0));
        }
        if !(effective_radius.is_finite() && effective_radius > 0.0) {
            return Err(invalid("effective radius", effective_radius));
        }
        if !(axis_ratio.is_finite() && axis_ratio > 0.0 && axis_ratio <= 1.0) {
            return Err(invalid("axis ratio", axis_ratio));
        }
        if !position_angle.is_finite() {
            return Err(invalid("position angle", position_angle));
        }
        if !(sersic_index.is_finite() && sersic_index > 0.0) {
            return Err(invalid("Sersic index", sersic_index));
        }
        let bn = sersic_bn(sersic_index).map_err(|_| invalid("Sersic index", sersic_index))?;

        Ok(Self {
            x0,
            y0,
            effective_radius,
            axis_ratio,
            position_angle,
            sersic_index,
            bn,
        })
    }

    /// Same shape moved to a new centroid
    pub fn centered_at(&self, x0: f64, y0: f64) -> Self {
        Self { x0, y0, ..*self }
    }

    /// Half-light constant `b_n = P^-1(2n, 0.5)`
    pub fn bn(&self) -> f64 {
        self.bn
    }

    /// Elliptical radius of `(x, y)` about the centroid, in arcsec
    ///
    /// Contours of constant elliptical radius are the isophotes; a point on
    /// the major axis at distance `a` has elliptical radius `a * sqrt(q)`.
    pub fn elliptical_radius(&self, x: f64, y: f64) -> f64 {
        let (sn, cs) = self.position_angle.to_radians().sin_cos();
        let dx = x - self.x0;
        let dy = y - self.y0;
        let xp = dx * cs + dy * sn;
        let yp = dy * cs - dx * sn;
        (xp * xp * self.axis_ratio + yp * yp / self.axis_ratio).sqrt()
    }

    /// Relative intensity at a single position
    pub fn intensity(&self, x: f64, y: f64) -> f64 {
        let r = self.elliptical_radius(x, y) / self.effective_radius;
        (-self.bn * (r.powf(1.0 / self.sersic_index) - 1.0)).exp()
    }

    /// Relative intensity over coordinate arrays of equal shape
    pub fn evaluate(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros(x.raw_dim());
        Zip::from(&mut out)
            .and(&x)
            .and(&y)
            .par_for_each(|v, &xi, &yi| *v = self.intensity(xi, yi));
        out
    }

    /// Fraction of total light inside elliptical radius `r`
    pub fn enclosed_fraction(&self, r: f64) -> f64 {
        let x = self.bn * (r / self.effective_radius).powf(1.0 / self.sersic_index);
        // shape parameter is validated in `new`, so only NaN input can fail here
        regularized_gamma_p(2.0 * self.sersic_index, x).unwrap_or(f64::NAN)
    }
}
