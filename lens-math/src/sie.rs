//! Isothermal ellipsoid deflection oracle
//!
//! The lens mass model is a singular isothermal ellipsoid (SIE) with external
//! shear and external convergence. The deflection follows the OM10 mock lens
//! conventions: position angle measured in degrees from the x axis, axis ratio
//! `q = b/a`, Einstein radius from the velocity dispersion via
//!
//! ```text
//! θ_E = 4π (σ_v / c)² D_ls / D_s
//! ```
//!
//! and an optional dynamical normalization `λ(e)` (the "ellipticity scale")
//! which rescales the deflection for the projection of a 3D ellipsoid.

use std::f64::consts::PI;
use std::path::Path;

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use thiserror::Error;

use crate::cosmology::{CosmologyError, FlatLcdm, SPEED_OF_LIGHT_KM_S};

/// Arcseconds per radian
const ARCSEC_PER_RADIAN: f64 = 180.0 / PI * 3600.0;

/// Axis ratios above this are treated as spherical to avoid the 0/0 limit
const SPHERICAL_AXIS_RATIO: f64 = 1.0 - 1e-8;

/// Errors from the lens mass model
#[derive(Error, Debug)]
pub enum LensModelError {
    #[error("cosmology error: {0}")]
    Cosmology(#[from] CosmologyError),
    #[error("velocity dispersion must be positive and finite, got {0} km/s")]
    InvalidVelocityDispersion(f64),
    #[error("ellipticity table I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed ellipticity table: {0}")]
    MalformedTable(String),
}

/// Parameters of one SIE + external shear evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SieParams {
    /// Lens centre x (arcsec)
    pub x: f64,
    /// Lens centre y (arcsec)
    pub y: f64,
    /// Position angle of the mass distribution (degrees)
    pub position_angle: f64,
    /// Axis ratio b/a in (0, 1]
    pub axis_ratio: f64,
    /// Einstein radius (arcsec)
    pub einstein_radius: f64,
    /// Dynamical normalization applied to the SIE part of the deflection
    pub ellipticity_scale: f64,
    /// External shear magnitude
    pub shear: f64,
    /// External shear angle (degrees)
    pub shear_angle: f64,
    /// External convergence
    pub convergence: f64,
}

impl SieParams {
    /// Deflection at a single image-plane position
    pub fn deflection_at(&self, x: f64, y: f64) -> (f64, f64) {
        let tr = self.position_angle.to_radians();
        let (sn, cs) = tr.sin_cos();
        let sx = x - self.x;
        let sy = y - self.y;

        // Rotate into the lens frame
        let sx_r = sx * cs + sy * sn;
        let sy_r = -sx * sn + sy * cs;

        let q = self.axis_ratio;
        let psi = (sx_r * sx_r * q + sy_r * sy_r / q).sqrt();
        let re = self.einstein_radius;

        let (dx_tmp, dy_tmp) = if psi == 0.0 {
            (0.0, 0.0)
        } else if q >= SPHERICAL_AXIS_RATIO {
            (re * sx_r / psi, re * sy_r / psi)
        } else {
            let eql = (q / (1.0 - q * q)).sqrt();
            (
                re * eql * (sx_r / psi / eql).atan(),
                re * eql * (sy_r / psi / eql).atanh(),
            )
        };

        // Back to the sky frame
        let dx = dx_tmp * cs - dy_tmp * sn;
        let dy = dx_tmp * sn + dy_tmp * cs;

        let (sn2, cs2) = (2.0 * self.shear_angle.to_radians()).sin_cos();
        let dx_shear = self.shear * (cs2 * sx + sn2 * sy);
        let dy_shear = self.shear * (sn2 * sx - cs2 * sy);

        let dx_kappa = self.convergence * sx;
        let dy_kappa = self.convergence * sy;

        (
            dx * self.ellipticity_scale + dx_shear + dx_kappa,
            dy * self.ellipticity_scale + dy_shear + dy_kappa,
        )
    }
}

/// Tabulated ellipticity to dynamical-normalization mapping
///
/// Loaded from a whitespace separated two-column text file of
/// `(ellipticity, scale)` pairs; `#` starts a comment. Lookups interpolate
/// linearly and clamp to the end values outside the tabulated range.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticityTable {
    ellipticity: Vec<f64>,
    scale: Vec<f64>,
}

impl EllipticityTable {
    /// Build a table from `(ellipticity, scale)` points
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self, LensModelError> {
        if points.is_empty() {
            return Err(LensModelError::MalformedTable("table is empty".to_string()));
        }
        if points.iter().any(|(e, s)| !e.is_finite() || !s.is_finite()) {
            return Err(LensModelError::MalformedTable(
                "table contains non-finite values".to_string(),
            ));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if points.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(LensModelError::MalformedTable(
                "duplicate ellipticity values".to_string(),
            ));
        }

        let (ellipticity, scale) = points.into_iter().unzip();
        Ok(Self { ellipticity, scale })
    }

    /// Parse a table from a text file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LensModelError> {
        let contents = std::fs::read_to_string(&path)?;
        let mut points = Vec::new();

        for (line_no, line) in contents.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace().map(str::parse::<f64>);
            match (fields.next(), fields.next()) {
                (Some(Ok(e)), Some(Ok(s))) => points.push((e, s)),
                _ => {
                    return Err(LensModelError::MalformedTable(format!(
                        "line {}: expected two numeric columns",
                        line_no + 1
                    )))
                }
            }
        }

        debug!(
            "Loaded {} ellipticity scale points from {}",
            points.len(),
            path.as_ref().display()
        );
        Self::new(points)
    }

    /// Interpolated scale at `ellipticity`
    pub fn interpolate(&self, ellipticity: f64) -> f64 {
        let n = self.ellipticity.len();
        if ellipticity <= self.ellipticity[0] {
            return self.scale[0];
        }
        if ellipticity >= self.ellipticity[n - 1] {
            return self.scale[n - 1];
        }

        let upper = self.ellipticity.partition_point(|&e| e <= ellipticity);
        let lower = upper - 1;
        let (e0, e1) = (self.ellipticity[lower], self.ellipticity[upper]);
        let (s0, s1) = (self.scale[lower], self.scale[upper]);
        s0 + (s1 - s0) * (ellipticity - e0) / (e1 - e0)
    }
}

/// Ellipticity to lensing-normalization mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EllipticityScale {
    /// No projection correction, the scale is always 1
    #[default]
    Unit,
    /// Interpolated from a table
    Table(EllipticityTable),
}

impl EllipticityScale {
    pub fn scale(&self, ellipticity: f64) -> f64 {
        match self {
            EllipticityScale::Unit => 1.0,
            EllipticityScale::Table(table) => table.interpolate(ellipticity),
        }
    }
}

/// Source of lens deflection fields
///
/// Implementations must be stateless per call so a single oracle can be
/// shared across worker threads.
pub trait DeflectionOracle: Send + Sync {
    /// Einstein radius in arcseconds
    fn einstein_radius(
        &self,
        velocity_dispersion: f64,
        z_lens: f64,
        z_source: f64,
    ) -> Result<f64, LensModelError>;

    /// Dynamical normalization for lens ellipticity `1 - q`
    fn ellipticity_scale(&self, ellipticity: f64) -> f64;

    /// Deflection field `(alpha_x, alpha_y)` over the image-plane grid
    fn deflection(
        &self,
        params: &SieParams,
        grid_x: ArrayView2<f64>,
        grid_y: ArrayView2<f64>,
    ) -> (Array2<f64>, Array2<f64>);
}

/// SIE + external shear oracle in a flat LCDM universe
#[derive(Debug, Clone, Default)]
pub struct IsothermalEllipsoidOracle {
    pub cosmology: FlatLcdm,
    pub ellipticity: EllipticityScale,
}

impl IsothermalEllipsoidOracle {
    pub fn new(cosmology: FlatLcdm, ellipticity: EllipticityScale) -> Self {
        Self {
            cosmology,
            ellipticity,
        }
    }
}

impl DeflectionOracle for IsothermalEllipsoidOracle {
    fn einstein_radius(
        &self,
        velocity_dispersion: f64,
        z_lens: f64,
        z_source: f64,
    ) -> Result<f64, LensModelError> {
        if !(velocity_dispersion.is_finite() && velocity_dispersion > 0.0) {
            return Err(LensModelError::InvalidVelocityDispersion(
                velocity_dispersion,
            ));
        }
        let ratio = self.cosmology.distance_ratio(z_lens, z_source)?;
        let beta = velocity_dispersion / SPEED_OF_LIGHT_KM_S;
        Ok(4.0 * PI * beta * beta * ratio * ARCSEC_PER_RADIAN)
    }

    fn ellipticity_scale(&self, ellipticity: f64) -> f64 {
        self.ellipticity.scale(ellipticity)
    }

    fn deflection(
        &self,
        params: &SieParams,
        grid_x: ArrayView2<f64>,
        grid_y: ArrayView2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let mut alpha_x = Array2::zeros(grid_x.raw_dim());
        let mut alpha_y = Array2::zeros(grid_x.raw_dim());

        Zip::from(&mut alpha_x)
            .and(&mut alpha_y)
            .and(&grid_x)
            .and(&grid_y)
            .par_for_each(|ax, ay, &x, &y| {
                let (dx, dy) = params.deflection_at(x, y);
                *ax = dx;
                *ay = dy;
            });

        (alpha_x, alpha_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sis(einstein_radius: f64) -> SieParams {
        SieParams {
            x: 0.0,
            y: 0.0,
            position_angle: 0.0,
            axis_ratio: 1.0,
            einstein_radius,
            ellipticity_scale: 1.0,
            shear: 0.0,
            shear_angle: 0.0,
            convergence: 0.0,
        }
    }

    #[test]
    fn test_sis_deflection_constant_magnitude() {
        let lens = sis(1.2);
        for &(x, y) in &[(0.3, 0.0), (0.0, -2.0), (3.0, 4.0), (-0.1, 0.05)] {
            let (dx, dy) = lens.deflection_at(x, y);
            assert_relative_eq!((dx * dx + dy * dy).sqrt(), 1.2, epsilon = 1e-12);
            // Points towards the lens centre in the lens equation sense
            assert!(dx * x + dy * y > 0.0);
        }
    }

    #[test]
    fn test_deflection_zero_at_centre() {
        let mut lens = sis(1.0);
        lens.axis_ratio = 0.6;
        assert_eq!(lens.deflection_at(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_near_spherical_sie_matches_sis() {
        let mut lens = sis(1.0);
        lens.axis_ratio = 0.999_999;
        let (dx, dy) = lens.deflection_at(0.7, -0.4);
        let (sx, sy) = sis(1.0).deflection_at(0.7, -0.4);
        assert_relative_eq!(dx, sx, epsilon = 1e-5);
        assert_relative_eq!(dy, sy, epsilon = 1e-5);
    }

    #[test]
    fn test_sie_symmetry() {
        let lens = SieParams {
            axis_ratio: 0.7,
            position_angle: 0.0,
            ..sis(1.0)
        };
        let (dx, dy) = lens.deflection_at(0.5, 0.8);
        let (mx, my) = lens.deflection_at(-0.5, -0.8);
        assert_relative_eq!(dx, -mx, epsilon = 1e-12);
        assert_relative_eq!(dy, -my, epsilon = 1e-12);

        // Mirror symmetry about the lens axes
        let (fx, fy) = lens.deflection_at(0.5, -0.8);
        assert_relative_eq!(dx, fx, epsilon = 1e-12);
        assert_relative_eq!(dy, -fy, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_shear_and_convergence() {
        let lens = SieParams {
            einstein_radius: 0.0,
            shear: 0.1,
            shear_angle: 0.0,
            convergence: 0.05,
            ..sis(0.0)
        };
        let (dx, dy) = lens.deflection_at(2.0, 1.0);
        assert_relative_eq!(dx, 0.1 * 2.0 + 0.05 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(dy, -0.1 * 1.0 + 0.05 * 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_einstein_radius_typical_galaxy() {
        let oracle = IsothermalEllipsoidOracle::default();
        let theta_e = oracle.einstein_radius(250.0, 0.5, 1.0).unwrap();
        // 4π(σ/c)² is 1.80 arcsec for 250 km/s, times D_ls/D_s ~ 0.43
        assert!(theta_e > 0.7 && theta_e < 0.85, "theta_e = {theta_e}");

        let bigger = oracle.einstein_radius(300.0, 0.5, 1.0).unwrap();
        assert_relative_eq!(bigger / theta_e, 1.44, epsilon = 1e-10);
    }

    #[test]
    fn test_einstein_radius_rejects_bad_inputs() {
        let oracle = IsothermalEllipsoidOracle::default();
        assert!(matches!(
            oracle.einstein_radius(0.0, 0.5, 1.0),
            Err(LensModelError::InvalidVelocityDispersion(_))
        ));
        assert!(matches!(
            oracle.einstein_radius(250.0, 1.0, 0.5),
            Err(LensModelError::Cosmology(_))
        ));
    }

    #[test]
    fn test_grid_deflection_matches_pointwise() {
        let oracle = IsothermalEllipsoidOracle::default();
        let params = SieParams {
            axis_ratio: 0.7,
            position_angle: 30.0,
            shear: 0.02,
            shear_angle: 15.0,
            ..sis(0.9)
        };
        let gx = array![[-1.0, -1.0], [1.0, 1.0]];
        let gy = array![[-1.0, 1.0], [-1.0, 1.0]];
        let (ax, ay) = oracle.deflection(&params, gx.view(), gy.view());
        for ((i, j), &x) in gx.indexed_iter() {
            let (dx, dy) = params.deflection_at(x, gy[[i, j]]);
            assert_eq!(ax[[i, j]], dx);
            assert_eq!(ay[[i, j]], dy);
        }
    }

    #[test]
    fn test_ellipticity_table_interpolation() {
        let table = EllipticityTable::new(vec![(0.5, 1.2), (0.0, 1.0), (0.25, 1.05)]).unwrap();
        assert_relative_eq!(table.interpolate(0.0), 1.0);
        assert_relative_eq!(table.interpolate(0.125), 1.025, epsilon = 1e-12);
        assert_relative_eq!(table.interpolate(0.375), 1.125, epsilon = 1e-12);
        // Clamped outside the table
        assert_relative_eq!(table.interpolate(-0.1), 1.0);
        assert_relative_eq!(table.interpolate(0.9), 1.2);
    }

    #[test]
    fn test_ellipticity_table_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# e  lambda").unwrap();
        writeln!(file, "0.0 1.0").unwrap();
        writeln!(file, "0.4 1.1  # trailing comment").unwrap();
        writeln!(file).unwrap();

        let table = EllipticityTable::from_path(file.path()).unwrap();
        let scale = EllipticityScale::Table(table);
        assert_relative_eq!(scale.scale(0.2), 1.05, epsilon = 1e-12);
        assert_eq!(EllipticityScale::Unit.scale(0.2), 1.0);
    }

    #[test]
    fn test_ellipticity_table_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.0 abc").unwrap();
        assert!(matches!(
            EllipticityTable::from_path(file.path()),
            Err(LensModelError::MalformedTable(_))
        ));
        assert!(EllipticityTable::new(vec![]).is_err());
        assert!(EllipticityTable::new(vec![(0.1, 1.0), (0.1, 1.1)]).is_err());
    }
}
