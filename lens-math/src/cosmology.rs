//! Flat LCDM distances for lensing geometry
//!
//! Only distance ratios enter the Einstein radius, and in a flat universe the
//! ratio `D_ls / D_s` reduces to `1 - D_C(z_l) / D_C(z_s)`, so the Hubble
//! constant cancels. It is still carried so absolute distances are available.

use thiserror::Error;

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Simpson panels per unit redshift for the comoving distance integral
const PANELS_PER_UNIT_Z: f64 = 512.0;

/// Errors from cosmological distance calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CosmologyError {
    #[error("matter density must lie in (0, 1], got {0}")]
    InvalidMatterDensity(f64),
    #[error("Hubble constant must be positive, got {0}")]
    InvalidHubbleConstant(f64),
    #[error("redshift must be finite and non-negative, got {0}")]
    InvalidRedshift(f64),
    #[error("source redshift {z_source} must exceed lens redshift {z_lens}")]
    SourceNotBehindLens { z_lens: f64, z_source: f64 },
}

/// Spatially flat LCDM cosmology
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatLcdm {
    /// Hubble constant in km/s/Mpc
    hubble_constant: f64,
    /// Present-day matter density parameter
    omega_m: f64,
}

impl Default for FlatLcdm {
    fn default() -> Self {
        Self {
            hubble_constant: 70.0,
            omega_m: 0.3,
        }
    }
}

impl FlatLcdm {
    /// Create a flat cosmology, dark energy fills the remaining density
    pub fn new(hubble_constant: f64, omega_m: f64) -> Result<Self, CosmologyError> {
        if !(hubble_constant.is_finite() && hubble_constant > 0.0) {
            return Err(CosmologyError::InvalidHubbleConstant(hubble_constant));
        }
        if !(omega_m.is_finite() && omega_m > 0.0 && omega_m <= 1.0) {
            return Err(CosmologyError::InvalidMatterDensity(omega_m));
        }
        Ok(Self {
            hubble_constant,
            omega_m,
        })
    }

    pub fn hubble_constant(&self) -> f64 {
        self.hubble_constant
    }

    pub fn omega_m(&self) -> f64 {
        self.omega_m
    }

    /// Hubble distance `c / H0` in Mpc
    pub fn hubble_distance(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.hubble_constant
    }

    /// Dimensionless expansion rate `E(z) = H(z) / H0`
    pub fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        (self.omega_m * zp1 * zp1 * zp1 + (1.0 - self.omega_m)).sqrt()
    }

    /// Line-of-sight comoving distance in units of the Hubble distance
    ///
    /// Composite Simpson integration of `1 / E(z)`, which is smooth and
    /// monotone so a fixed panel density is plenty.
    pub fn comoving_distance_dimensionless(&self, z: f64) -> Result<f64, CosmologyError> {
        check_redshift(z)?;
        if z == 0.0 {
            return Ok(0.0);
        }

        let mut panels = (z * PANELS_PER_UNIT_Z).ceil() as usize;
        panels = panels.max(64);
        if panels % 2 == 1 {
            panels += 1;
        }
        let h = z / panels as f64;

        let mut sum = 1.0 / self.efunc(0.0) + 1.0 / self.efunc(z);
        for i in 1..panels {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight / self.efunc(i as f64 * h);
        }

        Ok(sum * h / 3.0)
    }

    /// Angular diameter distance to redshift `z` in Mpc
    pub fn angular_diameter_distance(&self, z: f64) -> Result<f64, CosmologyError> {
        let dc = self.comoving_distance_dimensionless(z)?;
        Ok(self.hubble_distance() * dc / (1.0 + z))
    }

    /// Angular diameter distance between two redshifts in Mpc (flat geometry)
    pub fn angular_diameter_distance_between(
        &self,
        z_lens: f64,
        z_source: f64,
    ) -> Result<f64, CosmologyError> {
        check_ordering(z_lens, z_source)?;
        let dc_l = self.comoving_distance_dimensionless(z_lens)?;
        let dc_s = self.comoving_distance_dimensionless(z_source)?;
        Ok(self.hubble_distance() * (dc_s - dc_l) / (1.0 + z_source))
    }

    /// Lensing efficiency `D_ls / D_s`
    pub fn distance_ratio(&self, z_lens: f64, z_source: f64) -> Result<f64, CosmologyError> {
        check_ordering(z_lens, z_source)?;
        let dc_l = self.comoving_distance_dimensionless(z_lens)?;
        let dc_s = self.comoving_distance_dimensionless(z_source)?;
        Ok(1.0 - dc_l / dc_s)
    }
}

fn check_redshift(z: f64) -> Result<(), CosmologyError> {
    if z.is_finite() && z >= 0.0 {
        Ok(())
    } else {
        Err(CosmologyError::InvalidRedshift(z))
    }
}

fn check_ordering(z_lens: f64, z_source: f64) -> Result<(), CosmologyError> {
    check_redshift(z_lens)?;
    check_redshift(z_source)?;
    if z_source <= z_lens {
        return Err(CosmologyError::SourceNotBehindLens { z_lens, z_source });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_einstein_de_sitter_closed_form() {
        // Omega_m = 1: D_C = 2 (1 - 1/sqrt(1+z)) in Hubble units
        let cosmo = FlatLcdm::new(70.0, 1.0).unwrap();
        for &z in &[0.1, 0.5, 1.0, 3.0] {
            let expected = 2.0 * (1.0 - 1.0 / (1.0f64 + z).sqrt());
            assert_relative_eq!(
                cosmo.comoving_distance_dimensionless(z).unwrap(),
                expected,
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_concordance_distance() {
        // H0 = 70, Om = 0.3: D_A(z=1) is about 1652 Mpc
        let cosmo = FlatLcdm::default();
        let da = cosmo.angular_diameter_distance(1.0).unwrap();
        assert_relative_eq!(da, 1651.9, max_relative = 2e-3);
    }

    #[test]
    fn test_distance_ratio_matches_distances() {
        let cosmo = FlatLcdm::default();
        let ratio = cosmo.distance_ratio(0.5, 1.0).unwrap();
        let dls = cosmo.angular_diameter_distance_between(0.5, 1.0).unwrap();
        let ds = cosmo.angular_diameter_distance(1.0).unwrap();
        assert_relative_eq!(ratio, dls / ds, epsilon = 1e-12);
        assert!(ratio > 0.0 && ratio < 1.0);
    }

    #[test]
    fn test_lens_at_observer_ratio_is_one() {
        let cosmo = FlatLcdm::default();
        assert_relative_eq!(cosmo.distance_ratio(0.0, 2.0).unwrap(), 1.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(FlatLcdm::new(70.0, 0.0).is_err());
        assert!(FlatLcdm::new(-1.0, 0.3).is_err());

        let cosmo = FlatLcdm::default();
        assert_eq!(
            cosmo.distance_ratio(1.0, 0.5),
            Err(CosmologyError::SourceNotBehindLens {
                z_lens: 1.0,
                z_source: 0.5
            })
        );
        assert!(matches!(
            cosmo.comoving_distance_dimensionless(f64::NAN),
            Err(CosmologyError::InvalidRedshift(_))
        ));
    }
}
