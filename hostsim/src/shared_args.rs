use clap::Parser;
use lens_math::{
    EllipticityScale, EllipticityTable, FlatLcdm, IsothermalEllipsoidOracle, LensModelError,
};
use std::path::PathBuf;
use thiserror::Error;

use crate::error::ValidationError;
use crate::grid::PixelGrid;

/// Parse a strictly positive float
fn parse_positive(s: &str) -> Result<f64, String> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("expected a positive value, got {value}"))
    }
}

/// Fatal configuration problems detected before any system is processed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to load ellipticity table: {0}")]
    EllipticityTable(#[from] LensModelError),
}

/// Grid and lens-model arguments shared by the simulation binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedSimulationArgs {
    /// Pixel size in arcseconds
    #[arg(long, default_value_t = 0.04, value_parser = parse_positive)]
    pub pixel_size: f64,

    /// Stamp side length in pixels
    #[arg(long, default_value_t = 250)]
    pub num_pix: usize,

    /// Matter density of the flat LCDM cosmology
    #[arg(long, default_value_t = 0.3)]
    pub omega_m: f64,

    /// Hubble constant in km/s/Mpc
    #[arg(long, default_value_t = 70.0)]
    pub hubble_constant: f64,

    /// Two-column (ellipticity, scale) table for the lens dynamical normalization
    #[arg(long)]
    pub ellipticity_table: Option<PathBuf>,
}

impl Default for SharedSimulationArgs {
    fn default() -> Self {
        Self {
            pixel_size: 0.04,
            num_pix: 250,
            omega_m: 0.3,
            hubble_constant: 70.0,
            ellipticity_table: None,
        }
    }
}

impl SharedSimulationArgs {
    pub fn build_grid(&self) -> Result<PixelGrid, ConfigError> {
        Ok(PixelGrid::new(self.pixel_size, self.num_pix)?)
    }

    pub fn build_oracle(&self) -> Result<IsothermalEllipsoidOracle, ConfigError> {
        let cosmology = FlatLcdm::new(self.hubble_constant, self.omega_m)
            .map_err(ValidationError::from)?;
        let ellipticity = match &self.ellipticity_table {
            Some(path) => EllipticityScale::Table(EllipticityTable::from_path(path)?),
            None => EllipticityScale::Unit,
        };
        Ok(IsothermalEllipsoidOracle::new(cosmology, ellipticity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lens_math::DeflectionOracle;
    use std::io::Write;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        shared: SharedSimulationArgs,
    }

    #[test]
    fn test_defaults_match_cli() {
        let parsed = Wrapper::parse_from(["test"]).shared;
        let defaults = SharedSimulationArgs::default();
        assert_eq!(parsed.pixel_size, defaults.pixel_size);
        assert_eq!(parsed.num_pix, defaults.num_pix);
        assert_eq!(parsed.omega_m, defaults.omega_m);
        assert!(parsed.ellipticity_table.is_none());

        let grid = parsed.build_grid().unwrap();
        assert_eq!(grid.side(), 250);
        assert_relative_eq!(grid.extent(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Wrapper::try_parse_from(["test", "--pixel-size", "-0.1"]).is_err());
        assert!(Wrapper::try_parse_from(["test", "--pixel-size", "abc"]).is_err());

        let args = SharedSimulationArgs {
            num_pix: 0,
            ..Default::default()
        };
        assert!(matches!(
            args.build_grid(),
            Err(ConfigError::Validation(ValidationError::EmptyGrid))
        ));

        let args = SharedSimulationArgs {
            omega_m: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            args.build_oracle(),
            Err(ConfigError::Validation(ValidationError::Cosmology(_)))
        ));
    }

    #[test]
    fn test_ellipticity_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# e scale").unwrap();
        writeln!(file, "0.0 1.0").unwrap();
        writeln!(file, "0.5 1.2").unwrap();

        let args = SharedSimulationArgs {
            ellipticity_table: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let oracle = args.build_oracle().unwrap();
        assert_relative_eq!(oracle.ellipticity_scale(0.25), 1.1, epsilon = 1e-12);

        let missing = SharedSimulationArgs {
            ellipticity_table: Some(PathBuf::from("/nonexistent/table.dat")),
            ..Default::default()
        };
        assert!(matches!(
            missing.build_oracle(),
            Err(ConfigError::EllipticityTable(_))
        ));
    }
}
