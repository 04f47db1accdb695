//! lens-math - Numerical building blocks for strong-lensing image synthesis
//!
//! This crate collects the math that the host-galaxy simulator leans on but
//! that has nothing to do with pixels or catalogs:
//!
//! - **Special functions** - regularized incomplete gamma and its inverse,
//!   used for the Sersic `b_n` constant and for radial sampling
//! - **Cosmology** - flat LCDM distances for Einstein-radius geometry
//! - **SIE** - isothermal ellipsoid deflection oracle with external shear
//! - **Matrix** - 2x2 rotation/scale matrices and a checked linear solve
//! - **Statistics** - Kolmogorov-Smirnov goodness of fit, median
//!
//! # Example
//!
//! ```text
//! use lens_math::special::sersic_bn;
//!
//! // Half-light constant for an exponential disk
//! let bn = sersic_bn(1.0).unwrap();
//! assert!((bn - 1.678).abs() < 1e-3);
//! ```

pub mod cosmology;
pub mod matrix2;
pub mod sie;
pub mod special;
pub mod stats;

pub use cosmology::{CosmologyError, FlatLcdm, SPEED_OF_LIGHT_KM_S};
pub use matrix2::{rotation_matrix, scale_matrix, solve_linear, SingularMatrixError};
pub use sie::{
    DeflectionOracle, EllipticityScale, EllipticityTable, IsothermalEllipsoidOracle,
    LensModelError, SieParams,
};
pub use special::{
    inverse_regularized_gamma_p, regularized_gamma_p, sersic_bn, SpecialFunctionError,
};
pub use stats::{ks_critical_value, ks_statistic, median};
