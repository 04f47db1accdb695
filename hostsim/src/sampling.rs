//! Random positions drawn from a Sersic light distribution
//!
//! Used to place a transient at a light-weighted location inside its host:
//! the elliptical radius is drawn by inverting the enclosed-light curve
//! `P(2n, b_n (R/Reff)^(1/n))`, the azimuth uniformly, and the resulting point
//! is squeezed by the axis ratio and rotated into the sky frame.

use lens_math::{
    inverse_regularized_gamma_p, rotation_matrix, scale_matrix, solve_linear,
    SingularMatrixError, SpecialFunctionError,
};
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;
use thiserror::Error;

use crate::catalog::SystemId;
use crate::image_proc::SersicProfile;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("radial inversion failed: {0}")]
    Radial(#[from] SpecialFunctionError),
    #[error("frame rotation failed: {0}")]
    Rotation(#[from] SingularMatrixError),
}

/// Independent random stream for one lens system
///
/// The run seed keys the generator and the system id selects its stream, so
/// every system's draws are fixed regardless of worker scheduling or which
/// other systems were rejected, and runs with different seeds share nothing.
pub fn system_rng(seed: u64, system_id: SystemId) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(system_id);
    rng
}

/// Draw an offset `(dx, dy)` in arcsec from the profile's light distribution
///
/// The offset is relative to the profile centroid. Its elliptical radius
/// follows the enclosed-light curve of the profile exactly.
pub fn sample_offset<R: Rng + ?Sized>(
    profile: &SersicProfile,
    rng: &mut R,
) -> Result<(f64, f64), SamplingError> {
    let two_n = 2.0 * profile.sersic_index;

    let z: f64 = rng.gen();
    let x = inverse_regularized_gamma_p(two_n, z)?;
    let radius = (x / profile.bn()).powf(profile.sersic_index) * profile.effective_radius;

    let theta = rng.gen_range(0.0..2.0 * PI);
    let circular = Vector2::new(radius * theta.cos(), radius * theta.sin());

    let sqrt_q = profile.axis_ratio.sqrt();
    let squeezed = scale_matrix(sqrt_q, 1.0 / sqrt_q) * circular;

    // The major axis of the squeezed point lies along y, so the sky-frame
    // rotation is the position angle less a quarter turn
    let frame = rotation_matrix((profile.position_angle - 90.0).to_radians()).transpose();
    let offset = solve_linear(&frame, &squeezed)?;

    Ok((offset.x, offset.y))
}
