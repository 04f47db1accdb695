//! Error types for the lensed host pipeline
//!
//! Errors split by blast radius: `ValidationError` is fatal at startup,
//! `DataError` and `ZeroFluxError` only ever cost a single lens system.

use lens_math::{CosmologyError, LensModelError};
use thiserror::Error;

use crate::catalog::{Component, SystemId};
use crate::io::fits::FitsError;
use crate::photometry::Band;
use crate::sampling::SamplingError;

/// Malformed configuration or shape parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("pixel size must be positive and finite, got {0}")]
    NonPositivePixelSize(f64),
    #[error("grid side length must be at least one pixel")]
    EmptyGrid,
    #[error("invalid {parameter}: {value}")]
    InvalidParameter { parameter: &'static str, value: f64 },
    #[error("invalid cosmology: {0}")]
    Cosmology(#[from] CosmologyError),
}

/// Catalog record that cannot be turned into a lens system
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("system {system_id}: no host record joins this lens")]
    MissingHost { system_id: SystemId },
    #[error("system {system_id}: duplicate lens records")]
    DuplicateLens { system_id: SystemId },
    #[error("system {system_id}: source position ({x}, {y}) is not finite")]
    NonFinitePosition { system_id: SystemId, x: f64, y: f64 },
    #[error("system {system_id}: non-finite {component} magnitude in band {band}")]
    NonFiniteMagnitude {
        system_id: SystemId,
        component: Component,
        band: Band,
    },
    #[error("system {system_id}: invalid lens parameters: {source}")]
    InvalidLens {
        system_id: SystemId,
        source: ValidationError,
    },
    #[error("system {system_id}: invalid {component} parameters: {source}")]
    InvalidSource {
        system_id: SystemId,
        component: Component,
        source: ValidationError,
    },
}

/// Degenerate flux integral during magnitude renormalization
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "system {system_id}: lensed image or source has zero-valued integral for the {component} \
     (lensed {lensed_sum:e}, unlensed {source_sum:e})"
)]
pub struct ZeroFluxError {
    pub system_id: SystemId,
    pub component: Component,
    pub lensed_sum: f64,
    pub source_sum: f64,
}

/// Anything that causes one lens system to be skipped
#[derive(Error, Debug)]
pub enum SystemError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    ZeroFlux(#[from] ZeroFluxError),
    #[error("system {system_id}: lens model error: {source}")]
    LensModel {
        system_id: SystemId,
        source: LensModelError,
    },
    #[error("system {system_id}: offset sampling failed: {source}")]
    Sampling {
        system_id: SystemId,
        source: SamplingError,
    },
    #[error("system {system_id}: failed to write {component} stamp: {source}")]
    Stamp {
        system_id: SystemId,
        component: Component,
        source: FitsError,
    },
}
