//! Lensed host-galaxy postage-stamp simulator
//!
//! Renders the bulge and disk light of strongly lensed AGN and supernova host
//! galaxies. Each system is ray traced through an isothermal ellipsoid lens,
//! the Sersic source is evaluated in the source plane, and the catalog
//! magnitudes are shifted so total flux follows the lensing magnification.
//!
//! The pipeline, leaves first:
//!
//! - [`grid`] - fixed image-plane pixel coordinates
//! - [`image_proc`] - Sersic surface brightness
//! - [`sampling`] - light-weighted random host offsets
//! - [`render`] - ray tracing and flux-conserving renormalization
//! - [`catalog`] - CSV lens and host tables joined per system
//! - [`io`] - FITS stamp writer and reader
//! - [`sims`] - parallel batch runner
//!
//! Lens deflection, cosmology and special functions live in `lens_math`.

pub mod catalog;
pub mod error;
pub mod grid;
pub mod image_proc;
pub mod io;
pub mod photometry;
pub mod render;
pub mod sampling;
pub mod shared_args;
pub mod sims;

pub use catalog::{
    CatalogError, Component, HostCatalog, LensParams, LensSystem, ObjectType, SourceParams,
    SystemId,
};
pub use error::{DataError, SystemError, ValidationError, ZeroFluxError};
pub use grid::PixelGrid;
pub use image_proc::SersicProfile;
pub use io::{read_stamp, write_stamp, FitsError, Stamp};
pub use photometry::{magnitude_offset, Band, BandMagnitudes};
pub use render::{LensedImage, LensedImageSynthesizer, TracedGrid};
pub use sampling::{sample_offset, system_rng, SamplingError};
pub use sims::{run_batch, BatchConfig, BatchSummary, OffsetPolicy};
