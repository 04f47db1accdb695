//! Per-system orchestration over a whole catalog
//!
//! Every lens system is independent: optional host offset, ray tracing,
//! rendering of both components, then one stamp per component. Failures are
//! contained to the system that raised them and collected into the summary.

use clap::ValueEnum;
use indicatif::ProgressBar;
use lens_math::{DeflectionOracle, LensModelError};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::{Component, HostCatalog, LensSystem, ObjectType, SystemId};
use crate::error::SystemError;
use crate::io::fits::{write_stamp, FitsError};
use crate::render::{LensedImage, LensedImageSynthesizer};
use crate::sampling::{sample_offset, system_rng};

/// Host centroids further than this from the lens are worth a look (arcsec)
const FAR_HOST_RADIUS: f64 = 5.0;

/// When to perturb host centroids with a light-weighted random offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OffsetPolicy {
    /// Supernova hosts only
    #[default]
    Auto,
    Always,
    Never,
}

impl OffsetPolicy {
    pub fn enabled_for(&self, object_type: ObjectType) -> bool {
        match self {
            OffsetPolicy::Auto => object_type == ObjectType::Sne,
            OffsetPolicy::Always => true,
            OffsetPolicy::Never => false,
        }
    }
}

/// Run-level settings shared by every system
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub object_type: ObjectType,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub offset_policy: OffsetPolicy,
    /// Process systems in order on the calling thread
    pub serial: bool,
}

impl BatchConfig {
    pub fn offsets_enabled(&self) -> bool {
        self.offset_policy.enabled_for(self.object_type)
    }

    /// `<outdir>/<type>_lensed_<component>s/<id>_<component>.fits`
    pub fn stamp_path(&self, system_id: SystemId, component: Component) -> PathBuf {
        stamp_path(&self.output_dir, self.object_type, system_id, component)
    }
}

pub fn stamp_path(
    output_dir: &Path,
    object_type: ObjectType,
    system_id: SystemId,
    component: Component,
) -> PathBuf {
    output_dir
        .join(format!("{object_type}_lensed_{component}s"))
        .join(format!("{system_id}_{component}.fits"))
}

/// What happened to one successfully written system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemOutcome {
    pub system_id: SystemId,
    /// Offset applied to the host, if any
    pub offset: Option<(f64, f64)>,
    pub bulge_magnitude_offset: f64,
    pub disk_magnitude_offset: f64,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Written systems in ascending id order
    pub outcomes: Vec<SystemOutcome>,
    /// Systems skipped during processing, in ascending id order
    pub failures: Vec<SystemError>,
    /// Records rejected while loading the catalog
    pub rejected_at_load: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

fn render_system<O: DeflectionOracle + ?Sized>(
    system: &LensSystem,
    synth: &LensedImageSynthesizer<'_, O>,
) -> Result<(LensedImage, LensedImage), SystemError> {
    let lens_error = |source: LensModelError| SystemError::LensModel {
        system_id: system.system_id,
        source,
    };

    let disk_trace = synth
        .trace(&system.lens, system.disk.redshift)
        .map_err(lens_error)?;
    let disk = synth.render_traced(&disk_trace, &system.disk)?;

    let bulge = if system.bulge.redshift == system.disk.redshift {
        synth.render_traced(&disk_trace, &system.bulge)?
    } else {
        let bulge_trace = synth
            .trace(&system.lens, system.bulge.redshift)
            .map_err(lens_error)?;
        synth.render_traced(&bulge_trace, &system.bulge)?
    };

    Ok((bulge, disk))
}

/// Sibling path a stamp is written to before being moved into place
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// A stamp written to its staging path, waiting to be renamed
struct StagedStamp {
    component: Component,
    staging: PathBuf,
    target: PathBuf,
}

fn discard(paths: impl IntoIterator<Item = PathBuf>) {
    for path in paths {
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("could not remove {}: {err}", path.display());
            }
        }
    }
}

/// Write every image to its staging path, or none of them
fn stage_stamps(
    images: &[&LensedImage],
    pixel_size: f64,
    config: &BatchConfig,
) -> Result<Vec<StagedStamp>, SystemError> {
    let mut staged: Vec<StagedStamp> = Vec::with_capacity(images.len());
    for image in images {
        let target = config.stamp_path(image.system_id, image.component);
        let staging = staging_path(&target);
        let written = write_stamp(
            &image.pixels,
            &image.magnitudes,
            image.system_id,
            image.component,
            pixel_size,
            &staging,
        );
        if let Err(source) = written {
            discard(staged.into_iter().map(|s| s.staging).chain([staging]));
            return Err(SystemError::Stamp {
                system_id: image.system_id,
                component: image.component,
                source,
            });
        }
        staged.push(StagedStamp {
            component: image.component,
            staging,
            target,
        });
    }
    Ok(staged)
}

/// Move staged stamps into place, rolling back already moved ones on failure
fn commit_stamps(system_id: SystemId, staged: &[StagedStamp]) -> Result<(), SystemError> {
    for (i, stamp) in staged.iter().enumerate() {
        if let Err(err) = fs::rename(&stamp.staging, &stamp.target) {
            let moved = staged[..i].iter().map(|s| s.target.clone());
            let pending = staged[i..].iter().map(|s| s.staging.clone());
            discard(moved.chain(pending));
            return Err(SystemError::Stamp {
                system_id,
                component: stamp.component,
                source: FitsError::Io(err),
            });
        }
    }
    Ok(())
}

/// Offset, render and write a single system
///
/// Both components are rendered before anything is written, and the stamps
/// only appear under their final names once both have been written, so a
/// failing system never leaves half its stamps behind.
pub fn process_system<O: DeflectionOracle + ?Sized>(
    system: &LensSystem,
    synth: &LensedImageSynthesizer<'_, O>,
    config: &BatchConfig,
) -> Result<SystemOutcome, SystemError> {
    let system_id = system.system_id;

    let (system, offset) = if config.offsets_enabled() {
        let mut rng = system_rng(config.seed, system_id);
        let (dx, dy) = sample_offset(&system.disk.profile, &mut rng)
            .map_err(|source| SystemError::Sampling { system_id, source })?;
        let shifted = system.with_offset(dx, dy);

        let (hx, hy) = (shifted.disk.profile.x0, shifted.disk.profile.y0);
        let separation = (hx - system.lens.x).hypot(hy - system.lens.y);
        if separation > FAR_HOST_RADIUS {
            debug!("system {system_id}: host centroid {separation:.2}\" from lens after offset");
        }
        (shifted, Some((dx, dy)))
    } else {
        (system.clone(), None)
    };

    let (bulge, disk) = render_system(&system, synth)?;

    let images = [&bulge, &disk];
    let staged = stage_stamps(&images, synth.grid().pixel_size(), config)?;
    commit_stamps(system_id, &staged)?;

    Ok(SystemOutcome {
        system_id,
        offset,
        bulge_magnitude_offset: bulge.magnitude_offset,
        disk_magnitude_offset: disk.magnitude_offset,
    })
}

/// Process every system in the catalog, skipping and reporting failures
pub fn run_batch<O: DeflectionOracle + ?Sized>(
    catalog: &HostCatalog,
    synth: &LensedImageSynthesizer<'_, O>,
    config: &BatchConfig,
    progress: &ProgressBar,
) -> BatchSummary {
    let systems: Vec<&LensSystem> = catalog.systems().collect();
    info!(
        "Rendering {} {} systems (offsets {})",
        systems.len(),
        config.object_type,
        if config.offsets_enabled() { "on" } else { "off" }
    );

    let run_one = |system: &&LensSystem| {
        let result = process_system(system, synth, config);
        progress.inc(1);
        result
    };

    let results: Vec<Result<SystemOutcome, SystemError>> = if config.serial {
        systems.iter().map(run_one).collect()
    } else {
        systems.par_iter().map(run_one).collect()
    };

    let mut summary = BatchSummary {
        rejected_at_load: catalog.rejected().len(),
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(err) => {
                warn!("Skipping: {err}");
                summary.failures.push(err);
            }
        }
    }

    info!(
        "Wrote {} systems, skipped {}, rejected at load {}",
        summary.processed(),
        summary.skipped(),
        summary.rejected_at_load
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_policy() {
        assert!(OffsetPolicy::Auto.enabled_for(ObjectType::Sne));
        assert!(!OffsetPolicy::Auto.enabled_for(ObjectType::Agn));
        assert!(OffsetPolicy::Always.enabled_for(ObjectType::Agn));
        assert!(!OffsetPolicy::Never.enabled_for(ObjectType::Sne));
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        let target = PathBuf::from("outputs/sne_lensed_disks/3_disk.fits");
        assert_eq!(
            staging_path(&target),
            PathBuf::from("outputs/sne_lensed_disks/3_disk.fits.partial")
        );
    }

    #[test]
    fn test_stamp_layout() {
        let config = BatchConfig {
            object_type: ObjectType::Agn,
            output_dir: PathBuf::from("outputs"),
            seed: 42,
            offset_policy: OffsetPolicy::Auto,
            serial: true,
        };
        assert_eq!(
            config.stamp_path(1234, Component::Bulge),
            PathBuf::from("outputs/agn_lensed_bulges/1234_bulge.fits")
        );
        assert_eq!(
            config.stamp_path(7, Component::Disk),
            PathBuf::from("outputs/agn_lensed_disks/7_disk.fits")
        );
    }
}
