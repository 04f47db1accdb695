//! Lens and host catalog ingestion
//!
//! Two CSV tables per object type are joined on `lens_cat_sys_id`:
//!
//! - `<type>_lens.csv`: one row per lens galaxy (velocity dispersion,
//!   ellipticity, position angle, external shear, redshift)
//! - `<type>_hosts.csv`: host-galaxy bulge and disk parameters; systems may
//!   carry one row per lensed image, in which case the `image_number == 0`
//!   row is used
//!
//! Records that cannot form a valid system are rejected at load time with a
//! [`DataError`] and never reach the renderer. Unreadable or malformed files
//! are fatal.

use clap::ValueEnum;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::{DataError, ValidationError};
use crate::image_proc::SersicProfile;
use crate::photometry::{Band, BandMagnitudes};

/// Lens system identifier shared by the lens and host tables
pub type SystemId = u64;

/// Host-galaxy light component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Bulge,
    Disk,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Bulge, Component::Disk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Bulge => "bulge",
            Component::Disk => "disk",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class of lensed transient whose hosts are being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectType {
    Agn,
    Sne,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Agn => "agn",
            ObjectType::Sne => "sne",
        }
    }

    pub fn lens_table(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_lens.csv", self.as_str()))
    }

    pub fn host_table(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_hosts.csv", self.as_str()))
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lens galaxy mass model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensParams {
    pub system_id: SystemId,
    /// Lens-plane position (arcsec)
    pub x: f64,
    pub y: f64,
    /// Axis ratio b/a
    pub axis_ratio: f64,
    /// Position angle (degrees)
    pub position_angle: f64,
    /// Velocity dispersion (km/s)
    pub velocity_dispersion: f64,
    pub redshift: f64,
    /// External shear magnitude
    pub shear: f64,
    /// External shear angle (degrees)
    pub shear_angle: f64,
}

impl LensParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |parameter: &'static str, value: f64| {
            Err(ValidationError::InvalidParameter { parameter, value })
        };

        if !self.x.is_finite() {
            return invalid("lens x", self.x);
        }
        if !self.y.is_finite() {
            return invalid("lens y", self.y);
        }
        if !(self.axis_ratio.is_finite() && self.axis_ratio > 0.0 && self.axis_ratio <= 1.0) {
            return invalid("lens axis ratio", self.axis_ratio);
        }
        if !self.position_angle.is_finite() {
            return invalid("lens position angle", self.position_angle);
        }
        if !(self.velocity_dispersion.is_finite() && self.velocity_dispersion > 0.0) {
            return invalid("velocity dispersion", self.velocity_dispersion);
        }
        if !(self.redshift.is_finite() && self.redshift >= 0.0) {
            return invalid("lens redshift", self.redshift);
        }
        if !self.shear.is_finite() {
            return invalid("external shear", self.shear);
        }
        if !self.shear_angle.is_finite() {
            return invalid("external shear angle", self.shear_angle);
        }
        Ok(())
    }

    /// Lensing ellipticity `1 - q`
    pub fn ellipticity(&self) -> f64 {
        1.0 - self.axis_ratio
    }
}

/// One host-galaxy light component in the source plane
#[derive(Debug, Clone, PartialEq)]
pub struct SourceParams {
    pub system_id: SystemId,
    pub component: Component,
    pub profile: SersicProfile,
    /// Catalog (unlensed) magnitude per band
    pub magnitudes: BandMagnitudes,
    pub redshift: f64,
}

impl SourceParams {
    /// Copy with the centroid moved to `(x, y)`
    pub fn with_centroid(&self, x: f64, y: f64) -> Self {
        Self {
            profile: self.profile.centered_at(x, y),
            ..self.clone()
        }
    }
}

/// A lens and the two components of its background host
#[derive(Debug, Clone, PartialEq)]
pub struct LensSystem {
    pub system_id: SystemId,
    pub lens: LensParams,
    pub bulge: SourceParams,
    pub disk: SourceParams,
}

impl LensSystem {
    pub fn source(&self, component: Component) -> &SourceParams {
        match component {
            Component::Bulge => &self.bulge,
            Component::Disk => &self.disk,
        }
    }

    /// Catalog host position, shared by both components
    pub fn nominal_position(&self) -> (f64, f64) {
        (self.disk.profile.x0, self.disk.profile.y0)
    }

    /// Move both components so the nominal position lies at `(dx, dy)` from
    /// the host centroid
    pub fn with_offset(&self, dx: f64, dy: f64) -> Self {
        let (x, y) = self.nominal_position();
        Self {
            bulge: self.bulge.with_centroid(x - dx, y - dy),
            disk: self.disk.with_centroid(x - dx, y - dy),
            ..self.clone()
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("malformed {table} table: {source}")]
    Parse {
        table: &'static str,
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct LensRow {
    lens_cat_sys_id: SystemId,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    vel_disp_lenscat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    ellip_lens: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    position_angle: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    gamma_lenscat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    phig_lenscat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    redshift: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct HostRow {
    lens_cat_sys_id: SystemId,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    image_number: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    redshift: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    x_src: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    y_src: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    position_angle: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_u: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_g: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_r: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_i: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_z: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_bulge_y: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_u: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_g: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_r: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_i: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_z: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    magnorm_disk_y: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    major_axis_bulge: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    minor_axis_bulge: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    major_axis_disk: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    minor_axis_disk: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    sindex_bulge: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    sindex_disk: Option<f64>,
}

/// Missing or unparseable numeric cells behave like NaN
fn value(cell: Option<f64>) -> f64 {
    cell.unwrap_or(f64::NAN)
}

impl LensRow {
    fn to_params(&self) -> LensParams {
        LensParams {
            system_id: self.lens_cat_sys_id,
            x: 0.0,
            y: 0.0,
            axis_ratio: 1.0 - value(self.ellip_lens),
            position_angle: value(self.position_angle),
            velocity_dispersion: value(self.vel_disp_lenscat),
            redshift: value(self.redshift),
            shear: value(self.gamma_lenscat),
            shear_angle: value(self.phig_lenscat),
        }
    }
}

impl HostRow {
    fn magnitudes(&self, component: Component) -> BandMagnitudes {
        BandMagnitudes::from_fn(|band| {
            let cell = match (component, band) {
                (Component::Bulge, Band::U) => self.magnorm_bulge_u,
                (Component::Bulge, Band::G) => self.magnorm_bulge_g,
                (Component::Bulge, Band::R) => self.magnorm_bulge_r,
                (Component::Bulge, Band::I) => self.magnorm_bulge_i,
                (Component::Bulge, Band::Z) => self.magnorm_bulge_z,
                (Component::Bulge, Band::Y) => self.magnorm_bulge_y,
                (Component::Disk, Band::U) => self.magnorm_disk_u,
                (Component::Disk, Band::G) => self.magnorm_disk_g,
                (Component::Disk, Band::R) => self.magnorm_disk_r,
                (Component::Disk, Band::I) => self.magnorm_disk_i,
                (Component::Disk, Band::Z) => self.magnorm_disk_z,
                (Component::Disk, Band::Y) => self.magnorm_disk_y,
            };
            value(cell)
        })
    }

    /// (major axis, minor axis, Sersic index)
    fn shape(&self, component: Component) -> (f64, f64, f64) {
        match component {
            Component::Bulge => (
                value(self.major_axis_bulge),
                value(self.minor_axis_bulge),
                value(self.sindex_bulge),
            ),
            Component::Disk => (
                value(self.major_axis_disk),
                value(self.minor_axis_disk),
                value(self.sindex_disk),
            ),
        }
    }

    fn to_source(&self, component: Component) -> Result<SourceParams, DataError> {
        let system_id = self.lens_cat_sys_id;
        let (x, y) = (value(self.x_src), value(self.y_src));
        if !(x.is_finite() && y.is_finite()) {
            return Err(DataError::NonFinitePosition { system_id, x, y });
        }

        let magnitudes = self.magnitudes(component);
        if let Some(band) = magnitudes.first_non_finite() {
            return Err(DataError::NonFiniteMagnitude {
                system_id,
                component,
                band,
            });
        }

        let (major, minor, sersic_index) = self.shape(component);
        let profile = SersicProfile::new(
            x,
            y,
            (minor * major).sqrt(),
            minor / major,
            value(self.position_angle),
            sersic_index,
        )
        .map_err(|source| DataError::InvalidSource {
            system_id,
            component,
            source,
        })?;

        Ok(SourceParams {
            system_id,
            component,
            profile,
            magnitudes,
            redshift: value(self.redshift),
        })
    }
}

fn build_system(lens: &LensRow, host: &HostRow) -> Result<LensSystem, DataError> {
    let system_id = lens.lens_cat_sys_id;
    let lens = lens.to_params();
    lens.validate()
        .map_err(|source| DataError::InvalidLens { system_id, source })?;

    Ok(LensSystem {
        system_id,
        lens,
        bulge: host.to_source(Component::Bulge)?,
        disk: host.to_source(Component::Disk)?,
    })
}

fn read_rows<T, R>(reader: R, table: &'static str) -> Result<Vec<T>, CatalogError>
where
    T: DeserializeOwned,
    R: io::Read,
{
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|source| CatalogError::Parse { table, source })
}

/// Joined lens systems keyed by id, plus the records rejected while joining
#[derive(Debug, Clone, Default)]
pub struct HostCatalog {
    systems: BTreeMap<SystemId, LensSystem>,
    rejected: Vec<DataError>,
}

impl HostCatalog {
    /// Load `<dir>/<type>_lens.csv` and `<dir>/<type>_hosts.csv`
    pub fn load(dir: &Path, object_type: ObjectType) -> Result<Self, CatalogError> {
        let open = |path: PathBuf| {
            std::fs::File::open(&path).map_err(|source| CatalogError::Open { path, source })
        };
        let lens_file = open(object_type.lens_table(dir))?;
        let host_file = open(object_type.host_table(dir))?;
        Self::from_readers(lens_file, host_file)
    }

    /// Join lens and host tables from arbitrary CSV sources
    pub fn from_readers<L: io::Read, H: io::Read>(
        lens: L,
        hosts: H,
    ) -> Result<Self, CatalogError> {
        let lens_rows: Vec<LensRow> = read_rows(lens, "lens")?;
        let host_rows: Vec<HostRow> = read_rows(hosts, "host")?;

        let mut rejected = Vec::new();

        let mut lenses: BTreeMap<SystemId, Option<LensRow>> = BTreeMap::new();
        for row in lens_rows {
            match lenses.entry(row.lens_cat_sys_id) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(row));
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().is_some() {
                        rejected.push(DataError::DuplicateLens {
                            system_id: row.lens_cat_sys_id,
                        });
                    }
                    slot.insert(None);
                }
            }
        }

        let mut hosts: BTreeMap<SystemId, HostRow> = BTreeMap::new();
        for row in host_rows {
            match hosts.entry(row.lens_cat_sys_id) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(mut slot) => {
                    if row.image_number == Some(0) && slot.get().image_number != Some(0) {
                        slot.insert(row);
                    }
                }
            }
        }

        let mut systems = BTreeMap::new();
        for (system_id, lens) in lenses {
            let Some(lens) = lens else { continue };
            let Some(host) = hosts.get(&system_id) else {
                rejected.push(DataError::MissingHost { system_id });
                continue;
            };
            match build_system(&lens, host) {
                Ok(system) => {
                    systems.insert(system_id, system);
                }
                Err(err) => rejected.push(err),
            }
        }

        let orphans = hosts.keys().filter(|id| !systems.contains_key(id)).count();
        if orphans > 0 {
            debug!("{orphans} host records without a usable lens");
        }
        for err in &rejected {
            warn!("Rejected at load: {err}");
        }

        Ok(Self { systems, rejected })
    }

    pub fn get(&self, system_id: SystemId) -> Option<&LensSystem> {
        self.systems.get(&system_id)
    }

    /// Valid systems in ascending id order
    pub fn systems(&self) -> impl Iterator<Item = &LensSystem> + '_ {
        self.systems.values()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Records dropped while joining, with the reason
    pub fn rejected(&self) -> &[DataError] {
        &self.rejected
    }
}
