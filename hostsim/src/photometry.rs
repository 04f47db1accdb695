//! Photometric bands and per-band magnitude bookkeeping
//!
//! Catalog magnitudes come in the six LSST bands. Lensing is achromatic, so
//! the magnitude shift implied by flux conservation is the same in every band
//! and is applied once over the whole mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// LSST photometric band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
}

impl Band {
    /// All bands in wavelength order
    pub const ALL: [Band; 6] = [Band::U, Band::G, Band::R, Band::I, Band::Z, Band::Y];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::U => "u",
            Band::G => "g",
            Band::R => "r",
            Band::I => "i",
            Band::Z => "z",
            Band::Y => "y",
        }
    }

    /// FITS header keyword carrying this band's magnitude
    pub fn header_key(&self) -> String {
        format!("MAGNORM{}", self.as_str().to_uppercase())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::ALL
            .iter()
            .copied()
            .find(|band| band.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown band '{s}', expected one of ugrizy"))
    }
}

/// Magnitude per photometric band
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandMagnitudes(BTreeMap<Band, f64>);

impl BandMagnitudes {
    /// Build from a function evaluated for every band
    pub fn from_fn<F: FnMut(Band) -> f64>(mut f: F) -> Self {
        Self(Band::ALL.iter().map(|&band| (band, f(band))).collect())
    }

    /// Same magnitude in all bands
    pub fn uniform(magnitude: f64) -> Self {
        Self::from_fn(|_| magnitude)
    }

    pub fn get(&self, band: Band) -> Option<f64> {
        self.0.get(&band).copied()
    }

    pub fn insert(&mut self, band: Band, magnitude: f64) {
        self.0.insert(band, magnitude);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        self.0.iter().map(|(&band, &mag)| (band, mag))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shift every band by `delta` magnitudes
    pub fn offset(&self, delta: f64) -> Self {
        Self(self.0.iter().map(|(&band, &mag)| (band, mag + delta)).collect())
    }

    /// First band holding a NaN or infinite magnitude, if any
    pub fn first_non_finite(&self) -> Option<Band> {
        self.iter()
            .find(|(_, mag)| !mag.is_finite())
            .map(|(band, _)| band)
    }
}

/// Magnitude change for a flux ratio, `-2.5 log10(lensed / unlensed)`
///
/// Negative when the lensed flux is larger (magnified, brighter).
pub fn magnitude_offset(lensed_flux: f64, unlensed_flux: f64) -> f64 {
    -2.5 * (lensed_flux / unlensed_flux).log10()
}
