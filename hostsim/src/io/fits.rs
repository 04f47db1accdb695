//! FITS postage-stamp output
//!
//! Each stamp is a single primary HDU holding 32-bit float pixels with the
//! lensed magnitudes and identifying metadata in the header:
//!
//! | Key          | Content                                   |
//! |--------------|-------------------------------------------|
//! | `LENS_ID`    | lens system identifier                    |
//! | `GALTYPE`    | `bulge` or `disk`                         |
//! | `MAGNORM<B>` | lensed apparent magnitude in band `B`     |
//! | `PIXSIZE`    | pixel size in arcsec                      |
//!
//! Pixel `[i, j]` of the array is written at row-major offset `i * side + j`.

use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{Component, SystemId};
use crate::photometry::{Band, BandMagnitudes};

/// Errors that can occur during FITS file operations
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("system id {0} does not fit a signed 64-bit LENS_ID")]
    IdOutOfRange(SystemId),
    #[error("invalid header value for {key}: {value}")]
    InvalidHeader { key: &'static str, value: String },
    #[error("image data does not match header shape {rows}x{cols}")]
    ShapeMismatch { rows: usize, cols: usize },
}

/// Contents of a stamp read back from disk
#[derive(Debug, Clone)]
pub struct Stamp {
    pub pixels: Array2<f32>,
    pub system_id: SystemId,
    pub component: Component,
    pub magnitudes: BandMagnitudes,
    pub pixel_size: f64,
}

/// Write one lensed component to `path`, replacing any existing file
///
/// Parent directories are created as needed.
pub fn write_stamp<P: AsRef<Path>>(
    pixels: &Array2<f64>,
    magnitudes: &BandMagnitudes,
    system_id: SystemId,
    component: Component,
    pixel_size: f64,
    path: P,
) -> Result<(), FitsError> {
    let path = path.as_ref();
    let lens_id = i64::try_from(system_id).map_err(|_| FitsError::IdOutOfRange(system_id))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let (rows, cols) = pixels.dim();
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[rows, cols],
    };

    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    let flat_data: Vec<f32> = pixels.iter().map(|&v| v as f32).collect();
    hdu.write_image(&mut fptr, &flat_data)?;

    hdu.write_key(&mut fptr, "LENS_ID", lens_id)?;
    hdu.write_key(&mut fptr, "GALTYPE", component.as_str())?;
    for (band, magnitude) in magnitudes.iter() {
        hdu.write_key(&mut fptr, &band.header_key(), magnitude)?;
    }
    hdu.write_key(&mut fptr, "PIXSIZE", pixel_size)?;

    Ok(())
}

/// Read a stamp written by [`write_stamp`]
pub fn read_stamp<P: AsRef<Path>>(path: P) -> Result<Stamp, FitsError> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;

    let cols = hdu.read_key::<i64>(&mut fptr, "NAXIS1")? as usize;
    let rows = hdu.read_key::<i64>(&mut fptr, "NAXIS2")? as usize;
    let data: Vec<f32> = hdu.read_image(&mut fptr)?;
    let pixels = Array2::from_shape_vec((rows, cols), data)
        .map_err(|_| FitsError::ShapeMismatch { rows, cols })?;

    let lens_id = hdu.read_key::<i64>(&mut fptr, "LENS_ID")?;
    let system_id = SystemId::try_from(lens_id).map_err(|_| FitsError::InvalidHeader {
        key: "LENS_ID",
        value: lens_id.to_string(),
    })?;

    let galtype = hdu.read_key::<String>(&mut fptr, "GALTYPE")?;
    let component = Component::ALL
        .into_iter()
        .find(|c| c.as_str() == galtype.trim())
        .ok_or(FitsError::InvalidHeader {
            key: "GALTYPE",
            value: galtype,
        })?;

    let mut magnitudes = BandMagnitudes::default();
    for band in Band::ALL {
        let magnitude = hdu.read_key::<f64>(&mut fptr, &band.header_key())?;
        magnitudes.insert(band, magnitude);
    }
    let pixel_size = hdu.read_key::<f64>(&mut fptr, "PIXSIZE")?;

    Ok(Stamp {
        pixels,
        system_id,
        component,
        magnitudes,
        pixel_size,
    })
}
