//! Shared helpers for hostsim integration tests

#![allow(dead_code)]

use hostsim::photometry::Band;
use std::fmt::Write as _;
use std::path::Path;

/// One lens + host pair to be written into the CSV tables
#[derive(Debug, Clone)]
pub struct SystemRow {
    pub id: u64,
    pub vel_disp: f64,
    pub ellip: f64,
    pub lens_pa: f64,
    pub z_lens: f64,
    pub z_source: f64,
    pub x_src: f64,
    pub y_src: f64,
    pub host_pa: f64,
    pub magnitude: f64,
}

impl SystemRow {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            vel_disp: 250.0,
            ellip: 0.3,
            lens_pa: 30.0,
            z_lens: 0.5,
            z_source: 1.0,
            x_src: 0.05,
            y_src: -0.03,
            host_pa: 10.0,
            magnitude: 22.0,
        }
    }
}

/// Write `<dir>/<prefix>_lens.csv` and `<dir>/<prefix>_hosts.csv`
pub fn write_catalog(dir: &Path, prefix: &str, rows: &[SystemRow]) {
    let mut lens = String::from(
        "lens_cat_sys_id,vel_disp_lenscat,ellip_lens,position_angle,gamma_lenscat,phig_lenscat,redshift\n",
    );
    for r in rows {
        writeln!(
            lens,
            "{},{},{},{},0.0,0.0,{}",
            r.id, r.vel_disp, r.ellip, r.lens_pa, r.z_lens
        )
        .unwrap();
    }

    let mut header = vec![
        "lens_cat_sys_id".to_string(),
        "image_number".into(),
        "redshift".into(),
        "x_src".into(),
        "y_src".into(),
        "position_angle".into(),
    ];
    for comp in ["bulge", "disk"] {
        for band in Band::ALL {
            header.push(format!("magnorm_{comp}_{band}"));
        }
    }
    header.extend(
        [
            "major_axis_bulge",
            "minor_axis_bulge",
            "major_axis_disk",
            "minor_axis_disk",
            "sindex_bulge",
            "sindex_disk",
        ]
        .map(String::from),
    );

    let mut hosts = header.join(",") + "\n";
    for r in rows {
        let mut cells = vec![
            r.id.to_string(),
            "0".into(),
            r.z_source.to_string(),
            r.x_src.to_string(),
            r.y_src.to_string(),
            r.host_pa.to_string(),
        ];
        cells.extend(std::iter::repeat(format!("{}", r.magnitude + 1.0)).take(6));
        cells.extend(std::iter::repeat(format!("{}", r.magnitude)).take(6));
        // Bulge: Reff 0.1, q 0.8; disk: Reff 0.3, q 0.5
        cells.extend(
            [0.1 / 0.8_f64.sqrt(), 0.1 * 0.8_f64.sqrt(), 0.3 / 0.5_f64.sqrt(), 0.3 * 0.5_f64.sqrt()]
                .map(|v| v.to_string()),
        );
        cells.extend(["4.0".to_string(), "1.0".to_string()]);
        hosts.push_str(&cells.join(","));
        hosts.push('\n');
    }

    std::fs::write(dir.join(format!("{prefix}_lens.csv")), lens).unwrap();
    std::fs::write(dir.join(format!("{prefix}_hosts.csv")), hosts).unwrap();
}
