//! Stamp export and import

pub mod fits;

pub use fits::{read_stamp, write_stamp, FitsError, Stamp};
