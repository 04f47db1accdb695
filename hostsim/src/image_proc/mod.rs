//! Source-plane surface-brightness models

pub mod sersic;

pub use sersic::SersicProfile;
