//! Shared helpers.
//!
//! - [`app_data`] - Configuration file and default locations (XDG-compliant)
//! - [`encoding`] - Varints and fixed-width integers for the database format
//! - [`progress`] - Spinner that compiles to a no-op without the `progress` feature

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
