//! Calibration session: configuration, run loop and reporting.

mod calibsession;
pub mod config;
pub mod types;

pub use calibsession::*;
pub use config::*;
pub use types::*;
