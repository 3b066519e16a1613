//! Core math and data model for `robocal`.
//!
//! This crate provides the building blocks shared by the other crates of
//! the workspace:
//!
//! - linear algebra type aliases (`Real`, `Pt3`, `Iso3`, and friends) and
//!   the single roll/pitch/yaw convention used for reporting,
//! - the kinematic-chain data model ([`Chain`], [`Edge`], [`CalibrationOrder`]),
//! - robot configurations and per-configuration observations,
//! - [`ConfigError`], raised for malformed declarative input.
//!
//! # Modules
//!
//! - \[`math`\]: type aliases and pose helpers.
//! - \[`types`\]: chain, configuration and observation types.
//! - \[`synthetic`\]: deterministic synthetic data helpers (tests/demos).
//!
//! # Example
//!
//! ```
//! use robocal_core::{CalibrationOrder, Chain, EdgeSpec, Iso3};
//!
//! let specs = [
//!     EdgeSpec::new("base_link", "arm_mount"),
//!     EdgeSpec::new("arm_tip", "camera"),
//! ];
//! let chain = Chain::new(&specs, &[Iso3::identity(); 2]).unwrap();
//! assert_eq!(chain.num_bridges(), 1);
//!
//! let order = CalibrationOrder::from_one_based(&[2, 1], chain.len()).unwrap();
//! assert_eq!(order.indices(), &[1, 0]);
//! ```

mod error;
/// Linear algebra type aliases and helpers.
mod math;
/// Deterministic synthetic data generation helpers.
///
/// Small building blocks for constructing synthetic chain calibration
/// problems (target grids, chain observations, noise). Used by workspace
/// tests and the simulated backend.
pub mod synthetic;
/// Chain, configuration and observation types.
mod types;

pub use error::*;
pub use math::*;
pub use types::*;
