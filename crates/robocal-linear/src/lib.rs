//! Closed-form solvers for `robocal`.
//!
//! - [`fit_rigid_transform`]: least-squares rigid transform between two
//!   point sets (SVD, with reflection correction).
//! - [`TransformChainCalibrator`]: accumulates chain observations and
//!   refines every uncertain edge of a kinematic chain by coordinate
//!   descent over a calibration order.

mod chain_solver;
mod rigid;

pub use chain_solver::*;
pub use rigid::*;
