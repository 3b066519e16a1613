//! Deterministic simulated robot.
//!
//! [`SimWorld`] implements [`PoseLookup`](crate::PoseLookup),
//! [`VelocityActuator`](crate::VelocityActuator),
//! [`JointActuator`](crate::JointActuator) and [`Clock`](crate::Clock) on
//! a single virtual-time state, so a whole
//! [`CalibrationSession`](crate::CalibrationSession) runs in milliseconds
//! and is reproducible. [`PanTiltScenario`] wires it up with a matching
//! session configuration.

mod backends;
mod scenario;
mod world;

pub use backends::*;
pub use scenario::*;
pub use world::*;
