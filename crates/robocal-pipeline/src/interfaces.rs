//! Collaborators the calibration core talks to.
//!
//! Everything hardware- or middleware-specific sits behind these traits.
//! All methods take `&self`; implementations that hold mutable state use
//! interior mutability, as the simulated backend does.

use std::io;
use std::time::Duration;

use robocal_core::{Iso3, MarkerDetection, Real};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("transform {target} <- {from} is not available")]
    Unavailable { target: String, from: String },
    #[error("unknown frame {0}")]
    UnknownFrame(String),
}

/// Frame-tree lookups.
pub trait PoseLookup {
    /// Returns `target_se3_source`: maps `source` coordinates into `target`.
    fn lookup(&self, target: &str, source: &str) -> Result<Iso3, LookupError>;
}

/// Planar body-frame velocity of a mobile base.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward velocity (m/s).
    pub vx: Real,
    /// Lateral velocity (m/s).
    pub vy: Real,
    /// Yaw rate (rad/s).
    pub wz: Real,
}

impl VelocityCommand {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.wz == 0.0
    }
}

/// Fire-and-forget velocity interface of the mobile base.
pub trait VelocityActuator {
    fn send(&self, command: VelocityCommand);
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActuatorError {
    #[error("goal not reached within {budget:?}")]
    Timeout { budget: Duration },
    #[error("goal rejected: {0}")]
    Rejected(String),
}

/// Position-controlled joints (arm, pan-tilt unit, ...).
pub trait JointActuator {
    /// Number of joints expected in every goal.
    fn dof(&self) -> usize;

    /// Current joint values, one per joint.
    fn positions(&self) -> Result<Vec<Real>, ActuatorError>;

    /// Block until the joints reach `target` or `budget` elapses.
    fn move_to(&self, target: &[Real], budget: Duration) -> Result<(), ActuatorError>;
}

/// Calibration target kinds a detector can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    #[default]
    Checkerboard,
    Pitag,
}

/// Estimates the marker pose from one sensor frame `F`.
pub trait TargetDetector<F> {
    fn kind(&self) -> MarkerKind;

    /// `None` when the marker is not found in the frame.
    fn detect(&self, frame: &F) -> Option<MarkerDetection>;
}

/// Append-only sink for human-readable results.
pub trait ResultStore {
    fn append(&self, text: &str) -> io::Result<()>;
}
