use robocal_core::Real;
use thiserror::Error;

use crate::{ActuatorError, LookupError};

/// How the session must react to a failed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retry the move, then skip the configuration.
    Soft,
    /// Stop the whole session.
    Fatal,
}

/// Errors raised while driving the robot to a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    #[error("reference frame lookup failed: {0}")]
    LookupFailed(#[from] LookupError),
    #[error("reference frame too far away: squared distance {squared_distance:.3} exceeds {max:.3}²")]
    ReferenceTooFar { squared_distance: Real, max: Real },
    #[error("reference frame unstable: {current:.4} deviates from running average {average:.4}")]
    ReferenceUnstable { current: Real, average: Real },
    #[error("divergence in {quantity}: error {error:.4} exceeds start error {baseline:.4} + margin")]
    Diverged {
        quantity: &'static str,
        error: Real,
        baseline: Real,
    },
    #[error("joint move failed: {0}")]
    Joint(ActuatorError),
    #[error("joint {joint} goal {target:.3} is more than {max:.3} rad from its current value {current:.3}")]
    JointDeviation {
        joint: usize,
        current: Real,
        target: Real,
        max: Real,
    },
    #[error("no {0} available for this configuration")]
    MissingActuator(&'static str),
    #[error("motion cancelled")]
    Cancelled,
}

impl MotionError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::LookupFailed(_)
            | Self::ReferenceUnstable { .. }
            | Self::Joint(ActuatorError::Timeout { .. }) => Severity::Soft,
            Self::ReferenceTooFar { .. }
            | Self::Diverged { .. }
            | Self::Joint(ActuatorError::Rejected(_))
            | Self::JointDeviation { .. }
            | Self::MissingActuator(_)
            | Self::Cancelled => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Short error code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LookupFailed(_) => "LOOKUP_FAILED",
            Self::ReferenceTooFar { .. } => "REFERENCE_TOO_FAR",
            Self::ReferenceUnstable { .. } => "REFERENCE_UNSTABLE",
            Self::Diverged { .. } => "DIVERGED",
            Self::Joint(_) => "JOINT",
            Self::JointDeviation { .. } => "JOINT_DEVIATION",
            Self::MissingActuator(_) => "MISSING_ACTUATOR",
            Self::Cancelled => "CANCELLED",
        }
    }
}
