use std::time::Duration;

use robocal_core::Real;
use serde::{Deserialize, Serialize};

/// Tuning of the closed-loop base controller and the move retry policy.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Proportional gain on the heading error.
    pub heading_gain: Real,
    /// Proportional gain on the position error.
    pub position_gain: Real,
    /// Bound on every commanded velocity component (m/s, rad/s).
    pub max_velocity: Real,
    /// Control loop rate (Hz).
    pub rate_hz: Real,
    /// No motion is commanded when the base already is this close in heading (rad)...
    pub start_heading_tolerance: Real,
    /// ...and per axis in position (m).
    pub start_position_tolerance: Real,
    /// Heading phases converge below this error (rad).
    pub heading_tolerance: Real,
    /// Translation phase converges when both axes are below this error (m).
    pub position_tolerance: Real,
    /// Allowed growth of the heading error over its phase start value (rad).
    pub heading_divergence_margin: Real,
    /// Allowed growth of a position error component over its start value (m).
    pub position_divergence_margin: Real,
    /// Attempts per move before the configuration is skipped.
    pub max_attempts: usize,
    /// Delay between attempts (s).
    pub retry_backoff_s: Real,
    /// Time budget for one joint-space move (s).
    pub joint_timeout_s: Real,
    /// Largest allowed difference between a joint goal and the current
    /// joint value (rad); `<= 0` disables the check.
    pub max_joint_deviation: Real,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            heading_gain: 0.25,
            position_gain: 0.25,
            max_velocity: 0.05,
            rate_hz: 20.0,
            start_heading_tolerance: 0.03,
            start_position_tolerance: 0.02,
            heading_tolerance: 0.02,
            position_tolerance: 0.01,
            heading_divergence_margin: 0.1,
            position_divergence_margin: 0.1,
            max_attempts: 3,
            retry_backoff_s: 2.0,
            joint_timeout_s: 30.0,
            max_joint_deviation: 0.0,
        }
    }
}

impl MotionConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_s)
    }

    pub fn joint_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.joint_timeout_s)
    }

    /// The joint deviation bound, if enabled.
    pub fn joint_deviation_limit(&self) -> Option<Real> {
        (self.max_joint_deviation > 0.0).then_some(self.max_joint_deviation)
    }

    pub fn clamp_velocity(&self, v: Real) -> Real {
        v.clamp(-self.max_velocity, self.max_velocity)
    }

    /// Reject values that would make the controller misbehave.
    pub fn validate(&self) -> Result<(), robocal_core::ConfigError> {
        use robocal_core::ConfigError::InvalidParameter;
        let positive = [
            ("motion.heading_gain", self.heading_gain),
            ("motion.position_gain", self.position_gain),
            ("motion.max_velocity", self.max_velocity),
            ("motion.rate_hz", self.rate_hz),
            ("motion.heading_tolerance", self.heading_tolerance),
            ("motion.position_tolerance", self.position_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(InvalidParameter {
                    name,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.max_attempts == 0 {
            return Err(InvalidParameter {
                name: "motion.max_attempts",
                reason: "at least one attempt is required".into(),
            });
        }
        if !(self.retry_backoff_s >= 0.0 && self.joint_timeout_s > 0.0) {
            return Err(InvalidParameter {
                name: "motion.retry_backoff_s",
                reason: "backoff must be >= 0 and joint timeout > 0".into(),
            });
        }
        if self.max_joint_deviation.is_nan() {
            return Err(InvalidParameter {
                name: "motion.max_joint_deviation",
                reason: "must be a number".into(),
            });
        }
        Ok(())
    }
}
