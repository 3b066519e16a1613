//! Declarative session configuration (JSON via serde).

use std::path::PathBuf;
use std::time::Duration;

use robocal_core::{ConfigError, EdgeSpec, Real};
use serde::{Deserialize, Serialize};

use crate::{MarkerKind, MonitorConfig, MotionConfig, PoseSpace};

/// Frame names the session looks up besides the chain edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameNames {
    /// Externally tracked frame used as motion feedback.
    pub reference: String,
    /// Frame of the mobile base.
    pub base: String,
    /// Frame of the calibration target.
    pub marker: String,
    /// Frame the detector reports marker poses in.
    pub sensor: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            reference: "landmark_reference".into(),
            base: "base_link".into(),
            marker: "marker".into(),
            sensor: "camera_optical_frame".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    pub result_file: String,
    /// Recorded observations are written here (JSON) when set.
    pub observations_file: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("calibration"),
            result_file: "calibration_results.txt".into(),
            observations_file: None,
        }
    }
}

/// Everything a [`CalibrationSession`](super::CalibrationSession) needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Uncertain edges, in chain order.
    pub edges: Vec<EdgeSpec>,
    /// 1-indexed solve order; a permutation of `1..=edges.len()`.
    pub calibration_order: Vec<usize>,
    /// Passes over the calibration order; `0` selects the default.
    pub optimization_iterations: usize,
    pub frames: FrameNames,
    pub poses: PoseSpace,
    pub motion: MotionConfig,
    pub monitor: MonitorConfig,
    pub marker: MarkerKind,
    pub storage: StorageConfig,
    /// Bound on each startup wait (s).
    pub startup_timeout_s: Real,
    /// Bound on the wait for a fresh sensor frame after a move (s).
    pub frame_timeout_s: Real,
    /// Frames older than this are ignored (s).
    pub max_frame_age_s: Real,
    /// Polling period of blocking waits (s).
    pub poll_interval_s: Real,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            calibration_order: Vec::new(),
            optimization_iterations: robocal_linear::DEFAULT_ITERATIONS,
            frames: FrameNames::default(),
            poses: PoseSpace::default(),
            motion: MotionConfig::default(),
            monitor: MonitorConfig::default(),
            marker: MarkerKind::default(),
            storage: StorageConfig::default(),
            startup_timeout_s: 10.0,
            frame_timeout_s: 10.0,
            max_frame_age_s: 10.0,
            poll_interval_s: 0.05,
        }
    }
}

impl SessionConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.startup_timeout_s)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.frame_timeout_s)
    }

    pub fn max_frame_age(&self) -> Duration {
        Duration::from_secs_f64(self.max_frame_age_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_s)
    }

    /// Checks that need no collaborator: timing values and nested configs.
    pub fn validate_timing(&self) -> Result<(), ConfigError> {
        let values = [
            ("startup_timeout_s", self.startup_timeout_s),
            ("frame_timeout_s", self.frame_timeout_s),
            ("max_frame_age_s", self.max_frame_age_s),
            ("poll_interval_s", self.poll_interval_s),
        ];
        for (name, value) in values {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be a positive number of seconds, got {value}"),
                });
            }
        }
        if self.monitor.history_capacity == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "monitor.history_capacity",
                reason: "history needs at least one slot".into(),
            });
        }
        self.motion.validate()
    }
}
