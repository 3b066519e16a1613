//! Safety gate on the externally tracked reference frame.
//!
//! The tracked pose is `reference_se3_base`; its stability metric is the
//! squared distance between the two origins. Three gates, in order:
//!
//! 1. the lookup succeeds (soft),
//! 2. the metric stays within `max_reference_distance²` (fatal),
//! 3. the metric stays within `stability_tolerance` of the running
//!    average of the history (soft).

use std::time::{Duration, Instant};

use log::{debug, warn};
use robocal_core::{Iso3, Real};
use serde::{Deserialize, Serialize};

use crate::{MotionError, PoseLookup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Largest allowed distance between base and reference frame (m);
    /// `<= 0` disables the check.
    pub max_reference_distance: Real,
    /// Allowed relative deviation from the history average.
    pub stability_tolerance: Real,
    /// Number of samples in the circular history.
    pub history_capacity: usize,
    /// Minimum interval between two history updates (s).
    pub history_interval_s: Real,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_reference_distance: 1.0,
            stability_tolerance: 0.15,
            history_capacity: 10,
            history_interval_s: 0.1,
        }
    }
}

/// Fixed-capacity circular buffer of stability samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceHistory {
    samples: Vec<Real>,
    next: usize,
    last_update: Option<Instant>,
}

impl ReferenceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            next: 0,
            last_update: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Overwrite every slot with `value`.
    pub fn fill(&mut self, value: Real) {
        self.samples.iter_mut().for_each(|s| *s = value);
        self.next = 0;
    }

    pub fn average(&self) -> Real {
        self.samples.iter().sum::<Real>() / self.samples.len() as Real
    }

    /// Store `value` in the oldest slot unless the previous update is less
    /// than `min_interval` ago. Returns whether the sample was stored.
    pub fn push(&mut self, value: Real, now: Instant, min_interval: Duration) -> bool {
        if let Some(last) = self.last_update
            && now.saturating_duration_since(last) < min_interval
        {
            return false;
        }
        self.last_update = Some(now);
        self.samples[self.next] = value;
        self.next = (self.next + 1) % self.samples.len();
        true
    }
}

/// Validates the tracked reference frame before every control tick.
#[derive(Debug, Clone)]
pub struct ReferenceFrameMonitor {
    config: MonitorConfig,
    reference_frame: String,
    base_frame: String,
    history: ReferenceHistory,
}

impl ReferenceFrameMonitor {
    pub fn new(
        config: MonitorConfig,
        reference_frame: impl Into<String>,
        base_frame: impl Into<String>,
    ) -> Self {
        let history = ReferenceHistory::new(config.history_capacity);
        Self {
            config,
            reference_frame: reference_frame.into(),
            base_frame: base_frame.into(),
            history,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn history(&self) -> &ReferenceHistory {
        &self.history
    }

    /// Stability metric of a tracked pose.
    pub fn metric(reference_se3_base: &Iso3) -> Real {
        reference_se3_base.translation.vector.norm_squared()
    }

    /// Reset the history to the metric of `reference_se3_base`.
    pub fn prime(&mut self, reference_se3_base: &Iso3) {
        let metric = Self::metric(reference_se3_base);
        debug!("reference history primed with {metric:.4}");
        self.history = ReferenceHistory::new(self.config.history_capacity);
        self.history.fill(metric);
    }

    /// Look up the tracked pose and run all gates on it.
    pub fn validate(&mut self, lookup: &dyn PoseLookup, now: Instant) -> Result<Iso3, MotionError> {
        let pose = lookup
            .lookup(&self.reference_frame, &self.base_frame)
            .inspect_err(|e| warn!("reference frame lookup failed: {e}"))?;
        self.check_metric(Self::metric(&pose), now)?;
        Ok(pose)
    }

    /// Run the distance and stability gates on a raw metric value.
    pub fn check_metric(&mut self, metric: Real, now: Instant) -> Result<(), MotionError> {
        let max = self.config.max_reference_distance;
        if max > 0.0 && metric > max * max {
            log::error!("reference frame too far away from the robot ({metric:.3} > {max:.3}²)");
            return Err(MotionError::ReferenceTooFar {
                squared_distance: metric,
                max,
            });
        }

        let average = self.history.average();
        self.history.push(
            metric,
            now,
            Duration::from_secs_f64(self.config.history_interval_s),
        );

        if average == 0.0 || (1.0 - metric / average).abs() > self.config.stability_tolerance {
            warn!("reference frame unstable: {metric:.4} vs average {average:.4}");
            return Err(MotionError::ReferenceUnstable {
                current: metric,
                average,
            });
        }
        Ok(())
    }
}
