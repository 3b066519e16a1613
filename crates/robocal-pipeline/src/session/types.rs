//! Session log, report and dataset types.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use robocal_core::{CalibrationOrder, Chain, ChainObservation, Edge, EdgeSpec, Iso3, Real, Rpy};
use robocal_linear::{ChainSolveReport, TransformChainCalibrator};
use serde::{Deserialize, Serialize};

/// Lightweight operation log entry (audit trail, not for replay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,
    /// Operation name (e.g. "startup", "move", "observe", "solve").
    pub operation: String,
    pub success: bool,
    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// Get the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Final estimate of one edge, in reporting form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeResult {
    pub parent: String,
    pub child: String,
    pub transform: Iso3,
    pub xyz: [Real; 3],
    pub rpy: Rpy,
}

impl From<&Edge> for EdgeResult {
    fn from(edge: &Edge) -> Self {
        let t = edge.transform.translation.vector;
        Self {
            parent: edge.parent.clone(),
            child: edge.child.clone(),
            transform: edge.transform,
            xyz: [t.x, t.y, t.z],
            rpy: Rpy::from_iso(&edge.transform),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedConfiguration {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Number of generated configurations.
    pub configurations: usize,
    /// Configurations that produced an observation.
    pub visited: Vec<usize>,
    pub skipped: Vec<SkippedConfiguration>,
    pub solve: ChainSolveReport,
    pub edges: Vec<EdgeResult>,
    pub log: Vec<LogEntry>,
}

/// Recorded observations and the initial estimates they were taken with.
///
/// Enough to re-run the solver offline without moving the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationLog {
    pub edges: Vec<EdgeSpec>,
    pub initial: Vec<Iso3>,
    /// 1-indexed, as in [`SessionConfig`](super::SessionConfig).
    pub calibration_order: Vec<usize>,
    pub observations: Vec<ChainObservation>,
}

impl ObservationLog {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let log = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(log)
    }

    /// Solve the chain from the recorded data.
    pub fn solve(&self, iterations: usize) -> Result<(Chain, ChainSolveReport)> {
        let chain = Chain::new(&self.edges, &self.initial)?;
        let order = CalibrationOrder::from_one_based(&self.calibration_order, chain.len())?;
        let mut calibrator = TransformChainCalibrator::new(chain);
        for obs in &self.observations {
            calibrator.record_observation(obs.configuration, obs.clone())?;
        }
        let report = calibrator.solve(&order, iterations)?;
        Ok((calibrator.into_chain(), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robocal_core::{
        iso_from_xyz_rpy, pose_error,
        synthetic::{grid_points, observe_chain},
    };

    #[test]
    fn log_entry_failure_keeps_message() {
        let entry = LogEntry::failure("move", "tracking lost");
        assert!(!entry.success);
        assert_eq!(entry.notes.as_deref(), Some("tracking lost"));
        assert!(entry.timestamp > 0);
        assert!(LogEntry::success_with_notes("solve", "3 passes").success);
    }

    #[test]
    fn edge_result_reports_rpy() {
        let edge = Edge {
            parent: "a".into(),
            child: "b".into(),
            transform: iso_from_xyz_rpy([1.0, 2.0, 3.0], Rpy::new(0.1, 0.2, 0.3)),
            bridge_index: None,
        };
        let r = EdgeResult::from(&edge);
        assert_eq!(r.xyz, [1.0, 2.0, 3.0]);
        assert!((r.rpy.pitch - 0.2).abs() < 1e-10);
    }

    #[test]
    fn saved_log_re_solves_offline() {
        let gt = iso_from_xyz_rpy([0.2, 0.0, 0.4], Rpy::new(0.0, 0.1, 0.2));
        let specs = vec![EdgeSpec::new("base_link", "camera_link")];
        let chain = Chain::new(&specs, &[Iso3::identity()]).unwrap();
        let model = grid_points(3, 2, 0.05);
        let observations = (0..3)
            .map(|i| {
                let root_se3_marker =
                    iso_from_xyz_rpy([1.0, 0.1 * i as Real, 0.5], Rpy::new(0.0, 0.0, 0.1 * i as Real));
                observe_chain(&chain, &[gt], &[], root_se3_marker, &model, i)
            })
            .collect();
        let log = ObservationLog {
            edges: specs,
            initial: vec![Iso3::identity()],
            calibration_order: vec![1],
            observations,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/observations.json");
        log.save(&path).unwrap();
        let loaded = ObservationLog::load(&path).unwrap();
        assert_eq!(loaded.observations.len(), 3);

        let (chain, report) = loaded.solve(0).unwrap();
        assert!(report.all_solved());
        let (dt, dr) = pose_error(&chain.edge(0).transform, &gt);
        assert!(dt < 1e-6 && dr < 1e-6, "dt {dt}, dr {dr}");
    }
}
