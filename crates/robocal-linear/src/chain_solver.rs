//! Coordinate-descent solver for the uncertain edges of a kinematic chain.
//!
//! Every observation closes the loop `root -> ... -> tip -> marker` and
//! `root -> marker`. To solve edge `k`, the marker model points are mapped
//! into edge `k`'s parent frame (walking backwards from the root) and into
//! its child frame (walking forwards to the tip), using the current
//! estimates of every other edge. The edge is then re-fitted as the rigid
//! transform between the two point sets.
//!
//! ```text
//! parent_k_se3_marker = (E0 B0 .. E{k-1} B{k-1})^-1 * root_se3_marker
//! child_k_se3_marker  = Bk E{k+1} B{k+1} .. E{n-1} * tip_se3_marker
//! ```

use anyhow::{Result, ensure};
use log::{debug, info, warn};
use robocal_core::{
    CalibrationOrder, Chain, ChainObservation, Correspondence, Iso3, Pt3, Real,
};
use serde::{Deserialize, Serialize};

use crate::{fit_rigid_transform, rms_residual};

/// Number of passes used when the configured iteration count is zero.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Passes actually run for a requested iteration count.
///
/// A single-edge chain gains nothing from repetition and always runs one
/// pass; a request of `0` falls back to [`DEFAULT_ITERATIONS`].
pub fn effective_iterations(requested: usize, num_edges: usize) -> usize {
    if num_edges == 1 {
        if requested != 1 {
            debug!("single-edge chain: running 1 pass instead of {requested}");
        }
        return 1;
    }
    if requested == 0 {
        warn!("optimization iterations must be positive, using default {DEFAULT_ITERATIONS}");
        return DEFAULT_ITERATIONS;
    }
    requested
}

/// Outcome of the last solve of one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EdgeOutcome {
    Solved { rms: Real, correspondences: usize },
    Failed { reason: String },
}

impl EdgeOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, EdgeOutcome::Solved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSolveReport {
    pub edge: usize,
    pub parent: String,
    pub child: String,
    pub outcome: EdgeOutcome,
}

/// Summary of [`TransformChainCalibrator::solve`], one entry per edge in
/// chain order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSolveReport {
    pub passes: usize,
    pub edges: Vec<EdgeSolveReport>,
}

impl ChainSolveReport {
    pub fn all_solved(&self) -> bool {
        self.edges.iter().all(|e| e.outcome.is_solved())
    }

    pub fn num_failed(&self) -> usize {
        self.edges.iter().filter(|e| !e.outcome.is_solved()).count()
    }
}

/// Accumulates observations and refines the edge estimates of a [`Chain`].
#[derive(Debug, Clone)]
pub struct TransformChainCalibrator {
    chain: Chain,
    observations: Vec<ChainObservation>,
}

impl TransformChainCalibrator {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            observations: Vec::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn into_chain(self) -> Chain {
        self.chain
    }

    pub fn observations(&self) -> &[ChainObservation] {
        &self.observations
    }

    /// Drop all recorded observations (between sessions).
    pub fn clear_observations(&mut self) {
        self.observations.clear();
    }

    /// Append the observation taken at `configuration`.
    pub fn record_observation(
        &mut self,
        configuration: usize,
        mut observation: ChainObservation,
    ) -> Result<()> {
        ensure!(
            observation.bridges.len() == self.chain.num_bridges(),
            "observation at configuration {configuration} carries {} bridges, chain needs {}",
            observation.bridges.len(),
            self.chain.num_bridges()
        );
        ensure!(
            !observation.model_points.is_empty(),
            "observation at configuration {configuration} has no model points"
        );
        observation.configuration = configuration;
        self.observations.push(observation);
        debug!(
            "recorded observation for configuration {configuration} ({} total)",
            self.observations.len()
        );
        Ok(())
    }

    /// Point pairs for `edge` under the current estimates of all other edges.
    pub fn correspondences(&self, edge: usize) -> Vec<Correspondence> {
        let (parent, child) = self.correspondence_points(edge);
        parent
            .into_iter()
            .zip(child)
            .map(|(parent, child)| Correspondence { parent, child })
            .collect()
    }

    /// Run `iterations` passes over `order`, refitting one edge at a time.
    ///
    /// Failed fits leave the edge at its pre-solve estimate; the remaining
    /// edges are still solved.
    pub fn solve(&mut self, order: &CalibrationOrder, iterations: usize) -> Result<ChainSolveReport> {
        ensure!(
            order.len() == self.chain.len(),
            "calibration order has {} entries for {} edges",
            order.len(),
            self.chain.len()
        );
        let passes = effective_iterations(iterations, self.chain.len());
        info!(
            "solving {} edge(s) from {} observation(s), {passes} pass(es)",
            self.chain.len(),
            self.observations.len()
        );

        let mut outcomes: Vec<Option<EdgeOutcome>> = vec![None; self.chain.len()];
        for pass in 0..passes {
            let last = pass + 1 == passes;
            for &k in order.indices() {
                let outcome = self.solve_edge(k);
                if let EdgeOutcome::Failed { reason } = &outcome {
                    if last {
                        warn!("edge {k} could not be solved: {reason}");
                    } else {
                        debug!("pass {pass}: edge {k} could not be solved: {reason}");
                    }
                }
                outcomes[k] = Some(outcome);
            }
        }

        let edges = self
            .chain
            .edges()
            .iter()
            .enumerate()
            .map(|(k, edge)| EdgeSolveReport {
                edge: k,
                parent: edge.parent.clone(),
                child: edge.child.clone(),
                outcome: outcomes[k].take().unwrap_or(EdgeOutcome::Failed {
                    reason: "edge not visited".to_string(),
                }),
            })
            .collect();

        Ok(ChainSolveReport { passes, edges })
    }

    fn solve_edge(&mut self, edge: usize) -> EdgeOutcome {
        let (parent, child) = self.correspondence_points(edge);
        match fit_rigid_transform(&parent, &child) {
            Ok(transform) => {
                self.chain.set_transform(edge, transform);
                EdgeOutcome::Solved {
                    rms: rms_residual(&transform, &parent, &child),
                    correspondences: parent.len(),
                }
            }
            Err(e) => EdgeOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    fn correspondence_points(&self, edge: usize) -> (Vec<Pt3>, Vec<Pt3>) {
        let edges = self.chain.edges();
        let total: usize = self.observations.iter().map(|o| o.num_points()).sum();
        let mut parent_pts = Vec::with_capacity(total);
        let mut child_pts = Vec::with_capacity(total);

        for obs in &self.observations {
            let mut root_se3_parent = Iso3::identity();
            for e in &edges[..edge] {
                root_se3_parent *= e.transform;
                if let Some(b) = e.bridge_index {
                    root_se3_parent *= obs.bridges[b];
                }
            }

            let mut child_se3_tip = Iso3::identity();
            if let Some(b) = edges[edge].bridge_index {
                child_se3_tip *= obs.bridges[b];
            }
            for e in &edges[edge + 1..] {
                child_se3_tip *= e.transform;
                if let Some(b) = e.bridge_index {
                    child_se3_tip *= obs.bridges[b];
                }
            }

            let parent_se3_marker = root_se3_parent.inverse() * obs.root_se3_marker;
            let child_se3_marker = child_se3_tip * obs.tip_se3_marker;
            for m in &obs.model_points {
                parent_pts.push(parent_se3_marker * m);
                child_pts.push(child_se3_marker * m);
            }
        }

        (parent_pts, child_pts)
    }
}
