//! Observations recorded at each visited configuration.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{Iso3, Pt3};

/// Marker pose reported by a detector together with its model points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    /// Marker pose in the sensor frame (`sensor_se3_marker`).
    pub sensor_se3_marker: Iso3,
    /// Marker model points in the marker frame.
    pub model_points: Vec<Pt3>,
}

/// Everything the chain solver needs from one configuration.
///
/// The marker is reachable from both ends of the chain:
/// - `root_se3_marker`: from the first edge's parent frame,
/// - `tip_se3_marker`: from the last edge's child frame (through the sensor).
///
/// `bridges[k]` is the fixed transform for bridge index `k` as looked up at
/// this configuration (`child_i_se3_parent_{i+1}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainObservation {
    /// Index of the configuration this observation was taken at.
    pub configuration: usize,
    pub model_points: Vec<Pt3>,
    pub root_se3_marker: Iso3,
    pub tip_se3_marker: Iso3,
    pub bridges: Vec<Iso3>,
}

impl ChainObservation {
    pub fn new(
        configuration: usize,
        model_points: Vec<Pt3>,
        root_se3_marker: Iso3,
        tip_se3_marker: Iso3,
        bridges: Vec<Iso3>,
    ) -> Result<Self> {
        ensure!(
            !model_points.is_empty(),
            "observation at configuration {configuration} has no model points"
        );
        Ok(Self {
            configuration,
            model_points,
            root_se3_marker,
            tip_se3_marker,
            bridges,
        })
    }

    pub fn num_points(&self) -> usize {
        self.model_points.len()
    }
}

/// A pair of coordinates of the same physical point in two frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub parent: Pt3,
    pub child: Pt3,
}
