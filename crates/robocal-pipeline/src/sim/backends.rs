//! Camera frame, detector and result store of the simulation.

use std::cell::RefCell;
use std::io;

use robocal_core::{Iso3, MarkerDetection, Pt3, synthetic::noise::UniformPoseNoise};

use crate::{MarkerKind, ResultStore, TargetDetector};

/// Frame produced by the simulated camera.
#[derive(Debug, Clone, PartialEq)]
pub struct SimImage {
    pub sequence: u64,
    /// True marker pose in the optical frame; `None` when out of view.
    pub sensor_se3_marker: Option<Iso3>,
}

/// Reports the marker pose carried by a [`SimImage`], optionally perturbed.
#[derive(Debug, Clone)]
pub struct SimDetector {
    kind: MarkerKind,
    model_points: Vec<Pt3>,
    noise: Option<UniformPoseNoise>,
}

impl SimDetector {
    pub fn new(kind: MarkerKind, model_points: Vec<Pt3>) -> Self {
        Self {
            kind,
            model_points,
            noise: None,
        }
    }

    /// Deterministic pose noise keyed by the frame sequence number.
    pub fn with_noise(mut self, noise: UniformPoseNoise) -> Self {
        self.noise = Some(noise);
        self
    }
}

impl TargetDetector<SimImage> for SimDetector {
    fn kind(&self) -> MarkerKind {
        self.kind
    }

    fn detect(&self, frame: &SimImage) -> Option<MarkerDetection> {
        let pose = frame.sensor_se3_marker?;
        let sensor_se3_marker = match &self.noise {
            Some(noise) => noise.apply(frame.sequence as usize, &pose),
            None => pose,
        };
        Some(MarkerDetection {
            sensor_se3_marker,
            model_points: self.model_points.clone(),
        })
    }
}

/// In-memory [`ResultStore`]; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    text: RefCell<String>,
    fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> String {
        self.text.borrow().clone()
    }
}

impl ResultStore for MemoryStore {
    fn append(&self, text: &str) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only"));
        }
        self.text.borrow_mut().push_str(text);
        Ok(())
    }
}
