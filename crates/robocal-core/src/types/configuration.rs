use serde::{Deserialize, Serialize};

use crate::{Iso3, Real, planar_iso};

/// Planar goal pose of a mobile base in the reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BasePose {
    pub x: Real,
    pub y: Real,
    /// Heading (yaw) in radians.
    pub phi: Real,
}

impl BasePose {
    pub fn new(x: Real, y: Real, phi: Real) -> Self {
        Self { x, y, phi }
    }

    pub fn to_iso(&self) -> Iso3 {
        planar_iso(self.x, self.y, self.phi)
    }
}

/// One robot configuration to visit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Base goal; `None` for limb-only calibration.
    pub base_pose: Option<BasePose>,
    /// Actuator goal, one value per joint.
    pub joint_values: Vec<Real>,
}

impl Configuration {
    /// Motion steps needed to reach this configuration.
    ///
    /// Joints are positioned first so the base approach happens with the
    /// sensor already in its final pose.
    pub fn targets(&self) -> Vec<MotionTarget> {
        let mut targets = Vec::with_capacity(2);
        if !self.joint_values.is_empty() {
            targets.push(MotionTarget::JointVector(self.joint_values.clone()));
        }
        if let Some(pose) = self.base_pose {
            targets.push(MotionTarget::BasePose(pose));
        }
        targets
    }
}

/// A single goal the motion controller can drive to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionTarget {
    BasePose(BasePose),
    JointVector(Vec<Real>),
}

impl std::fmt::Display for MotionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionTarget::BasePose(p) => {
                write!(f, "base(x={:.3}, y={:.3}, phi={:.3})", p.x, p.y, p.phi)
            }
            MotionTarget::JointVector(v) => write!(f, "joints{:?}", v),
        }
    }
}
