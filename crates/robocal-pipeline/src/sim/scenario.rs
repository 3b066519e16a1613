//! Ready-made simulated robot: mobile base with a torso and a pan-tilt head
//! carrying a camera, looking at a marker on a wall.

use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

use robocal_core::{
    BasePose, EdgeSpec, Iso3, Rpy, Vec3, iso_from_xyz_rpy,
    synthetic::{grid_points, noise::UniformPoseNoise},
};

use super::{FrameLink, SimCamera, SimDetector, SimFrames, SimWorld};
use crate::{BaseRanges, PoseSpace, RangeSpec, SessionConfig};

/// Simulated world, a matching session configuration and the true values of
/// the uncertain edges.
#[derive(Debug)]
pub struct PanTiltScenario {
    pub world: SimWorld,
    pub config: SessionConfig,
    /// True `parent_se3_child` of each configured edge.
    pub truth: Vec<Iso3>,
    /// What the lookup service reports for each configured edge.
    pub nominal: Vec<Iso3>,
}

impl PanTiltScenario {
    /// Edges `base_link -> torso_link` and `head_mount -> camera_link`,
    /// bridged by the pan-tilt unit. Nominal values are the truth moved by
    /// `perturbation`.
    pub fn new(perturbation: UniformPoseNoise) -> Self {
        let config = Self::session_config();
        let truth = vec![
            iso_from_xyz_rpy([0.1, 0.0, 0.5], Rpy::new(0.0, 0.0, 0.05)),
            iso_from_xyz_rpy([0.05, 0.01, 0.06], Rpy::new(0.02, 0.1, -0.03)),
        ];
        let nominal: Vec<Iso3> = truth
            .iter()
            .enumerate()
            .map(|(k, t)| perturbation.apply(k, t))
            .collect();

        let frames = &config.frames;
        let links = vec![
            FrameLink::fixed(&frames.base, "torso_link", truth[0]),
            FrameLink::revolute(
                "torso_link",
                "head_pan_link",
                iso_from_xyz_rpy([0.0, 0.0, 0.08], Rpy::default()),
                Vec3::z_axis(),
                0,
            ),
            FrameLink::revolute(
                "head_pan_link",
                "head_mount",
                iso_from_xyz_rpy([0.02, 0.0, 0.0], Rpy::default()),
                Vec3::y_axis(),
                1,
            ),
            FrameLink::fixed("head_mount", "camera_link", truth[1]),
            FrameLink::fixed(
                "camera_link",
                &frames.sensor,
                iso_from_xyz_rpy([0.0; 3], Rpy::new(-FRAC_PI_2, 0.0, -FRAC_PI_2)),
            ),
            FrameLink::fixed(
                &frames.reference,
                &frames.marker,
                iso_from_xyz_rpy([0.4, 0.0, 0.62], Rpy::new(FRAC_PI_2, 0.0, -FRAC_PI_2)),
            ),
        ];
        let camera = SimCamera {
            frame: frames.sensor.clone(),
            target: frames.marker.clone(),
            period: Duration::from_millis(100),
            min_depth: 0.2,
            max_tan: (1.0, 0.8),
        };
        let world = SimWorld::new(
            SimFrames {
                reference: frames.reference.clone(),
                base: frames.base.clone(),
            },
            links,
            camera,
            BasePose::new(-0.9, 0.0, 0.0),
            2,
        )
        .with_nominal(&config.edges[0].parent, &config.edges[0].child, nominal[0])
        .with_nominal(&config.edges[1].parent, &config.edges[1].child, nominal[1]);

        Self {
            world,
            config,
            truth,
            nominal,
        }
    }

    /// Two base positions times a 3x3 pan-tilt grid.
    pub fn session_config() -> SessionConfig {
        SessionConfig {
            edges: vec![
                EdgeSpec::new("base_link", "torso_link"),
                EdgeSpec::new("head_mount", "camera_link"),
            ],
            calibration_order: vec![1, 2],
            poses: PoseSpace::Range(RangeSpec {
                base: Some(BaseRanges {
                    x: vec![-0.8, 1.0, -0.8],
                    y: vec![-0.05, 0.1, 0.05],
                    phi: vec![0.0, 1.0, 0.0],
                }),
                joints: vec![-0.4, 0.4, 0.4, -0.3, 0.3, 0.3],
            }),
            ..SessionConfig::default()
        }
    }

    /// Checkerboard detector matching the configured marker kind.
    pub fn detector(&self) -> SimDetector {
        SimDetector::new(self.config.marker, grid_points(4, 3, 0.04))
    }
}

impl Default for PanTiltScenario {
    fn default() -> Self {
        Self::new(UniformPoseNoise {
            seed: 7,
            max_translation: 0.02,
            max_angle: 0.03,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clock, ConfigurationSpaceGenerator, JointActuator, PoseLookup, TargetDetector};
    use robocal_core::pose_error;

    #[test]
    fn nominal_differs_from_truth_only_on_edges() {
        let s = PanTiltScenario::default();
        let reported = s.world.lookup("base_link", "torso_link").unwrap();
        assert_eq!(reported, s.nominal[0]);
        let (dt, _) = pose_error(&reported, &s.truth[0]);
        assert!(dt > 0.0);

        let bridge = s.world.lookup("torso_link", "head_mount").unwrap();
        let want = iso_from_xyz_rpy([0.02, 0.0, 0.08], Rpy::default());
        let (dt, dr) = pose_error(&bridge, &want);
        assert!(dt < 1e-12 && dr < 1e-7);
    }

    #[test]
    fn marker_visible_over_the_whole_pose_space() {
        let s = PanTiltScenario::default();
        let space = ConfigurationSpaceGenerator::generate(&s.config.poses).unwrap();
        assert_eq!(space.len(), 18);

        let detector = s.detector();
        let slot = s.world.frames();
        for c in space.configurations() {
            s.world
                .move_to(&c.joint_values, Duration::from_secs(30))
                .unwrap();
            let (image, _) = slot.latest(s.world.now(), Duration::from_secs(1)).unwrap();
            assert!(detector.detect(&image).is_some(), "hidden at {c:?}");
        }
    }
}
