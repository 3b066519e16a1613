//! Simulated robot: frame tree, holonomic base, revolute joints, camera and
//! virtual clock in one object.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use log::{debug, trace};
use nalgebra::{Translation3, Unit, UnitQuaternion};
use robocal_core::{BasePose, Iso3, Real, Vec3};

use super::SimImage;
use crate::{
    ActuatorError, Clock, JointActuator, LookupError, ObservationSlot, PoseLookup,
    VelocityActuator, VelocityCommand,
};

/// How a child frame is attached to its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Mount {
    Fixed(Iso3),
    /// `offset` followed by a rotation of joint `joint` about `axis`.
    Revolute {
        offset: Iso3,
        axis: Unit<Vec3>,
        joint: usize,
    },
}

impl Mount {
    fn parent_se3_child(&self, joints: &[Real]) -> Iso3 {
        match self {
            Mount::Fixed(t) => *t,
            Mount::Revolute {
                offset,
                axis,
                joint,
            } => {
                let q = joints.get(*joint).copied().unwrap_or(0.0);
                offset * Iso3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(axis, q))
            }
        }
    }
}

/// One edge of the simulated frame tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLink {
    pub parent: String,
    pub child: String,
    pub mount: Mount,
}

impl FrameLink {
    pub fn fixed(parent: impl Into<String>, child: impl Into<String>, transform: Iso3) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            mount: Mount::Fixed(transform),
        }
    }

    pub fn revolute(
        parent: impl Into<String>,
        child: impl Into<String>,
        offset: Iso3,
        axis: Unit<Vec3>,
        joint: usize,
    ) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            mount: Mount::Revolute {
                offset,
                axis,
                joint,
            },
        }
    }
}

/// Camera model: which frame it looks from and what it can see.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCamera {
    /// Optical frame (z forward).
    pub frame: String,
    /// Frame of the observed target.
    pub target: String,
    /// Frames are published at most this often.
    pub period: Duration,
    /// Closest distance along the optical axis at which the target is seen.
    pub min_depth: Real,
    /// Half field of view as `tan` of the angle, horizontal and vertical.
    pub max_tan: (Real, Real),
}

/// The frame names the simulation treats specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFrames {
    /// Root of the tree, where the base is tracked.
    pub reference: String,
    /// Mobile base; its pose relative to `reference` is integrated from
    /// velocity commands.
    pub base: String,
}

/// Deterministic simulated robot implementing every motion-side collaborator.
///
/// Lookups of the uncertain edges registered with
/// [`with_nominal`](Self::with_nominal) report the nominal value; every
/// other lookup is answered from the true geometry. [`Clock::sleep`]
/// advances virtual time, integrates the base velocity and publishes
/// camera frames into the observation slot.
#[derive(Debug)]
pub struct SimWorld {
    frames: SimFrames,
    links: Vec<FrameLink>,
    nominal: Vec<(String, String, Iso3)>,
    camera: SimCamera,
    slot: ObservationSlot<SimImage>,

    origin: Instant,
    elapsed: Cell<Duration>,
    pose: Cell<BasePose>,
    velocity: Cell<VelocityCommand>,
    commands: RefCell<Vec<VelocityCommand>>,
    joints: RefCell<Vec<Real>>,
    /// Joint speed (rad/s) used to time joint moves.
    joint_speed: Real,
    tracking: Cell<bool>,
    teleport: Cell<Option<(Duration, BasePose)>>,
    last_frame: Cell<Option<Duration>>,
    sequence: Cell<u64>,
}

impl SimWorld {
    pub fn new(
        frames: SimFrames,
        links: Vec<FrameLink>,
        camera: SimCamera,
        start: BasePose,
        dof: usize,
    ) -> Self {
        Self {
            frames,
            links,
            nominal: Vec::new(),
            camera,
            slot: ObservationSlot::new(),
            origin: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            pose: Cell::new(start),
            velocity: Cell::new(VelocityCommand::zero()),
            commands: RefCell::new(Vec::new()),
            joints: RefCell::new(vec![0.0; dof]),
            joint_speed: 0.5,
            tracking: Cell::new(true),
            teleport: Cell::new(None),
            last_frame: Cell::new(None),
            sequence: Cell::new(0),
        }
    }

    /// Report `nominal` instead of the truth for lookups of `parent -> child`.
    pub fn with_nominal(
        mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        nominal: Iso3,
    ) -> Self {
        self.nominal.push((parent.into(), child.into(), nominal));
        self
    }

    pub fn with_joint_speed(mut self, rad_per_s: Real) -> Self {
        self.joint_speed = rad_per_s;
        self
    }

    /// Handle to the slot camera frames are published into.
    pub fn frames(&self) -> ObservationSlot<SimImage> {
        self.slot.clone()
    }

    pub fn base_pose(&self) -> BasePose {
        self.pose.get()
    }

    pub fn joint_values(&self) -> Vec<Real> {
        self.joints.borrow().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Every velocity command received so far.
    pub fn commands(&self) -> Vec<VelocityCommand> {
        self.commands.borrow().clone()
    }

    /// Lose or regain the tracking of the base in the reference frame.
    pub fn set_tracking(&self, available: bool) {
        self.tracking.set(available);
    }

    /// Move the base to `pose` instantly once `after` of virtual time has
    /// elapsed (a kidnapping or a tracking jump).
    pub fn schedule_teleport(&self, after: Duration, pose: BasePose) {
        self.teleport.set(Some((after, pose)));
    }

    /// True `parent_se3_child` for a pair of frames.
    pub fn true_transform(&self, target: &str, source: &str) -> Result<Iso3, LookupError> {
        Ok(self.reference_se3(target)?.inverse() * self.reference_se3(source)?)
    }

    /// Publish a frame now, whatever the camera period.
    pub fn capture(&self) {
        let now = self.elapsed.get();
        self.last_frame.set(Some(now));
        let seq = self.sequence.get();
        self.sequence.set(seq + 1);

        let sensor_se3_marker = self
            .true_transform(&self.camera.frame, &self.camera.target)
            .ok()
            .filter(|t| self.visible(t));
        self.slot.publish(
            SimImage {
                sequence: seq,
                sensor_se3_marker,
            },
            self.origin + now,
        );
    }

    fn visible(&self, sensor_se3_marker: &Iso3) -> bool {
        let p = sensor_se3_marker.translation.vector;
        let (tan_x, tan_y) = self.camera.max_tan;
        p.z >= self.camera.min_depth && (p.x / p.z).abs() <= tan_x && (p.y / p.z).abs() <= tan_y
    }

    fn reference_se3(&self, frame: &str) -> Result<Iso3, LookupError> {
        let joints = self.joints.borrow();
        let mut acc = Iso3::identity();
        let mut current = frame;
        // Bounded walk towards the root; a cycle or dangling parent ends as
        // an unknown frame.
        for _ in 0..=self.links.len() + 1 {
            if current == self.frames.reference {
                return Ok(acc);
            }
            if current == self.frames.base {
                return Ok(self.pose.get().to_iso() * acc);
            }
            let link = self
                .links
                .iter()
                .find(|l| l.child == current)
                .ok_or_else(|| LookupError::UnknownFrame(frame.to_string()))?;
            acc = link.mount.parent_se3_child(&joints) * acc;
            current = &link.parent;
        }
        Err(LookupError::UnknownFrame(frame.to_string()))
    }

    fn on_base(&self, frame: &str) -> bool {
        let mut current = frame;
        for _ in 0..=self.links.len() + 1 {
            if current == self.frames.base {
                return true;
            }
            match self.links.iter().find(|l| l.child == current) {
                Some(link) => current = &link.parent,
                None => return false,
            }
        }
        false
    }

    fn advance(&self, duration: Duration) {
        let dt = duration.as_secs_f64();
        let v = self.velocity.get();
        let p = self.pose.get();
        let mid = p.phi + 0.5 * v.wz * dt;
        let (s, c) = mid.sin_cos();
        self.pose.set(BasePose::new(
            p.x + (c * v.vx - s * v.vy) * dt,
            p.y + (s * v.vx + c * v.vy) * dt,
            p.phi + v.wz * dt,
        ));

        let now = self.elapsed.get() + duration;
        self.elapsed.set(now);

        if let Some((at, pose)) = self.teleport.get()
            && now >= at
        {
            debug!("sim: base teleported to ({:.3}, {:.3}, {:.3})", pose.x, pose.y, pose.phi);
            self.pose.set(pose);
            self.teleport.set(None);
        }

        let due = self
            .last_frame
            .get()
            .is_none_or(|last| now.saturating_sub(last) >= self.camera.period);
        if due {
            self.capture();
        }
    }
}

impl PoseLookup for SimWorld {
    fn lookup(&self, target: &str, source: &str) -> Result<Iso3, LookupError> {
        if target == source {
            return Ok(Iso3::identity());
        }
        for (parent, child, nominal) in &self.nominal {
            if parent == target && child == source {
                return Ok(*nominal);
            }
            if parent == source && child == target {
                return Ok(nominal.inverse());
            }
        }
        if !self.tracking.get() && self.on_base(target) != self.on_base(source) {
            return Err(LookupError::Unavailable {
                target: target.to_string(),
                from: source.to_string(),
            });
        }
        self.true_transform(target, source)
    }
}

impl VelocityActuator for SimWorld {
    fn send(&self, command: VelocityCommand) {
        trace!("sim: velocity {command:?}");
        self.velocity.set(command);
        self.commands.borrow_mut().push(command);
    }
}

impl JointActuator for SimWorld {
    fn dof(&self) -> usize {
        self.joints.borrow().len()
    }

    fn positions(&self) -> Result<Vec<Real>, ActuatorError> {
        Ok(self.joints.borrow().clone())
    }

    fn move_to(&self, target: &[Real], budget: Duration) -> Result<(), ActuatorError> {
        if target.len() != self.dof() {
            return Err(ActuatorError::Rejected(format!(
                "{} values for {} joints",
                target.len(),
                self.dof()
            )));
        }
        let travel = self
            .joints
            .borrow()
            .iter()
            .zip(target)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, Real::max);
        let needed = if self.joint_speed > 0.0 {
            Duration::from_secs_f64(travel / self.joint_speed)
        } else {
            Duration::MAX
        };
        if needed > budget {
            self.sleep(budget);
            return Err(ActuatorError::Timeout { budget });
        }
        self.sleep(needed);
        self.joints.borrow_mut().copy_from_slice(target);
        // Let the camera catch up with the new joint state.
        self.sleep(self.camera.period);
        Ok(())
    }
}

impl Clock for SimWorld {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        let step = self.camera.period.max(Duration::from_millis(1));
        let mut left = duration;
        while !left.is_zero() {
            let dt = left.min(step);
            self.advance(dt);
            left -= dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robocal_core::{Rpy, iso_from_xyz_rpy};

    fn world() -> SimWorld {
        SimWorld::new(
            SimFrames {
                reference: "map".into(),
                base: "base".into(),
            },
            vec![
                FrameLink::fixed("base", "mast", iso_from_xyz_rpy([0.0, 0.0, 0.5], Rpy::default())),
                FrameLink::revolute(
                    "mast",
                    "head",
                    Iso3::identity(),
                    Vec3::z_axis(),
                    0,
                ),
                FrameLink::fixed(
                    "head",
                    "optical",
                    iso_from_xyz_rpy(
                        [0.0; 3],
                        Rpy::new(-std::f64::consts::FRAC_PI_2, 0.0, -std::f64::consts::FRAC_PI_2),
                    ),
                ),
                FrameLink::fixed("map", "marker", iso_from_xyz_rpy([1.0, 0.0, 0.5], Rpy::default())),
            ],
            SimCamera {
                frame: "optical".into(),
                target: "marker".into(),
                period: Duration::from_millis(100),
                min_depth: 0.2,
                max_tan: (1.0, 0.8),
            },
            BasePose::new(0.0, 0.0, 0.0),
            1,
        )
    }

    #[test]
    fn lookups_compose_through_the_tree() {
        let w = world();
        let t = w.lookup("base", "marker").unwrap();
        assert!((t.translation.vector - Vec3::new(1.0, 0.0, 0.5)).norm() < 1e-12);
        assert_eq!(w.lookup("mast", "mast").unwrap(), Iso3::identity());
        assert!(matches!(
            w.lookup("base", "nowhere"),
            Err(LookupError::UnknownFrame(_))
        ));
    }

    #[test]
    fn nominal_edges_override_truth() {
        let nominal = iso_from_xyz_rpy([0.0, 0.0, 0.55], Rpy::default());
        let w = world().with_nominal("base", "mast", nominal);
        assert_eq!(w.lookup("base", "mast").unwrap(), nominal);
        let truth = w.true_transform("base", "mast").unwrap();
        assert!((truth.translation.vector.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sleep_integrates_body_velocity() {
        let w = world();
        w.send(VelocityCommand {
            vx: 0.1,
            ..Default::default()
        });
        w.sleep(Duration::from_secs(2));
        let p = w.base_pose();
        assert!((p.x - 0.2).abs() < 1e-9 && p.y.abs() < 1e-12);
        assert_eq!(w.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn camera_sees_marker_in_front() {
        let w = world();
        let slot = w.frames();
        w.sleep(Duration::from_millis(100));
        let (image, _) = slot.latest(w.now(), Duration::from_secs(1)).unwrap();
        let t = image.sensor_se3_marker.expect("marker in view");
        assert!((t.translation.vector.z - 1.0).abs() < 1e-9);

        w.move_to(&[std::f64::consts::PI], Duration::from_secs(30)).unwrap();
        let (image, _) = slot.latest(w.now(), Duration::from_secs(1)).unwrap();
        assert!(image.sensor_se3_marker.is_none());
    }

    #[test]
    fn slow_joints_time_out() {
        let w = world().with_joint_speed(0.1);
        let err = w.move_to(&[1.0], Duration::from_secs(2)).unwrap_err();
        assert_eq!(
            err,
            ActuatorError::Timeout {
                budget: Duration::from_secs(2)
            }
        );
        assert_eq!(w.joint_values(), vec![0.0]);
    }

    #[test]
    fn lost_tracking_hides_base_to_world_lookups() {
        let w = world();
        w.set_tracking(false);
        assert!(w.lookup("map", "base").is_err());
        assert!(w.lookup("base", "marker").is_err());
        assert!(w.lookup("base", "head").is_ok());
    }

    #[test]
    fn scheduled_teleport_happens_once() {
        let w = world();
        w.schedule_teleport(Duration::from_millis(500), BasePose::new(-2.0, 0.0, 0.0));
        w.sleep(Duration::from_millis(400));
        assert_eq!(w.base_pose().x, 0.0);
        w.sleep(Duration::from_millis(200));
        assert_eq!(w.base_pose().x, -2.0);
    }
}
