//! Closed-loop motion to one configuration target.
//!
//! Base goals run through `RotateToHeading -> Translate -> FinalRotate`,
//! each phase a proportional loop on the tracked reference pose. Joint
//! goals are a single blocking call to the joint actuator.

use log::{debug, info, warn};
use robocal_core::{BasePose, MotionTarget, Real, heading};

use super::{DivergenceGuard, MotionConfig, MotionError, Severity};
use crate::{
    ActuatorError, CancelToken, Clock, JointActuator, PoseLookup, ReferenceFrameMonitor, VelocityActuator,
    VelocityCommand, cancellable_sleep,
};

/// Phase of a base move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RotateToHeading,
    Translate,
    FinalRotate,
    Done,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::RotateToHeading => "rotate_to_heading",
            Phase::Translate => "translate",
            Phase::FinalRotate => "final_rotate",
            Phase::Done => "done",
        }
    }

    fn next(self) -> Self {
        match self {
            Phase::RotateToHeading => Phase::Translate,
            Phase::Translate => Phase::FinalRotate,
            Phase::FinalRotate | Phase::Done => Phase::Done,
        }
    }
}

/// Collaborators a move needs, borrowed for its duration.
#[derive(Clone, Copy)]
pub struct MotionContext<'a> {
    pub lookup: &'a dyn PoseLookup,
    pub velocity: &'a dyn VelocityActuator,
    pub joints: Option<&'a dyn JointActuator>,
    pub clock: &'a dyn Clock,
    pub cancel: &'a CancelToken,
}

/// Result of a move that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Reached { attempts: usize },
    /// All attempts failed softly; the last error is kept.
    Skipped(MotionError),
}

/// Wrap a heading error into `(-π/2, π/2]`.
pub fn wrap_heading_error(mut error: Real) -> Real {
    use std::f64::consts::{FRAC_PI_2, PI};
    while error <= -FRAC_PI_2 {
        error += PI;
    }
    while error > FRAC_PI_2 {
        error -= PI;
    }
    error
}

/// Drives the base and joints, gated by a [`ReferenceFrameMonitor`].
#[derive(Debug, Clone)]
pub struct MotionController {
    config: MotionConfig,
    monitor: ReferenceFrameMonitor,
    phase: Phase,
}

impl MotionController {
    pub fn new(config: MotionConfig, monitor: ReferenceFrameMonitor) -> Self {
        Self {
            config,
            monitor,
            phase: Phase::Done,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn monitor(&self) -> &ReferenceFrameMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut ReferenceFrameMonitor {
        &mut self.monitor
    }

    /// Phase of the current (or last) base move.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `target`, retrying soft failures.
    ///
    /// Returns `Err` only for fatal errors and cancellation; exhausted
    /// retries yield [`MoveOutcome::Skipped`].
    pub fn move_with_retry(
        &mut self,
        ctx: &MotionContext<'_>,
        target: &MotionTarget,
    ) -> Result<MoveOutcome, MotionError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.move_to(ctx, target) {
                Ok(()) => return Ok(MoveOutcome::Reached { attempts: attempt }),
                Err(e) if e.severity() == Severity::Fatal => {
                    if !matches!(e, MotionError::Cancelled) {
                        log::error!("fatal motion error [{}] towards {target}: {e}", e.code());
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!("could not reach {target} ({attempt}/{attempts} tries): {e}");
                    if attempt < attempts {
                        info!("trying again in {:.1} s", self.config.retry_backoff_s);
                        cancellable_sleep(
                            ctx.clock,
                            ctx.cancel,
                            self.config.retry_backoff(),
                            self.config.tick(),
                        )
                        .map_err(|_| MotionError::Cancelled)?;
                    }
                    last_error = Some(e);
                }
            }
        }
        let e = last_error.unwrap_or(MotionError::Cancelled);
        warn!("skipping target {target}");
        Ok(MoveOutcome::Skipped(e))
    }

    /// One attempt at `target`. Always leaves the base with a zero-velocity
    /// command.
    pub fn move_to(&mut self, ctx: &MotionContext<'_>, target: &MotionTarget) -> Result<(), MotionError> {
        let result = match target {
            MotionTarget::BasePose(goal) => self.move_base(ctx, goal),
            MotionTarget::JointVector(values) => self.move_joints(ctx, values),
        };
        ctx.velocity.send(VelocityCommand::zero());
        result
    }

    fn move_joints(&mut self, ctx: &MotionContext<'_>, values: &[Real]) -> Result<(), MotionError> {
        if ctx.cancel.is_cancelled() {
            return Err(MotionError::Cancelled);
        }
        let joints = ctx.joints.ok_or(MotionError::MissingActuator("joint actuator"))?;
        if let Some(max) = self.config.joint_deviation_limit() {
            let current = joints.positions().map_err(MotionError::Joint)?;
            if current.len() != values.len() {
                return Err(MotionError::Joint(ActuatorError::Rejected(format!(
                    "{} values for {} joints",
                    values.len(),
                    current.len()
                ))));
            }
            let jump = current
                .iter()
                .zip(values)
                .enumerate()
                .find(|(_, (c, t))| (*t - *c).abs() > max);
            if let Some((joint, (&current, &target))) = jump {
                return Err(MotionError::JointDeviation {
                    joint,
                    current,
                    target,
                    max,
                });
            }
        }
        debug!("moving joints to {values:?}");
        joints
            .move_to(values, self.config.joint_timeout())
            .map_err(MotionError::Joint)
    }

    fn move_base(&mut self, ctx: &MotionContext<'_>, goal: &BasePose) -> Result<(), MotionError> {
        let pose = self.monitor.validate(ctx.lookup, ctx.clock.now())?;
        let heading_error = wrap_heading_error(goal.phi - heading(&pose));
        let ex = goal.x - pose.translation.vector.x;
        let ey = goal.y - pose.translation.vector.y;

        if heading_error.abs() <= self.config.start_heading_tolerance
            && ex.abs() <= self.config.start_position_tolerance
            && ey.abs() <= self.config.start_position_tolerance
        {
            debug!("base already at ({:.3}, {:.3}, {:.3})", goal.x, goal.y, goal.phi);
            self.phase = Phase::Done;
            return Ok(());
        }

        self.phase = Phase::RotateToHeading;
        while self.phase != Phase::Done {
            let result = self.run_phase(ctx, goal);
            ctx.velocity.send(VelocityCommand::zero());
            result?;
            self.phase = self.phase.next();
        }
        Ok(())
    }

    fn run_phase(&mut self, ctx: &MotionContext<'_>, goal: &BasePose) -> Result<(), MotionError> {
        let rotating = self.phase != Phase::Translate;
        let margin = if rotating {
            self.config.heading_divergence_margin
        } else {
            self.config.position_divergence_margin
        };
        let mut guard = DivergenceGuard::new(margin);
        let mut ticks = 0usize;

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(MotionError::Cancelled);
            }
            let pose = self.monitor.validate(ctx.lookup, ctx.clock.now())?;
            let yaw = heading(&pose);

            let command = if rotating {
                let error = wrap_heading_error(goal.phi - yaw);
                if error.abs() < self.config.heading_tolerance {
                    break;
                }
                if let Some(d) = guard.check(&[error]) {
                    return Err(MotionError::Diverged {
                        quantity: "heading",
                        error: d.error,
                        baseline: d.baseline,
                    });
                }
                VelocityCommand {
                    wz: self.config.clamp_velocity(self.config.heading_gain * error),
                    ..Default::default()
                }
            } else {
                let ex = goal.x - pose.translation.vector.x;
                let ey = goal.y - pose.translation.vector.y;
                if ex.abs() < self.config.position_tolerance && ey.abs() < self.config.position_tolerance {
                    break;
                }
                if let Some(d) = guard.check(&[ex, ey]) {
                    return Err(MotionError::Diverged {
                        quantity: if d.axis == 0 { "x position" } else { "y position" },
                        error: d.error,
                        baseline: d.baseline,
                    });
                }
                // World-frame error expressed in the body frame.
                let (s, c) = yaw.sin_cos();
                let bx = c * ex + s * ey;
                let by = -s * ex + c * ey;
                VelocityCommand {
                    vx: self.config.clamp_velocity(self.config.position_gain * bx),
                    vy: self.config.clamp_velocity(self.config.position_gain * by),
                    wz: 0.0,
                }
            };

            ctx.velocity.send(command);
            ctx.clock.sleep(self.config.tick());
            ticks += 1;
        }

        debug!("phase {} converged after {ticks} tick(s)", self.phase.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::PanTiltScenario;
    use crate::{LookupError, MonitorConfig};
    use robocal_core::{Iso3, planar_iso};
    use std::cell::{Cell, RefCell};
    use std::f64::consts::PI;
    use std::time::{Duration, Instant};

    /// Holonomic base integrating body-frame velocity in virtual time.
    struct TestBase {
        origin: Instant,
        offset: Cell<Duration>,
        pose: Cell<(Real, Real, Real)>,
        velocity: Cell<VelocityCommand>,
        sent: RefCell<Vec<VelocityCommand>>,
        /// Pose lookups fail after this many calls.
        lookups_left: Cell<Option<usize>>,
        /// Turn the opposite way to the commanded yaw rate.
        inverted_yaw: Cell<bool>,
    }

    impl TestBase {
        fn at(x: Real, y: Real, phi: Real) -> Self {
            Self {
                origin: Instant::now(),
                offset: Cell::new(Duration::ZERO),
                pose: Cell::new((x, y, phi)),
                velocity: Cell::new(VelocityCommand::zero()),
                sent: RefCell::new(Vec::new()),
                lookups_left: Cell::new(None),
                inverted_yaw: Cell::new(false),
            }
        }

        fn ctx<'a>(&'a self, cancel: &'a CancelToken) -> MotionContext<'a> {
            MotionContext {
                lookup: self,
                velocity: self,
                joints: None,
                clock: self,
                cancel,
            }
        }
    }

    impl PoseLookup for TestBase {
        fn lookup(&self, target: &str, source: &str) -> Result<Iso3, LookupError> {
            if let Some(left) = self.lookups_left.get() {
                if left == 0 {
                    return Err(LookupError::Unavailable {
                        target: target.into(),
                        from: source.into(),
                    });
                }
                self.lookups_left.set(Some(left - 1));
            }
            let (x, y, phi) = self.pose.get();
            Ok(planar_iso(x, y, phi))
        }
    }

    impl VelocityActuator for TestBase {
        fn send(&self, command: VelocityCommand) {
            self.velocity.set(command);
            self.sent.borrow_mut().push(command);
        }
    }

    impl Clock for TestBase {
        fn now(&self) -> Instant {
            self.origin + self.offset.get()
        }

        fn sleep(&self, duration: Duration) {
            let dt = duration.as_secs_f64();
            let v = self.velocity.get();
            let (x, y, phi) = self.pose.get();
            let (s, c) = phi.sin_cos();
            let wz = if self.inverted_yaw.get() { -v.wz } else { v.wz };
            self.pose.set((
                x + (c * v.vx - s * v.vy) * dt,
                y + (s * v.vx + c * v.vy) * dt,
                phi + wz * dt,
            ));
            self.offset.set(self.offset.get() + duration);
        }
    }

    fn controller_at(base: &TestBase) -> MotionController {
        let (x, y, phi) = base.pose.get();
        let mut monitor = ReferenceFrameMonitor::new(
            MonitorConfig {
                max_reference_distance: 2.0,
                ..Default::default()
            },
            "landmark",
            "base_link",
        );
        monitor.prime(&planar_iso(x, y, phi));
        MotionController::new(MotionConfig::default(), monitor)
    }

    #[test]
    fn heading_error_wraps_to_half_turn() {
        assert!((wrap_heading_error(0.3) - 0.3).abs() < 1e-12);
        assert!((wrap_heading_error(PI - 0.1) + 0.1).abs() < 1e-12);
        assert!((wrap_heading_error(-PI + 0.1) - 0.1).abs() < 1e-12);
        assert!((wrap_heading_error(PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_heading_error(-PI / 2.0) - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn base_reaches_goal_and_stops() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);

        let goal = BasePose::new(-0.8, 0.15, 0.2);
        let outcome = ctrl
            .move_with_retry(&base.ctx(&cancel), &MotionTarget::BasePose(goal))
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Reached { attempts: 1 });
        assert_eq!(ctrl.phase(), Phase::Done);

        let (x, y, phi) = base.pose.get();
        assert!((x - goal.x).abs() < 0.01 && (y - goal.y).abs() < 0.01);
        assert!((phi - goal.phi).abs() < 0.02);

        let sent = base.sent.borrow();
        assert!(sent.last().unwrap().is_zero());
        assert!(sent.iter().all(|c| c.vx.abs() <= 0.05 && c.vy.abs() <= 0.05 && c.wz.abs() <= 0.05));
    }

    #[test]
    fn goal_within_start_tolerance_commands_nothing_but_stop() {
        let base = TestBase::at(0.5, 0.5, 0.1);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);

        let goal = BasePose::new(0.51, 0.49, 0.12);
        ctrl.move_to(&base.ctx(&cancel), &MotionTarget::BasePose(goal))
            .unwrap();
        let sent = base.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_zero());
    }

    #[test]
    fn lost_tracking_is_retried_then_skipped() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        base.lookups_left.set(Some(0));
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);

        let outcome = ctrl
            .move_with_retry(
                &base.ctx(&cancel),
                &MotionTarget::BasePose(BasePose::new(-0.7, 0.0, 0.0)),
            )
            .unwrap();
        assert!(matches!(outcome, MoveOutcome::Skipped(MotionError::LookupFailed(_))));
        // Two backoff delays between three attempts.
        assert_eq!(base.offset.get(), Duration::from_secs(4));
        assert!(base.sent.borrow().last().unwrap().is_zero());
    }

    #[test]
    fn reference_jump_aborts_with_zero_velocity() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);
        ctrl.monitor_mut().prime(&planar_iso(-0.8, 0.0, 0.0));
        // Teleport the tracked frame beyond the allowed distance.
        base.pose.set((-2.5, 0.0, 0.0));

        let err = ctrl
            .move_with_retry(
                &base.ctx(&cancel),
                &MotionTarget::BasePose(BasePose::new(-0.7, 0.0, 0.0)),
            )
            .unwrap_err();
        assert!(matches!(err, MotionError::ReferenceTooFar { .. }));
        assert!(base.sent.borrow().last().unwrap().is_zero());
    }

    #[test]
    fn cancellation_stops_the_base() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ctrl = controller_at(&base);
        let err = ctrl
            .move_with_retry(
                &base.ctx(&cancel),
                &MotionTarget::BasePose(BasePose::new(-0.8, 0.3, 0.0)),
            )
            .unwrap_err();
        assert_eq!(err, MotionError::Cancelled);
        assert!(base.sent.borrow().iter().all(|c| c.is_zero()));
    }

    #[test]
    fn joint_goal_without_actuator_is_fatal() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);
        let err = ctrl
            .move_with_retry(&base.ctx(&cancel), &MotionTarget::JointVector(vec![0.1]))
            .unwrap_err();
        assert_eq!(err, MotionError::MissingActuator("joint actuator"));
    }

    struct SlowJoints;

    impl JointActuator for SlowJoints {
        fn dof(&self) -> usize {
            1
        }

        fn positions(&self) -> Result<Vec<Real>, ActuatorError> {
            Ok(vec![0.0])
        }

        fn move_to(&self, _target: &[Real], budget: Duration) -> Result<(), ActuatorError> {
            Err(ActuatorError::Timeout { budget })
        }
    }

    #[test]
    fn joint_timeout_skips_configuration() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);
        let joints = SlowJoints;
        let ctx = MotionContext {
            joints: Some(&joints),
            ..base.ctx(&cancel)
        };
        let outcome = ctrl
            .move_with_retry(&ctx, &MotionTarget::JointVector(vec![0.4]))
            .unwrap();
        assert!(matches!(
            outcome,
            MoveOutcome::Skipped(MotionError::Joint(ActuatorError::Timeout { .. }))
        ));
    }

    #[test]
    fn runaway_rotation_is_fatal_and_stops_the_base() {
        let base = TestBase::at(-0.8, 0.0, 0.0);
        base.inverted_yaw.set(true);
        let cancel = CancelToken::new();
        let mut ctrl = controller_at(&base);

        let err = ctrl
            .move_with_retry(
                &base.ctx(&cancel),
                &MotionTarget::BasePose(BasePose::new(-0.8, 0.0, 0.3)),
            )
            .unwrap_err();
        match err {
            MotionError::Diverged {
                quantity,
                error,
                baseline,
            } => {
                assert_eq!(quantity, "heading");
                assert!(error > baseline + 0.1);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(ctrl.phase(), Phase::RotateToHeading);

        let sent = base.sent.borrow();
        assert!(sent.iter().any(|c| c.wz != 0.0));
        assert!(sent.last().unwrap().is_zero());
        // No retry backoff for a fatal error.
        assert!(base.offset.get() < Duration::from_secs(4));
    }

    fn joint_move_config(max_joint_deviation: Real) -> MotionController {
        let monitor = ReferenceFrameMonitor::new(MonitorConfig::default(), "landmark", "base_link");
        MotionController::new(
            MotionConfig {
                max_joint_deviation,
                ..Default::default()
            },
            monitor,
        )
    }

    #[test]
    fn joint_jump_beyond_bound_is_fatal_without_motion() {
        let scenario = PanTiltScenario::default();
        let world = &scenario.world;
        let cancel = CancelToken::new();
        let ctx = MotionContext {
            lookup: world,
            velocity: world,
            joints: Some(world),
            clock: world,
            cancel: &cancel,
        };
        let mut ctrl = joint_move_config(0.5);
        let before = world.elapsed();

        let err = ctrl
            .move_with_retry(&ctx, &MotionTarget::JointVector(vec![0.3, -1.2]))
            .unwrap_err();
        assert_eq!(
            err,
            MotionError::JointDeviation {
                joint: 1,
                current: 0.0,
                target: -1.2,
                max: 0.5,
            }
        );
        assert!(err.is_fatal());
        assert_eq!(world.joint_values(), vec![0.0, 0.0]);
        assert_eq!(world.elapsed(), before);

        let outcome = ctrl
            .move_with_retry(&ctx, &MotionTarget::JointVector(vec![0.3, -0.4]))
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Reached { attempts: 1 });
        assert_eq!(world.joint_values(), vec![0.3, -0.4]);
    }

    #[test]
    fn joint_jump_allowed_when_bound_disabled() {
        let scenario = PanTiltScenario::default();
        let world = &scenario.world;
        let cancel = CancelToken::new();
        let ctx = MotionContext {
            lookup: world,
            velocity: world,
            joints: Some(world),
            clock: world,
            cancel: &cancel,
        };
        let mut ctrl = joint_move_config(0.0);
        ctrl.move_to(&ctx, &MotionTarget::JointVector(vec![1.2, 0.0]))
            .unwrap();
        assert_eq!(world.joint_values(), vec![1.2, 0.0]);
    }
}
