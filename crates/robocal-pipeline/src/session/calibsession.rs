//! The calibration run: move, observe, record, then solve and persist.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use robocal_core::{
    CalibrationOrder, Chain, ChainObservation, ConfigError, Iso3, validate_specs,
};
use robocal_linear::{TransformChainCalibrator, effective_iterations};
use thiserror::Error;

use super::config::SessionConfig;
use super::types::{
    EdgeResult, LogEntry, ObservationLog, SessionReport, SkippedConfiguration,
};
use crate::{
    CancelToken, Clock, ConfigurationSpace, ConfigurationSpaceGenerator, JointActuator,
    MotionContext, MotionController, MotionError, MoveOutcome, ObservationSlot, PoseLookup,
    ReferenceFrameMonitor, ResultStore, TargetDetector, VelocityActuator, VelocityCommand,
    WaitError, format_chain_record, wait_for,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("startup failed: {0}")]
    Startup(String),
    #[error("session aborted at configuration {configuration}: {source}")]
    Aborted {
        configuration: usize,
        #[source]
        source: MotionError,
    },
    #[error("session cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// External systems a session talks to, borrowed for the session lifetime.
pub struct Collaborators<'a, F> {
    pub lookup: &'a dyn PoseLookup,
    pub velocity: &'a dyn VelocityActuator,
    /// Required when any configuration carries joint values.
    pub joints: Option<&'a dyn JointActuator>,
    pub detector: &'a dyn TargetDetector<F>,
    pub store: &'a dyn ResultStore,
    pub clock: &'a dyn Clock,
    /// Latest sensor frame, written by the sensor side.
    pub frames: ObservationSlot<F>,
    pub cancel: CancelToken,
}

enum ObserveError {
    Cancelled,
    Failed(String),
}

/// One calibration run over a generated configuration space.
///
/// Everything that can be checked without moving is checked in
/// [`new`](Self::new); [`run`](Self::run) then visits each configuration in
/// order, solves the chain and writes the results.
pub struct CalibrationSession<'a, F> {
    config: SessionConfig,
    io: Collaborators<'a, F>,
    order: CalibrationOrder,
    space: ConfigurationSpace,
    iterations: usize,
    controller: MotionController,
    log: Vec<LogEntry>,
}

impl<'a, F: Clone> CalibrationSession<'a, F> {
    pub fn new(config: SessionConfig, io: Collaborators<'a, F>) -> Result<Self, ConfigError> {
        validate_specs(&config.edges)?;
        let order = CalibrationOrder::from_one_based(&config.calibration_order, config.edges.len())?;
        config.validate_timing()?;

        let space = ConfigurationSpaceGenerator::generate(&config.poses)?;
        if space.is_empty() {
            return Err(ConfigError::EmptyConfigurationSpace);
        }
        for (i, c) in space.configurations().iter().enumerate() {
            if c.joint_values.is_empty() {
                continue;
            }
            let Some(joints) = io.joints else {
                return Err(ConfigError::MissingCollaborator("joint actuator"));
            };
            if joints.dof() != c.joint_values.len() {
                return Err(ConfigError::InvalidParameter {
                    name: "poses",
                    reason: format!(
                        "configuration {i} has {} joint values, actuator has {} joints",
                        c.joint_values.len(),
                        joints.dof()
                    ),
                });
            }
        }
        if io.detector.kind() != config.marker {
            return Err(ConfigError::InvalidParameter {
                name: "marker",
                reason: format!(
                    "detector handles {:?} targets, configuration asks for {:?}",
                    io.detector.kind(),
                    config.marker
                ),
            });
        }

        let iterations = effective_iterations(config.optimization_iterations, config.edges.len());
        let monitor = ReferenceFrameMonitor::new(
            config.monitor.clone(),
            config.frames.reference.clone(),
            config.frames.base.clone(),
        );
        let controller = MotionController::new(config.motion.clone(), monitor);

        Ok(Self {
            config,
            io,
            order,
            space,
            iterations,
            controller,
            log: Vec::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn configurations(&self) -> &ConfigurationSpace {
        &self.space
    }

    pub fn order(&self) -> &CalibrationOrder {
        &self.order
    }

    /// Solver passes after single-edge and default substitution.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Run the whole session. The base is left with a zero-velocity
    /// command whatever the outcome.
    pub fn run(&mut self) -> Result<SessionReport, SessionError> {
        let result = self.run_inner();
        self.io.velocity.send(VelocityCommand::zero());
        match &result {
            Ok(report) => info!(
                "session finished: {} observed, {} skipped",
                report.visited.len(),
                report.skipped.len()
            ),
            Err(SessionError::Cancelled) => warn!("session cancelled"),
            Err(e) => log::error!("session failed: {e}"),
        }
        result
    }

    fn run_inner(&mut self) -> Result<SessionReport, SessionError> {
        let chain = self.startup()?;
        let initial = chain.transforms();
        let mut calibrator = TransformChainCalibrator::new(chain);

        let cancel = self.io.cancel.clone();
        let ctx = MotionContext {
            lookup: self.io.lookup,
            velocity: self.io.velocity,
            joints: self.io.joints,
            clock: self.io.clock,
            cancel: &cancel,
        };

        let configurations = self.space.configurations().to_vec();
        let total = configurations.len();
        let mut visited = Vec::new();
        let mut skipped = Vec::new();

        'configs: for (index, configuration) in configurations.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            info!("configuration {}/{total}", index + 1);

            for target in configuration.targets() {
                match self.controller.move_with_retry(&ctx, &target) {
                    Ok(MoveOutcome::Reached { attempts }) => {
                        debug!("reached {target} after {attempts} attempt(s)");
                    }
                    Ok(MoveOutcome::Skipped(e)) => {
                        warn!("skipping configuration {index}: {e}");
                        self.log.push(LogEntry::failure("move", format!("configuration {index}: {e}")));
                        skipped.push(SkippedConfiguration {
                            index,
                            reason: e.to_string(),
                        });
                        continue 'configs;
                    }
                    Err(MotionError::Cancelled) => return Err(SessionError::Cancelled),
                    Err(source) => {
                        self.log.push(LogEntry::failure(
                            "move",
                            format!("configuration {index}: {source}"),
                        ));
                        return Err(SessionError::Aborted {
                            configuration: index,
                            source,
                        });
                    }
                }
            }

            let moved_at = self.io.clock.now();
            let recorded = match self.observe(calibrator.chain(), index, moved_at) {
                Ok(obs) => calibrator
                    .record_observation(index, obs)
                    .map_err(|e| e.to_string()),
                Err(ObserveError::Cancelled) => return Err(SessionError::Cancelled),
                Err(ObserveError::Failed(reason)) => Err(reason),
            };
            match recorded {
                Ok(()) => {
                    self.log.push(LogEntry::success_with_notes(
                        "observe",
                        format!("configuration {index}"),
                    ));
                    visited.push(index);
                }
                Err(reason) => {
                    warn!("no observation at configuration {index}: {reason}");
                    self.log.push(LogEntry::failure("observe", reason.clone()));
                    skipped.push(SkippedConfiguration { index, reason });
                }
            }
        }

        let solve = calibrator.solve(&self.order, self.iterations)?;
        self.log.push(LogEntry::success_with_notes(
            "solve",
            format!("{} pass(es), {} edge(s) failed", solve.passes, solve.num_failed()),
        ));

        self.persist(&calibrator, initial);

        let edges = calibrator.chain().edges().iter().map(EdgeResult::from).collect();
        Ok(SessionReport {
            configurations: total,
            visited,
            skipped,
            solve,
            edges,
            log: self.log.clone(),
        })
    }

    /// Bounded waits for tracking (when the base moves), every transform and
    /// the first frame.
    fn startup(&mut self) -> Result<Chain, SessionError> {
        let lookup = self.io.lookup;
        let frames = &self.config.frames;
        let waits = Waits {
            clock: self.io.clock,
            cancel: &self.io.cancel,
            timeout: self.config.startup_timeout(),
            poll: self.config.poll_interval(),
        };
        info!("waiting for tracking, transforms and sensor data");

        // Tracking only gates base motion.
        let moves_base = self
            .space
            .configurations()
            .iter()
            .any(|c| c.base_pose.is_some());
        if moves_base {
            let reference_se3_base = waits.until("tracking pose", || {
                lookup.lookup(&frames.reference, &frames.base).ok()
            })?;
            self.controller.monitor_mut().prime(&reference_se3_base);
        } else {
            debug!("no base motion, tracking pose not required");
        }

        let mut initial = Vec::with_capacity(self.config.edges.len());
        for spec in &self.config.edges {
            let what = format!("transform {} -> {}", spec.parent, spec.child);
            initial.push(waits.until(&what, || lookup.lookup(&spec.parent, &spec.child).ok())?);
        }
        let chain = Chain::new(&self.config.edges, &initial)?;

        for bridge in chain.bridges() {
            let what = format!("bridge {} -> {}", bridge.from, bridge.to);
            waits.until(&what, || lookup.lookup(&bridge.from, &bridge.to).ok())?;
        }
        waits.until("root to marker transform", || {
            lookup.lookup(chain.root_frame(), &frames.marker).ok()
        })?;
        waits.until("tip to sensor transform", || {
            lookup.lookup(chain.tip_frame(), &frames.sensor).ok()
        })?;

        let slot = &self.io.frames;
        let clock = self.io.clock;
        let max_age = self.config.max_frame_age();
        waits.until("sensor frame", || slot.latest(clock.now(), max_age))?;

        for edge in chain.edges() {
            debug!(
                "initial {} -> {}: {:?}",
                edge.parent, edge.child, edge.transform.translation.vector
            );
        }
        self.log.push(LogEntry::success_with_notes(
            "startup",
            format!("{} edge(s), {} bridge(s)", chain.len(), chain.num_bridges()),
        ));
        Ok(chain)
    }

    fn observe(
        &self,
        chain: &Chain,
        index: usize,
        moved_at: Instant,
    ) -> Result<ChainObservation, ObserveError> {
        let clock = self.io.clock;
        let max_age = self.config.max_frame_age();
        let (frame, stamp) = wait_for(
            clock,
            &self.io.cancel,
            self.config.frame_timeout(),
            self.config.poll_interval(),
            || self.io.frames.newer_than(moved_at, clock.now(), max_age),
        )
        .map_err(|e| match e {
            WaitError::Cancelled => ObserveError::Cancelled,
            WaitError::TimedOut(d) => {
                ObserveError::Failed(format!("no sensor frame newer than the move within {d:?}"))
            }
        })?;
        debug!(
            "frame for configuration {index} is {:?} old",
            clock.now().saturating_duration_since(stamp)
        );

        let detection = self
            .io
            .detector
            .detect(&frame)
            .ok_or_else(|| ObserveError::Failed("marker not detected".into()))?;

        let lookup = |target: &str, source: &str| -> Result<Iso3, ObserveError> {
            self.io
                .lookup
                .lookup(target, source)
                .map_err(|e| ObserveError::Failed(e.to_string()))
        };
        let frames = &self.config.frames;
        let root_se3_marker = lookup(chain.root_frame(), &frames.marker)?;
        let tip_se3_sensor = lookup(chain.tip_frame(), &frames.sensor)?;
        let bridges = chain
            .bridges()
            .iter()
            .map(|b| lookup(&b.from, &b.to))
            .collect::<Result<Vec<_>, _>>()?;

        ChainObservation::new(
            index,
            detection.model_points,
            root_se3_marker,
            tip_se3_sensor * detection.sensor_se3_marker,
            bridges,
        )
        .map_err(|e| ObserveError::Failed(e.to_string()))
    }

    fn persist(&mut self, calibrator: &TransformChainCalibrator, initial: Vec<Iso3>) {
        let record = format_chain_record(calibrator.chain().edges());
        for line in record.lines().filter(|l| !l.is_empty()) {
            info!("{line}");
        }
        match self.io.store.append(&record) {
            Ok(()) => self.log.push(LogEntry::success("store")),
            Err(e) => {
                warn!("could not store calibration results: {e}");
                self.log.push(LogEntry::failure("store", e.to_string()));
            }
        }

        if let Some(file) = &self.config.storage.observations_file {
            let path = self.config.storage.directory.join(file);
            let dataset = ObservationLog {
                edges: self.config.edges.clone(),
                initial,
                calibration_order: self.order.to_one_based(),
                observations: calibrator.observations().to_vec(),
            };
            match dataset.save(&path) {
                Ok(()) => info!("observations written to {}", path.display()),
                Err(e) => warn!("could not write observations: {e:#}"),
            }
        }
    }
}

/// Bounded, cancellable startup waits.
struct Waits<'w> {
    clock: &'w dyn Clock,
    cancel: &'w CancelToken,
    timeout: Duration,
    poll: Duration,
}

impl Waits<'_> {
    fn until<T>(&self, what: &str, probe: impl FnMut() -> Option<T>) -> Result<T, SessionError> {
        wait_for(self.clock, self.cancel, self.timeout, self.poll, probe).map_err(|e| match e {
            WaitError::Cancelled => SessionError::Cancelled,
            WaitError::TimedOut(d) => {
                SessionError::Startup(format!("{what} not available within {d:?}"))
            }
        })
    }
}
