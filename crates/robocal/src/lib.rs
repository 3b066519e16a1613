//! High-level entry crate for `robocal`, extrinsic calibration of the
//! kinematic chain of a mobile manipulator.
//!
//! A calibration run drives the robot through a grid of base poses and joint
//! values, observes a fixed marker with a sensor at the end of the chain and
//! refines every uncertain transform of the chain so that both paths to the
//! marker (through the base and through the chain) agree.
//!
//! # Quick Start
//!
//! ```no_run
//! use robocal::prelude::*;
//!
//! fn calibrate<F: Clone>(
//!     config: SessionConfig,
//!     robot: &(impl PoseLookup + VelocityActuator + JointActuator + Clock),
//!     detector: &dyn TargetDetector<F>,
//!     frames: ObservationSlot<F>,
//! ) -> anyhow::Result<SessionReport> {
//!     let store = FileResultStore::new(&config.storage.directory, &config.storage.result_file);
//!     let mut session = CalibrationSession::new(
//!         config,
//!         Collaborators {
//!             lookup: robot,
//!             velocity: robot,
//!             joints: Some(robot),
//!             detector,
//!             store: &store,
//!             clock: robot,
//!             frames,
//!             cancel: CancelToken::new(),
//!         },
//!     )?;
//!     let report = session.run()?;
//!     for edge in &report.edges {
//!         println!("{} -> {}: {:?} {:?}", edge.parent, edge.child, edge.xyz, edge.rpy);
//!     }
//!     Ok(report)
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`session`] - `CalibrationSession`, its configuration and report types
//! - [`generator`] - configuration space from ranges or explicit lists
//! - [`motion`] - closed-loop base motion and the reference-frame monitor
//! - [`io`] - collaborator traits, clock, observation slot and result store
//! - [`sim`] - deterministic simulated robot
//!
//! ## Foundation Crates
//!
//! - [`core`] - math aliases, chain and observation types
//! - [`linear`] - rigid-transform fitting and the chain solver
//! - [`synthetic`] - synthetic data helpers for tests

/// Calibration session: configuration, run loop, report and dataset export.
pub mod session {
    pub use robocal_pipeline::session::{
        CalibrationSession, Collaborators, EdgeResult, FrameNames, LogEntry, ObservationLog,
        SessionConfig, SessionError, SessionReport, SkippedConfiguration, StorageConfig,
    };
}

/// Configuration space generation.
pub mod generator {
    pub use robocal_pipeline::{
        AxisRange, BaseRanges, ConfigurationSpace, ConfigurationSpaceGenerator, PoseSpace,
        RangeSpec,
    };
}

/// Base and joint motion gated by the reference-frame monitor.
pub mod motion {
    pub use robocal_pipeline::{
        Divergence, DivergenceGuard, MonitorConfig, MotionConfig, MotionContext,
        MotionController, MotionError, MoveOutcome, Phase, ReferenceFrameMonitor,
        ReferenceHistory, Severity, wrap_heading_error,
    };
}

/// Collaborators the session talks to.
pub mod io {
    pub use robocal_pipeline::{
        ActuatorError, CancelToken, Clock, FileResultStore, JointActuator, LookupError,
        MarkerKind, ObservationSlot, PoseLookup, ResultStore, SystemClock, TargetDetector,
        VelocityActuator, VelocityCommand, WaitError, cancellable_sleep, format_chain_record,
        format_edge_record, wait_for,
    };
}

/// Deterministic simulated robot.
pub mod sim {
    pub use robocal_pipeline::sim::*;
}

/// Math types and the chain data model.
pub mod core {
    pub use robocal_core::*;
}

/// Rigid-transform fitting and the coordinate-descent chain solver.
pub mod linear {
    pub use robocal_linear::*;
}

/// Synthetic data generation for testing.
pub mod synthetic {
    pub use robocal_core::synthetic::*;
}

pub use robocal_core::{
    CalibrationOrder, Chain, ChainObservation, ConfigError, Edge, EdgeSpec, Iso3, Pt3, Real, Rpy,
    Vec3,
};
pub use robocal_linear::{ChainSolveReport, TransformChainCalibrator};
pub use robocal_pipeline::{CalibrationSession, SessionConfig, SessionError, SessionReport};

/// Convenient imports for running a session.
pub mod prelude {
    pub use crate::io::{
        CancelToken, Clock, FileResultStore, JointActuator, MarkerKind, ObservationSlot,
        PoseLookup, ResultStore, SystemClock, TargetDetector, VelocityActuator,
    };
    pub use crate::session::{
        CalibrationSession, Collaborators, ObservationLog, SessionConfig, SessionError,
        SessionReport,
    };
    pub use crate::{Chain, EdgeSpec, Iso3, Pt3, Real, Rpy};
}
