//! Motion, monitoring and session orchestration for kinematic-chain
//! calibration.
//!
//! A [`CalibrationSession`] visits every configuration produced by the
//! [`ConfigurationSpaceGenerator`], moving the robot with a
//! [`MotionController`] gated by a [`ReferenceFrameMonitor`], records one
//! observation per configuration and finally solves the chain with
//! [`robocal_linear::TransformChainCalibrator`].
//!
//! All robot- and middleware-specific access goes through the traits in
//! [`interfaces`] and the [`Clock`]; the [`sim`] module provides a
//! deterministic implementation of all of them.
//!
//! ```
//! use robocal_pipeline::sim::{MemoryStore, PanTiltScenario};
//! use robocal_pipeline::{CalibrationSession, CancelToken, Collaborators};
//!
//! let scenario = PanTiltScenario::default();
//! let detector = scenario.detector();
//! let store = MemoryStore::new();
//! let world = &scenario.world;
//!
//! let mut session = CalibrationSession::new(
//!     scenario.config.clone(),
//!     Collaborators {
//!         lookup: world,
//!         velocity: world,
//!         joints: Some(world),
//!         detector: &detector,
//!         store: &store,
//!         clock: world,
//!         frames: world.frames(),
//!         cancel: CancelToken::new(),
//!     },
//! )
//! .unwrap();
//! let report = session.run().unwrap();
//! assert_eq!(report.visited.len(), 18);
//! assert!(store.contents().contains("torso_link_x"));
//! ```

pub mod clock;
pub mod generator;
pub mod interfaces;
pub mod monitor;
pub mod motion;
pub mod observation_slot;
pub mod session;
pub mod sim;
pub mod store;

pub use clock::*;
pub use generator::*;
pub use interfaces::*;
pub use monitor::*;
pub use motion::*;
pub use observation_slot::*;
pub use session::*;
pub use store::*;
