//! Whole calibration sessions against the simulated robot.

use std::time::Duration;

use robocal_core::{BasePose, ConfigError, pose_error};
use robocal_pipeline::sim::{MemoryStore, PanTiltScenario, SimDetector, SimImage, SimWorld};
use robocal_pipeline::{
    CalibrationSession, CancelToken, Collaborators, MarkerKind, MotionError, ObservationLog,
    PoseSpace, RangeSpec, SessionError,
};

fn collaborators<'a>(
    world: &'a SimWorld,
    detector: &'a SimDetector,
    store: &'a MemoryStore,
    cancel: CancelToken,
) -> Collaborators<'a, SimImage> {
    Collaborators {
        lookup: world,
        velocity: world,
        joints: Some(world),
        detector,
        store,
        clock: world,
        frames: world.frames(),
        cancel,
    }
}

fn assert_stopped(world: &SimWorld) {
    let commands = world.commands();
    let last = commands.last().expect("at least one velocity command");
    assert!(last.is_zero(), "last command {last:?}");
}

#[test]
fn chain_recovered_from_perturbed_nominal() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;

    let mut session = CalibrationSession::new(
        scenario.config.clone(),
        collaborators(world, &detector, &store, CancelToken::new()),
    )
    .unwrap();
    assert_eq!(session.configurations().len(), 18);
    assert_eq!(session.iterations(), 1000);

    let report = session.run().unwrap();
    assert_eq!(report.configurations, 18);
    assert_eq!(report.visited.len(), 18);
    assert!(report.skipped.is_empty());
    assert!(report.solve.all_solved());

    for (k, truth) in scenario.truth.iter().enumerate() {
        let (dt0, _) = pose_error(&scenario.nominal[k], truth);
        let (dt, dr) = pose_error(&report.edges[k].transform, truth);
        assert!(dt < 1e-3, "edge {k}: translation error {dt} (nominal {dt0})");
        assert!(dr < 1e-3, "edge {k}: rotation error {dr}");
    }

    let text = store.contents();
    assert!(text.contains("<!-- torso_link mount positions | relative to base_link -->"));
    assert!(text.contains("camera_link_yaw"));
    assert!(report.log.iter().any(|e| e.operation == "solve" && e.success));

    // The base was really driven, and left stopped.
    assert!(world.commands().iter().any(|c| !c.is_zero()));
    assert_stopped(world);
}

#[test]
fn tracking_jump_aborts_with_zero_velocity() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;
    world.schedule_teleport(Duration::from_secs(3), BasePose::new(-1.5, 0.0, 0.0));

    let mut session = CalibrationSession::new(
        scenario.config.clone(),
        collaborators(world, &detector, &store, CancelToken::new()),
    )
    .unwrap();
    let err = session.run().unwrap_err();

    match err {
        SessionError::Aborted {
            configuration,
            source,
        } => {
            assert_eq!(configuration, 0);
            assert!(matches!(source, MotionError::ReferenceTooFar { .. }), "{source}");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(store.contents().is_empty());
    assert_stopped(world);
}

#[test]
fn lost_tracking_fails_startup() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;
    world.set_tracking(false);

    let mut config = scenario.config.clone();
    config.startup_timeout_s = 1.0;
    let mut session =
        CalibrationSession::new(config, collaborators(world, &detector, &store, CancelToken::new()))
            .unwrap();

    let err = session.run().unwrap_err();
    assert!(matches!(err, SessionError::Startup(ref msg) if msg.contains("tracking")), "{err}");
    assert!(world.elapsed() >= Duration::from_secs(1));
    assert_stopped(world);
}

#[test]
fn hidden_marker_skips_configuration() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;

    let mut config = scenario.config.clone();
    config.poses = PoseSpace::Explicit {
        base: true,
        joint_dof: 2,
        values: vec![
            -0.8, 0.0, 0.0, 0.0, 0.0, //
            -0.8, 0.0, 0.0, 2.5, 0.0, //
            -0.8, 0.0, 0.0, 0.3, 0.2, //
            -0.8, 0.0, 0.0, -0.3, -0.2,
        ],
    };
    config.frame_timeout_s = 1.0;
    let mut session =
        CalibrationSession::new(config, collaborators(world, &detector, &store, CancelToken::new()))
            .unwrap();

    let report = session.run().unwrap();
    assert_eq!(report.visited, vec![0, 2, 3]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert!(report.skipped[0].reason.contains("not detected"));
    assert!(!store.contents().is_empty());
}

#[test]
fn limb_only_session_needs_no_tracking() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;

    let mut config = scenario.config.clone();
    config.frames.reference = "no_tracker".into();
    config.startup_timeout_s = 1.0;
    config.poses = PoseSpace::Range(RangeSpec {
        base: None,
        joints: vec![-0.4, 0.4, 0.4, -0.3, 0.3, 0.3],
    });
    let mut session =
        CalibrationSession::new(config, collaborators(world, &detector, &store, CancelToken::new()))
            .unwrap();

    let report = session.run().unwrap();
    assert_eq!(report.visited.len(), 9);
    assert!(report.skipped.is_empty());
    assert!(report.solve.all_solved());
    for (k, truth) in scenario.truth.iter().enumerate() {
        let (dt0, _) = pose_error(&scenario.nominal[k], truth);
        let (dt, _) = pose_error(&report.edges[k].transform, truth);
        assert!(dt < dt0, "edge {k}: translation error {dt} (nominal {dt0})");
    }
    assert!(store.contents().contains("camera_link_x"));
    assert!(world.commands().iter().all(|c| c.is_zero()));
}

#[test]
fn joint_jump_beyond_bound_aborts_session() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;

    let mut config = scenario.config.clone();
    config.motion.max_joint_deviation = 1.0;
    config.poses = PoseSpace::Explicit {
        base: false,
        joint_dof: 2,
        values: vec![
            0.2, 0.1, //
            2.5, 0.1, //
            -0.3, -0.2,
        ],
    };
    let mut session =
        CalibrationSession::new(config, collaborators(world, &detector, &store, CancelToken::new()))
            .unwrap();

    let err = session.run().unwrap_err();
    match err {
        SessionError::Aborted {
            configuration,
            source,
        } => {
            assert_eq!(configuration, 1);
            assert!(matches!(source, MotionError::JointDeviation { joint: 0, .. }), "{source}");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(world.joint_values(), vec![0.2, 0.1]);
    assert!(store.contents().is_empty());
    assert_stopped(world);
}

#[test]
fn joint_configurations_need_a_joint_actuator() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;

    let mut io = collaborators(world, &detector, &store, CancelToken::new());
    io.joints = None;
    let err = CalibrationSession::new(scenario.config.clone(), io).err();
    assert_eq!(err, Some(ConfigError::MissingCollaborator("joint actuator")));
}

#[test]
fn detector_must_match_marker_kind() {
    let scenario = PanTiltScenario::default();
    let detector = SimDetector::new(MarkerKind::Pitag, Vec::new());
    let store = MemoryStore::new();

    let err = CalibrationSession::new(
        scenario.config.clone(),
        collaborators(&scenario.world, &detector, &store, CancelToken::new()),
    )
    .err();
    assert!(matches!(err, Some(ConfigError::InvalidParameter { name: "marker", .. })));
}

#[test]
fn invalid_order_rejected_before_any_motion() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();

    let mut config = scenario.config.clone();
    config.calibration_order = vec![1, 2, 3];
    let err = CalibrationSession::new(
        config,
        collaborators(&scenario.world, &detector, &store, CancelToken::new()),
    )
    .err();
    assert_eq!(
        err,
        Some(ConfigError::OrderLength {
            got: 3,
            expected: 2
        })
    );
    assert!(scenario.world.commands().is_empty());
}

#[test]
fn cancelled_session_stops_the_base() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let world = &scenario.world;
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut session = CalibrationSession::new(
        scenario.config.clone(),
        collaborators(world, &detector, &store, cancel),
    )
    .unwrap();
    assert!(matches!(session.run(), Err(SessionError::Cancelled)));
    assert_stopped(world);
}

#[test]
fn store_failure_is_not_fatal() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::failing();

    let mut session = CalibrationSession::new(
        scenario.config.clone(),
        collaborators(&scenario.world, &detector, &store, CancelToken::new()),
    )
    .unwrap();
    let report = session.run().unwrap();
    assert!(report.log.iter().any(|e| e.operation == "store" && !e.success));
}

#[test]
fn recorded_observations_re_solve_offline() {
    let scenario = PanTiltScenario::default();
    let detector = scenario.detector();
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();

    let mut config = scenario.config.clone();
    config.storage.directory = dir.path().join("calibration");
    config.storage.observations_file = Some("observations.json".into());
    let mut session = CalibrationSession::new(
        config,
        collaborators(&scenario.world, &detector, &store, CancelToken::new()),
    )
    .unwrap();
    session.run().unwrap();

    let log = ObservationLog::load(&dir.path().join("calibration/observations.json")).unwrap();
    assert_eq!(log.observations.len(), 18);
    assert_eq!(log.initial, scenario.nominal);
    assert_eq!(log.calibration_order, vec![1, 2]);

    let (chain, report) = log.solve(0).unwrap();
    assert_eq!(report.passes, 1000);
    for (k, truth) in scenario.truth.iter().enumerate() {
        let (dt, dr) = pose_error(&chain.edge(k).transform, truth);
        assert!(dt < 1e-3 && dr < 1e-3, "edge {k}: {dt} {dr}");
    }
}
