use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use strider_core::{Blackboard, PoseEstimate, TelemetrySnapshot, Topic};
use strider_kinematics::Pose;
use strider_localization::{
    FilterSettings, Landmark, LandmarkMap, LandmarkObservation, LocalizationEngine, LocalizationError, NoObservations,
    PoseStd,
};

fn settings() -> FilterSettings {
    FilterSettings {
        particles: 50,
        seed: Some(11),
        ..FilterSettings::default()
    }
}

fn map() -> Arc<LandmarkMap> {
    Arc::new(LandmarkMap::new(vec![
        Landmark::new(1, 24.0, 0.0),
        Landmark::new(2, 0.0, 24.0),
        Landmark::new(3, -24.0, -12.0),
    ]))
}

fn publish_motion(blackboard: &Blackboard, v: f64, yaw_rate: f64) {
    blackboard.telemetry.publish(TelemetrySnapshot {
        forward_velocity: Some(v),
        yaw_rate: Some(yaw_rate),
        ..TelemetrySnapshot::default()
    });
}

fn engine(blackboard: &Arc<Blackboard>) -> LocalizationEngine {
    LocalizationEngine::new(settings(), map(), Arc::clone(blackboard), Arc::new(NoObservations)).unwrap()
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_start_requires_initialization() {
    let blackboard = Blackboard::shared();
    let mut engine = engine(&blackboard);
    assert!(matches!(engine.start(), Err(LocalizationError::NotInitialized)));
    assert!(matches!(engine.step(), Err(LocalizationError::NotInitialized)));
    assert!(engine.particles().is_none());
}

#[test]
fn test_manual_step_publishes_prediction() {
    let blackboard = Blackboard::shared();
    let engine = engine(&blackboard);
    engine.initialize(Pose::default(), PoseStd::ZERO).unwrap();
    assert_eq!(engine.pose_estimate().cycle, 0);

    publish_motion(&blackboard, 10.0, 0.0);
    let estimate = engine.step().unwrap();

    assert!((estimate.pose.x - 0.2).abs() < 0.05);
    assert!(estimate.pose.y.abs() < 0.05);
    let published = blackboard.pose_estimate();
    assert_eq!(published.cycle, 1);
    assert_eq!(published.pose, estimate.pose);
    assert_eq!(engine.particles().map(|p| p.len()), Some(50));
}

#[test]
fn test_missing_telemetry_is_not_fatal() {
    let blackboard = Blackboard::shared();
    let engine = engine(&blackboard);
    engine.initialize(Pose::new(1.0, 1.0, 0.0), PoseStd::ZERO).unwrap();
    blackboard.telemetry.publish(TelemetrySnapshot {
        forward_velocity: None,
        yaw_rate: Some(f64::NAN),
        ..TelemetrySnapshot::default()
    });

    let estimate = engine.step().unwrap();
    assert!(estimate.pose.distance_to(&Pose::new(1.0, 1.0, 0.0)) < 0.05);
}

#[test]
fn test_lifecycle_start_stop_restart() {
    let blackboard = Blackboard::shared();
    let mut engine = engine(&blackboard);
    engine.initialize(Pose::default(), PoseStd::ZERO).unwrap();
    publish_motion(&blackboard, 10.0, 0.0);

    engine.start().unwrap();
    assert!(engine.is_running());
    assert!(matches!(engine.start(), Err(LocalizationError::AlreadyRunning)));
    assert!(wait_for(|| blackboard.pose_estimate().cycle >= 5));

    engine.stop().unwrap();
    assert!(!engine.is_running());
    let stopped_at = blackboard.pose_estimate().cycle;
    thread::sleep(Duration::from_millis(100));
    assert_eq!(blackboard.pose_estimate().cycle, stopped_at);
    // driving forward the whole time
    assert!(blackboard.pose_estimate().pose.x > 0.0);

    engine.start().unwrap();
    assert!(wait_for(|| blackboard.pose_estimate().cycle > stopped_at));
    engine.stop().unwrap();
    engine.stop().unwrap();
}

#[test]
fn test_estimates_are_broadcast() {
    let blackboard = Blackboard::shared();
    let topic: Topic<PoseEstimate> = Topic::new(8);
    let mut rx = topic.subscribe();
    let engine = engine(&blackboard).with_topic(topic);
    engine.initialize(Pose::default(), PoseStd::ZERO).unwrap();

    engine.step().unwrap();
    engine.step().unwrap();

    assert_eq!(rx.try_recv().unwrap().cycle, 1);
    assert_eq!(rx.try_recv().unwrap().cycle, 2);
}

#[test]
fn test_topic_attached_while_running() {
    let blackboard = Blackboard::shared();
    let mut engine = engine(&blackboard);
    engine.initialize(Pose::default(), PoseStd::ZERO).unwrap();
    engine.start().unwrap();
    assert!(wait_for(|| blackboard.pose_estimate().cycle >= 1));

    let topic: Topic<PoseEstimate> = Topic::new(64);
    let mut rx = topic.subscribe();
    let mut engine = engine.with_topic(topic);

    assert!(wait_for(|| rx.try_recv().is_ok()));
    engine.stop().unwrap();
}

#[test]
fn test_restart_after_task_panicked() {
    let blackboard = Blackboard::shared();
    let failed = Arc::new(AtomicBool::new(false));
    let sensor = {
        let failed = Arc::clone(&failed);
        move || {
            if !failed.swap(true, Ordering::SeqCst) {
                panic!("sensor fault");
            }
            Vec::<LandmarkObservation>::new()
        }
    };
    let mut engine = LocalizationEngine::new(settings(), map(), Arc::clone(&blackboard), Arc::new(sensor)).unwrap();
    engine.initialize(Pose::default(), PoseStd::ZERO).unwrap();

    engine.start().unwrap();
    assert!(wait_for(|| !engine.is_running()));
    assert_eq!(blackboard.pose_estimate().cycle, 0);

    engine.start().unwrap();
    assert!(wait_for(|| blackboard.pose_estimate().cycle >= 3));
    engine.stop().unwrap();
}

#[test]
fn test_landmarks_pull_estimate_to_truth() {
    let blackboard = Blackboard::shared();
    let truth = Pose::new(3.0, -2.0, 0.0);
    let landmarks = map();
    let sensor = {
        let landmarks = Arc::clone(&landmarks);
        move || {
            landmarks
                .iter()
                .map(|l| LandmarkObservation::new(l.x - truth.x, l.y - truth.y))
                .collect::<Vec<_>>()
        }
    };
    let settings = FilterSettings {
        particles: 400,
        ..settings()
    };
    let engine = LocalizationEngine::new(settings, landmarks, Arc::clone(&blackboard), Arc::new(sensor)).unwrap();
    engine.initialize(Pose::new(4.0, -3.0, 0.0), PoseStd::new(1.5, 1.5, 0.02)).unwrap();
    publish_motion(&blackboard, 0.0, 0.0);

    for _ in 0..20 {
        engine.step().unwrap();
    }
    let estimate = engine.pose_estimate();
    assert_eq!(estimate.observations, 3);
    assert!(estimate.pose.distance_to(&truth) < 0.5, "estimate {}", estimate.pose);
}
