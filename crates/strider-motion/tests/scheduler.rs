mod common;

use std::thread;
use std::time::Duration;

use common::SimDrive;
use strider_motion::{ControllerSettings, Motion, MotionError, MotionOutcome, MotionRequest, MotionScheduler};

fn scheduler(drive: &std::sync::Arc<SimDrive>) -> MotionScheduler {
    MotionScheduler::new(drive.clone(), ControllerSettings::default()).unwrap()
}

fn running(motion: Motion) -> strider_motion::MotionHandle {
    match motion {
        Motion::Running(handle) => handle,
        Motion::Finished(report) => panic!("non-blocking request finished inline: {report:?}"),
    }
}

#[test]
fn test_non_blocking_returns_while_running() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    let handle = running(
        scheduler
            .move_distance(MotionRequest::new(24.0, Duration::from_millis(200)).non_blocking())
            .unwrap(),
    );

    assert!(scheduler.is_motion_running());
    assert!(!handle.is_finished());
    let report = handle.join().unwrap();
    assert_eq!(report.outcome, MotionOutcome::TimedOut);
    assert!(!scheduler.is_motion_running());
}

#[test]
fn test_second_request_is_rejected_and_first_is_unaffected() {
    let drive = SimDrive::new(0.01);
    let scheduler = scheduler(&drive);

    let first = running(
        scheduler
            .move_distance(MotionRequest::new(24.0, Duration::from_secs(3)).non_blocking())
            .unwrap(),
    );
    thread::sleep(Duration::from_millis(50));

    let denied = scheduler.move_distance(MotionRequest::new(-24.0, Duration::from_secs(3)));
    assert!(matches!(denied, Err(MotionError::Busy { active }) if active == first.id()));
    assert!(matches!(scheduler.request_start(), Err(MotionError::Busy { .. })));

    let report = first.join().unwrap();
    assert_eq!(report.outcome, MotionOutcome::Done);
    assert!((report.traveled - 24.0).abs() <= 0.5);
    // the denied request never commanded the drivetrain backwards
    assert!(drive.commands().iter().all(|&(l, r)| l >= 0.0 && r >= 0.0));

    // slot is free again
    let report = scheduler
        .move_distance(MotionRequest::new(6.0, Duration::from_secs(3)))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(report.outcome, MotionOutcome::Done);
}

#[test]
fn test_cancel_stops_within_a_period() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    let handle = running(
        scheduler
            .move_distance(MotionRequest::new(24.0, Duration::from_secs(5)).non_blocking())
            .unwrap(),
    );
    thread::sleep(Duration::from_millis(50));

    assert!(scheduler.cancel());
    let report = handle.join().unwrap();
    assert_eq!(report.outcome, MotionOutcome::Cancelled);
    assert!(report.elapsed < Duration::from_secs(1));
    assert_eq!(drive.last_command(), Some((0.0, 0.0)));
    assert!(!scheduler.is_motion_running());
    assert!(!scheduler.cancel());
}

#[test]
fn test_handle_cancel_targets_its_motion() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    let handle = running(
        scheduler
            .move_distance(MotionRequest::new(24.0, Duration::from_secs(5)).non_blocking())
            .unwrap(),
    );
    handle.cancel();
    assert_eq!(handle.join().unwrap().outcome, MotionOutcome::Cancelled);
}

#[test]
fn test_wait_until_distance_then_done() {
    let drive = SimDrive::new(0.01);
    let scheduler = scheduler(&drive);

    let handle = running(
        scheduler
            .move_distance(MotionRequest::new(24.0, Duration::from_secs(3)).non_blocking())
            .unwrap(),
    );

    scheduler.wait_until(12.0);
    assert!(drive.position() >= 12.0);
    assert!(scheduler.distance_traveled().is_none_or(|traveled| traveled >= 12.0));

    scheduler.wait_until_done();
    assert!(!scheduler.is_motion_running());
    assert_eq!(scheduler.distance_traveled(), None);
    assert_eq!(handle.join().unwrap().outcome, MotionOutcome::Done);
}

#[test]
fn test_wait_until_counts_in_motion_direction() {
    let drive = SimDrive::new(0.01);
    let scheduler = scheduler(&drive);

    let handle = running(
        scheduler
            .move_distance(MotionRequest::new(-24.0, Duration::from_secs(3)).non_blocking())
            .unwrap(),
    );

    scheduler.wait_until(8.0);
    assert!(drive.position() <= -8.0);
    handle.join().unwrap();
}

#[test]
fn test_waits_return_immediately_when_idle() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    scheduler.wait_until(100.0);
    scheduler.wait_until_done();
    assert_eq!(scheduler.distance_traveled(), None);
}

#[test]
fn test_manual_slot_blocks_motions_until_released() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    let slot = scheduler.request_start().unwrap();
    assert!(scheduler.is_motion_running());
    assert!(matches!(
        scheduler.move_distance(MotionRequest::new(1.0, Duration::from_millis(10))),
        Err(MotionError::Busy { active }) if active == slot.id()
    ));

    slot.release();
    assert!(!scheduler.is_motion_running());
    assert!(scheduler.request_start().is_ok());
}

#[test]
fn test_invalid_request_does_not_take_the_slot() {
    let drive = SimDrive::stuck();
    let scheduler = scheduler(&drive);

    let result = scheduler.move_distance(MotionRequest::new(f64::INFINITY, Duration::from_secs(1)));
    assert!(matches!(result, Err(MotionError::InvalidRequest(_))));
    assert!(!scheduler.is_motion_running());
}
