mod config;
mod sim;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use sim::{SimDrivetrain, SimLandmarkSensor};
use strider_core::{Blackboard, PoseEstimate, Topic};
use strider_localization::LocalizationEngine;
use strider_motion::{MotionError, MotionRequest, MotionScheduler};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Log every n-th pose estimate.
const REPORT_EVERY: u64 = 25;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Strider control core simulation starting.");
    let settings = config::load_settings(config::DEFAULT_CONFIG_PATH).context("loading configuration")?;

    let blackboard = Blackboard::shared();
    let shutdown = CancellationToken::new();

    let drivetrain = Arc::new(SimDrivetrain::new(
        settings.drivetrain.geometry()?,
        settings.drivetrain.max_wheel_speed(),
        settings.drivetrain.max_command,
        settings.sim.start,
        Arc::clone(&blackboard),
    ));

    info!("Spawning drivetrain thread...");
    let physics = thread::Builder::new().name("drivetrain".into()).spawn({
        let drivetrain = Arc::clone(&drivetrain);
        let shutdown = shutdown.clone();
        let period = Duration::from_millis(settings.sim.period_ms);
        move || drivetrain.run(period, &shutdown)
    })?;

    let landmarks = Arc::new(settings.landmarks.clone());
    let sensor = Arc::new(SimLandmarkSensor::new(
        Arc::clone(&drivetrain),
        Arc::clone(&landmarks),
        settings.localization.sensor_range,
        settings.sim.observation_std,
        settings.sim.seed,
    ));

    let pose_topic: Topic<PoseEstimate> = Topic::new(16);
    let pose_rx = pose_topic.subscribe();
    let mut localization = LocalizationEngine::new(
        settings.localization.clone(),
        landmarks,
        Arc::clone(&blackboard),
        sensor,
    )?
    .with_topic(pose_topic);
    localization.initialize(settings.sim.start, settings.localization.initial_std)?;
    localization.start()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let reporter = runtime.spawn(async_runtime(
        Arc::clone(&blackboard),
        pose_rx,
        settings.localization.period(),
        shutdown.clone(),
    ));

    let scheduler = MotionScheduler::new(drivetrain.clone(), settings.motion.clone())?;
    let route = run_route(&scheduler);

    shutdown.cancel();
    runtime.block_on(reporter)??;
    localization.stop()?;
    let estimate = blackboard.pose_estimate();
    info!(
        truth = %drivetrain.true_pose(),
        estimate = %estimate.pose,
        best = %estimate.best,
        error = estimate.pose.distance_to(&drivetrain.true_pose()),
        "localization finished"
    );

    if physics.join().is_err() {
        warn!("drivetrain thread panicked");
    }
    route
}

/// A short route exercising each way a motion can start and end.
fn run_route(scheduler: &MotionScheduler) -> anyhow::Result<()> {
    let report = scheduler
        .move_distance(MotionRequest::new(24.0, Duration::from_millis(3000)).speeds(10.0, 100.0))?
        .wait()?;
    info!(?report, "blocking move finished");

    let motion = scheduler.move_distance(MotionRequest::new(-12.0, Duration::from_millis(2000)).non_blocking())?;
    match scheduler.move_distance(MotionRequest::new(6.0, Duration::from_millis(1000))) {
        Err(MotionError::Busy { active }) => info!(%active, "second motion denied while one is running"),
        other => warn!(?other, "second motion was not denied"),
    }
    scheduler.wait_until(6.0);
    info!(traveled = ?scheduler.distance_traveled(), "halfway back");
    scheduler.wait_until_done();
    info!(report = ?motion.wait()?, "non-blocking move finished");

    let motion = scheduler.move_distance(MotionRequest::new(36.0, Duration::from_millis(5000)).non_blocking())?;
    thread::sleep(Duration::from_millis(300));
    scheduler.cancel();
    info!(report = ?motion.wait()?, "cancelled move finished");

    let report = scheduler
        .move_distance(MotionRequest::new(18.0, Duration::from_millis(3000)).reversed().early_exit(2.0))?
        .wait()?;
    info!(?report, "chained move finished");
    Ok(())
}

async fn async_runtime(
    blackboard: Arc<Blackboard>,
    pose_rx: broadcast::Receiver<Arc<PoseEstimate>>,
    period: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Async runtime started.");
    tokio::try_join!(
        pose_reporter(pose_rx, shutdown.clone()),
        watchdog(blackboard, period, shutdown),
    )?;
    info!("Async runtime finished.");
    Ok(())
}

async fn pose_reporter(
    mut pose_rx: broadcast::Receiver<Arc<PoseEstimate>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Pose reporter started.");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = pose_rx.recv() => match received {
                Ok(estimate) if estimate.cycle % REPORT_EVERY == 0 => {
                    info!(cycle = estimate.cycle, pose = %estimate.pose, observations = estimate.observations, "pose estimate");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "pose reporter lagging"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// Warn when the pose estimate goes stale while localization should be running.
async fn watchdog(blackboard: Arc<Blackboard>, period: Duration, shutdown: CancellationToken) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let mut tick = tokio::time::interval(period * 5);
    let mut warned = false;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                let age = Instant::now() - blackboard.pose_estimate().published_at;
                if age > period * 5 && !warned {
                    warn!(?age, "pose estimate is stale");
                    warned = true;
                } else if age <= period * 5 {
                    warned = false;
                }
            }
        }
    }
    Ok(())
}
