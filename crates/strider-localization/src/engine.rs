//! Fixed-rate localization task.
//!
//! The engine owns the particle filter and runs it on a dedicated thread,
//! reading drivetrain telemetry from the [`Blackboard`] and publishing the
//! resulting [`PoseEstimate`] back to it every cycle. Start and stop are
//! explicit; stopping cancels the task and joins it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use spin_sleep::SpinSleeper;
use strider_core::{Blackboard, PoseEstimate, TelemetrySource, Topic};
use strider_kinematics::{ChassisSpeeds, Pose};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::LocalizationError;
use crate::filter::{FilterSettings, ParticleFilter};
use crate::map::LandmarkMap;
use crate::observation::ObservationSource;
use crate::particle::{Particle, PoseStd};

/// Native sleep accuracy handed to the cycle sleeper (ns).
const SLEEP_ACCURACY_NS: u32 = 10_000;

struct Shared {
    map: Arc<LandmarkMap>,
    blackboard: Arc<Blackboard>,
    sensor: Arc<dyn ObservationSource>,
    topic: Mutex<Option<Topic<PoseEstimate>>>,
    filter: Mutex<Option<ParticleFilter>>,
}

impl Shared {
    fn cycle(&self) -> Result<PoseEstimate, LocalizationError> {
        let motion = self
            .blackboard
            .telemetry()
            .motion()
            .map(|(v, omega)| ChassisSpeeds::new(v, omega));
        let observations = self.sensor.observations();

        let estimate = {
            let mut filter = self.filter.lock();
            let filter = filter.as_mut().ok_or(LocalizationError::NotInitialized)?;
            filter.step(motion, &observations, &self.map)
        };

        self.blackboard.pose.publish(estimate.clone());
        if let Some(topic) = self.topic.lock().as_ref() {
            topic.publish(estimate.clone());
        }
        Ok(estimate)
    }
}

struct Task {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct LocalizationEngine {
    settings: FilterSettings,
    shared: Arc<Shared>,
    task: Option<Task>,
}

impl LocalizationEngine {
    pub fn new(
        settings: FilterSettings,
        map: Arc<LandmarkMap>,
        blackboard: Arc<Blackboard>,
        sensor: Arc<dyn ObservationSource>,
    ) -> Result<Self, LocalizationError> {
        settings.validate()?;
        Ok(Self {
            settings,
            shared: Arc::new(Shared {
                map,
                blackboard,
                sensor,
                topic: Mutex::new(None),
                filter: Mutex::new(None),
            }),
            task: None,
        })
    }

    /// Also broadcast every estimate on `topic`, replacing any previous one.
    /// Takes effect from the next cycle, even while the task is running.
    pub fn with_topic(self, topic: Topic<PoseEstimate>) -> Self {
        info!(subscribers = topic.subscribers(), "broadcasting pose estimates");
        *self.shared.topic.lock() = Some(topic);
        self
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Seed a fresh particle set around `start` with per-axis spread `std`,
    /// replacing any previous one.
    pub fn initialize(&self, start: Pose, std: PoseStd) -> Result<(), LocalizationError> {
        let filter = ParticleFilter::with_initial_std(self.settings.clone(), start, std)?;
        *self.shared.filter.lock() = Some(filter);
        self.shared.blackboard.pose.publish(PoseEstimate::initial(start));
        info!(%start, ?std, particles = self.settings.particles, "localization initialized");
        Ok(())
    }

    /// Spawn the periodic task.
    pub fn start(&mut self) -> Result<(), LocalizationError> {
        if self.is_running() {
            return Err(LocalizationError::AlreadyRunning);
        }
        if self.shared.filter.lock().is_none() {
            return Err(LocalizationError::NotInitialized);
        }
        // reap a task that ended on its own
        if let Some(task) = self.task.take()
            && task.join.join().is_err()
        {
            warn!("previous localization task panicked, restarting");
        }

        let cancel = CancellationToken::new();
        let period = self.settings.period();
        let join = thread::Builder::new()
            .name("localization".into())
            .spawn({
                let shared = Arc::clone(&self.shared);
                let cancel = cancel.clone();
                move || {
                    info!(?period, "localization task started");
                    let sleeper = SpinSleeper::new(SLEEP_ACCURACY_NS);
                    while !cancel.is_cancelled() {
                        if let Err(e) = shared.cycle() {
                            error!(error = %e, "localization cycle failed, stopping");
                            break;
                        }
                        sleeper.sleep(period);
                    }
                    info!("localization task stopped");
                }
            })
            .map_err(LocalizationError::Spawn)?;

        self.task = Some(Task { cancel, join });
        Ok(())
    }

    /// Cancel the periodic task and wait for it to exit. Stopping an engine
    /// that is not running is a no-op.
    pub fn stop(&mut self) -> Result<(), LocalizationError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.cancel.cancel();
        task.join.join().map_err(|_| LocalizationError::TaskPanicked)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.join.is_finished())
    }

    /// Run one cycle on the calling thread.
    pub fn step(&self) -> Result<PoseEstimate, LocalizationError> {
        self.shared.cycle()
    }

    /// Latest published estimate.
    pub fn pose_estimate(&self) -> Arc<PoseEstimate> {
        self.shared.blackboard.pose_estimate()
    }

    /// Copy of the current particle set, if initialized.
    pub fn particles(&self) -> Option<Vec<Particle>> {
        self.shared
            .filter
            .lock()
            .as_ref()
            .map(|filter| filter.particles().as_slice().to_vec())
    }
}

impl Drop for LocalizationEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "localization task ended abnormally");
        }
    }
}

impl std::fmt::Debug for LocalizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationEngine")
            .field("settings", &self.settings)
            .field("landmarks", &self.shared.map.len())
            .field("running", &self.is_running())
            .finish()
    }
}
