//! Motion exclusivity scheduler.
//!
//! The exclusivity slot is a mutex-guarded check-and-set. Acquiring it yields
//! a [`MotionSlot`] token; dropping the token releases the slot. A request
//! made while the slot is held is rejected with [`MotionError::Busy`] and is
//! not queued. Non-blocking requests move their token into the spawned motion
//! thread, and the caller is released only after that thread has signalled
//! that it is running, so the slot is never observably free in between.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use strider_kinematics::DifferentialDrive;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{DistanceController, MotionReport};
use crate::drivetrain::Drivetrain;
use crate::error::MotionError;
use crate::request::{ExecutionMode, MotionRequest};
use crate::settings::ControllerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionId(u64);

impl fmt::Display for MotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct ActiveMotion {
    id: MotionId,
    cancel: CancellationToken,
    /// Signed distance traveled and direction, once the controller is running.
    progress: Option<(f64, f64)>,
}

struct Inner {
    drivetrain: Arc<dyn Drivetrain>,
    geometry: DifferentialDrive,
    settings: ControllerSettings,
    slot: Mutex<Option<ActiveMotion>>,
    changed: Condvar,
    next_id: AtomicU64,
}

impl Inner {
    fn release(&self, id: MotionId) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
            debug!(motion = %id, "exclusivity slot released");
        }
        drop(slot);
        self.changed.notify_all();
    }

    fn record_progress(&self, id: MotionId, traveled: f64, direction: f64) {
        let mut slot = self.slot.lock();
        if let Some(active) = slot.as_mut().filter(|active| active.id == id) {
            active.progress = Some((traveled, direction));
        }
        drop(slot);
        self.changed.notify_all();
    }

    fn execute(&self, slot: MotionSlot, request: MotionRequest) -> MotionReport {
        let id = slot.id;
        let target = request.target();
        let direction = if target < 0.0 { -1.0 } else { 1.0 };
        info!(
            motion = %id,
            target,
            timeout = ?request.timeout,
            min_speed = request.min_speed,
            max_speed = request.max_speed,
            "distance motion started"
        );
        self.record_progress(id, 0.0, direction);

        let controller = DistanceController::new(&request, &self.settings, self.geometry);
        let report = controller.run(self.drivetrain.as_ref(), request.timeout, &slot.cancel, |traveled| {
            self.record_progress(id, traveled, direction)
        });
        info!(
            motion = %id,
            outcome = ?report.outcome,
            traveled = report.traveled,
            remaining = report.remaining,
            periods = report.periods,
            "distance motion finished"
        );
        drop(slot);
        report
    }
}

/// Token proving ownership of the exclusivity slot.
///
/// Dropping it (or calling [`release`](Self::release)) ends the motion's
/// claim on the slot.
pub struct MotionSlot {
    inner: Arc<Inner>,
    id: MotionId,
    cancel: CancellationToken,
}

impl MotionSlot {
    pub fn id(&self) -> MotionId {
        self.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn release(self) {}
}

impl Drop for MotionSlot {
    fn drop(&mut self) {
        self.inner.release(self.id);
    }
}

impl fmt::Debug for MotionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionSlot").field("id", &self.id).finish()
    }
}

/// Handle to a motion running on its own thread.
#[derive(Debug)]
pub struct MotionHandle {
    id: MotionId,
    cancel: CancellationToken,
    join: JoinHandle<MotionReport>,
}

impl MotionHandle {
    pub fn id(&self) -> MotionId {
        self.id
    }

    /// Request cooperative cancellation of this motion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the motion to reach a terminal state.
    pub fn join(self) -> Result<MotionReport, MotionError> {
        self.join.join().map_err(|_| MotionError::TaskPanicked(self.id))
    }
}

/// What [`MotionScheduler::move_distance`] hands back.
#[derive(Debug)]
pub enum Motion {
    /// A blocking request ran to completion.
    Finished(MotionReport),
    /// A non-blocking request is running on its own thread.
    Running(MotionHandle),
}

impl Motion {
    /// Block until the motion completes, whichever way it was started.
    pub fn wait(self) -> Result<MotionReport, MotionError> {
        match self {
            Motion::Finished(report) => Ok(report),
            Motion::Running(handle) => handle.join(),
        }
    }
}

/// Arbitrates access to the distance controller.
#[derive(Clone)]
pub struct MotionScheduler {
    inner: Arc<Inner>,
}

impl MotionScheduler {
    pub fn new(drivetrain: Arc<dyn Drivetrain>, settings: ControllerSettings) -> Result<Self, MotionError> {
        settings.validate()?;
        let geometry = drivetrain.geometry();
        Ok(Self {
            inner: Arc::new(Inner {
                drivetrain,
                geometry,
                settings,
                slot: Mutex::new(None),
                changed: Condvar::new(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Try to take the exclusivity slot.
    pub fn request_start(&self) -> Result<MotionSlot, MotionError> {
        let mut slot = self.inner.slot.lock();
        if let Some(active) = slot.as_ref() {
            warn!(active = %active.id, "motion request denied, slot is held");
            return Err(MotionError::Busy { active: active.id });
        }
        let id = MotionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        *slot = Some(ActiveMotion {
            id,
            cancel: cancel.clone(),
            progress: None,
        });
        debug!(motion = %id, "exclusivity slot acquired");
        Ok(MotionSlot {
            inner: Arc::clone(&self.inner),
            id,
            cancel,
        })
    }

    /// Drive `request.distance` in a straight line.
    ///
    /// Blocking requests return when the motion has finished. Non-blocking
    /// requests return as soon as the motion thread is running; completion is
    /// observable through [`is_motion_running`](Self::is_motion_running) or
    /// the returned handle.
    pub fn move_distance(&self, request: MotionRequest) -> Result<Motion, MotionError> {
        let request = request.normalized()?;
        let slot = self.request_start()?;
        match request.mode {
            ExecutionMode::Blocking => Ok(Motion::Finished(self.inner.execute(slot, request))),
            ExecutionMode::NonBlocking => self.dispatch(slot, request).map(Motion::Running),
        }
    }

    fn dispatch(&self, slot: MotionSlot, request: MotionRequest) -> Result<MotionHandle, MotionError> {
        let id = slot.id;
        let cancel = slot.cancel_token();
        let inner = Arc::clone(&self.inner);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);

        let join = thread::Builder::new()
            .name(format!("motion-{}", id.0))
            .spawn(move || {
                let _ = started_tx.send(());
                inner.execute(slot, request)
            })
            .map_err(MotionError::Spawn)?;

        if started_rx.recv().is_err() {
            warn!(motion = %id, "motion thread exited before signalling start");
        }
        Ok(MotionHandle { id, cancel, join })
    }

    /// Cancel the active motion, if any. Returns whether one was running.
    ///
    /// The controller observes the request within one control period and
    /// commands zero output before giving up the slot.
    pub fn cancel(&self) -> bool {
        match self.inner.slot.lock().as_ref() {
            Some(active) => {
                info!(motion = %active.id, "cancelling motion");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_motion_running(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// Signed distance traveled by the active motion; `None` when idle.
    pub fn distance_traveled(&self) -> Option<f64> {
        self.inner
            .slot
            .lock()
            .as_ref()
            .and_then(|active| active.progress)
            .map(|(traveled, _)| traveled)
    }

    /// Block until the active motion has traveled `distance` in its own
    /// direction, or until it finishes. Returns immediately when idle.
    pub fn wait_until(&self, distance: f64) {
        let mut slot = self.inner.slot.lock();
        let Some(id) = slot.as_ref().map(|active| active.id) else {
            return;
        };
        loop {
            match slot.as_ref() {
                Some(active) if active.id == id => {
                    if let Some((traveled, direction)) = active.progress
                        && traveled * direction >= distance.abs()
                    {
                        return;
                    }
                }
                _ => return,
            }
            self.inner.changed.wait(&mut slot);
        }
    }

    /// Block until no motion holds the slot.
    pub fn wait_until_done(&self) {
        let mut slot = self.inner.slot.lock();
        while slot.is_some() {
            self.inner.changed.wait(&mut slot);
        }
    }
}

impl fmt::Debug for MotionScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionScheduler")
            .field("geometry", &self.inner.geometry)
            .field("running", &self.is_motion_running())
            .finish()
    }
}
