use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::state::{PoseEstimate, TelemetrySnapshot};

/// A single-writer, multi-reader cell holding the latest immutable snapshot.
///
/// Writers swap in a whole new value; readers get an `Arc` to whichever
/// snapshot was current when they loaded, so a read is never torn.
#[derive(Debug)]
pub struct Published<T> {
    cell: ArcSwap<T>,
}

impl<T> Published<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: ArcSwap::from_pointee(value),
        }
    }

    pub fn publish(&self, value: T) {
        self.cell.store(Arc::new(value));
    }

    pub fn latest(&self) -> Arc<T> {
        self.cell.load_full()
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Shared state read by the motion controller and the localization engine.
#[derive(Debug, Default)]
pub struct Blackboard {
    pub telemetry: Published<TelemetrySnapshot>,
    pub pose: Published<PoseEstimate>,
}

impl Blackboard {
    pub fn shared() -> Arc<Self> {
        Arc::default()
    }

    /// Latest published pose estimate.
    pub fn pose_estimate(&self) -> Arc<PoseEstimate> {
        self.pose.latest()
    }
}

/// Anything that can hand out the latest drivetrain telemetry without blocking.
pub trait TelemetrySource: Send + Sync {
    fn telemetry(&self) -> Arc<TelemetrySnapshot>;
}

impl TelemetrySource for Blackboard {
    fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        self.telemetry.latest()
    }
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Arc<T> {
    fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        (**self).telemetry()
    }
}
