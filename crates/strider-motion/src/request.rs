use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::MotionError;

/// Whether [`MotionScheduler::move_distance`](crate::MotionScheduler::move_distance)
/// returns on completion or immediately after the motion task has started.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Blocking,
    NonBlocking,
}

/// A straight-line distance motion.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Signed distance; the sign selects direction.
    pub distance: f64,
    pub timeout: Duration,
    /// Minimum effective speed while far from the target.
    pub min_speed: f64,
    pub max_speed: f64,
    /// Finish as soon as `|remaining|` drops below this. Zero disables.
    pub early_exit_range: f64,
    /// When false the direction of `distance` is inverted.
    pub forwards: bool,
    pub mode: ExecutionMode,
}

impl MotionRequest {
    pub fn new(distance: f64, timeout: Duration) -> Self {
        Self {
            distance,
            timeout,
            min_speed: 0.0,
            max_speed: 127.0,
            early_exit_range: 0.0,
            forwards: true,
            mode: ExecutionMode::Blocking,
        }
    }

    pub fn speeds(mut self, min_speed: f64, max_speed: f64) -> Self {
        self.min_speed = min_speed;
        self.max_speed = max_speed;
        self
    }

    pub fn early_exit(mut self, range: f64) -> Self {
        self.early_exit_range = range;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.forwards = !self.forwards;
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.mode = ExecutionMode::NonBlocking;
        self
    }

    /// Effective signed target distance.
    pub fn target(&self) -> f64 {
        if self.forwards {
            self.distance
        } else {
            -self.distance
        }
    }

    /// Magnitudes are taken for the speed bounds and early-exit range, then
    /// checked for consistency.
    pub(crate) fn normalized(mut self) -> Result<Self, MotionError> {
        self.min_speed = self.min_speed.abs();
        self.max_speed = self.max_speed.abs();
        self.early_exit_range = self.early_exit_range.abs();

        if !self.distance.is_finite() {
            return Err(MotionError::InvalidRequest("distance must be finite"));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(MotionError::InvalidRequest("max speed must be positive"));
        }
        if !self.min_speed.is_finite() || self.min_speed > self.max_speed {
            return Err(MotionError::InvalidRequest("min speed must not exceed max speed"));
        }
        if !self.early_exit_range.is_finite() {
            return Err(MotionError::InvalidRequest("early exit range must be finite"));
        }
        Ok(self)
    }
}
