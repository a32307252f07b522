use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::MotionError;

/// Gains for one [`Pid`](crate::Pid) compensator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Integral is cleared while `|error|` exceeds this. Zero disables.
    #[cfg_attr(feature = "serde", serde(default))]
    pub windup_range: f64,
    /// Clear the integral whenever the error changes sign.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sign_flip_reset: bool,
}

/// Band and dwell for one hysteresis exit detector.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSettings {
    pub range: f64,
    pub dwell_ms: u64,
}

impl ExitSettings {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

/// Tuning for the closed-loop distance controller.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub period_ms: u64,
    /// Linear (distance) compensator, output per unit of remaining distance.
    pub lateral: PidGains,
    /// Heading compensator, output per degree of heading drift.
    pub heading: PidGains,
    /// Bound on the heading correction term.
    pub heading_limit: f64,
    /// Maximum change of the linear output per period. Zero disables.
    pub slew: f64,
    /// Tight-tolerance, short-dwell exit detector.
    pub small_exit: ExitSettings,
    /// Loose-tolerance, long-dwell exit detector.
    pub large_exit: ExitSettings,
    pub near_target_threshold: f64,
    /// Lowest speed ceiling applied when entering the near-target phase.
    pub near_target_floor: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            period_ms: 10,
            lateral: PidGains {
                kp: 10.0,
                ki: 0.0,
                kd: 3.0,
                windup_range: 3.0,
                sign_flip_reset: true,
            },
            heading: PidGains {
                kp: 2.0,
                ki: 0.0,
                kd: 12.0,
                windup_range: 0.0,
                sign_flip_reset: false,
            },
            heading_limit: 20.0,
            slew: 20.0,
            small_exit: ExitSettings {
                range: 0.5,
                dwell_ms: 100,
            },
            large_exit: ExitSettings {
                range: 1.0,
                dwell_ms: 500,
            },
            near_target_threshold: 7.5,
            near_target_floor: 60.0,
        }
    }
}

impl ControllerSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), MotionError> {
        if self.period_ms == 0 {
            return Err(MotionError::InvalidSettings("control period must be positive"));
        }
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !(non_negative(self.small_exit.range) && non_negative(self.large_exit.range)) {
            return Err(MotionError::InvalidSettings("exit ranges must be finite and non-negative"));
        }
        if !non_negative(self.near_target_threshold) {
            return Err(MotionError::InvalidSettings("near-target threshold must be finite and non-negative"));
        }
        // the floor is the speed ceiling of a move that starts near its target
        if !(self.near_target_floor.is_finite() && self.near_target_floor > 0.0) {
            return Err(MotionError::InvalidSettings("near-target floor must be finite and positive"));
        }
        if !(non_negative(self.heading_limit) && non_negative(self.slew)) {
            return Err(MotionError::InvalidSettings("heading limit and slew must be finite and non-negative"));
        }
        let gains_finite = |g: &PidGains| [g.kp, g.ki, g.kd, g.windup_range].iter().all(|v| v.is_finite());
        if !(gains_finite(&self.lateral) && gains_finite(&self.heading)) {
            return Err(MotionError::InvalidSettings("compensator gains must be finite"));
        }
        Ok(())
    }
}
