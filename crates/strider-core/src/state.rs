use std::time::Instant;

use strider_kinematics::Pose;

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// One control period's worth of drivetrain telemetry.
///
/// A `None` (or non-finite) field means the reading was unavailable that
/// period. Consumers treat it as "no new information", never as a fault.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    /// Monotonic publication counter.
    pub sequence: u64,
    /// Cumulative left wheel rotation (rad).
    pub left_rotation: Option<f64>,
    /// Cumulative right wheel rotation (rad).
    pub right_rotation: Option<f64>,
    /// Forward velocity of the chassis center (units/s).
    pub forward_velocity: Option<f64>,
    /// Yaw rate (rad/s, counter-clockwise positive).
    pub yaw_rate: Option<f64>,
    /// Heading (rad), wrapped to `[-PI, PI)`.
    pub heading: Option<f64>,
    pub captured_at: Instant,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        TelemetrySnapshot {
            sequence: 0,
            left_rotation: Some(0.0),
            right_rotation: Some(0.0),
            forward_velocity: Some(0.0),
            yaw_rate: Some(0.0),
            heading: Some(0.0),
            captured_at: Instant::now(),
        }
    }
}

impl TelemetrySnapshot {
    /// Both cumulative wheel rotations, if both are valid this period.
    pub fn wheel_rotations(&self) -> Option<(f64, f64)> {
        Some((finite(self.left_rotation)?, finite(self.right_rotation)?))
    }

    /// Forward velocity and yaw rate, if both are valid this period.
    pub fn motion(&self) -> Option<(f64, f64)> {
        Some((finite(self.forward_velocity)?, finite(self.yaw_rate)?))
    }

    pub fn heading(&self) -> Option<f64> {
        finite(self.heading)
    }
}

/// Best-pose estimate published by the localization engine.
#[derive(Debug, Clone)]
pub struct PoseEstimate {
    /// Weighted mean of the particle set (circular mean heading).
    pub pose: Pose,
    /// Highest-weight particle of the cycle.
    pub best: Pose,
    /// Number of completed filter cycles when this estimate was produced.
    pub cycle: u64,
    /// Observations that contributed to this cycle's weight update.
    pub observations: usize,
    pub published_at: Instant,
}

impl PoseEstimate {
    /// Estimate for a freshly seeded filter.
    pub fn initial(pose: Pose) -> Self {
        PoseEstimate {
            pose,
            best: pose,
            cycle: 0,
            observations: 0,
            published_at: Instant::now(),
        }
    }
}

impl Default for PoseEstimate {
    fn default() -> Self {
        PoseEstimate::initial(Pose::default())
    }
}
