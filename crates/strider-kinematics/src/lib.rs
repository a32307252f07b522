#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for planar differential-drive geometry."]
#![doc = ""]
#![doc = "This crate provides the pose type shared by the motion controller and the"]
#![doc = "localization filter, canonical heading wrapping, forward and inverse"]
#![doc = "kinematics, and exact constant-curvature pose integration."]

use core::f64::consts::{PI, TAU};
use core::fmt;
use libm::{cos, fabs, hypot, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// Yaw rates below this magnitude (rad/s) are integrated as straight-line motion.
pub const STRAIGHT_LINE_YAW_RATE: f64 = 1e-6;

/// Wrap an angle into the canonical half-open range `[-PI, PI)`.
///
/// Angles at `PI` map to `-PI`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    let wrapped = if a >= PI {
        a - TAU
    } else if a < -PI {
        a + TAU
    } else {
        a
    };
    // rounding in `a + TAU` can land exactly on PI
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Signed shortest rotation from `from` to `to`, wrapped into `[-PI, PI)`.
pub fn angle_difference(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}

/// A 2‑D pose `(x, y, θ)`.
///
/// Linear units are whatever the drivetrain geometry is expressed in (the
/// default configuration uses inches). θ is in radians, counter‑clockwise from
/// the world x‑axis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position.
    pub x: f64,
    /// World‑frame y position.
    pub y: f64,
    /// Heading (rad), normalized to `[-PI, PI)`.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose. The heading is wrapped into `[-PI, PI)`.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        hypot(other.x - self.x, other.y - self.y)
    }

    /// Transform a point expressed in this pose's body frame into the world frame.
    ///
    /// # Arguments
    ///
    /// * `local_x`: Distance ahead of the robot.
    /// * `local_y`: Distance to the robot's left.
    pub fn to_world(&self, local_x: f64, local_y: f64) -> (f64, f64) {
        let (s, c) = (sin(self.theta), cos(self.theta));
        (
            self.x + c * local_x - s * local_y,
            self.y + s * local_x + c * local_y,
        )
    }

    /// Advance this pose by constant chassis speeds held for `dt` seconds.
    ///
    /// Motion follows a circular arc when the yaw rate is non-zero and a
    /// straight line otherwise. The resulting heading is wrapped.
    pub fn integrate(&self, speeds: ChassisSpeeds, dt: f64) -> Pose {
        let ChassisSpeeds { v, omega } = speeds;
        if fabs(omega) < STRAIGHT_LINE_YAW_RATE {
            return Pose::new(
                self.x + v * dt * cos(self.theta),
                self.y + v * dt * sin(self.theta),
                self.theta,
            );
        }
        let theta_end = self.theta + omega * dt;
        let radius = v / omega;
        Pose::new(
            self.x + radius * (sin(theta_end) - sin(self.theta)),
            self.y + radius * (cos(self.theta) - cos(theta_end)),
            theta_end,
        )
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.3} rad)", self.x, self.y, self.theta)
    }
}

/// Left and right wheel angular velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    /// Left wheel angular velocity (rad/s).
    pub omega_l: f64,
    /// Right wheel angular velocity (rad/s).
    pub omega_r: f64,
}

impl WheelSpeeds {
    /// Construct wheel speeds.
    pub const fn new(omega_l: f64, omega_r: f64) -> Self {
        WheelSpeeds { omega_l, omega_r }
    }
}

/// Linear and angular chassis velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward speed of the chassis center (units/s).
    pub v: f64,
    /// Yaw rate of the chassis (rad/s, counter‑clockwise positive).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} /s, ω: {:.3} rad/s)", self.v, self.omega)
    }
}

/// Differential‑drive geometry.
///
/// Encapsulates wheel radius and track width and converts between wheel
/// rotation, per-side travel, and chassis motion.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    wheel_radius: f64,
    track_width: f64,
}

impl DifferentialDrive {
    /// Construct a differential-drive geometry.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive and finite.
    /// Returns `Err(KinematicsError::InvalidTrackWidth)` if `track_width` is not positive and finite.
    pub fn new(wheel_radius: f64, track_width: f64) -> Result<Self, KinematicsError> {
        if !(wheel_radius > 0.0 && wheel_radius.is_finite()) {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if !(track_width > 0.0 && track_width.is_finite()) {
            return Err(KinematicsError::InvalidTrackWidth("must be positive"));
        }
        Ok(DifferentialDrive {
            wheel_radius,
            track_width,
        })
    }

    /// Returns the wheel radius.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the track width.
    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Linear distance covered by a wheel that turned `rotation` radians.
    pub fn travel(&self, rotation: f64) -> f64 {
        rotation * self.wheel_radius
    }

    /// Signed average travel of both sides, given cumulative wheel rotations.
    pub fn average_travel(&self, left_rotation: f64, right_rotation: f64) -> f64 {
        self.travel((left_rotation + right_rotation) / 2.0)
    }

    /// Chassis speeds produced by the given wheel speeds (forward kinematics).
    pub fn forward_kinematics(&self, wheel_speeds: WheelSpeeds) -> ChassisSpeeds {
        let v_l = wheel_speeds.omega_l * self.wheel_radius;
        let v_r = wheel_speeds.omega_r * self.wheel_radius;
        ChassisSpeeds::new((v_r + v_l) / 2.0, (v_r - v_l) / self.track_width)
    }

    /// Wheel speeds required for the given chassis speeds (inverse kinematics).
    pub fn inverse_kinematics(&self, chassis_speeds: ChassisSpeeds) -> WheelSpeeds {
        let half_track = self.track_width / 2.0;
        let v_r = chassis_speeds.v + chassis_speeds.omega * half_track;
        let v_l = chassis_speeds.v - chassis_speeds.omega * half_track;
        WheelSpeeds::new(v_l / self.wheel_radius, v_r / self.wheel_radius)
    }

    /// Integrate wheel speeds held for `dt` seconds into a new pose.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        current_pose: Pose,
        wheel_speeds: WheelSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }
        Ok(current_pose.integrate(self.forward_kinematics(wheel_speeds), dt))
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DifferentialDrive (r: {:.3}, track: {:.3})",
            self.wheel_radius, self.track_width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_pose_normalization() {
        assert!((normalize_angle(0.0) - 0.0).abs() < EPSILON);
        assert!((normalize_angle(PI) - (-PI)).abs() < EPSILON); // PI maps to -PI for [-PI, PI)
        assert!((normalize_angle(-PI) - -PI).abs() < EPSILON);
        assert!((normalize_angle(3.0 * PI) - (-PI)).abs() < EPSILON);
        assert!((normalize_angle(2.5 * PI) - 0.5 * PI).abs() < EPSILON);
        assert!((normalize_angle(-2.5 * PI) - -0.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_angle_difference_takes_short_way_round() {
        // 170° to -170° is a 20° counter-clockwise step, not 340° clockwise
        let from = 170.0_f64.to_radians();
        let to = (-170.0_f64).to_radians();
        assert!((angle_difference(to, from) - 20.0_f64.to_radians()).abs() < EPSILON);
        assert!((angle_difference(from, to) + 20.0_f64.to_radians()).abs() < EPSILON);
    }

    #[test]
    fn test_constructor_rejects_bad_geometry() {
        assert!(matches!(
            DifferentialDrive::new(0.0, 11.5),
            Err(KinematicsError::InvalidWheelRadius("must be positive"))
        ));
        assert!(matches!(
            DifferentialDrive::new(1.625, -1.0),
            Err(KinematicsError::InvalidTrackWidth("must be positive"))
        ));
        assert!(DifferentialDrive::new(f64::NAN, 11.5).is_err());
    }

    #[test]
    fn test_travel_from_rotation() {
        let drive = DifferentialDrive::new(1.625, 11.5).unwrap();
        // one full turn of a 3.25" wheel covers its circumference
        assert!((drive.travel(2.0 * PI) - PI * 3.25).abs() < EPSILON);
        assert!((drive.average_travel(2.0 * PI, 0.0) - PI * 3.25 / 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_forward_kinematics_pivot_turn() {
        let drive = DifferentialDrive::new(0.1, 0.5).unwrap();
        let chassis_speeds = drive.forward_kinematics(WheelSpeeds::new(-5.0, 5.0));
        // v_l = -0.5, v_r = 0.5 => v = 0, omega = 1 / 0.5 = 2
        assert!(chassis_speeds.v.abs() < EPSILON);
        assert!((chassis_speeds.omega - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_kinematics_gentle_turn() {
        let drive = DifferentialDrive::new(0.1, 0.5).unwrap();
        let wheel_speeds = drive.inverse_kinematics(ChassisSpeeds::new(0.75, 1.0));
        assert!((wheel_speeds.omega_l - 5.0).abs() < EPSILON);
        assert!((wheel_speeds.omega_r - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_straight_line() {
        let pose = Pose::new(1.0, 1.0, FRAC_PI_2);
        let next = pose.integrate(ChassisSpeeds::new(1.0, 0.0), 2.0);
        assert!((next.x - 1.0).abs() < EPSILON);
        assert!((next.y - 3.0).abs() < EPSILON);
        assert!((next.theta - FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_quarter_circle() {
        // radius 1 arc, quarter turn counter-clockwise from the origin facing +x
        let pose = Pose::new(0.0, 0.0, 0.0);
        let next = pose.integrate(ChassisSpeeds::new(FRAC_PI_2, FRAC_PI_2), 1.0);
        assert!((next.x - 1.0).abs() < EPSILON);
        assert!((next.y - 1.0).abs() < EPSILON);
        assert!((next.theta - FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_to_world_rotates_body_frame() {
        let pose = Pose::new(2.0, 3.0, FRAC_PI_2);
        let (x, y) = pose.to_world(1.0, 0.0);
        assert!((x - 2.0).abs() < EPSILON);
        assert!((y - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_update_pose_negative_dt() {
        let drive = DifferentialDrive::new(0.1, 0.5).unwrap();
        let result = drive.update_pose(Pose::default(), WheelSpeeds::new(1.0, 1.0), -0.1);
        assert!(matches!(result, Err(KinematicsError::NegativeTimeDelta("must be non-negative"))));
    }

    proptest! {
        #[test]
        fn normalized_angles_stay_in_half_open_range(angle in -1.0e4f64..1.0e4) {
            let wrapped = normalize_angle(angle);
            prop_assert!((-PI..PI).contains(&wrapped));
            // wrapping preserves the direction
            prop_assert!((sin(wrapped) - sin(angle)).abs() < 1e-6);
            prop_assert!((cos(wrapped) - cos(angle)).abs() < 1e-6);
        }
    }
}
