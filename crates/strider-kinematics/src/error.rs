#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! These are returned when a drivetrain geometry or an integration step is
//! physically meaningless.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Returned when a wheel radius is not a positive, finite number.
    InvalidWheelRadius(&'static str),
    /// Returned when a track width is not a positive, finite number.
    InvalidTrackWidth(&'static str),
    /// Returned when a pose is integrated over a negative time delta.
    NegativeTimeDelta(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidWheelRadius(msg) => write!(f, "Invalid wheel radius: {}", msg),
            KinematicsError::InvalidTrackWidth(msg) => write!(f, "Invalid track width: {}", msg),
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
