//! Closed-loop straight-line motion for a differential drivetrain.
//!
//! [`MotionScheduler`] owns the exclusivity slot: at most one
//! [`DistanceController`] drives the motors at any instant. Requests run
//! inline (blocking) or on a dedicated thread (non-blocking), and a running
//! motion can be cancelled cooperatively. Cancellation is polled once per
//! control period, so the control period is the cancellation-latency bound.

pub mod controller;
pub mod drivetrain;
pub mod error;
pub mod exit;
pub mod pid;
pub mod request;
pub mod scheduler;
pub mod settings;

pub use controller::{ControllerPhase, DistanceController, DriveCommand, MotionOutcome, MotionReport, Step};
pub use drivetrain::Drivetrain;
pub use error::MotionError;
pub use exit::ExitCondition;
pub use pid::{Pid, slew};
pub use request::{ExecutionMode, MotionRequest};
pub use scheduler::{Motion, MotionHandle, MotionId, MotionScheduler, MotionSlot};
pub use settings::{ControllerSettings, ExitSettings, PidGains};
