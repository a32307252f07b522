//! Shared state for the strider control core.
//!
//! The drivetrain collaborator publishes a [`TelemetrySnapshot`] every control
//! period and the localization engine publishes a [`PoseEstimate`] every
//! cycle. Both live on the [`Blackboard`], where each write swaps in a new
//! immutable snapshot and readers never block.

pub mod blackboard;
pub mod bus;
pub mod state;

pub use blackboard::{Blackboard, Published, TelemetrySource};
pub use bus::Topic;
pub use state::{PoseEstimate, TelemetrySnapshot};
