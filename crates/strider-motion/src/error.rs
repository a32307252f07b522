use thiserror::Error;

use crate::scheduler::MotionId;

#[derive(Debug, Error)]
pub enum MotionError {
    /// The exclusivity slot is held. The running motion is not affected.
    #[error("motion {active} is already running")]
    Busy { active: MotionId },

    #[error("invalid motion request: {0}")]
    InvalidRequest(&'static str),

    #[error("invalid controller settings: {0}")]
    InvalidSettings(&'static str),

    #[error("failed to spawn motion task")]
    Spawn(#[source] std::io::Error),

    #[error("motion task {0} panicked")]
    TaskPanicked(MotionId),
}
