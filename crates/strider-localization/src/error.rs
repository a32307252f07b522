use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("invalid filter settings: {0}")]
    InvalidSettings(&'static str),

    /// A particle set must hold at least one particle.
    #[error("particle set is empty")]
    EmptyParticleSet,

    #[error("localization engine is already running")]
    AlreadyRunning,

    /// `start` or `step` was called before a starting pose was supplied.
    #[error("localization engine has not been initialized with a starting pose")]
    NotInitialized,

    #[error("failed to spawn localization task")]
    Spawn(#[source] std::io::Error),

    #[error("localization task panicked")]
    TaskPanicked,
}
