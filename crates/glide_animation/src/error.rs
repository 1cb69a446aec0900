//! Animation engine error types

use thiserror::Error;

/// Errors surfaced by the playback engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimatorError {
    /// `play` was called before any property was registered
    #[error("cannot play an animator with no registered properties")]
    EmptyAnimator,

    /// Properties cannot change while a run is ticking
    #[error("cannot register properties while the animator is playing")]
    AlreadyPlaying,

    /// Cycle duration must be positive and finite
    #[error("invalid duration: {0} seconds")]
    InvalidDuration(f64),

    /// Update frequency must be positive and finite
    #[error("invalid update frequency: {0} Hz")]
    InvalidFrequency(f64),

    /// No tokio runtime was available to drive the tick loop
    #[error("no tokio runtime available to schedule the tick loop")]
    NoRuntime,
}

/// Result type for animation engine operations
pub type Result<T> = std::result::Result<T, AnimatorError>;
