use crate::handler::HandlerError;

/// Errors reported by a [`crate::PeriodicTimer`].
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The timer was already started; a timer runs at most one driver.
    #[error("timer '{handler}' has already been started")]
    AlreadyStarted { handler: String },

    /// The handler failed. The timer does not retry and has stopped.
    #[error("timer handler '{handler}' failed: {source}")]
    HandlerFailed {
        handler: String,
        #[source]
        source: HandlerError,
    },

    /// The driver task panicked or was aborted.
    #[error("timer '{handler}' driver task failed: {message}")]
    Join { handler: String, message: String },
}

impl TimerError {
    /// Returns `true` if the handler itself reported the error.
    #[must_use]
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, Self::HandlerFailed { .. })
    }

    /// Name of the handler the error belongs to.
    #[must_use]
    pub fn handler(&self) -> &str {
        match self {
            Self::AlreadyStarted { handler }
            | Self::HandlerFailed { handler, .. }
            | Self::Join { handler, .. } => handler,
        }
    }
}
