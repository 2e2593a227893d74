use std::time::Duration;

use async_trait::async_trait;

/// Error type returned by timer handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A job driven by a [`crate::PeriodicTimer`].
///
/// The handler is owned by the timer for its whole lifetime and is never
/// invoked concurrently with itself.
#[async_trait]
pub trait TimerHandler: Send + 'static {
    /// Identity used in log output and errors.
    fn name(&self) -> &str;

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// An error is logged and stops the timer. It is surfaced by the call
    /// that drives the timer.
    async fn on_tick(&mut self) -> Result<(), HandlerError>;

    /// Interval to the next tick, consulted after every tick.
    ///
    /// `None` ends the timer, which makes one-shot handlers trivial.
    fn next_interval(&self) -> Option<Duration>;
}
