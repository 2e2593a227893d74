//! # erx-scheduler
//!
//! Periodic timers for long-lived background jobs.
//!
//! A [`PeriodicTimer`] owns one [`TimerHandler`] and invokes it repeatedly
//! until the handler reports that it has no next interval or the timer is
//! canceled. Ticks never overlap, deadlines do not drift, and canceling waits
//! for a tick that is already running.
//!
//! ```ignore
//! use erx_scheduler::{HandlerError, PeriodicTimer, TimerHandler};
//!
//! struct Refresh;
//!
//! #[async_trait::async_trait]
//! impl TimerHandler for Refresh {
//!     fn name(&self) -> &str { "refresh" }
//!     async fn on_tick(&mut self) -> Result<(), HandlerError> { Ok(()) }
//!     fn next_interval(&self) -> Option<Duration> { Some(Duration::from_secs(60)) }
//! }
//!
//! let mut timer = PeriodicTimer::new(Refresh);
//! timer.start(Duration::from_secs(60))?;
//! // ...
//! timer.cancel().await?;
//! ```

mod error;
mod handler;
mod timer;

pub use error::TimerError;
pub use handler::{HandlerError, TimerHandler};
pub use timer::{PeriodicTimer, TimerDriver, TimerStats};
