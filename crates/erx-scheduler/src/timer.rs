use std::any::type_name;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::TimerError;
use crate::handler::TimerHandler;

/// The handler together with its cancellation flag.
///
/// `cancel` sets `canceled` while `handler` is locked, and the driver checks
/// it under the same lock before every tick. `Drop` sets it without the lock.
struct HandlerCell<H> {
    canceled: AtomicBool,
    handler: Mutex<H>,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    skipped_intervals: AtomicU64,
}

/// Counters describing a timer's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Number of completed handler invocations, failed ones included.
    pub ticks: u64,
    /// Number of times a deadline had already passed when a tick finished.
    pub skipped_intervals: u64,
}

/// Runs a [`TimerHandler`] repeatedly on a fixed schedule.
///
/// Deadlines are computed from the previous deadline, not from the end of
/// the previous tick, so the schedule does not drift. If a tick overruns the
/// next deadline, that interval is skipped and the schedule restarts from
/// the current time.
///
/// Dropping the timer stops it without waiting. A tick that is running, or
/// whose driver has already checked the flag, may still run to completion
/// after `drop` returns. Use [`PeriodicTimer::cancel`] to guarantee that no
/// tick runs once it returns.
pub struct PeriodicTimer<H: TimerHandler> {
    name: String,
    cell: Arc<HandlerCell<H>>,
    shutdown_tx: watch::Sender<bool>,
    /// Handed to the driver; `None` once the timer has been started.
    shutdown_rx: Option<watch::Receiver<bool>>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<Result<(), TimerError>>>,
}

impl<H: TimerHandler> PeriodicTimer<H> {
    /// Wraps `handler`. Nothing runs until the timer is started.
    pub fn new(handler: H) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            name: handler.name().to_owned(),
            cell: Arc::new(HandlerCell {
                canceled: AtomicBool::new(false),
                handler: Mutex::new(handler),
            }),
            shutdown_tx,
            shutdown_rx: Some(shutdown_rx),
            counters: Arc::new(Counters::default()),
            task: None,
        }
    }

    /// Name of the wrapped handler.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns the driver on the ambient tokio runtime. The first tick runs
    /// after `first_interval`.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` if the timer was started before.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn start(&mut self, first_interval: Duration) -> Result<(), TimerError> {
        let driver = self.driver(first_interval)?;
        self.task = Some(tokio::spawn(driver.run()));
        Ok(())
    }

    /// Spawns the driver on the given runtime.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` if the timer was started before.
    pub fn start_on(&mut self, runtime: &Handle, first_interval: Duration) -> Result<(), TimerError> {
        let driver = self.driver(first_interval)?;
        self.task = Some(runtime.spawn(driver.run()));
        Ok(())
    }

    /// Hands out the driver loop so the caller can run it in place.
    ///
    /// Handler errors are then returned by [`TimerDriver::run`] instead of
    /// [`PeriodicTimer::cancel`].
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` if the timer was started before.
    pub fn driver(&mut self, first_interval: Duration) -> Result<TimerDriver<H>, TimerError> {
        let shutdown = self
            .shutdown_rx
            .take()
            .ok_or_else(|| TimerError::AlreadyStarted {
                handler: self.name.clone(),
            })?;
        Ok(TimerDriver {
            name: self.name.clone(),
            cell: Arc::downgrade(&self.cell),
            shutdown,
            counters: Arc::clone(&self.counters),
            first_interval,
        })
    }

    /// Whether the timer has been started.
    pub fn is_started(&self) -> bool {
        self.shutdown_rx.is_none()
    }

    /// Whether the timer will not run any further ticks.
    pub fn is_canceled(&self) -> bool {
        self.cell.canceled.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            skipped_intervals: self.counters.skipped_intervals.load(Ordering::Relaxed),
        }
    }

    /// Stops the timer.
    ///
    /// Waits for a tick that is currently running; no tick starts after this
    /// returns. Then waits for the spawned driver to exit.
    ///
    /// # Errors
    ///
    /// Returns the handler's error if the timer had already stopped because
    /// of it, or `TimerError::Join` if the driver task panicked.
    pub async fn cancel(mut self) -> Result<(), TimerError> {
        {
            let _handler = self.cell.handler.lock().await;
            self.cell.canceled.store(true, Ordering::Release);
        }
        self.shutdown_tx.send_replace(true);
        debug!(handler = %self.name, "timer canceled");
        self.wait_for_driver().await
    }

    /// Waits until the timer stops by itself, i.e. its handler returned no
    /// next interval or failed.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or `TimerError::Join` if the driver task
    /// panicked.
    pub async fn join(mut self) -> Result<(), TimerError> {
        self.wait_for_driver().await
    }

    async fn wait_for_driver(&mut self) -> Result<(), TimerError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await.map_err(|e| TimerError::Join {
            handler: self.name.clone(),
            message: e.to_string(),
        })?
    }
}

impl<H: TimerHandler> Drop for PeriodicTimer<H> {
    /// Does not take the handler lock, so one more tick may still start.
    fn drop(&mut self) {
        self.cell.canceled.store(true, Ordering::Release);
        self.shutdown_tx.send_replace(true);
    }
}

impl<H: TimerHandler> std::fmt::Debug for PeriodicTimer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTimer")
            .field("name", &self.name)
            .field("started", &self.is_started())
            .field("canceled", &self.is_canceled())
            .field("stats", &self.stats())
            .finish()
    }
}

/// The loop that drives a [`PeriodicTimer`].
///
/// Only holds a weak reference to the handler between ticks, so it never
/// keeps a dropped timer alive.
pub struct TimerDriver<H: TimerHandler> {
    name: String,
    cell: Weak<HandlerCell<H>>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
    first_interval: Duration,
}

impl<H: TimerHandler> TimerDriver<H> {
    /// Runs ticks until the timer is canceled, dropped, or the handler
    /// returns no next interval.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::HandlerFailed` when a tick fails. The failure is
    /// logged before it is returned.
    pub async fn run(mut self) -> Result<(), TimerError> {
        debug!(
            handler = %self.name,
            first_interval_ms = duration_ms(self.first_interval),
            "timer started"
        );
        let mut deadline = Instant::now() + self.first_interval;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    debug!(handler = %self.name, "timer driver stopped");
                    return Ok(());
                }
                () = tokio::time::sleep_until(deadline) => {}
            }

            let Some(interval) = self.tick().await? else {
                return Ok(());
            };

            deadline += interval;
            let now = Instant::now();
            if deadline < now {
                warn!(
                    handler = %self.name,
                    interval_ms = duration_ms(interval),
                    behind_ms = duration_ms(now - deadline),
                    "skipped interval, rescheduling from now"
                );
                self.counters
                    .skipped_intervals
                    .fetch_add(1, Ordering::Relaxed);
                deadline = now + interval;
            }
        }
    }

    /// Runs one tick and returns the interval to the next one.
    async fn tick(&self) -> Result<Option<Duration>, TimerError> {
        let Some(cell) = self.cell.upgrade() else {
            debug!(handler = %self.name, "timer dropped, driver exits");
            return Ok(None);
        };

        let mut handler = cell.handler.lock().await;
        if cell.canceled.load(Ordering::Acquire) {
            return Ok(None);
        }

        let result = handler.on_tick().await;
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        if let Err(source) = result {
            cell.canceled.store(true, Ordering::Release);
            error!(
                handler = %self.name,
                handler_type = type_name::<H>(),
                error = %source,
                "timer handler failed"
            );
            return Err(TimerError::HandlerFailed {
                handler: self.name.clone(),
                source,
            });
        }

        let next = handler.next_interval();
        if next.is_none() {
            cell.canceled.store(true, Ordering::Release);
            debug!(handler = %self.name, "timer has no next interval");
        }
        Ok(next)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
