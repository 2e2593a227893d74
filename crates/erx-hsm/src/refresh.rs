use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use erx_scheduler::{HandlerError, TimerHandler};
use tracing::{trace, warn};

use crate::cache::BlobCache;

/// Timer handler that periodically reloads a [`BlobCache`].
///
/// Holds the cache weakly; once the cache is gone the timer ends.
pub struct BlobCacheRefresher {
    cache: Weak<BlobCache>,
    interval: Duration,
}

impl BlobCacheRefresher {
    pub fn new(cache: Weak<BlobCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }
}

#[async_trait]
impl TimerHandler for BlobCacheRefresher {
    fn name(&self) -> &str {
        "blob-cache-refresh"
    }

    async fn on_tick(&mut self) -> Result<(), HandlerError> {
        let Some(cache) = self.cache.upgrade() else {
            return Ok(());
        };

        trace!("scheduled blob cache refresh");
        // A failed refresh keeps the previous snapshot; the next tick retries.
        if let Err(e) = cache.rebuild().await {
            warn!(error = %e, "scheduled blob cache refresh failed");
        }
        Ok(())
    }

    fn next_interval(&self) -> Option<Duration> {
        (self.cache.strong_count() > 0).then_some(self.interval)
    }
}
