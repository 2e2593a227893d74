use std::time::Duration;

use erx_core::PlatformState;
use serde::{Deserialize, Serialize};

/// Blob cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobCacheConfig {
    /// Seconds between scheduled rebuilds. `0` disables the refresh task.
    pub refresh_interval_secs: u64,

    /// Initial platform state, hex encoded. Empty when not configured.
    pub platform_state: PlatformState,
}

impl Default for BlobCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            platform_state: PlatformState::default(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl BlobCacheConfig {
    /// Set the refresh interval; `Duration::ZERO` disables the refresh task.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = interval.as_secs();
        self
    }

    #[must_use]
    pub fn with_platform_state(mut self, state: PlatformState) -> Self {
        self.platform_state = state;
        self
    }

    /// The refresh interval, or `None` when scheduled refresh is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}
