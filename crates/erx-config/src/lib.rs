//! # erx-config
//!
//! Configuration for the blob cache stack.
//!
//! Settings are read from a TOML file (`erx.toml` by default) and overridden
//! by `ERX__SECTION__KEY` environment variables:
//!
//! ```toml
//! [storage]
//! backend = "postgres"
//!
//! [storage.postgres]
//! url = "postgres://erx:secret@db/erx"
//! host_ip = "10.0.0.7"
//!
//! [blob_cache]
//! refresh_interval_secs = 60
//! platform_state = "0a0b0c"
//!
//! [logging]
//! level = "info"
//! ```

pub mod bootstrap;
pub mod error;
pub mod loader;
pub mod observability;
pub mod settings;

pub use bootstrap::{build_blob_store, start_blob_cache};
pub use error::ConfigError;
pub use loader::load_config;
pub use settings::{AppConfig, LoggingConfig, StorageBackend, StorageSettings};
