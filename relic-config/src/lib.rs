//! Configuration loading for Relic.
//!
//! Values come from an optional `relic.toml`, a `.env` file and the process
//! environment, in increasing order of precedence. Loading also runs guard
//! rails that reject unusable settings and collect warnings for degraded
//! ones (no reasoning API key, incomplete marketplace credentials).
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AutomationConfig, Config, ConfigMetadata, MarketplaceConfig, ReasoningConfig, ServerConfig, StorageConfig,
    WatchConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
