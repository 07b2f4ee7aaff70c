use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub reasoning: ReasoningConfig,
    /// Present only when every credential is set.
    pub marketplace: Option<MarketplaceConfig>,
    pub watch: WatchConfig,
    pub storage: StorageConfig,
    pub automation: AutomationConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ReasoningConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub triage_model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("triage_model", &self.triage_model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    pub app_id: String,
    pub cert_id: String,
    pub dev_id: String,
    pub auth_token: String,
    pub sandbox: bool,
    pub postal_code: String,
    pub paypal_email: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("app_id", &self.app_id)
            .field("dev_id", &self.dev_id)
            .field("sandbox", &self.sandbox)
            .field("postal_code", &self.postal_code)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub folder: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub debounce: Duration,
    pub stability: Duration,
}

/// Root of every file the pipeline writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn listings_file(&self) -> PathBuf {
        self.data_dir.join("listings.json")
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.data_dir.join("drafts")
    }

    pub fn active_listings_dir(&self) -> PathBuf {
        self.data_dir.join("active-listings")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("processed-photos")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn shipping_file(&self) -> PathBuf {
        self.data_dir.join("TO-SHIP.json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationConfig {
    pub auto_post: bool,
    pub notify_on_sale: bool,
    pub sale_poll_interval: Duration,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
