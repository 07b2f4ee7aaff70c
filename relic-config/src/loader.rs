use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::models::{
    AutomationConfig, Config, ConfigMetadata, MarketplaceConfig, ReasoningConfig, ServerConfig, StorageConfig,
    WatchConfig,
};
use crate::sources::{EnvConfig, FileConfig, FileMarketplaceConfig};
use crate::validation::{self, ConfigGuardRailError, ConfigWarnings};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TRIAGE_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];

const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_MARKETPLACE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WATCH_WINDOW: Duration = Duration::from_secs(2);
const DEFAULT_SALE_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> =
    Lazy::new(|| vec![PathBuf::from("relic.toml"), PathBuf::from("config/relic.toml")]);

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env` into the process environment, then resolve configuration
    /// from the file and environment. Environment values win.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        self.resolve(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolve against an already gathered environment without touching the
    /// process environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        self.resolve(env, false)
    }

    fn resolve(&self, env: EnvConfig, env_file_loaded: bool) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, mut warnings) = compose_config(file_config, env, config_path, env_file_loaded)?;
        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(&self, env: &EnvConfig) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig = toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No relic.toml detected; using environment variables and defaults",
            "Create relic.toml or set RELIC_CONFIG to point at one",
        );
    }
    for (name, raw) in &env.unparsed {
        warnings.push_with_hint(
            format!("{name}={raw} could not be parsed and was ignored"),
            "Booleans accept true/false/yes/no/1/0",
        );
    }

    let FileConfig {
        server: file_server,
        reasoning: file_reasoning,
        marketplace: file_marketplace,
        watch: file_watch,
        storage: file_storage,
        automation: file_automation,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(3001),
    };

    let reasoning = ReasoningConfig {
        api_key: env.anthropic_api_key.clone().or(file_reasoning.api_key),
        model: env
            .claude_model
            .clone()
            .or(file_reasoning.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        triage_model: env
            .claude_triage_model
            .clone()
            .or(file_reasoning.triage_model)
            .unwrap_or_else(|| DEFAULT_TRIAGE_MODEL.to_string()),
        base_url: env
            .anthropic_base_url
            .clone()
            .or(file_reasoning.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        timeout: duration(
            "REASONING_TIMEOUT",
            env.reasoning_timeout.as_deref(),
            "reasoning.timeout",
            file_reasoning.timeout.as_deref(),
            DEFAULT_REASONING_TIMEOUT,
        )?,
    };

    let marketplace = compose_marketplace(&env, file_marketplace.unwrap_or_default(), &mut warnings)?;

    let watch = WatchConfig {
        folder: env.watch_folder.clone().or(file_watch.folder),
        extensions: env
            .watch_extensions
            .clone()
            .or(file_watch.extensions)
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect())
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect(),
        debounce: duration(
            "WATCH_DEBOUNCE",
            env.watch_debounce.as_deref(),
            "watch.debounce",
            file_watch.debounce.as_deref(),
            DEFAULT_WATCH_WINDOW,
        )?,
        stability: duration(
            "WATCH_STABILITY",
            env.watch_stability.as_deref(),
            "watch.stability",
            file_watch.stability.as_deref(),
            DEFAULT_WATCH_WINDOW,
        )?,
    };

    let storage = StorageConfig {
        data_dir: env
            .data_dir
            .clone()
            .or(file_storage.data_dir)
            .unwrap_or_else(|| PathBuf::from("./data")),
    };

    let automation = AutomationConfig {
        auto_post: env.auto_post.or(file_automation.auto_post).unwrap_or(false),
        notify_on_sale: env
            .notify_on_sale
            .or(file_automation.notify_on_sale)
            .unwrap_or(true),
        sale_poll_interval: duration(
            "SALE_POLL_INTERVAL",
            env.sale_poll_interval.as_deref(),
            "automation.sale_poll_interval",
            file_automation.sale_poll_interval.as_deref(),
            DEFAULT_SALE_POLL_INTERVAL,
        )?,
    };

    let config = Config {
        server,
        reasoning,
        marketplace,
        watch,
        storage,
        automation,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };
    Ok((config, warnings))
}

fn compose_marketplace(
    env: &EnvConfig,
    file: FileMarketplaceConfig,
    warnings: &mut ConfigWarnings,
) -> Result<Option<MarketplaceConfig>, ConfigLoadError> {
    let app_id = env.ebay_app_id.clone().or(file.app_id);
    let cert_id = env.ebay_cert_id.clone().or(file.cert_id);
    let dev_id = env.ebay_dev_id.clone().or(file.dev_id);
    let auth_token = env.ebay_auth_token.clone().or(file.auth_token);
    let timeout = duration(
        "EBAY_TIMEOUT",
        env.ebay_timeout.as_deref(),
        "marketplace.timeout",
        file.timeout.as_deref(),
        DEFAULT_MARKETPLACE_TIMEOUT,
    )?;

    match (app_id, cert_id, dev_id, auth_token) {
        (Some(app_id), Some(cert_id), Some(dev_id), Some(auth_token)) => Ok(Some(MarketplaceConfig {
            app_id,
            cert_id,
            dev_id,
            auth_token,
            sandbox: env.ebay_sandbox.or(file.sandbox).unwrap_or(false),
            postal_code: env
                .ship_from_zip
                .clone()
                .or(file.postal_code)
                .unwrap_or_else(|| "90210".to_string()),
            paypal_email: env.paypal_email.clone().or(file.paypal_email),
            timeout,
        })),
        (None, None, None, None) => Ok(None),
        (app_id, cert_id, dev_id, auth_token) => {
            let missing: Vec<&str> = [
                ("EBAY_APP_ID", app_id.is_none()),
                ("EBAY_CERT_ID", cert_id.is_none()),
                ("EBAY_DEV_ID", dev_id.is_none()),
                ("EBAY_AUTH_TOKEN", auth_token.is_none()),
            ]
            .into_iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| name)
            .collect();
            warnings.push_with_hint(
                format!("Marketplace credentials incomplete (missing {}); posting disabled", missing.join(", ")),
                "All four eBay credentials are required",
            );
            Ok(None)
        }
    }
}

fn duration(
    env_name: &'static str,
    env_value: Option<&str>,
    file_key: &'static str,
    file_value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    let (key, raw) = match (env_value, file_value) {
        (Some(raw), _) => (env_name, raw),
        (None, Some(raw)) => (file_key, raw),
        (None, None) => return Ok(default),
    };
    humantime::parse_duration(raw.trim()).map_err(|source| ConfigLoadError::InvalidDuration {
        key,
        value: raw.to_string(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration '{value}' for {key}")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(self, ConfigPathProvenance::Explicit | ConfigPathProvenance::Env)
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
