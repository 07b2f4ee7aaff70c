use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file. Durations are humantime
/// strings such as `"2s"` or `"5m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub reasoning: FileReasoningConfig,
    pub marketplace: Option<FileMarketplaceConfig>,
    #[serde(default)]
    pub watch: FileWatchConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub automation: FileAutomationConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReasoningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMarketplaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paypal_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAutomationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_post: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_sale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_poll_interval: Option<String>,
}

/// Environment-derived configuration values. Durations stay raw strings so
/// the loader can report which variable was malformed.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub anthropic_api_key: Option<String>,
    pub claude_model: Option<String>,
    pub claude_triage_model: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub reasoning_timeout: Option<String>,
    pub ebay_app_id: Option<String>,
    pub ebay_cert_id: Option<String>,
    pub ebay_dev_id: Option<String>,
    pub ebay_auth_token: Option<String>,
    pub ebay_sandbox: Option<bool>,
    pub ebay_timeout: Option<String>,
    pub ship_from_zip: Option<String>,
    pub paypal_email: Option<String>,
    pub watch_folder: Option<PathBuf>,
    pub watch_extensions: Option<Vec<String>>,
    pub watch_debounce: Option<String>,
    pub watch_stability: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub auto_post: Option<bool>,
    pub notify_on_sale: Option<bool>,
    pub sale_poll_interval: Option<String>,
    /// Variables that were set but could not be parsed.
    pub unparsed: Vec<(&'static str, String)>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut env = Self::default();

        env.config_path = var("RELIC_CONFIG").map(PathBuf::from);
        env.server_host = var("SERVER_HOST");
        env.server_port = parse_number(&mut env.unparsed, "SERVER_PORT", var("SERVER_PORT"));

        env.anthropic_api_key = var("ANTHROPIC_API_KEY");
        env.claude_model = var("CLAUDE_MODEL");
        env.claude_triage_model = var("CLAUDE_TRIAGE_MODEL");
        env.anthropic_base_url = var("ANTHROPIC_BASE_URL");
        env.reasoning_timeout = var("REASONING_TIMEOUT");

        env.ebay_app_id = var("EBAY_APP_ID");
        env.ebay_cert_id = var("EBAY_CERT_ID");
        env.ebay_dev_id = var("EBAY_DEV_ID");
        env.ebay_auth_token = var("EBAY_AUTH_TOKEN");
        env.ebay_sandbox = parse_bool(&mut env.unparsed, "EBAY_SANDBOX", var("EBAY_SANDBOX"));
        env.ebay_timeout = var("EBAY_TIMEOUT");
        env.ship_from_zip = var("SHIP_FROM_ZIP");
        env.paypal_email = var("PAYPAL_EMAIL");

        env.watch_folder = var("WATCH_FOLDER").map(PathBuf::from);
        env.watch_extensions = var("WATCH_EXTENSIONS").map(|raw| parse_csv(&raw));
        env.watch_debounce = var("WATCH_DEBOUNCE");
        env.watch_stability = var("WATCH_STABILITY");

        env.data_dir = var("RELIC_DATA_DIR").map(PathBuf::from);
        env.auto_post = parse_bool(&mut env.unparsed, "AUTO_POST", var("AUTO_POST"));
        env.notify_on_sale = parse_bool(&mut env.unparsed, "NOTIFY_ON_SALE", var("NOTIFY_ON_SALE"));
        env.sale_poll_interval = var("SALE_POLL_INTERVAL");

        env
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_bool(unparsed: &mut Vec<(&'static str, String)>, name: &'static str, raw: Option<String>) -> Option<bool> {
    let raw = raw?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            unparsed.push((name, raw));
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    unparsed: &mut Vec<(&'static str, String)>,
    name: &'static str,
    raw: Option<String>,
) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            unparsed.push((name, raw));
            None
        }
    }
}
