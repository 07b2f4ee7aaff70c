use std::time::Duration;

use thiserror::Error;

use crate::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("no photo extensions configured; the watcher would ignore every file")]
    NoExtensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Reject configurations that cannot run and warn about ones that will run
/// degraded.
pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.automation.sale_poll_interval == Duration::ZERO {
        return Err(ConfigGuardRailError::ZeroDuration {
            field: "automation.sale_poll_interval",
        });
    }
    if config.reasoning.timeout == Duration::ZERO {
        return Err(ConfigGuardRailError::ZeroDuration {
            field: "reasoning.timeout",
        });
    }
    if config.watch.extensions.is_empty() {
        return Err(ConfigGuardRailError::NoExtensions);
    }
    if config.reasoning.api_key.is_none() {
        warnings.push_with_hint(
            "ANTHROPIC_API_KEY not configured; photo analysis is unavailable",
            "Set ANTHROPIC_API_KEY or reasoning.api_key in relic.toml",
        );
    }
    if config.marketplace.is_none() {
        let message = if config.automation.auto_post {
            "auto_post is enabled but marketplace credentials are not configured; items are saved as drafts"
        } else {
            "Marketplace credentials not configured; items are saved as drafts"
        };
        warnings.push_with_hint(
            message,
            "Set EBAY_APP_ID, EBAY_CERT_ID, EBAY_DEV_ID and EBAY_AUTH_TOKEN to enable posting",
        );
    }
    if config.watch.debounce < Duration::from_millis(250) {
        warnings.push_with_hint(
            format!(
                "watch debounce of {:?} may split multi-photo items into separate listings",
                config.watch.debounce
            ),
            "A debounce of a few seconds groups photos taken together",
        );
    }

    Ok(warnings)
}
