use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelicError {
    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Failed to load image {path:?}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reasoning service error: {message}")]
    Service {
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to parse analysis: {0}")]
    Parse(String),

    #[error("Listing store I/O error at {path:?}: {message}")]
    StoreIo { path: PathBuf, message: String },

    #[error("Marketplace relay failed: {0}")]
    Relay(String),

    #[error("Failed to archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The request does not fit the listing's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Marketplace not configured")]
    MarketplaceUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelicError {
    pub fn service(message: impl Into<String>) -> Self {
        RelicError::Service {
            status: None,
            message: message.into(),
        }
    }

    pub fn store_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RelicError::StoreIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short stable name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelicError::Watch(_) => "watch",
            RelicError::ImageLoad { .. } => "image_load",
            RelicError::Service { .. } => "service",
            RelicError::Parse(_) => "parse",
            RelicError::StoreIo { .. } => "store_io",
            RelicError::Relay(_) => "relay",
            RelicError::Archive { .. } => "archive",
            RelicError::NotFound(_) => "not_found",
            RelicError::Conflict(_) => "conflict",
            RelicError::MarketplaceUnavailable => "marketplace_unavailable",
            RelicError::Io(_) => "io",
            RelicError::Serialization(_) => "serialization",
            RelicError::Internal(_) => "internal",
        }
    }

    /// Message safe to show an operator, without provider protocol detail.
    pub fn user_message(&self) -> String {
        match self {
            RelicError::ImageLoad { path, .. } => {
                format!("Could not read photo {}", path.display())
            }
            RelicError::Service { .. } => {
                "The appraisal service is unavailable; try again later".to_string()
            }
            RelicError::Parse(_) => {
                "The appraisal service returned an unreadable answer".to_string()
            }
            RelicError::Relay(_) => {
                "The marketplace request failed; nothing was changed there".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<relic_model::ModelError> for RelicError {
    fn from(err: relic_model::ModelError) -> Self {
        match err {
            relic_model::ModelError::InvalidPrice(msg) => RelicError::Parse(msg),
            relic_model::ModelError::InvalidId(msg) => RelicError::NotFound(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelicError>;
