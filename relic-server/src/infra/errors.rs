use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use relic_core::RelicError;
use relic_model::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::failure(self.message));
        (self.status, body).into_response()
    }
}

impl From<RelicError> for AppError {
    fn from(err: RelicError) -> Self {
        let status = match &err {
            RelicError::NotFound(_) => StatusCode::NOT_FOUND,
            RelicError::Conflict(_) => StatusCode::CONFLICT,
            RelicError::MarketplaceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RelicError::Relay(_) => StatusCode::BAD_GATEWAY,
            RelicError::ImageLoad { .. } => StatusCode::BAD_REQUEST,
            RelicError::Service { .. } | RelicError::Parse(_) => StatusCode::BAD_GATEWAY,
            RelicError::StoreIo { .. } => {
                tracing::error!(error = %err, "listing store operation failed");
                return Self::internal("Listing store unavailable");
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(kind = err.kind(), error = %err, "request failed");
        Self::new(status, err.user_message())
    }
}

impl From<relic_model::ModelError> for AppError {
    fn from(err: relic_model::ModelError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
