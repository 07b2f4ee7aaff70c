use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use relic_model::ApiResponse;
use serde::Serialize;

use crate::infra::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub async fn health() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        timestamp: Utc::now(),
    }))
}

/// Which providers are usable, without exposing any credential.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub reasoning_configured: bool,
    pub marketplace_configured: bool,
    pub marketplace_sandbox: bool,
    pub model: String,
    pub triage_model: String,
    pub auto_post: bool,
}

pub async fn config_status(State(state): State<AppState>) -> Json<ApiResponse<ConfigStatus>> {
    let config = &state.config;
    Json(ApiResponse::success(ConfigStatus {
        reasoning_configured: state.pipeline.is_some(),
        marketplace_configured: state.marketplace_configured(),
        marketplace_sandbox: config
            .marketplace
            .as_ref()
            .is_some_and(|marketplace| marketplace.sandbox),
        model: config.reasoning.model.clone(),
        triage_model: config.reasoning.triage_model.clone(),
        auto_post: config.automation.auto_post,
    }))
}
