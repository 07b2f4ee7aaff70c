//! Photo upload and appraisal.

use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use chrono::Utc;
use relic_core::{AnalysisMode, AnalysisOptions, RelayStatus};
use relic_model::{ApiResponse, ItemId, VintageItem};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Request body cap for `/api/analyze`: every image at full size plus
/// room for the form fields.
pub const MAX_BODY_BYTES: usize = MAX_IMAGES * MAX_IMAGE_BYTES + 64 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub item: VintageItem,
    pub website: WebsiteResult,
    pub marketplace: MarketplaceResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteResult {
    pub posted: bool,
    pub listing_id: ItemId,
    pub url: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceResult {
    pub requested: bool,
    pub posted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fees: Option<f64>,
    pub message: String,
}

#[derive(Debug)]
struct AnalyzeForm {
    images: Vec<Upload>,
    extended_thinking: bool,
    two_stage: bool,
    auto_post: bool,
    platforms: Vec<String>,
}

#[derive(Debug)]
struct Upload {
    extension: String,
    bytes: Vec<u8>,
}

/// `POST /api/analyze`: store the uploaded photos, appraise them, persist
/// the listing and optionally relay it to the marketplace.
pub async fn analyze(State(state): State<AppState>, multipart: Multipart) -> AppResult<Json<ApiResponse<AnalyzeResponse>>> {
    let Some(pipeline) = state.pipeline.clone() else {
        return Err(AppError::unavailable("ANTHROPIC_API_KEY not configured"));
    };

    let form = read_form(multipart, state.config.automation.auto_post).await?;
    if form.images.is_empty() {
        return Err(AppError::bad_request("No images provided"));
    }

    let stored = store_uploads(&state.uploads_dir, &form.images).await?;
    let (paths, refs): (Vec<PathBuf>, Vec<String>) = stored.into_iter().unzip();

    let options = AnalysisOptions {
        mode: if form.two_stage {
            AnalysisMode::TwoStage
        } else {
            AnalysisMode::SinglePass
        },
        extended_thinking: form.extended_thinking,
        target_platforms: form.platforms,
    };

    let outcome = match pipeline.process(&paths, refs, &options, form.auto_post).await {
        Ok(outcome) => outcome,
        Err(err) => {
            discard_uploads(&paths).await;
            return Err(err.into());
        }
    };

    let listing = outcome.listing;
    info!(
        listing_id = %listing.id,
        images = paths.len(),
        relayed = outcome.relay.is_relayed(),
        "upload appraised"
    );

    let marketplace = marketplace_result(form.auto_post, pipeline.relay().is_some(), &outcome.relay);
    let website = WebsiteResult {
        posted: true,
        listing_id: listing.id,
        url: format!("/shop/{}", listing.id),
    };

    Ok(Json(
        ApiResponse::success(AnalyzeResponse {
            item: listing.item,
            website,
            marketplace,
        })
        .with_message("Posted to website".to_string()),
    ))
}

async fn read_form(mut multipart: Multipart, auto_post_default: bool) -> AppResult<AnalyzeForm> {
    let mut form = AnalyzeForm {
        images: Vec::new(),
        extended_thinking: true,
        two_stage: false,
        auto_post: auto_post_default,
        platforms: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("Malformed upload: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                if form.images.len() == MAX_IMAGES {
                    return Err(AppError::bad_request(format!("At most {MAX_IMAGES} images per request")));
                }
                form.images.push(read_image(field).await?);
            }
            "extendedThinking" => form.extended_thinking = read_flag(field).await?,
            "twoStage" => form.two_stage = read_flag(field).await?,
            "autoPostToMarketplace" => form.auto_post = read_flag(field).await?,
            "platform" => {
                let platform = read_text(field).await?;
                if !platform.is_empty() {
                    form.platforms.push(platform);
                }
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn read_image(field: Field<'_>) -> AppResult<Upload> {
    let extension = field
        .file_name()
        .map(Path::new)
        .and_then(|name| name.extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::bad_request("Only image files are allowed"))?;
    if field
        .content_type()
        .is_some_and(|content_type| !content_type.starts_with("image/"))
    {
        return Err(AppError::bad_request("Only image files are allowed"));
    }

    let bytes = field
        .bytes()
        .await
        .map_err(|err| AppError::bad_request(format!("Malformed upload: {err}")))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::payload_too_large("Images are limited to 10 MB each"));
    }

    Ok(Upload {
        extension,
        bytes: bytes.to_vec(),
    })
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map(|text| text.trim().to_string())
        .map_err(|err| AppError::bad_request(format!("Malformed upload: {err}")))
}

/// Anything but an explicit `false` or `0` counts as set.
async fn read_flag(field: Field<'_>) -> AppResult<bool> {
    let value = read_text(field).await?;
    Ok(!matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"))
}

/// Write uploads as `{millis}-{uuid}.{ext}` and return each file path with
/// the public `/uploads/...` reference.
async fn store_uploads(dir: &Path, uploads: &[Upload]) -> AppResult<Vec<(PathBuf, String)>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| AppError::internal(format!("Could not prepare upload directory: {err}")))?;

    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            upload.extension
        );
        let path = dir.join(&file_name);
        if let Err(err) = tokio::fs::write(&path, &upload.bytes).await {
            let written: Vec<PathBuf> = stored.into_iter().map(|(path, _)| path).collect();
            discard_uploads(&written).await;
            return Err(AppError::internal(format!("Could not store upload: {err}")));
        }
        stored.push((path, format!("/uploads/{file_name}")));
    }
    Ok(stored)
}

async fn discard_uploads(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %err, "could not remove upload");
        }
    }
}

fn marketplace_result(requested: bool, configured: bool, status: &RelayStatus) -> MarketplaceResult {
    match status {
        RelayStatus::Relayed(outcome) => MarketplaceResult {
            requested,
            posted: true,
            item_id: Some(outcome.marketplace.item_id.clone()),
            url: Some(outcome.marketplace.url.clone()),
            total_fees: Some(outcome.total_fees),
            message: "Posted to marketplace".to_string(),
        },
        RelayStatus::Draft { .. } if !requested => MarketplaceResult {
            message: "Saved as draft".to_string(),
            ..MarketplaceResult::default()
        },
        RelayStatus::Draft { .. } if !configured => MarketplaceResult {
            requested,
            message: "Marketplace not configured; saved as draft".to_string(),
            ..MarketplaceResult::default()
        },
        RelayStatus::Draft { .. } => MarketplaceResult {
            requested,
            message: "Marketplace listing failed; saved as draft".to_string(),
            ..MarketplaceResult::default()
        },
    }
}
