//! Shop endpoints over the listing store, plus the operator actions that
//! post a listing to the marketplace later, check or end it there, or delete
//! it.

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use relic_core::SoldTransition;
use relic_core::relay::ItemStatus;
use relic_model::{ApiResponse, ItemId, Listing, ListingStats};
use serde::{Deserialize, Serialize};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

fn parse_id(raw: &str) -> AppResult<ItemId> {
    raw.parse::<ItemId>()
        .map_err(|_| AppError::not_found("Listing not found"))
}

pub async fn listings(State(state): State<AppState>) -> Json<ApiResponse<Vec<Listing>>> {
    Json(ApiResponse::success(state.store.active_listings().await))
}

/// Fetch one listing and count the view.
pub async fn item(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<ApiResponse<Listing>>> {
    let id = parse_id(&id)?;
    let mut listing = state
        .store
        .listing(id)
        .await
        .ok_or_else(|| AppError::not_found("Listing not found"))?;

    if let Some(views) = state.store.increment_views(id).await? {
        listing.views = views;
    }
    Ok(Json(ApiResponse::success(listing)))
}

pub async fn stats(State(state): State<AppState>) -> Json<ApiResponse<ListingStats>> {
    Json(ApiResponse::success(state.store.stats().await))
}

pub async fn mark_sold(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<ApiResponse<Listing>>> {
    let id = parse_id(&id)?;
    let message = match state.store.mark_sold(id).await? {
        SoldTransition::Sold { .. } => "Item marked as sold".to_string(),
        SoldTransition::Unchanged { status } => format!("Item already {}", status.as_str()),
        SoldTransition::NotFound => return Err(AppError::not_found("Listing not found")),
    };
    let listing = state
        .store
        .listing(id)
        .await
        .ok_or_else(|| AppError::not_found("Listing not found"))?;
    Ok(Json(ApiResponse::success(listing).with_message(message)))
}

#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    pub featured: bool,
}

pub async fn set_featured(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FeaturedRequest>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let id = parse_id(&id)?;
    if !state.store.set_featured(id, request.featured).await? {
        return Err(AppError::not_found("Listing not found"));
    }
    let listing = state
        .store
        .listing(id)
        .await
        .ok_or_else(|| AppError::not_found("Listing not found"))?;
    Ok(Json(ApiResponse::success(listing)))
}

/// Local files behind a listing's photo references. Uploads live in the
/// uploads directory; folder photos are looked up in the archive once they
/// have been moved there.
fn listing_photos(state: &AppState, listing: &Listing) -> Vec<PathBuf> {
    listing
        .item
        .images
        .iter()
        .map(|reference| {
            if let Some(name) = reference.strip_prefix("/uploads/") {
                return state.uploads_dir.join(name);
            }
            let original = PathBuf::from(reference);
            if original.exists() {
                return original;
            }
            match original.file_name() {
                Some(name) => state.archive_dir.join(name),
                None => original,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedListing {
    pub listing: Listing,
    pub url: String,
    pub total_fees: f64,
    pub pictures_uploaded: usize,
    pub pictures_skipped: usize,
}

/// Post a listing that was kept as a draft.
pub async fn relay_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<RelayedListing>>> {
    let id = parse_id(&id)?;
    let listing = state
        .store
        .listing(id)
        .await
        .ok_or_else(|| AppError::not_found("Listing not found"))?;
    let photos = listing_photos(&state, &listing);

    let (listing, outcome) = state.listings.relay_listing(id, &photos).await?;
    Ok(Json(
        ApiResponse::success(RelayedListing {
            listing,
            url: outcome.marketplace.url,
            total_fees: outcome.total_fees,
            pictures_uploaded: outcome.pictures_uploaded,
            pictures_skipped: outcome.pictures_skipped,
        })
        .with_message("Posted to marketplace"),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStatus {
    pub item_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub quantity_sold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl From<ItemStatus> for MarketplaceStatus {
    fn from(status: ItemStatus) -> Self {
        Self {
            item_id: status.item_id,
            status: status.listing_status,
            title: status.title,
            quantity_sold: status.quantity_sold,
            current_price: status.current_price,
        }
    }
}

pub async fn marketplace_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<MarketplaceStatus>>> {
    let id = parse_id(&id)?;
    let status = state.listings.marketplace_status(id).await?;
    Ok(Json(ApiResponse::success(status.into())))
}

#[derive(Debug, Default, Deserialize)]
pub struct EndQuery {
    /// Marketplace end reason, e.g. `NotAvailable` or `LostOrBroken`.
    pub reason: Option<String>,
}

/// End the marketplace listing and take the item off the shop.
pub async fn end_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EndQuery>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let id = parse_id(&id)?;
    let listing = state.listings.end_listing(id, query.reason.as_deref()).await?;
    Ok(Json(ApiResponse::success(listing).with_message("Marketplace listing ended")))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let id = parse_id(&id)?;
    let listing = state.listings.delete_listing(id).await?;
    Ok(Json(ApiResponse::success(listing).with_message("Listing deleted")))
}
