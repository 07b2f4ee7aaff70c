use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers::{analyze, shop, system};
use crate::infra::app_state::AppState;

/// Build the full application router.
pub fn create_app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.uploads_dir);

    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/config", get(system::config_status))
        .route(
            "/api/analyze",
            post(analyze::analyze).layer(DefaultBodyLimit::max(analyze::MAX_BODY_BYTES)),
        )
        .route("/api/shop/listings", get(shop::listings))
        .route("/api/shop/stats", get(shop::stats))
        .route("/api/shop/item/{id}", get(shop::item).delete(shop::delete_item))
        .route("/api/shop/item/{id}/featured", post(shop::set_featured))
        .route("/api/shop/item/{id}/relay", post(shop::relay_item))
        .route("/api/shop/item/{id}/marketplace", get(shop::marketplace_status))
        .route("/api/shop/item/{id}/end", post(shop::end_item))
        .route("/api/shop/mark-sold/{id}", post(shop::mark_sold))
        .nest_service("/uploads", uploads)
        // Same nesting as ServiceBuilder(Cors, Trace): Cors outermost, Trace inside.
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
