use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::SqliteTrackStore,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::RecommendationService,
};

pub mod recommendations;
pub mod tracks;

/// Shared state handed to every handler
pub struct AppState {
    pub tracks: Arc<SqliteTrackStore>,
    pub recommendations: Arc<RecommendationService>,
    /// Largest `k` accepted by recommendation endpoints
    pub max_k: i64,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracks", get(tracks::list).post(tracks::create))
        .route(
            "/tracks/:id",
            get(tracks::get).put(tracks::update).delete(tracks::delete),
        )
        .route("/tracks/:id/recommendations", get(recommendations::for_track))
        .route("/recommendations/similar", post(recommendations::similar))
        .route("/recommendations/rebuild", post(recommendations::rebuild))
        .route(
            "/recommendations/matrix",
            get(recommendations::summary).delete(recommendations::invalidate),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
