use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{MatrixSummary, NewTrack, Recommendation, TrackId},
    routes::AppState,
};

/// Neighbors returned when the caller does not pass `k`
pub const DEFAULT_K: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    /// Query track, absent for ad-hoc similarity queries
    pub track_id: Option<TrackId>,
    pub k: usize,
    pub recommendations: Vec<Recommendation>,
}

/// Checks `k` against `[1, max_k]`, defaulting when absent
pub fn validate_k(k: Option<i64>, max_k: i64) -> AppResult<usize> {
    let k = k.unwrap_or(DEFAULT_K.min(max_k));
    if k < 1 || k > max_k {
        return Err(AppError::InvalidK(k));
    }
    Ok(k as usize)
}

/// Handler for recommendations of a stored track
pub async fn for_track(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(track_id): Path<TrackId>,
    Query(params): Query<RecommendParams>,
) -> AppResult<Json<RecommendationResponse>> {
    let k = validate_k(params.k, state.max_k)?;

    tracing::info!(
        request_id = %request_id,
        track_id,
        k,
        "Processing recommendation request"
    );

    let recommendations = state.recommendations.recommend(track_id, k).await?;

    tracing::info!(
        request_id = %request_id,
        returned = recommendations.len(),
        "Recommendation completed"
    );

    Ok(Json(RecommendationResponse {
        track_id: Some(track_id),
        k,
        recommendations,
    }))
}

/// Handler for recommendations of an unsaved track
pub async fn similar(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendParams>,
    Json(track): Json<NewTrack>,
) -> AppResult<Json<RecommendationResponse>> {
    let k = validate_k(params.k, state.max_k)?;
    track.validate()?;

    tracing::info!(request_id = %request_id, k, "Processing similarity request");

    let recommendations = state.recommendations.recommend_similar(track, k).await?;

    Ok(Json(RecommendationResponse {
        track_id: None,
        k,
        recommendations,
    }))
}

/// Rebuilds the feature matrix from the current track store
pub async fn rebuild(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<MatrixSummary>> {
    tracing::info!(request_id = %request_id, "Rebuilding feature matrix");
    let summary = state.recommendations.rebuild_matrix().await?;
    Ok(Json(summary))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> AppResult<Json<MatrixSummary>> {
    let summary = state.recommendations.matrix_summary().await?;
    Ok(Json(summary))
}

/// Drops the cached matrix so the next request rebuilds it
pub async fn invalidate(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<StatusCode> {
    tracing::info!(request_id = %request_id, "Invalidating feature matrix");
    state.recommendations.invalidate().await?;
    Ok(StatusCode::NO_CONTENT)
}
