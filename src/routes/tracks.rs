use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    db::TrackStore,
    error::AppResult,
    models::{NewTrack, SortOrder, TrackField, TrackId, TrackListQuery, TrackPage, TrackRecord},
    routes::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListTracksParams {
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
}

impl ListTracksParams {
    /// Validates field names and order; a filter applies only when both parts are given
    pub fn into_query(self) -> AppResult<TrackListQuery> {
        let filter = match (self.filter_field, self.filter_value) {
            (Some(field), Some(value)) => Some((field.parse::<TrackField>()?, value)),
            _ => None,
        };

        Ok(TrackListQuery {
            filter,
            sort_field: self
                .sort_field
                .as_deref()
                .map(str::parse::<TrackField>)
                .transpose()?
                .unwrap_or(TrackField::Id),
            sort_order: self
                .sort_order
                .as_deref()
                .map(str::parse::<SortOrder>)
                .transpose()?
                .unwrap_or(SortOrder::Asc),
            page: self.page.unwrap_or(1),
        })
    }
}

/// Lists tracks, ten per page
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTracksParams>,
) -> AppResult<Json<TrackPage>> {
    let query = params.into_query()?;
    let page = state.tracks.list_page(&query).await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(track): Json<NewTrack>,
) -> AppResult<(StatusCode, Json<TrackRecord>)> {
    let created = state.tracks.create(&track).await?;
    tracing::info!(track_id = created.id, "Track created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TrackId>,
) -> AppResult<Json<TrackRecord>> {
    let track = state.tracks.get_by_id(id).await?;
    Ok(Json(track))
}

/// Replaces every attribute of a track
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TrackId>,
    Json(track): Json<NewTrack>,
) -> AppResult<Json<TrackRecord>> {
    let updated = state.tracks.update(id, &track).await?;
    tracing::info!(track_id = id, "Track updated");
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TrackId>,
) -> AppResult<StatusCode> {
    state.tracks.delete(id).await?;
    tracing::info!(track_id = id, "Track deleted");
    Ok(StatusCode::NO_CONTENT)
}
