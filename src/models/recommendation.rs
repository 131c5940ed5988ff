use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{FeatureColumn, TrackId};

/// A single ranked neighbor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recommendation {
    pub track_id: TrackId,
    /// 1-based position in the result
    pub rank: usize,
    /// Cosine distance to the query, in `[0, 2]`
    pub distance: f64,
}

/// Neighbors sorted by increasing distance, ties by ascending track id
pub type RecommendationResult = Vec<Recommendation>;

/// Describes the matrix currently backing recommendations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixSummary {
    pub row_count: usize,
    pub columns: Vec<FeatureColumn>,
    pub built_at: DateTime<Utc>,
}
