use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{
        FeatureMatrix, FeatureVector, MatrixSummary, Recommendation, RecommendationResult,
        TrackId, TrackRecord,
    },
    services::{matrix_builder::normalize_vector, vectorizer::vectorize},
};

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`
///
/// A zero vector on either side yields exactly 1 (maximally dissimilar)
/// instead of propagating a division by zero.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot / (norm_a * norm_b).sqrt();
    if !similarity.is_finite() {
        return 1.0;
    }

    1.0 - similarity.clamp(-1.0, 1.0)
}

/// Read-only nearest-neighbor index over a built feature matrix
#[derive(Debug)]
pub struct SimilarityIndex {
    matrix: FeatureMatrix,
    positions: HashMap<TrackId, usize>,
}

impl SimilarityIndex {
    pub fn new(matrix: FeatureMatrix) -> Self {
        let positions = matrix
            .ids
            .iter()
            .enumerate()
            .map(|(row, id)| (*id, row))
            .collect();

        Self { matrix, positions }
    }

    pub fn matrix(&self) -> &FeatureMatrix {
        &self.matrix
    }

    pub fn row_count(&self) -> usize {
        self.matrix.row_count()
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.positions.contains_key(&track_id)
    }

    /// Normalized row of a track that was part of the build
    pub fn row(&self, track_id: TrackId) -> Option<&[f64]> {
        self.positions
            .get(&track_id)
            .map(|row| self.matrix.rows[*row].as_slice())
    }

    pub fn summary(&self) -> MatrixSummary {
        MatrixSummary {
            row_count: self.row_count(),
            columns: self.matrix.columns.clone(),
            built_at: self.matrix.built_at,
        }
    }

    /// Vectorizes an arbitrary track the same way the matrix was built
    ///
    /// Uses the frozen category map and column statistics, so the track
    /// does not need to be stored.
    pub fn query_vector(&self, track: &TrackRecord) -> AppResult<FeatureVector> {
        let mut vector = vectorize(track, &self.matrix.columns, &self.matrix.categories)?;
        normalize_vector(&mut vector, &self.matrix.stats);
        Ok(vector)
    }

    /// Nearest rows to a normalized query vector
    ///
    /// Every row is scored, including one identical to the query. `k` is
    /// clamped to `[1, row_count]`.
    pub fn neighbors(&self, query: &[f64], k: usize) -> AppResult<RecommendationResult> {
        self.ranked(query, k, None)
    }

    /// Nearest rows to an indexed track; the track itself ranks among them
    pub fn neighbors_of(&self, track_id: TrackId, k: usize) -> AppResult<RecommendationResult> {
        let query = self
            .row(track_id)
            .ok_or(AppError::UnknownTrackId(track_id))?;
        self.ranked(query, k, None)
    }

    /// Ranks all rows by distance to `query`, optionally dropping one track
    /// before truncating to `k`
    pub fn ranked(
        &self,
        query: &[f64],
        k: usize,
        exclude: Option<TrackId>,
    ) -> AppResult<RecommendationResult> {
        if query.len() != self.matrix.columns.len() {
            return Err(AppError::InvalidInput(format!(
                "Query vector has {} values, matrix has {} columns",
                query.len(),
                self.matrix.columns.len()
            )));
        }

        let k = k.clamp(1, self.row_count().max(1));

        let mut scored: Vec<(TrackId, f64)> = self
            .matrix
            .ids
            .iter()
            .zip(&self.matrix.rows)
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, row)| (*id, cosine_distance(query, row)))
            .collect();

        scored.sort_by(|(id_a, dist_a), (id_b, dist_b)| {
            dist_a.total_cmp(dist_b).then_with(|| id_a.cmp(id_b))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(position, (track_id, distance))| Recommendation {
                track_id,
                rank: position + 1,
                distance,
            })
            .collect())
    }
}
