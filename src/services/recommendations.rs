use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::{
    db::{ArtifactStore, CacheKey, TrackStore},
    error::{AppError, AppResult},
    models::{FeatureColumn, MatrixSummary, NewTrack, RecommendationResult, TrackId},
    services::{matrix_builder::build_matrix, similarity::SimilarityIndex},
};

/// Answers "tracks similar to this one" requests from a cached feature matrix
///
/// The matrix is built lazily on the first request, persisted through the
/// artifact store and reused for the lifetime of the process. It reflects the
/// track store as of the last build; callers needing fresh data must call
/// [`RecommendationService::rebuild_matrix`] or
/// [`RecommendationService::invalidate`].
pub struct RecommendationService {
    tracks: Arc<dyn TrackStore>,
    artifacts: Arc<dyn ArtifactStore>,
    columns: Vec<FeatureColumn>,
    exclude_self: bool,
    index: RwLock<Option<Arc<SimilarityIndex>>>,
    /// Held for the duration of any build so at most one runs at a time
    build_lock: Mutex<()>,
}

impl RecommendationService {
    pub fn new(
        tracks: Arc<dyn TrackStore>,
        artifacts: Arc<dyn ArtifactStore>,
        columns: Vec<FeatureColumn>,
        exclude_self: bool,
    ) -> Self {
        Self {
            tracks,
            artifacts,
            columns,
            exclude_self,
            index: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::FeatureMatrix(self.columns.clone())
    }

    /// Returns the in-memory index, loading or building the matrix on first use
    ///
    /// Concurrent callers during a build wait for it and share its result.
    /// A failed build is not cached; the next call tries again.
    pub async fn get_or_build_matrix(&self) -> AppResult<Arc<SimilarityIndex>> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let _guard = self.build_lock.lock().await;

        // Another request may have finished the build while we waited
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let key = self.cache_key();
        let matrix = match self.artifacts.load(&key).await? {
            Some(matrix) => {
                matrix.validate(&self.columns)?;
                tracing::info!(
                    key = %key,
                    store = self.artifacts.name(),
                    rows = matrix.row_count(),
                    built_at = %matrix.built_at,
                    "Loaded feature matrix artifact"
                );
                matrix
            }
            None => {
                tracing::info!(key = %key, "No matrix artifact, building from track store");
                let matrix = build_matrix(self.tracks.as_ref(), &self.columns).await?;
                self.artifacts.save(&key, &matrix).await?;
                matrix
            }
        };

        let index = Arc::new(SimilarityIndex::new(matrix));
        *self.index.write().await = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Builds a fresh matrix from the store and swaps it in
    ///
    /// The artifact is replaced only after a successful build; on failure
    /// the previous artifact and in-memory index stay in place.
    pub async fn rebuild_matrix(&self) -> AppResult<MatrixSummary> {
        let _guard = self.build_lock.lock().await;

        let key = self.cache_key();
        let matrix = build_matrix(self.tracks.as_ref(), &self.columns).await?;
        self.artifacts.save(&key, &matrix).await?;

        let index = Arc::new(SimilarityIndex::new(matrix));
        let summary = index.summary();
        *self.index.write().await = Some(index);

        tracing::info!(key = %key, rows = summary.row_count, "Feature matrix rebuilt");
        Ok(summary)
    }

    /// Drops the persisted artifact and the in-memory index
    ///
    /// The next recommendation request rebuilds the matrix.
    pub async fn invalidate(&self) -> AppResult<()> {
        let _guard = self.build_lock.lock().await;

        let key = self.cache_key();
        let removed = self.artifacts.remove(&key).await?;
        *self.index.write().await = None;

        tracing::info!(key = %key, artifact_removed = removed, "Feature matrix invalidated");
        Ok(())
    }

    /// Describes the current matrix, building it if needed
    pub async fn matrix_summary(&self) -> AppResult<MatrixSummary> {
        Ok(self.get_or_build_matrix().await?.summary())
    }

    /// Up to `k` tracks closest to a stored track
    ///
    /// With self-exclusion enabled the query track never appears and the
    /// result holds `min(k, rows - 1)` entries.
    pub async fn recommend(&self, track_id: TrackId, k: usize) -> AppResult<RecommendationResult> {
        if k < 1 {
            return Err(AppError::InvalidK(k as i64));
        }

        let index = self.get_or_build_matrix().await?;
        let query = index
            .row(track_id)
            .ok_or(AppError::UnknownTrackId(track_id))?;

        if self.exclude_self {
            if index.row_count() == 1 {
                return Ok(Vec::new());
            }
            index.ranked(query, k, Some(track_id))
        } else {
            index.ranked(query, k, None)
        }
    }

    /// Up to `k` stored tracks closest to an arbitrary, possibly unsaved track
    ///
    /// Categorical values unseen at build time fail with `UnknownCategory`.
    pub async fn recommend_similar(
        &self,
        track: NewTrack,
        k: usize,
    ) -> AppResult<RecommendationResult> {
        if k < 1 {
            return Err(AppError::InvalidK(k as i64));
        }

        let index = self.get_or_build_matrix().await?;
        // The id is never looked up, only the attributes are vectorized
        let query = index.query_vector(&track.with_id(0))?;
        index.neighbors(&query, k)
    }
}
