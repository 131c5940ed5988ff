use std::fmt::Display;

use crate::{
    error::{AppError, AppResult},
    models::{FeatureColumn, FeatureMatrix},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Built matrix for an ordered column list
    FeatureMatrix(Vec<FeatureColumn>),
}

impl CacheKey {
    /// Key rendered as a portable file name stem
    pub fn file_stem(&self) -> String {
        self.to_string().replace(':', "-").replace(',', "_")
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::FeatureMatrix(columns) => {
                let names: Vec<&str> = columns.iter().map(FeatureColumn::name).collect();
                write!(f, "matrix:{}", names.join(","))
            }
        }
    }
}

/// Persistent storage for built feature matrices
///
/// `load` distinguishes an absent artifact (`Ok(None)`) from one that exists
/// but cannot be decoded (`ArtifactCorrupt`). `save` must replace any
/// previous artifact atomically.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self, key: &CacheKey) -> AppResult<Option<FeatureMatrix>>;

    async fn save(&self, key: &CacheKey, matrix: &FeatureMatrix) -> AppResult<()>;

    /// Deletes the artifact, returning whether one existed
    async fn remove(&self, key: &CacheKey) -> AppResult<bool>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

pub(crate) fn encode_artifact(matrix: &FeatureMatrix) -> AppResult<Vec<u8>> {
    serde_json::to_vec(matrix)
        .map_err(|e| AppError::Internal(format!("Artifact serialization error: {}", e)))
}

pub(crate) fn decode_artifact(bytes: &[u8]) -> AppResult<FeatureMatrix> {
    serde_json::from_slice(bytes).map_err(|e| AppError::ArtifactCorrupt(e.to_string()))
}
