use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{
    db::cache::{decode_artifact, encode_artifact, ArtifactStore, CacheKey},
    error::{AppError, AppResult},
    models::FeatureMatrix,
};

/// Stores matrix artifacts as JSON files in a directory
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new artifact.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn load(&self, key: &CacheKey) -> AppResult<Option<FeatureMatrix>> {
        let path = self.path_for(key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No matrix artifact on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let matrix = decode_artifact(&bytes).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to decode matrix artifact");
            e
        })?;

        tracing::debug!(path = %path.display(), rows = matrix.row_count(), "Loaded matrix artifact");
        Ok(Some(matrix))
    }

    async fn save(&self, key: &CacheKey, matrix: &FeatureMatrix) -> AppResult<()> {
        let bytes = encode_artifact(matrix)?;
        let dir = self.dir.clone();
        let path = self.path_for(key);

        tokio::fs::create_dir_all(&dir).await?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Artifact writer task failed: {}", e)))??;

        tracing::info!(path = %path.display(), rows = matrix.row_count(), "Saved matrix artifact");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> AppResult<bool> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Removed matrix artifact");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
