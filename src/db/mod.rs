pub mod cache;
pub mod file_store;
pub mod redis;
pub mod sqlite;
pub mod tracks;

pub use cache::{ArtifactStore, CacheKey};
pub use file_store::FileArtifactStore;
pub use self::redis::{create_redis_client, RedisArtifactStore};
pub use sqlite::{create_memory_pool, create_pool, run_migrations};
#[cfg(test)]
pub use tracks::MockTrackStore;
pub use tracks::{SqliteTrackStore, TrackStore, PAGE_SIZE};

use std::sync::Arc;

use crate::config::Config;

/// Picks the artifact store: Redis when `REDIS_URL` is set, otherwise files
/// under `ARTIFACT_DIR`
pub fn create_artifact_store(config: &Config) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match &config.redis_url {
        Some(redis_url) => Arc::new(RedisArtifactStore::new(create_redis_client(redis_url)?)),
        None => Arc::new(FileArtifactStore::new(config.artifact_dir.clone())),
    };
    Ok(store)
}
