use redis::AsyncCommands;
use redis::Client;

use crate::db::cache::{decode_artifact, encode_artifact, ArtifactStore, CacheKey};
use crate::error::AppResult;
use crate::models::FeatureMatrix;

/// Creates a Redis client from a `redis://` URL
///
/// No connection is opened until the first command.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Matrix artifacts stored as JSON strings in Redis
///
/// Artifacts are written with a single `SET` and never expire; they are
/// replaced by a rebuild or dropped by an explicit invalidation.
#[derive(Clone)]
pub struct RedisArtifactStore {
    redis_client: Client,
}

impl RedisArtifactStore {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }
}

#[async_trait::async_trait]
impl ArtifactStore for RedisArtifactStore {
    async fn load(&self, key: &CacheKey) -> AppResult<Option<FeatureMatrix>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<Vec<u8>> = conn.get(key.to_string()).await.map_err(|e| {
            tracing::warn!(error = %e, "Redis get failed");
            e
        })?;

        match cached {
            Some(bytes) => {
                let matrix = decode_artifact(&bytes)?;
                tracing::debug!(key = %key, rows = matrix.row_count(), "Cache hit");
                Ok(Some(matrix))
            }
            None => {
                tracing::debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &CacheKey, matrix: &FeatureMatrix) -> AppResult<()> {
        let bytes = encode_artifact(matrix)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let _: () = conn.set(key.to_string(), bytes).await.map_err(|e| {
            tracing::warn!(error = %e, "Redis set failed");
            e
        })?;

        tracing::info!(key = %key, rows = matrix.row_count(), "Cached matrix artifact");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> AppResult<bool> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let removed: i64 = conn.del(key.to_string()).await?;
        Ok(removed > 0)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// TODO : Cover load/save against a throwaway Redis instance once CI provides one
