use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wdb_api::{
    config::Config,
    db::{create_artifact_store, create_pool, run_migrations, CacheKey, SqliteTrackStore},
    models::NewTrack,
};

/// Bulk-loads tracks from a JSON array into the track table
#[derive(Parser, Debug)]
#[command(name = "import-tracks")]
struct CliArgs {
    /// JSON file holding an array of tracks
    path: PathBuf,

    /// Database to import into, defaults to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Replace every existing track, atomically with the import
    #[arg(long)]
    replace: bool,
}

/// Parses the import file without blocking the runtime
async fn read_tracks(path: &Path) -> Result<Vec<NewTrack>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of tracks", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wdb_api=info,import_tracks=info")),
        )
        .init();

    let cli_args = CliArgs::parse();
    let config = Config::from_env()?;
    let database_url = cli_args
        .database_url
        .clone()
        .unwrap_or_else(|| config.database_url.clone());

    let tracks = read_tracks(&cli_args.path).await?;

    let pool = create_pool(&database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;
    run_migrations(&pool).await?;
    let store = SqliteTrackStore::new(pool);

    let inserted = if cli_args.replace {
        let (removed, inserted) = store.replace_all(&tracks).await?;
        tracing::info!(removed, "Existing tracks deleted");
        inserted
    } else {
        store.insert_many(&tracks).await?
    };
    let total = store.count().await?;
    tracing::info!(inserted, total, database = %database_url, "Tracks imported");

    // The persisted matrix no longer reflects the table
    let artifacts = create_artifact_store(&config)?;
    let key = CacheKey::FeatureMatrix(config.feature_columns()?);
    if artifacts.remove(&key).await? {
        tracing::info!(key = %key, store = artifacts.name(), "Stale feature matrix removed");
    }

    Ok(())
}
