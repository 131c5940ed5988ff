use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use wdb_api::{
    config::Config,
    db::{create_artifact_store, create_pool, run_migrations, SqliteTrackStore},
    routes::{create_router, AppState},
    services::RecommendationService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wdb_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let columns = config.feature_columns()?;

    let pool = create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    run_migrations(&pool).await?;

    let tracks = Arc::new(SqliteTrackStore::new(pool));

    let artifacts = create_artifact_store(&config)?;

    tracing::info!(
        columns = ?columns,
        artifact_store = artifacts.name(),
        exclude_self = config.recommend_exclude_self,
        "Recommendation engine configured"
    );

    let recommendations = Arc::new(RecommendationService::new(
        tracks.clone(),
        artifacts,
        columns,
        config.recommend_exclude_self,
    ));

    let state = Arc::new(AppState {
        tracks,
        recommendations,
        max_k: config.max_k,
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    tracing::info!(address = %config.bind_address(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
