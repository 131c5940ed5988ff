use serde::Deserialize;
use std::path::PathBuf;

use crate::models::FeatureColumn;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// SQLite database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Redis connection URL; when set, matrix artifacts are cached in Redis
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Directory for file-backed matrix artifacts
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Ordered feature columns used for similarity (comma separated)
    #[serde(default = "default_feature_columns")]
    pub feature_columns: Vec<String>,

    /// Whether a track is dropped from its own recommendation list
    #[serde(default = "default_exclude_self")]
    pub recommend_exclude_self: bool,

    /// Upper bound accepted for `k` on the HTTP layer
    #[serde(default = "default_max_k")]
    pub max_k: i64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_url() -> String {
    "sqlite://tracks.db?mode=rwc".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_feature_columns() -> Vec<String> {
    FeatureColumn::ALL
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

fn default_exclude_self() -> bool {
    true
}

fn default_max_k() -> i64 {
    100
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config =
            envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would only fail on the first recommendation request
    pub fn validate(&self) -> anyhow::Result<()> {
        self.feature_columns()?;
        if self.max_k < 1 {
            anyhow::bail!("MAX_K must be at least 1, got {}", self.max_k);
        }
        Ok(())
    }

    /// Parses the configured column names into feature columns
    pub fn feature_columns(&self) -> anyhow::Result<Vec<FeatureColumn>> {
        parse_feature_columns(&self.feature_columns)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Validates a list of column names, rejecting unknown names, duplicates and empty lists
pub fn parse_feature_columns<S: AsRef<str>>(names: &[S]) -> anyhow::Result<Vec<FeatureColumn>> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        let column: FeatureColumn = name.parse()?;
        if columns.contains(&column) {
            anyhow::bail!("Feature column {} is listed more than once", column);
        }
        columns.push(column);
    }

    if columns.is_empty() {
        anyhow::bail!("At least one feature column must be configured");
    }

    Ok(columns)
}
