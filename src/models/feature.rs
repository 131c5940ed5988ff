use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use super::{TrackId, TrackRecord};
use crate::error::AppError;

/// Bumped whenever the persisted matrix layout changes
pub const MATRIX_FORMAT_VERSION: u32 = 1;

/// Ordered numeric values of one track, one per configured column
pub type FeatureVector = Vec<f64>;

/// A track attribute that takes part in similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Danceability,
    Key,
    Instrumentalness,
    Tempo,
    DurationMs,
    Popularity,
    /// Categorical, mapped to an integer code per build
    Decade,
}

/// Raw value read from a track for one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Numeric(f64),
    Categorical(&'a str),
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 7] = [
        FeatureColumn::Danceability,
        FeatureColumn::Key,
        FeatureColumn::Instrumentalness,
        FeatureColumn::Tempo,
        FeatureColumn::DurationMs,
        FeatureColumn::Popularity,
        FeatureColumn::Decade,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Danceability => "danceability",
            FeatureColumn::Key => "key",
            FeatureColumn::Instrumentalness => "instrumentalness",
            FeatureColumn::Tempo => "tempo",
            FeatureColumn::DurationMs => "duration_ms",
            FeatureColumn::Popularity => "popularity",
            FeatureColumn::Decade => "decade",
        }
    }

    /// Reads this column's attribute from a track
    pub fn value<'a>(&self, track: &'a TrackRecord) -> FeatureValue<'a> {
        match self {
            FeatureColumn::Danceability => FeatureValue::Numeric(track.danceability),
            FeatureColumn::Key => FeatureValue::Numeric(track.key as f64),
            FeatureColumn::Instrumentalness => FeatureValue::Numeric(track.instrumentalness),
            FeatureColumn::Tempo => FeatureValue::Numeric(track.tempo),
            FeatureColumn::DurationMs => FeatureValue::Numeric(track.duration_ms as f64),
            FeatureColumn::Popularity => FeatureValue::Numeric(track.popularity as f64),
            FeatureColumn::Decade => FeatureValue::Categorical(&track.decade),
        }
    }
}

impl Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureColumn::ALL
            .iter()
            .find(|column| column.name() == s)
            .copied()
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown feature column {}", s)))
    }
}

/// Category codes per categorical column, assigned in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMap {
    codes: BTreeMap<FeatureColumn, BTreeMap<String, u32>>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self, column: FeatureColumn, value: &str) -> Option<u32> {
        self.codes.get(&column)?.get(value).copied()
    }

    /// Returns the existing code or assigns the next free one
    pub fn code_or_insert(&mut self, column: FeatureColumn, value: &str) -> u32 {
        let codes = self.codes.entry(column).or_default();
        if let Some(code) = codes.get(value) {
            return *code;
        }
        let code = codes.len() as u32;
        codes.insert(value.to_string(), code);
        code
    }

    /// Number of distinct categories seen for a column
    pub fn len(&self, column: FeatureColumn) -> usize {
        self.codes.get(&column).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.values().all(BTreeMap::is_empty)
    }
}

/// Frozen per-column normalization statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl ColumnStats {
    /// Z-score of `value`; constant columns normalize to 0
    pub fn normalize(&self, value: f64) -> f64 {
        if self.std == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }
}

/// Normalized feature matrix together with everything needed to vectorize
/// new queries the same way it was built.
///
/// This is also the persisted artifact format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub format_version: u32,
    pub columns: Vec<FeatureColumn>,
    /// Row `i` belongs to track `ids[i]`
    pub ids: Vec<TrackId>,
    pub rows: Vec<FeatureVector>,
    pub stats: Vec<ColumnStats>,
    pub categories: CategoryMap,
    pub built_at: DateTime<Utc>,
}

impl FeatureMatrix {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Checks structural invariants, used when loading a persisted artifact
    pub fn validate(&self, expected_columns: &[FeatureColumn]) -> Result<(), AppError> {
        let corrupt = |reason: String| Err(AppError::ArtifactCorrupt(reason));

        if self.format_version != MATRIX_FORMAT_VERSION {
            return corrupt(format!(
                "unsupported format version {} (expected {})",
                self.format_version, MATRIX_FORMAT_VERSION
            ));
        }
        if self.columns != expected_columns {
            return corrupt(format!(
                "column mismatch: artifact has {:?}, expected {:?}",
                self.columns, expected_columns
            ));
        }
        if self.rows.is_empty() {
            return corrupt("matrix has no rows".to_string());
        }
        if self.ids.len() != self.rows.len() {
            return corrupt(format!(
                "{} ids for {} rows",
                self.ids.len(),
                self.rows.len()
            ));
        }
        if self.stats.len() != self.columns.len() {
            return corrupt(format!(
                "{} column stats for {} columns",
                self.stats.len(),
                self.columns.len()
            ));
        }
        if let Some(row) = self.rows.iter().position(|r| r.len() != self.columns.len()) {
            return corrupt(format!(
                "row {} has {} values, expected {}",
                row,
                self.rows[row].len(),
                self.columns.len()
            ));
        }
        let mut seen = HashSet::with_capacity(self.ids.len());
        if let Some(duplicate) = self.ids.iter().find(|id| !seen.insert(**id)) {
            return corrupt(format!("duplicate track id {}", duplicate));
        }

        Ok(())
    }
}
