use serde::{de, Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Store-assigned track identifier
pub type TrackId = i64;

/// Largest absolute value accepted for a numeric attribute
///
/// Keeps column sums and squared deviations of a matrix build finite.
pub const MAX_ATTRIBUTE_MAGNITUDE: f64 = 1e12;

/// Largest float that converts to `i64` without losing precision
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Accepts `5` as well as `5.0` for integer attributes
fn deserialize_integral<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Integral {
        Int(i64),
        Float(f64),
    }

    match Integral::deserialize(deserializer)? {
        Integral::Int(value) => Ok(value),
        Integral::Float(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER => {
            Ok(value as i64)
        }
        Integral::Float(value) => Err(de::Error::custom(format!(
            "expected an integer, got {}",
            value
        ))),
    }
}

/// A stored track with its audio features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackRecord {
    pub id: TrackId,
    pub track: String,
    pub artist: String,
    pub danceability: f64,
    pub key: i64,
    pub instrumentalness: f64,
    pub tempo: f64,
    pub duration_ms: i64,
    pub popularity: i64,
    pub decade: String,
}

/// Track attributes without an id, used for create, update and ad-hoc queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub track: String,
    pub artist: String,
    pub danceability: f64,
    #[serde(deserialize_with = "deserialize_integral")]
    pub key: i64,
    pub instrumentalness: f64,
    pub tempo: f64,
    #[serde(deserialize_with = "deserialize_integral")]
    pub duration_ms: i64,
    #[serde(deserialize_with = "deserialize_integral")]
    pub popularity: i64,
    pub decade: String,
}

impl NewTrack {
    /// Checks the fields the database cannot enforce
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("track", &self.track),
            ("artist", &self.artist),
            ("decade", &self.decade),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidInput(format!("{} must not be empty", name)));
            }
        }

        for (name, value) in [
            ("danceability", self.danceability),
            ("key", self.key as f64),
            ("instrumentalness", self.instrumentalness),
            ("tempo", self.tempo),
            ("duration_ms", self.duration_ms as f64),
            ("popularity", self.popularity as f64),
        ] {
            if !value.is_finite() {
                return Err(AppError::InvalidInput(format!("{} must be a finite number", name)));
            }
            if value.abs() > MAX_ATTRIBUTE_MAGNITUDE {
                return Err(AppError::InvalidInput(format!(
                    "{} must be within ±{:e}",
                    name, MAX_ATTRIBUTE_MAGNITUDE
                )));
            }
        }

        Ok(())
    }

    /// Attaches an id, e.g. to vectorize a track that is not stored
    pub fn with_id(self, id: TrackId) -> TrackRecord {
        TrackRecord {
            id,
            track: self.track,
            artist: self.artist,
            danceability: self.danceability,
            key: self.key,
            instrumentalness: self.instrumentalness,
            tempo: self.tempo,
            duration_ms: self.duration_ms,
            popularity: self.popularity,
            decade: self.decade,
        }
    }
}

/// Track fields usable for sorting and filtering listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackField {
    Id,
    Track,
    Artist,
    Danceability,
    Key,
    Instrumentalness,
    Tempo,
    DurationMs,
    Popularity,
    Decade,
}

impl TrackField {
    /// Column name in the `tracks` table
    pub fn column(&self) -> &'static str {
        match self {
            TrackField::Id => "id",
            TrackField::Track => "track",
            TrackField::Artist => "artist",
            TrackField::Danceability => "danceability",
            TrackField::Key => "key",
            TrackField::Instrumentalness => "instrumentalness",
            TrackField::Tempo => "tempo",
            TrackField::DurationMs => "duration_ms",
            TrackField::Popularity => "popularity",
            TrackField::Decade => "decade",
        }
    }

    /// Free-text fields are matched with `LIKE`, everything else exactly
    pub fn supports_like(&self) -> bool {
        matches!(self, TrackField::Track | TrackField::Artist)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            TrackField::Track | TrackField::Artist | TrackField::Decade
        )
    }
}

impl Display for TrackField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for TrackField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(TrackField::Id),
            "track" => Ok(TrackField::Track),
            "artist" => Ok(TrackField::Artist),
            "danceability" => Ok(TrackField::Danceability),
            "key" => Ok(TrackField::Key),
            "instrumentalness" => Ok(TrackField::Instrumentalness),
            "tempo" => Ok(TrackField::Tempo),
            "duration_ms" => Ok(TrackField::DurationMs),
            "popularity" => Ok(TrackField::Popularity),
            "decade" => Ok(TrackField::Decade),
            other => Err(AppError::InvalidInput(format!(
                "Field {} does not exist",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::InvalidInput(format!(
                "Sort order {} is invalid, use asc or desc",
                other
            ))),
        }
    }
}

/// Listing criteria for a page of tracks
#[derive(Debug, Clone, PartialEq)]
pub struct TrackListQuery {
    pub filter: Option<(TrackField, String)>,
    pub sort_field: TrackField,
    pub sort_order: SortOrder,
    pub page: u32,
}

impl Default for TrackListQuery {
    fn default() -> Self {
        Self {
            filter: None,
            sort_field: TrackField::Id,
            sort_order: SortOrder::Asc,
            page: 1,
        }
    }
}

/// One page of a track listing with navigation info
#[derive(Debug, Clone, Serialize)]
pub struct TrackPage {
    pub items: Vec<TrackRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: Vec<u32>,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_num: Option<u32>,
    pub prev_num: Option<u32>,
}

impl TrackPage {
    pub fn new(items: Vec<TrackRecord>, page: u32, per_page: u32, total: u64) -> Self {
        let page_count = total.div_ceil(per_page as u64) as u32;
        let has_next = page < page_count;
        let has_prev = page > 1;

        Self {
            items,
            page,
            per_page,
            total,
            pages: (1..=page_count).collect(),
            has_next,
            has_prev,
            next_num: has_next.then_some(page + 1),
            prev_num: has_prev.then_some(page - 1),
        }
    }
}
