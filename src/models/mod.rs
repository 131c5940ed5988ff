mod feature;
mod recommendation;
mod track;

pub use feature::{
    CategoryMap, ColumnStats, FeatureColumn, FeatureMatrix, FeatureValue, FeatureVector,
    MATRIX_FORMAT_VERSION,
};
pub use recommendation::{MatrixSummary, Recommendation, RecommendationResult};
pub use track::{
    NewTrack, SortOrder, TrackField, TrackId, TrackListQuery, TrackPage, TrackRecord,
};
