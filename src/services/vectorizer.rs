use crate::{
    error::{AppError, AppResult},
    models::{CategoryMap, FeatureColumn, FeatureValue, FeatureVector, TrackRecord},
};

/// Vectorizes a track against a frozen category map
///
/// Used at query time: a categorical value that was not seen when the
/// matrix was built fails with `UnknownCategory` instead of getting a new code.
pub fn vectorize(
    track: &TrackRecord,
    columns: &[FeatureColumn],
    categories: &CategoryMap,
) -> AppResult<FeatureVector> {
    columns
        .iter()
        .map(|column| match column.value(track) {
            FeatureValue::Numeric(value) => Ok(value),
            FeatureValue::Categorical(value) => categories
                .code(*column, value)
                .map(f64::from)
                .ok_or_else(|| AppError::UnknownCategory {
                    column: column.name().to_string(),
                    value: value.to_string(),
                }),
        })
        .collect()
}

/// Vectorizes a track during a matrix build, assigning codes to unseen categories
pub fn vectorize_assigning(
    track: &TrackRecord,
    columns: &[FeatureColumn],
    categories: &mut CategoryMap,
) -> FeatureVector {
    columns
        .iter()
        .map(|column| match column.value(track) {
            FeatureValue::Numeric(value) => value,
            FeatureValue::Categorical(value) => f64::from(categories.code_or_insert(*column, value)),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn track(id: i64, tempo: f64, decade: &str) -> TrackRecord {
        TrackRecord {
            id,
            track: format!("Track {}", id),
            artist: "tester".to_string(),
            danceability: 0.5,
            key: 2,
            instrumentalness: 0.1,
            tempo,
            duration_ms: 200_000,
            popularity: 40,
            decade: decade.to_string(),
        }
    }

    #[test]
    fn test_vector_follows_column_order() {
        let track = track(1, 120.0, "70s");
        let mut categories = CategoryMap::new();

        let vector = vectorize_assigning(
            &track,
            &[FeatureColumn::Tempo, FeatureColumn::Key, FeatureColumn::DurationMs],
            &mut categories,
        );

        assert_eq!(vector, vec![120.0, 2.0, 200_000.0]);
        assert!(categories.is_empty());
    }

    #[test]
    fn test_build_assigns_codes_in_first_seen_order() {
        let columns = [FeatureColumn::Decade];
        let mut categories = CategoryMap::new();

        let codes: Vec<f64> = [track(1, 1.0, "80s"), track(2, 1.0, "60s"), track(3, 1.0, "80s")]
            .iter()
            .map(|t| vectorize_assigning(t, &columns, &mut categories)[0])
            .collect();

        assert_eq!(codes, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_query_reuses_build_codes() {
        let columns = [FeatureColumn::Tempo, FeatureColumn::Decade];
        let mut categories = CategoryMap::new();
        vectorize_assigning(&track(1, 100.0, "70s"), &columns, &mut categories);
        vectorize_assigning(&track(2, 100.0, "90s"), &columns, &mut categories);

        let vector = vectorize(&track(3, 90.0, "90s"), &columns, &categories).unwrap();
        assert_eq!(vector, vec![90.0, 1.0]);
    }

    #[test]
    fn test_query_rejects_unseen_category() {
        let columns = [FeatureColumn::Decade];
        let mut categories = CategoryMap::new();
        vectorize_assigning(&track(1, 100.0, "70s"), &columns, &mut categories);

        let result = vectorize(&track(2, 100.0, "20s"), &columns, &categories);

        match result {
            Err(AppError::UnknownCategory { column, value }) => {
                assert_eq!(column, "decade");
                assert_eq!(value, "20s");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
        // The frozen map is never extended by queries
        assert_eq!(categories.len(FeatureColumn::Decade), 1);
    }
}
