use chrono::Utc;
use std::time::Instant;

use crate::{
    db::TrackStore,
    error::{AppError, AppResult},
    models::{
        CategoryMap, ColumnStats, FeatureColumn, FeatureMatrix, FeatureVector, TrackRecord,
        MATRIX_FORMAT_VERSION,
    },
    services::vectorizer::vectorize_assigning,
};

/// Builds a normalized feature matrix from every track in the store
///
/// Performs a full scan, which is fine for the corpus sizes this service
/// targets. Fails with `EmptyStore` when there is nothing to index.
pub async fn build_matrix(
    store: &dyn TrackStore,
    columns: &[FeatureColumn],
) -> AppResult<FeatureMatrix> {
    let start = Instant::now();

    let tracks = store.list_all().await?;
    tracing::info!(
        track_count = tracks.len(),
        columns = ?columns,
        "Building feature matrix"
    );

    let matrix = assemble_matrix(tracks, columns)?;

    tracing::info!(
        rows = matrix.row_count(),
        processing_time_ms = start.elapsed().as_millis(),
        "Feature matrix built"
    );

    Ok(matrix)
}

/// Vectorizes and normalizes a set of tracks
///
/// Tracks are processed in ascending id order so category codes are
/// deterministic regardless of the order the store returned them in.
pub fn assemble_matrix(
    mut tracks: Vec<TrackRecord>,
    columns: &[FeatureColumn],
) -> AppResult<FeatureMatrix> {
    if tracks.is_empty() {
        return Err(AppError::EmptyStore);
    }
    if columns.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one feature column is required".to_string(),
        ));
    }

    tracks.sort_by_key(|track| track.id);

    let mut categories = CategoryMap::new();
    let mut ids = Vec::with_capacity(tracks.len());
    let mut rows = Vec::with_capacity(tracks.len());
    for track in &tracks {
        ids.push(track.id);
        rows.push(vectorize_assigning(track, columns, &mut categories));
    }

    if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(AppError::Internal(format!(
            "Track store returned id {} more than once",
            pair[0]
        )));
    }

    let stats = column_stats(&rows, columns.len());
    for (index, column_stats) in stats.iter().enumerate() {
        if column_stats.std == 0.0 {
            tracing::debug!(column = %columns[index], "Constant feature column normalizes to zero");
        }
    }
    normalize_rows(&mut rows, &stats);

    // Non-finite values would serialize as null and poison the artifact
    for (index, column_stats) in stats.iter().enumerate() {
        if !column_stats.mean.is_finite() || !column_stats.std.is_finite() {
            return Err(AppError::Internal(format!(
                "Feature column {} overflows, cannot normalize",
                columns[index]
            )));
        }
    }
    if let Some((row, _)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.iter().any(|value| !value.is_finite()))
    {
        return Err(AppError::Internal(format!(
            "Track {} has a feature value that cannot be normalized",
            ids[row]
        )));
    }

    Ok(FeatureMatrix {
        format_version: MATRIX_FORMAT_VERSION,
        columns: columns.to_vec(),
        ids,
        rows,
        stats,
        categories,
        built_at: Utc::now(),
    })
}

/// Per-column mean and population standard deviation
fn column_stats(rows: &[FeatureVector], column_count: usize) -> Vec<ColumnStats> {
    let n = rows.len() as f64;

    (0..column_count)
        .map(|column| {
            let mean = rows.iter().map(|row| row[column]).sum::<f64>() / n;
            let variance = rows
                .iter()
                .map(|row| {
                    let delta = row[column] - mean;
                    delta * delta
                })
                .sum::<f64>()
                / n;
            ColumnStats {
                mean,
                std: variance.sqrt(),
            }
        })
        .collect()
}

/// Applies z-score normalization in place
pub(crate) fn normalize_rows(rows: &mut [FeatureVector], stats: &[ColumnStats]) {
    for row in rows.iter_mut() {
        normalize_vector(row, stats);
    }
}

/// Normalizes one vector with frozen column statistics
pub(crate) fn normalize_vector(vector: &mut [f64], stats: &[ColumnStats]) {
    for (value, column_stats) in vector.iter_mut().zip(stats) {
        *value = column_stats.normalize(*value);
    }
}
