use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{NewTrack, TrackField, TrackId, TrackListQuery, TrackPage, TrackRecord},
};

/// Tracks returned per listing page
pub const PAGE_SIZE: u32 = 10;

const SELECT_TRACKS: &str = r#"SELECT id, track, artist, danceability, "key", instrumentalness, tempo, duration_ms, popularity, decade FROM tracks"#;

const INSERT_TRACK: &str = r#"INSERT INTO tracks (track, artist, danceability, "key", instrumentalness, tempo, duration_ms, popularity, decade) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#;

const RETURNING_TRACK: &str = r#" RETURNING id, track, artist, danceability, "key", instrumentalness, tempo, duration_ms, popularity, decade"#;

/// Read access to track records needed by the recommendation engine
///
/// Implementations must return `list_all` in ascending id order so category
/// codes are assigned deterministically.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TrackStore: Send + Sync {
    /// Returns every stored track, ordered by ascending id
    async fn list_all(&self) -> AppResult<Vec<TrackRecord>>;

    /// Returns a single track or `NotFound`
    async fn get_by_id(&self, id: TrackId) -> AppResult<TrackRecord>;
}

/// Track persistence backed by SQLite
#[derive(Clone)]
pub struct SqliteTrackStore {
    pool: SqlitePool,
}

impl SqliteTrackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a track and returns it with its assigned id
    pub async fn create(&self, track: &NewTrack) -> AppResult<TrackRecord> {
        track.validate()?;

        let sql = format!("{}{}", INSERT_TRACK, RETURNING_TRACK);
        let created = bind_new_track(sqlx::query_as::<_, TrackRecord>(&sql), track)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(track_id = created.id, "Track created");
        Ok(created)
    }

    /// Replaces all attributes of an existing track
    pub async fn update(&self, id: TrackId, track: &NewTrack) -> AppResult<TrackRecord> {
        track.validate()?;

        let sql = format!(
            r#"UPDATE tracks SET track = ?, artist = ?, danceability = ?, "key" = ?, instrumentalness = ?, tempo = ?, duration_ms = ?, popularity = ?, decade = ? WHERE id = ?{}"#,
            RETURNING_TRACK
        );
        let updated = bind_new_track(sqlx::query_as::<_, TrackRecord>(&sql), track)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::debug!(track_id = id, "Track updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: TrackId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }

        tracing::debug!(track_id = id, "Track deleted");
        Ok(())
    }

    /// Returns one page of tracks matching the filter, in the requested order
    pub async fn list_page(&self, query: &TrackListQuery) -> AppResult<TrackPage> {
        if query.page == 0 {
            return Err(AppError::InvalidInput("Page numbers start at 1".to_string()));
        }

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tracks");
        push_filter(&mut count_query, query)?;
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut items_query = QueryBuilder::<Sqlite>::new(SELECT_TRACKS);
        push_filter(&mut items_query, query)?;
        items_query.push(format!(
            r#" ORDER BY "{}" {}, id ASC LIMIT "#,
            query.sort_field.column(),
            query.sort_order.as_sql()
        ));
        items_query.push_bind(PAGE_SIZE as i64);
        items_query.push(" OFFSET ");
        items_query.push_bind((query.page as i64 - 1) * PAGE_SIZE as i64);

        let items = items_query
            .build_query_as::<TrackRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(TrackPage::new(items, query.page, PAGE_SIZE, total.max(0) as u64))
    }

    pub async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }

    /// Inserts many tracks in a single transaction
    pub async fn insert_many(&self, tracks: &[NewTrack]) -> AppResult<u64> {
        for track in tracks {
            track.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let inserted = insert_all(&mut tx, tracks).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    /// Swaps the whole table for `tracks` in a single transaction
    ///
    /// Returns the number of deleted and inserted tracks. On any failure the
    /// previous contents are kept.
    pub async fn replace_all(&self, tracks: &[NewTrack]) -> AppResult<(u64, u64)> {
        for track in tracks {
            track.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM tracks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let inserted = insert_all(&mut tx, tracks).await?;
        tx.commit().await?;

        Ok((removed, inserted))
    }

}

#[async_trait::async_trait]
impl TrackStore for SqliteTrackStore {
    async fn list_all(&self) -> AppResult<Vec<TrackRecord>> {
        let sql = format!("{} ORDER BY id ASC", SELECT_TRACKS);
        let tracks = sqlx::query_as::<_, TrackRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(tracks)
    }

    async fn get_by_id(&self, id: TrackId) -> AppResult<TrackRecord> {
        let sql = format!("{} WHERE id = ?", SELECT_TRACKS);
        sqlx::query_as::<_, TrackRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }
}

async fn insert_all(tx: &mut Transaction<'_, Sqlite>, tracks: &[NewTrack]) -> AppResult<u64> {
    let sql = format!("{}{}", INSERT_TRACK, RETURNING_TRACK);
    for track in tracks {
        bind_new_track(sqlx::query_as::<_, TrackRecord>(&sql), track)
            .fetch_one(&mut **tx)
            .await?;
    }
    Ok(tracks.len() as u64)
}

fn not_found(id: TrackId) -> AppError {
    AppError::NotFound(format!("Track {} does not exist", id))
}

/// Binds the nine attribute placeholders, in table column order
fn bind_new_track<'q, O>(
    query: sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    track: &NewTrack,
) -> sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(track.track.clone())
        .bind(track.artist.clone())
        .bind(track.danceability)
        .bind(track.key)
        .bind(track.instrumentalness)
        .bind(track.tempo)
        .bind(track.duration_ms)
        .bind(track.popularity)
        .bind(track.decade.clone())
}

/// Appends the optional `WHERE` clause of a listing
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, query: &TrackListQuery) -> AppResult<()> {
    let Some((field, value)) = &query.filter else {
        return Ok(());
    };

    builder.push(format!(r#" WHERE "{}""#, field.column()));

    if field.supports_like() {
        builder.push(" LIKE ");
        builder.push_bind(value.clone());
    } else if field.is_numeric() {
        let number: f64 = value.trim().parse().map_err(|_| {
            AppError::InvalidInput(format!("Filter value {} is not a number", value))
        })?;
        builder.push(" = ");
        builder.push_bind(number);
    } else {
        builder.push(" = ");
        builder.push_bind(value.clone());
    }

    Ok(())
}
