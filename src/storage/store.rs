//! # Transcription Store
//!
//! The persistence gateway: create, list, point-lookup, and filename search
//! over transcription records. All ordering is newest-first with the record
//! id as tiebreaker so repeated reads return identical sequences.

use crate::error::AppResult;
use crate::storage::record::Transcription;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;

/// Gateway over the `transcriptions` table.
///
/// Cloning is cheap; the underlying pool is shared. Connection handling and
/// transactional guarantees come from the pool itself, nothing is layered
/// on top.
#[derive(Debug, Clone)]
pub struct TranscriptionStore {
    pool: SqlitePool,
}

impl TranscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the table and indexes if they do not exist yet.
    ///
    /// Runs unconditionally at startup; idempotent.
    pub async fn init_schema(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transcriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                unique_filename TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transcriptions_filename
             ON transcriptions (filename)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transcriptions_created_at
             ON transcriptions (created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new record and return it with its assigned id and timestamp.
    pub async fn create(
        &self,
        filename: &str,
        unique_filename: &str,
        text: &str,
    ) -> AppResult<Transcription> {
        let created_at = Utc::now();

        let record = sqlx::query_as::<_, Transcription>(
            "INSERT INTO transcriptions (filename, unique_filename, text, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, filename, unique_filename, text, created_at",
        )
        .bind(filename)
        .bind(unique_filename)
        .bind(text)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = record.id, filename = %record.filename, "Created transcription record");

        Ok(record)
    }

    /// All records, newest first.
    pub async fn list_all(&self) -> AppResult<Vec<Transcription>> {
        let records = sqlx::query_as::<_, Transcription>(
            "SELECT id, filename, unique_filename, text, created_at
             FROM transcriptions
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Point lookup by id. Absent is a valid result, not an error.
    pub async fn get_by_id(&self, id: i64) -> AppResult<Option<Transcription>> {
        let record = sqlx::query_as::<_, Transcription>(
            "SELECT id, filename, unique_filename, text, created_at
             FROM transcriptions
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Records whose filename contains `query`, newest first.
    ///
    /// Uses SQLite's LIKE collation (ASCII case-insensitive); `%` and `_`
    /// inside the query act as wildcards.
    pub async fn search(&self, query: &str) -> AppResult<Vec<Transcription>> {
        let records = sqlx::query_as::<_, Transcription>(
            "SELECT id, filename, unique_filename, text, created_at
             FROM transcriptions
             WHERE filename LIKE '%' || ?1 || '%'
             ORDER BY created_at DESC, id DESC",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> TranscriptionStore {
        let pool = crate::storage::connect("sqlite::memory:").await.unwrap();
        let store = TranscriptionStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let store = test_store().await;

        let record = store
            .create("clip.wav", "abc.wav", "hello world")
            .await
            .unwrap();

        assert!(record.id > 0);
        assert_eq!(record.filename, "clip.wav");
        assert_eq!(record.unique_filename, "abc.wav");
        assert_eq!(record.text, "hello world");
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = test_store().await;

        let first = store.create("a.wav", "1.wav", "").await.unwrap();
        let second = store.create("b.wav", "2.wav", "").await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let store = test_store().await;

        store.create("first.wav", "1.wav", "one").await.unwrap();
        store.create("second.wav", "2.wav", "two").await.unwrap();
        store.create("third.wav", "3.wav", "three").await.unwrap();

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].filename, "third.wav");
        assert_eq!(records[2].filename, "first.wav");

        for pair in records.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = test_store().await;

        let created = store.create("clip.wav", "x.wav", "text").await.unwrap();

        let found = store.get_by_id(created.id).await.unwrap();
        assert_eq!(found.unwrap().id, created.id);

        let missing = store.get_by_id(created.id + 1000).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_search_matches_filename_substring() {
        let store = test_store().await;

        store
            .create("meeting_notes.wav", "1.wav", "agenda")
            .await
            .unwrap();
        store.create("standup.mp3", "2.mp3", "updates").await.unwrap();

        let hits = store.search("meeting").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "meeting_notes.wav");

        let none = store.search("nonexistent").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_does_not_match_transcript_text() {
        let store = test_store().await;

        store.create("clip.wav", "1.wav", "agenda item").await.unwrap();

        let hits = store.search("agenda").await.unwrap();
        assert!(hits.is_empty());
    }
}
