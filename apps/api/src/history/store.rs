use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::history::timeline::{Cursor, Timeline};
use crate::models::history::VersionEntry;

pub type VersionTimeline = Timeline<VersionEntry>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history cursor moved (expected {expected}, found {actual})")]
    Conflict { expected: i64, actual: i64 },

    #[error("cursor {0} is out of range")]
    InvalidCursor(i64),

    #[error("stored history is inconsistent: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for per-user timelines. Writes carry the cursor the caller
/// last observed and are rejected with [`StoreError::Conflict`] when it moved.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<VersionTimeline, StoreError>;

    /// Truncates after `expected`, appends `entry`, and moves the cursor to it.
    async fn append(
        &self,
        user_id: Uuid,
        expected: Cursor,
        entry: VersionEntry,
    ) -> Result<Cursor, StoreError>;

    async fn set_cursor(&self, user_id: Uuid, expected: Cursor, new: Cursor) -> Result<(), StoreError>;
}

fn check_expected(expected: Cursor, actual: Cursor) -> Result<(), StoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            expected: expected.to_i64(),
            actual: actual.to_i64(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryHistoryStore {
    timelines: RwLock<HashMap<Uuid, VersionTimeline>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load(&self, user_id: Uuid) -> Result<VersionTimeline, StoreError> {
        Ok(self
            .timelines
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(
        &self,
        user_id: Uuid,
        expected: Cursor,
        entry: VersionEntry,
    ) -> Result<Cursor, StoreError> {
        let mut timelines = self.timelines.write().await;
        let timeline = timelines.entry(user_id).or_default();
        check_expected(expected, timeline.cursor())?;
        Ok(timeline.commit(entry))
    }

    async fn set_cursor(&self, user_id: Uuid, expected: Cursor, new: Cursor) -> Result<(), StoreError> {
        let mut timelines = self.timelines.write().await;
        let timeline = timelines.entry(user_id).or_default();
        check_expected(expected, timeline.cursor())?;
        if timeline.seek(new) {
            Ok(())
        } else {
            Err(StoreError::InvalidCursor(new.to_i64()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

/// Versions as JSONB rows ordered by `position`, plus one cursor row per user.
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revision_versions (
                id          UUID PRIMARY KEY,
                user_id     UUID NOT NULL,
                position    INTEGER NOT NULL,
                entry       JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (user_id, position)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revision_cursors (
                user_id  UUID PRIMARY KEY,
                cursor   INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("History schema ready");
        Ok(())
    }

    async fn stored_cursor<'e, E>(executor: E, user_id: Uuid, lock: bool) -> Result<Cursor, StoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = if lock {
            "SELECT cursor FROM revision_cursors WHERE user_id = $1 FOR UPDATE"
        } else {
            "SELECT cursor FROM revision_cursors WHERE user_id = $1"
        };
        let raw: Option<i32> = sqlx::query_scalar(sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await?;
        let raw = i64::from(raw.unwrap_or(-1));
        Cursor::from_i64(raw).ok_or_else(|| StoreError::Corrupt(format!("cursor {raw}")))
    }
}

fn cursor_to_db(cursor: Cursor) -> i32 {
    cursor.to_i64() as i32
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn load(&self, user_id: Uuid) -> Result<VersionTimeline, StoreError> {
        let cursor = Self::stored_cursor(&self.pool, user_id, false).await?;
        let rows: Vec<Json<VersionEntry>> = sqlx::query_scalar(
            "SELECT entry FROM revision_versions WHERE user_id = $1 ORDER BY position ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let versions = rows.into_iter().map(|Json(entry)| entry).collect::<Vec<_>>();
        let count = versions.len();
        Timeline::from_parts(versions, cursor).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "cursor {} with {count} versions for user {user_id}",
                cursor.to_i64()
            ))
        })
    }

    async fn append(
        &self,
        user_id: Uuid,
        expected: Cursor,
        entry: VersionEntry,
    ) -> Result<Cursor, StoreError> {
        let mut tx = self.pool.begin().await?;

        let actual = Self::stored_cursor(&mut *tx, user_id, true).await?;
        check_expected(expected, actual)?;

        let position = cursor_to_db(expected) + 1;
        sqlx::query("DELETE FROM revision_versions WHERE user_id = $1 AND position >= $2")
            .bind(user_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO revision_versions (id, user_id, position, entry, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(user_id)
        .bind(position)
        .bind(Json(&entry))
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO revision_cursors (user_id, cursor) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET cursor = EXCLUDED.cursor
            "#,
        )
        .bind(user_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Cursor::At(position as usize))
    }

    async fn set_cursor(&self, user_id: Uuid, expected: Cursor, new: Cursor) -> Result<(), StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM revision_versions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        let valid = match new {
            Cursor::Empty => count == 0,
            Cursor::At(i) => (i as i64) < count,
        };
        if !valid {
            return Err(StoreError::InvalidCursor(new.to_i64()));
        }

        let updated = sqlx::query(
            "UPDATE revision_cursors SET cursor = $3 WHERE user_id = $1 AND cursor = $2",
        )
        .bind(user_id)
        .bind(cursor_to_db(expected))
        .bind(cursor_to_db(new))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let actual = Self::stored_cursor(&self.pool, user_id, false).await?;
            return Err(StoreError::Conflict {
                expected: expected.to_i64(),
                actual: actual.to_i64(),
            });
        }
        Ok(())
    }
}
