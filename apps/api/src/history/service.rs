use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::history::store::{HistoryStore, StoreError};
use crate::history::timeline::{Cursor, HistoryBoundary};
use crate::keyed_lock::KeyedLocks;
use crate::models::history::{VersionEntry, VersionSummary};

/// Result of an undo or redo. At either end of the timeline `entry` is empty
/// and `boundary` says why; this is not an error.
#[derive(Debug, Clone, Serialize)]
pub struct Navigation {
    pub cursor: Cursor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<VersionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<HistoryBoundary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryListing {
    pub cursor: Cursor,
    pub versions: Vec<VersionSummary>,
}

/// Serializes every mutation per user and persists through a [`HistoryStore`].
pub struct HistoryService {
    store: Arc<dyn HistoryStore>,
    locks: KeyedLocks,
}

#[derive(Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

impl HistoryService {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Appends `entry` after the current cursor, discarding any redo branch.
    pub async fn commit(&self, entry: VersionEntry) -> Result<Cursor, StoreError> {
        let guard = self.locks.acquire(&entry.user_id.to_string()).await;
        let result = self.commit_locked(entry).await;
        drop(guard);
        self.release_idle_locks().await;
        result
    }

    async fn commit_locked(&self, entry: VersionEntry) -> Result<Cursor, StoreError> {
        let user_id = entry.user_id;
        let entry_id = entry.id;
        let timeline = self.store.load(user_id).await?;
        let discarded = timeline.len().saturating_sub(match timeline.cursor() {
            Cursor::Empty => 0,
            Cursor::At(i) => i + 1,
        });
        let cursor = self.store.append(user_id, timeline.cursor(), entry).await?;

        info!(
            "Committed version {entry_id} for user {user_id} at cursor {} (discarded {discarded})",
            cursor.to_i64()
        );
        Ok(cursor)
    }

    pub async fn undo(&self, user_id: Uuid) -> Result<Navigation, StoreError> {
        self.navigate(user_id, Direction::Undo).await
    }

    pub async fn redo(&self, user_id: Uuid) -> Result<Navigation, StoreError> {
        self.navigate(user_id, Direction::Redo).await
    }

    async fn navigate(&self, user_id: Uuid, direction: Direction) -> Result<Navigation, StoreError> {
        let guard = self.locks.acquire(&user_id.to_string()).await;
        let result = self.navigate_locked(user_id, direction).await;
        drop(guard);
        self.release_idle_locks().await;
        result
    }

    /// Per-user locks live only while someone holds or waits on them.
    async fn release_idle_locks(&self) {
        let released = self.locks.prune().await;
        if released > 0 {
            debug!("Released {released} idle history locks");
        }
    }

    async fn navigate_locked(
        &self,
        user_id: Uuid,
        direction: Direction,
    ) -> Result<Navigation, StoreError> {
        let mut timeline = self.store.load(user_id).await?;
        let from = timeline.cursor();

        let moved = match direction {
            Direction::Undo => timeline.undo().cloned(),
            Direction::Redo => timeline.redo().cloned(),
        };

        match moved {
            Ok(entry) => {
                let to = timeline.cursor();
                self.store.set_cursor(user_id, from, to).await?;
                debug!(
                    "History cursor for user {user_id}: {} -> {}",
                    from.to_i64(),
                    to.to_i64()
                );
                Ok(Navigation {
                    cursor: to,
                    entry: Some(entry),
                    boundary: None,
                })
            }
            Err(boundary) => Ok(Navigation {
                cursor: from,
                entry: None,
                boundary: Some(boundary),
            }),
        }
    }

    pub async fn cursor(&self, user_id: Uuid) -> Result<Cursor, StoreError> {
        Ok(self.store.load(user_id).await?.cursor())
    }

    pub async fn current(&self, user_id: Uuid) -> Result<Option<VersionEntry>, StoreError> {
        Ok(self.store.load(user_id).await?.current().cloned())
    }

    pub async fn list(&self, user_id: Uuid) -> Result<HistoryListing, StoreError> {
        let timeline = self.store.load(user_id).await?;
        Ok(HistoryListing {
            cursor: timeline.cursor(),
            versions: timeline.versions().iter().map(VersionSummary::from).collect(),
        })
    }

    pub async fn get(&self, user_id: Uuid, version_id: Uuid) -> Result<Option<VersionEntry>, StoreError> {
        Ok(self
            .store
            .load(user_id)
            .await?
            .versions()
            .iter()
            .find(|v| v.id == version_id)
            .cloned())
    }
}
