//! Per-user undo/redo state machine. All transitions are pure operations on
//! `(versions, cursor)`; persistence lives in [`crate::history::store`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Empty,
    At(usize),
}

impl Cursor {
    /// External form: the index, or `-1` for an empty timeline.
    pub fn to_i64(self) -> i64 {
        match self {
            Cursor::Empty => -1,
            Cursor::At(i) => i as i64,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Cursor::Empty),
            i if i >= 0 => Some(Cursor::At(i as usize)),
            _ => None,
        }
    }

    /// Number of entries kept when committing from this cursor.
    fn kept(self) -> usize {
        match self {
            Cursor::Empty => 0,
            Cursor::At(i) => i + 1,
        }
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_i64())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Cursor::from_i64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid history cursor {value}")))
    }
}

/// Benign outcome of undo/redo at either end of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBoundary {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline<T> {
    versions: Vec<T>,
    cursor: Cursor,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
            cursor: Cursor::Empty,
        }
    }
}

impl<T> Timeline<T> {
    /// Rebuilds a timeline from persisted parts. `None` when the cursor is
    /// out of range for `versions`.
    pub fn from_parts(versions: Vec<T>, cursor: Cursor) -> Option<Self> {
        let timeline = Self { versions, cursor };
        timeline.is_consistent().then_some(timeline)
    }

    pub fn versions(&self) -> &[T] {
        &self.versions
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn current(&self) -> Option<&T> {
        match self.cursor {
            Cursor::Empty => None,
            Cursor::At(i) => self.versions.get(i),
        }
    }

    /// `-1 ≤ cursor < len`, and the cursor is empty only for an empty timeline.
    pub fn is_consistent(&self) -> bool {
        match self.cursor {
            Cursor::Empty => self.versions.is_empty(),
            Cursor::At(i) => i < self.versions.len(),
        }
    }

    /// Discards any redo branch, appends `version`, and moves the cursor to it.
    pub fn commit(&mut self, version: T) -> Cursor {
        self.versions.truncate(self.cursor.kept());
        self.versions.push(version);
        self.cursor = Cursor::At(self.versions.len() - 1);
        self.cursor
    }

    /// Cursor that [`Timeline::undo`] would move to.
    pub fn undo_target(&self) -> Result<Cursor, HistoryBoundary> {
        match self.cursor {
            Cursor::At(i) if i > 0 => Ok(Cursor::At(i - 1)),
            _ => Err(HistoryBoundary::NothingToUndo),
        }
    }

    /// Cursor that [`Timeline::redo`] would move to.
    pub fn redo_target(&self) -> Result<Cursor, HistoryBoundary> {
        match self.cursor {
            Cursor::At(i) if i + 1 < self.versions.len() => Ok(Cursor::At(i + 1)),
            _ => Err(HistoryBoundary::NothingToRedo),
        }
    }

    pub fn undo(&mut self) -> Result<&T, HistoryBoundary> {
        self.cursor = self.undo_target()?;
        self.current().ok_or(HistoryBoundary::NothingToUndo)
    }

    pub fn redo(&mut self) -> Result<&T, HistoryBoundary> {
        self.cursor = self.redo_target()?;
        self.current().ok_or(HistoryBoundary::NothingToRedo)
    }

    /// Moves the cursor without touching versions. Returns false and leaves the
    /// timeline unchanged when `cursor` is out of range.
    pub fn seek(&mut self, cursor: Cursor) -> bool {
        let valid = match cursor {
            Cursor::Empty => self.versions.is_empty(),
            Cursor::At(i) => i < self.versions.len(),
        };
        if valid {
            self.cursor = cursor;
        }
        valid
    }
}
