//! Repository trait for character attribute rows.
//!
//! The simulation hands over one [`CharacterAttributeSnapshot`] per changed
//! character; backends diff it against what is stored and upsert only the
//! rows that changed, all in one transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gameplay_core::persistence::{AttributeRecord, CharacterAttributeSnapshot};
use gameplay_core::{CharacterId, GameplayError};

pub type RepoResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt row for character {character_id}: {reason}")]
    Corrupt {
        character_id: CharacterId,
        reason: String,
    },
    #[error("Gameplay error: {0}")]
    Gameplay(#[from] GameplayError),
    #[error("Persistence writer has shut down")]
    WriterClosed,
}

/// Stored form of a row. Soft-deleted rows keep their data with
/// `active = false` and are invisible to `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub record: AttributeRecord,
    pub active: bool,
}

impl StoredRow {
    pub fn active(record: AttributeRecord) -> Self {
        Self {
            record,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert,
    Update,
    Unchanged,
}

/// Classify one incoming record against the stored row
pub fn diff_row(existing: Option<&StoredRow>, record: &AttributeRecord) -> RowChange {
    match existing {
        None => RowChange::Insert,
        Some(row) if row.active && row.record == *record => RowChange::Unchanged,
        Some(_) => RowChange::Update,
    }
}

/// Row counts from committed saves, plus snapshots that failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Snapshots whose save errored (writer totals only)
    pub failed: usize,
}

impl SaveSummary {
    pub fn record(&mut self, change: RowChange) {
        match change {
            RowChange::Insert => self.inserted += 1,
            RowChange::Update => self.updated += 1,
            RowChange::Unchanged => self.unchanged += 1,
        }
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn merge(&mut self, other: SaveSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Persistence collaborator for character attributes
#[async_trait]
pub trait CharacterAttributeRepo: Send + Sync {
    /// Active rows for one character, ordered by template id
    async fn load(&self, character_id: CharacterId) -> RepoResult<Vec<AttributeRecord>>;

    /// Diff against stored rows and upsert what changed. Rows for the same
    /// character commit together or not at all.
    async fn save(&self, snapshot: &CharacterAttributeSnapshot) -> RepoResult<SaveSummary>;

    /// Soft delete (`keep_data = true`) marks rows inactive; otherwise rows
    /// are removed. Returns rows affected.
    async fn delete(&self, character_id: CharacterId, keep_data: bool) -> RepoResult<usize>;

    /// Number of active rows across all characters
    async fn count(&self) -> RepoResult<usize>;
}
