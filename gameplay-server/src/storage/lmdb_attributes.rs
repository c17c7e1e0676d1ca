//! LMDB attribute store.
//!
//! One database, one row per `(character_id, template_id)`. Keys are the
//! two IDs big-endian, so a character's rows are contiguous and a prefix
//! scan over the 8-byte character ID reads them in template order. Values
//! are bincode-encoded [`StoredRow`]s.
//!
//! ## Performance
//! - Load: one read transaction, one prefix scan
//! - Save: one write transaction per character snapshot

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use gameplay_core::attributes::AttributeId;
use gameplay_core::persistence::{AttributeRecord, CharacterAttributeSnapshot};
use gameplay_core::CharacterId;

use super::repository::*;

const KEY_LEN: usize = 12;

pub fn row_key(character_id: CharacterId, template_id: AttributeId) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..8].copy_from_slice(&character_id.to_be_bytes());
    key[8..].copy_from_slice(&template_id.to_be_bytes());
    key
}

fn character_prefix(character_id: CharacterId) -> [u8; 8] {
    character_id.to_be_bytes()
}

#[derive(Clone)]
pub struct LmdbAttributeStore {
    env: Arc<Env>,
    rows: Database<Bytes, Bytes>,
}

impl LmdbAttributeStore {
    /// Open or create the store. `max_size` must be a multiple of the page size.
    pub fn new<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size)
                .max_dbs(1)
                .open(path.as_ref())?
        };

        let mut wtxn = env.write_txn()?;
        let rows = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("attributes"))?;
        wtxn.commit()?;

        info!(
            "LMDB attribute store opened at {:?} ({}MB)",
            path.as_ref(),
            max_size / (1024 * 1024)
        );
        Ok(Self {
            env: Arc::new(env),
            rows,
        })
    }

    fn decode(character_id: CharacterId, bytes: &[u8]) -> Result<StoredRow, StorageError> {
        let row: StoredRow = bincode::deserialize(bytes)?;
        if row.record.character_id != character_id {
            return Err(StorageError::Corrupt {
                character_id,
                reason: format!("row belongs to character {}", row.record.character_id),
            });
        }
        Ok(row)
    }

    fn scan(&self, txn: &RoTxn, character_id: CharacterId) -> Result<Vec<StoredRow>, StorageError> {
        let prefix = character_prefix(character_id);
        let mut rows = Vec::new();
        for entry in self.rows.prefix_iter(txn, &prefix[..])? {
            let (_, bytes) = entry?;
            rows.push(Self::decode(character_id, bytes)?);
        }
        Ok(rows)
    }

    /// Stored row including soft-deleted ones
    pub fn get_row(
        &self,
        character_id: CharacterId,
        template_id: AttributeId,
    ) -> Result<Option<StoredRow>, StorageError> {
        let rtxn = self.env.read_txn()?;
        let key = row_key(character_id, template_id);
        match self.rows.get(&rtxn, &key[..])? {
            Some(bytes) => Ok(Some(Self::decode(character_id, bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_active(&self, character_id: CharacterId) -> Result<Vec<AttributeRecord>, StorageError> {
        let rtxn = self.env.read_txn()?;
        Ok(self
            .scan(&rtxn, character_id)?
            .into_iter()
            .filter(|row| row.active)
            .map(|row| row.record)
            .collect())
    }

    /// Diff and upsert in one write transaction. Nothing is committed if
    /// any row fails to encode.
    pub fn save_snapshot(&self, snapshot: &CharacterAttributeSnapshot) -> Result<SaveSummary, StorageError> {
        let mut summary = SaveSummary::default();
        let mut wtxn = self.env.write_txn()?;
        for record in &snapshot.records {
            let key = row_key(snapshot.character_id, record.template_id);
            let existing = match self.rows.get(&wtxn, &key[..])? {
                Some(bytes) => Some(Self::decode(snapshot.character_id, bytes)?),
                None => None,
            };
            let change = diff_row(existing.as_ref(), record);
            if change != RowChange::Unchanged {
                let bytes = bincode::serialize(&StoredRow::active(*record))?;
                self.rows.put(&mut wtxn, &key[..], &bytes)?;
            }
            summary.record(change);
        }
        wtxn.commit()?;
        debug!(
            character = snapshot.character_id,
            inserted = summary.inserted,
            updated = summary.updated,
            "LMDB attribute save"
        );
        Ok(summary)
    }

    pub fn delete_character(&self, character_id: CharacterId, keep_data: bool) -> Result<usize, StorageError> {
        let mut wtxn = self.env.write_txn()?;
        let rows = self.scan(&wtxn, character_id)?;
        let mut affected = 0;
        for row in rows {
            let key = row_key(character_id, row.record.template_id);
            if !keep_data {
                self.rows.delete(&mut wtxn, &key[..])?;
                affected += 1;
            } else if row.active {
                let bytes = bincode::serialize(&StoredRow {
                    active: false,
                    ..row
                })?;
                self.rows.put(&mut wtxn, &key[..], &bytes)?;
                affected += 1;
            }
        }
        wtxn.commit()?;
        debug!(character = character_id, keep_data, affected, "LMDB attribute delete");
        Ok(affected)
    }

    pub fn count_active(&self) -> Result<usize, StorageError> {
        let rtxn = self.env.read_txn()?;
        let mut count = 0;
        for entry in self.rows.iter(&rtxn)? {
            let (_, bytes) = entry?;
            let row: StoredRow = bincode::deserialize(bytes)?;
            if row.active {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Total rows, soft-deleted included
    pub fn len(&self) -> Result<usize, StorageError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.rows.len(&rtxn)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Explicit fsync
    pub fn sync(&self) -> Result<(), StorageError> {
        self.env.force_sync()?;
        Ok(())
    }
}

/// Repository adapter over [`LmdbAttributeStore`]
pub struct LmdbAttributeRepo {
    store: Arc<LmdbAttributeStore>,
}

impl LmdbAttributeRepo {
    pub fn new(store: Arc<LmdbAttributeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CharacterAttributeRepo for LmdbAttributeRepo {
    async fn load(&self, character_id: CharacterId) -> RepoResult<Vec<AttributeRecord>> {
        self.store.load_active(character_id)
    }

    async fn save(&self, snapshot: &CharacterAttributeSnapshot) -> RepoResult<SaveSummary> {
        self.store.save_snapshot(snapshot)
    }

    async fn delete(&self, character_id: CharacterId, keep_data: bool) -> RepoResult<usize> {
        self.store.delete_character(character_id, keep_data)
    }

    async fn count(&self) -> RepoResult<usize> {
        self.store.count_active()
    }
}
