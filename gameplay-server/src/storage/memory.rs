//! In-process attribute store. Nothing survives the process; tests use it
//! where LMDB files would only get in the way.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use gameplay_core::attributes::AttributeId;
use gameplay_core::persistence::{AttributeRecord, CharacterAttributeSnapshot};
use gameplay_core::CharacterId;

use super::repository::*;

#[derive(Default)]
pub struct MemoryAttributeRepo {
    rows: RwLock<BTreeMap<(CharacterId, AttributeId), StoredRow>>,
}

impl MemoryAttributeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored row including soft-deleted ones
    pub fn raw_row(&self, character_id: CharacterId, template_id: AttributeId) -> Option<StoredRow> {
        self.rows.read().get(&(character_id, template_id)).copied()
    }
}

#[async_trait]
impl CharacterAttributeRepo for MemoryAttributeRepo {
    async fn load(&self, character_id: CharacterId) -> RepoResult<Vec<AttributeRecord>> {
        let rows = self.rows.read();
        Ok(rows
            .range((character_id, AttributeId::MIN)..=(character_id, AttributeId::MAX))
            .filter(|(_, row)| row.active)
            .map(|(_, row)| row.record)
            .collect())
    }

    async fn save(&self, snapshot: &CharacterAttributeSnapshot) -> RepoResult<SaveSummary> {
        let mut summary = SaveSummary::default();
        let mut rows = self.rows.write();
        for record in &snapshot.records {
            let key = (snapshot.character_id, record.template_id);
            let change = diff_row(rows.get(&key), record);
            if change != RowChange::Unchanged {
                rows.insert(key, StoredRow::active(*record));
            }
            summary.record(change);
        }
        Ok(summary)
    }

    async fn delete(&self, character_id: CharacterId, keep_data: bool) -> RepoResult<usize> {
        let mut rows = self.rows.write();
        let range = (character_id, AttributeId::MIN)..=(character_id, AttributeId::MAX);
        if keep_data {
            let mut affected = 0;
            for (_, row) in rows.range_mut(range).filter(|(_, row)| row.active) {
                row.active = false;
                affected += 1;
            }
            return Ok(affected);
        }
        let keys: Vec<_> = rows.range(range).map(|(key, _)| *key).collect();
        for key in &keys {
            rows.remove(key);
        }
        Ok(keys.len())
    }

    async fn count(&self) -> RepoResult<usize> {
        Ok(self.rows.read().values().filter(|row| row.active).count())
    }
}
