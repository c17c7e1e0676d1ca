//! Storage Layer - attribute persistence for the gameplay server
//!
//! ## Architecture
//! ```text
//! [Simulation::drain_save_batch]  (FixedUpdate, per tick)
//!       ↓ PendingSaves
//! [PersistencePlugin]  → tokio channel →  [run_writer]
//!                                             ↓
//!                              [CharacterAttributeRepo]
//!                      ┌─────────────────┬────────────────────┐
//!                      │ LmdbAttributeRepo│ MemoryAttributeRepo│
//!                      └─────────────────┴────────────────────┘
//! ```

pub mod lmdb_attributes;
pub mod memory;
pub mod plugin;
pub mod repository;

use std::sync::Arc;
use tracing::info;

use gameplay_core::{Character, CharacterId, Simulation};

use self::lmdb_attributes::{LmdbAttributeRepo, LmdbAttributeStore};
use self::repository::{CharacterAttributeRepo, RepoResult};
use crate::config::{RosterEntry, ServerConfig};

/// Open the LMDB-backed repository described by `config`
pub fn open_repository(config: &ServerConfig) -> RepoResult<Arc<dyn CharacterAttributeRepo>> {
    let store = LmdbAttributeStore::new(&config.lmdb_path, config.lmdb_max_size)?;
    Ok(Arc::new(LmdbAttributeRepo::new(Arc::new(store))))
}

/// Load a character's stored attributes into the simulation.
///
/// A character with no stored rows starts from catalog defaults and is
/// left dirty, so the defaults are written with the next save batch.
pub async fn restore_character<'a>(
    repo: &dyn CharacterAttributeRepo,
    sim: &'a mut Simulation,
    character_id: CharacterId,
    name: &str,
) -> RepoResult<&'a mut Character> {
    let records = repo.load(character_id).await?;
    info!(character = character_id, rows = records.len(), "Restoring character");
    let character = sim.load_character(character_id, name, &records)?;
    if records.is_empty() {
        character.attributes.mark_dirty();
    }
    Ok(character)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterSummary {
    /// Characters found in storage
    pub restored: usize,
    /// Characters created from catalog defaults
    pub created: usize,
}

/// Restore every roster entry into the simulation, stopping at the first
/// storage error
pub async fn restore_roster(
    repo: &dyn CharacterAttributeRepo,
    sim: &mut Simulation,
    roster: &[RosterEntry],
) -> RepoResult<RosterSummary> {
    let mut summary = RosterSummary::default();
    for entry in roster {
        let character = restore_character(repo, sim, entry.id, &entry.name).await?;
        if character.attributes.is_dirty() {
            summary.created += 1;
        } else {
            summary.restored += 1;
        }
    }
    info!(
        restored = summary.restored,
        created = summary.created,
        "Roster loaded"
    );
    Ok(summary)
}
