//! Gameplay Server Library
//!
//! Headless host for the gameplay simulation:
//! - Environment-driven server configuration
//! - Attribute persistence (LMDB and in-memory repositories)
//! - Bevy plugin handing per-tick save batches to an async writer

pub mod config;
pub mod storage;

pub use config::{RosterEntry, ServerConfig};
pub use storage::lmdb_attributes::{LmdbAttributeRepo, LmdbAttributeStore};
pub use storage::memory::MemoryAttributeRepo;
pub use storage::repository::{CharacterAttributeRepo, SaveSummary, StorageError};
