//! Server configuration read from the environment.
//!
//! | Variable        | Default                           |
//! |-----------------|-----------------------------------|
//! | `CATALOG_PATH`  | `gameplay-core/data/catalog.ron`  |
//! | `SIM_CONFIG`    | unset (built-in simulation config)|
//! | `LMDB_PATH`     | `data/attributes`                 |
//! | `LMDB_MAX_SIZE` | 64 MiB, rounded up to page size   |
//! | `TICK_RATE`     | simulation default                |
//! | `RNG_SEED`      | simulation default                |
//! | `CHARACTERS`    | empty; `id[:name]` list, e.g. `1:Ayla,2` |

use bevy::prelude::Resource;
use std::path::PathBuf;

use gameplay_core::{CharacterId, SimulationConfig};

/// LMDB requires the map size to be a multiple of the OS page size
pub const LMDB_PAGE_SIZE: usize = 4096;

pub const DEFAULT_LMDB_MAX_SIZE: usize = 64 * 1024 * 1024;

/// A character restored (or created) at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: CharacterId,
    pub name: String,
}

impl RosterEntry {
    /// `id` or `id:name`. A missing name becomes `Character <id>`.
    pub fn parse(entry: &str) -> Option<Self> {
        let (id, name) = match entry.split_once(':') {
            Some((id, name)) => (id, name.trim()),
            None => (entry, ""),
        };
        let id: CharacterId = id.trim().parse().ok()?;
        let name = if name.is_empty() {
            format!("Character {id}")
        } else {
            name.to_string()
        };
        Some(Self { id, name })
    }
}

/// Comma-separated roster; malformed entries are skipped
pub fn parse_roster(list: &str) -> Vec<RosterEntry> {
    list.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(RosterEntry::parse)
        .collect()
}

#[derive(Debug, Clone, Resource)]
pub struct ServerConfig {
    pub catalog_path: PathBuf,
    pub simulation_config_path: Option<PathBuf>,
    pub lmdb_path: PathBuf,
    pub lmdb_max_size: usize,
    pub tick_rate: Option<u32>,
    pub rng_seed: Option<u64>,
    pub roster: Vec<RosterEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("gameplay-core/data/catalog.ron"),
            simulation_config_path: None,
            lmdb_path: PathBuf::from("data/attributes"),
            lmdb_max_size: DEFAULT_LMDB_MAX_SIZE,
            tick_rate: None,
            rng_seed: None,
            roster: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lmdb_max_size = lookup("LMDB_MAX_SIZE")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.lmdb_max_size);
        Self {
            catalog_path: lookup("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            simulation_config_path: lookup("SIM_CONFIG").map(PathBuf::from),
            lmdb_path: lookup("LMDB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.lmdb_path),
            lmdb_max_size: page_aligned(lmdb_max_size),
            tick_rate: lookup("TICK_RATE").and_then(|s| s.parse().ok()),
            rng_seed: lookup("RNG_SEED").and_then(|s| s.parse().ok()),
            roster: lookup("CHARACTERS")
                .map(|list| parse_roster(&list))
                .unwrap_or_default(),
        }
    }

    /// Apply environment overrides on top of a base simulation config
    pub fn simulation_config(&self, base: SimulationConfig) -> SimulationConfig {
        SimulationConfig {
            tick_rate: self.tick_rate.unwrap_or(base.tick_rate),
            rng_seed: self.rng_seed.unwrap_or(base.rng_seed),
            ..base
        }
    }
}

pub fn page_aligned(size: usize) -> usize {
    size.max(1).div_ceil(LMDB_PAGE_SIZE) * LMDB_PAGE_SIZE
}
