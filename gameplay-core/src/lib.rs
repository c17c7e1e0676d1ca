//! Gameplay Core Library
//!
//! Server-authoritative gameplay simulation:
//! - Attributes and resource pools (health, mana, ...)
//! - Template catalog loaded from RON
//! - Abilities composed from events, with casting and cooldowns
//! - Spawned ability objects (projectiles, areas) and hit resolution
//! - Timed buffs with periodic effects and stacking
//! - Attribute save records for the storage layer
//! - Fixed-step Bevy plugin driving the simulation

pub mod abilities;
pub mod attributes;
pub mod buffs;
pub mod catalog;
pub mod character;
pub mod constants;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod simulation;

pub use catalog::TemplateCatalog;
pub use character::{Character, CharacterId};
pub use error::{GameplayError, GameplayResult};
pub use simulation::{Simulation, SimulationConfig};
