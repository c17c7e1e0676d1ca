//! Immutable ability definitions loaded from the catalog.

use serde::{Deserialize, Serialize};

use super::event::EventId;
use super::{AbilityStats, ResourceMap};

pub type AbilityTemplateId = u32;

/// Where the objects of an ability appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnTarget {
    /// At the caster's position, along the caster's facing
    Caster,
    /// At the caster's hand (casting socket)
    Hand,
    /// At the hit position, or the target's position when no hit point exists
    Target,
}

fn default_hit_count() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityTemplate {
    pub id: AbilityTemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: AbilityStats,
    /// Resource costs consumed on activation
    #[serde(default)]
    pub resources: ResourceMap,
    /// Minimum current values the caster must hold
    #[serde(default)]
    pub requirements: ResourceMap,
    /// `None` for abilities that spawn no objects
    #[serde(default)]
    pub spawn_target: Option<SpawnTarget>,
    /// Hits each spawned object may land before it is destroyed
    #[serde(default = "default_hit_count")]
    pub hit_count: i32,
    #[serde(default)]
    pub requires_target: bool,
    /// Events attached to every instance of this template when learned
    #[serde(default)]
    pub events: Vec<EventId>,
}

impl AbilityTemplate {
    pub fn spawns_objects(&self) -> bool {
        self.spawn_target.is_some()
    }

    pub fn total_resource_cost(&self) -> i32 {
        self.resources.values().sum()
    }
}
