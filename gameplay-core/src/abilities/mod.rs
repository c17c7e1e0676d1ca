//! Abilities
//!
//! An ability is built from an immutable [`AbilityTemplate`] plus any number
//! of composable [`AbilityEvent`]s. Each event contributes stat deltas and
//! cost/requirement entries, and carries one behavior (spawn, move, hit).
//!
//! Activation flows through the caster's [`AbilityController`]:
//! requirements → resources → target → consume → spawn objects.
//! Spawned [`AbilityObject`]s live in the owning ability's [`ObjectTable`]
//! until their active time runs out or their hit budget is spent.

pub mod ability;
pub mod controller;
pub mod event;
pub mod objects;
pub mod spawn;
pub mod template;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{AddAssign, SubAssign};

use crate::attributes::AttributeId;

pub use ability::{Ability, RequirementRemoval, ResourceConversion};
pub use controller::{
    AbilityController, ActivationContext, ActivationOutcome, ActivationReport, CastState,
    ControllerTick, CooldownTracker,
};
pub use event::{
    AbilityEvent, AbilityEventKind, EventId, HitApplication, HitEffect, MoveBehavior,
    SpawnBehavior, SpawnPhase,
};
pub use objects::{AbilityObject, ContainerId, ObjectHandle, ObjectId, ObjectKey, ObjectState, ObjectTable};
pub use spawn::{speed_reduction, CasterInfo, SpawnContext, SpawnOutcome, TargetInfo};
pub use template::{AbilityTemplate, AbilityTemplateId, SpawnTarget};

/// Per-caster ability identifier
pub type AbilityId = u32;

/// attribute template → amount (costs and requirements)
pub type ResourceMap = BTreeMap<AttributeId, i32>;

/// Aggregated numeric stats of an ability, also used for event deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityStats {
    /// Cast time in seconds (0 = instant)
    pub activation_time: f32,
    /// Lifetime budget of spawned objects in seconds (0 = unlimited)
    pub active_time: f32,
    pub cooldown: f32,
    pub range: f32,
    pub speed: f32,
}

impl AddAssign for AbilityStats {
    fn add_assign(&mut self, rhs: Self) {
        self.activation_time += rhs.activation_time;
        self.active_time += rhs.active_time;
        self.cooldown += rhs.cooldown;
        self.range += rhs.range;
        self.speed += rhs.speed;
    }
}

impl SubAssign for AbilityStats {
    fn sub_assign(&mut self, rhs: Self) {
        self.activation_time -= rhs.activation_time;
        self.active_time -= rhs.active_time;
        self.cooldown -= rhs.cooldown;
        self.range -= rhs.range;
        self.speed -= rhs.speed;
    }
}

/// Add every entry of `contribution` into `totals` (create-if-absent).
///
/// Entries that land on zero are pruned so an add followed by the mirrored
/// subtract leaves `totals` exactly as it was.
pub fn merge_resources(totals: &mut ResourceMap, contribution: &ResourceMap) {
    for (&attribute, &amount) in contribution {
        adjust_entry(totals, attribute, amount);
    }
}

/// Mirror of [`merge_resources`]
pub fn subtract_resources(totals: &mut ResourceMap, contribution: &ResourceMap) {
    for (&attribute, &amount) in contribution {
        adjust_entry(totals, attribute, -amount);
    }
}

fn adjust_entry(totals: &mut ResourceMap, attribute: AttributeId, delta: i32) {
    let value = totals.entry(attribute).or_insert(0);
    *value += delta;
    if *value == 0 {
        totals.remove(&attribute);
    }
}
