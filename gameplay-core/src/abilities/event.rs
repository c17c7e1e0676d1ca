//! Composable ability events.
//!
//! Events are catalog entries shared between ability instances. Each one
//! carries stat deltas, cost and requirement contributions, and exactly one
//! behavior. Behaviors are closed enums so the catalog can be loaded from
//! data and validated up front.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::objects::{AbilityObject, ObjectState};
use super::spawn::SpawnContext;
use super::{AbilityStats, ResourceMap};
use crate::attributes::AttributeId;
use crate::buffs::{BuffApplication, BuffTemplateId};
use crate::catalog::TemplateCatalog;
use crate::character::{Character, CharacterId};
use crate::constants::DEFAULT_HIT_COST;
use crate::error::{GameplayError, GameplayResult};

pub type EventId = u32;

/// Which pass of the spawn pipeline a spawn event runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnPhase {
    /// Adjusts the prototype before any object is emitted
    PreSpawn,
    /// Emits objects into the container
    Spawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpawnBehavior {
    /// One object at the spawn origin
    Single,
    /// `count` objects fanned across `arc_degrees` around the vertical axis
    Spread { count: u32, arc_degrees: f32 },
    /// `count` objects on a horizontal circle, moving outward
    Ring { count: u32, radius: f32 },
    /// Shift the prototype (pre-spawn) along the caster's facing and up
    Offset { forward: f32, up: f32 },
}

/// Per-step motion. `Linear` integrates position; `Gravity` only bends velocity,
/// so a falling projectile carries both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveBehavior {
    Linear,
    Gravity { acceleration: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HitEffect {
    Damage { attribute: AttributeId, amount: i32 },
    Heal { attribute: AttributeId, amount: i32 },
    ApplyBuff { buff: BuffTemplateId },
}

fn default_hit_cost() -> i32 {
    DEFAULT_HIT_COST
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityEventKind {
    Spawn {
        phase: SpawnPhase,
        behavior: SpawnBehavior,
    },
    Move(MoveBehavior),
    Hit {
        effect: HitEffect,
        /// Deducted from the object's hit budget per landed hit
        #[serde(default = "default_hit_cost")]
        hit_cost: i32,
    },
    /// Contributes stats and costs only
    Passive,
}

/// Result of one hit event landing on a character
#[derive(Debug, Clone, PartialEq)]
pub enum HitApplication {
    Damaged {
        target: CharacterId,
        attribute: AttributeId,
        amount: i32,
    },
    Healed {
        target: CharacterId,
        attribute: AttributeId,
        amount: i32,
    },
    BuffApplied {
        target: CharacterId,
        buff: BuffTemplateId,
        application: BuffApplication,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityEvent {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: AbilityStats,
    #[serde(default)]
    pub resources: ResourceMap,
    #[serde(default)]
    pub requirements: ResourceMap,
    pub kind: AbilityEventKind,
}

impl AbilityEvent {
    pub fn spawn_phase(&self) -> Option<SpawnPhase> {
        match &self.kind {
            AbilityEventKind::Spawn { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self.kind, AbilityEventKind::Move(_))
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.kind, AbilityEventKind::Hit { .. })
    }

    /// Run a spawn behavior against the in-progress container.
    ///
    /// Pre-spawn behaviors only touch the prototype; spawn behaviors push
    /// copies of it into `ctx.objects`, numbering them from `ctx.next_id`.
    pub fn invoke_spawn(&self, ctx: &mut SpawnContext<'_>) {
        let AbilityEventKind::Spawn { behavior, .. } = &self.kind else {
            return;
        };
        match behavior {
            SpawnBehavior::Single => {
                let object = ctx.prototype.clone();
                ctx.emit(object);
            }
            SpawnBehavior::Spread { count, arc_degrees } => {
                let count = (*count).max(1);
                let arc = arc_degrees.to_radians();
                let step = if count > 1 { arc / (count - 1) as f32 } else { 0.0 };
                let start = if count > 1 { -arc / 2.0 } else { 0.0 };
                for i in 0..count {
                    let rotation = Quat::from_rotation_y(start + step * i as f32);
                    let mut object = ctx.prototype.clone();
                    object.velocity = rotation * object.velocity;
                    ctx.emit(object);
                }
            }
            SpawnBehavior::Ring { count, radius } => {
                let count = (*count).max(1);
                let speed = ctx.prototype.velocity.length();
                for i in 0..count {
                    let angle = std::f32::consts::TAU * i as f32 / count as f32;
                    let outward = Vec3::new(angle.cos(), 0.0, angle.sin());
                    let mut object = ctx.prototype.clone();
                    object.position += outward * *radius;
                    object.velocity = outward * speed;
                    ctx.emit(object);
                }
            }
            SpawnBehavior::Offset { forward, up } => {
                let facing = ctx.caster.facing.normalize_or_zero();
                ctx.prototype.position += facing * *forward + Vec3::Y * *up;
            }
        }
    }

    /// Advance one object by `dt` seconds
    pub fn invoke_move(&self, object: &mut AbilityObject, dt: f32) {
        let AbilityEventKind::Move(behavior) = &self.kind else {
            return;
        };
        if object.state != ObjectState::Active {
            return;
        }
        match behavior {
            MoveBehavior::Linear => object.position += object.velocity * dt,
            MoveBehavior::Gravity { acceleration } => object.velocity.y -= acceleration * dt,
        }
    }

    /// Fail if `invoke_hit` could error for this event: a negative amount
    /// or a buff missing from the catalog.
    pub fn check_hit(&self, catalog: &TemplateCatalog) -> GameplayResult<()> {
        let AbilityEventKind::Hit { effect, .. } = &self.kind else {
            return Ok(());
        };
        match effect {
            HitEffect::Damage { amount, .. } | HitEffect::Heal { amount, .. } if *amount < 0 => {
                Err(GameplayError::InvalidArgument(format!(
                    "hit event {} has negative amount {amount}",
                    self.id
                )))
            }
            HitEffect::ApplyBuff { buff } => catalog.buff(*buff).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Apply a hit behavior to the character that was struck.
    ///
    /// Returns the hit-count deduction and what was applied. A collision
    /// with no character deducts nothing.
    pub fn invoke_hit(
        &self,
        target: Option<&mut Character>,
        catalog: &TemplateCatalog,
    ) -> GameplayResult<(i32, Option<HitApplication>)> {
        let AbilityEventKind::Hit { effect, hit_cost } = &self.kind else {
            return Ok((0, None));
        };
        let Some(target) = target else {
            return Ok((0, None));
        };
        let application = match effect {
            HitEffect::Damage { attribute, amount } => {
                let applied = match target.attributes.resource_mut(*attribute) {
                    Some(pool) => pool.consume(*amount)?,
                    None => 0,
                };
                HitApplication::Damaged {
                    target: target.id,
                    attribute: *attribute,
                    amount: applied,
                }
            }
            HitEffect::Heal { attribute, amount } => {
                let applied = match target.attributes.resource_mut(*attribute) {
                    Some(pool) => pool.restore(*amount)?,
                    None => 0,
                };
                HitApplication::Healed {
                    target: target.id,
                    attribute: *attribute,
                    amount: applied,
                }
            }
            HitEffect::ApplyBuff { buff } => {
                let template = catalog.buff(*buff)?.clone();
                let application = target.buffs.apply(template, &mut target.attributes);
                HitApplication::BuffApplied {
                    target: target.id,
                    buff: *buff,
                    application,
                }
            }
        };
        Ok((*hit_cost, Some(application)))
    }
}
