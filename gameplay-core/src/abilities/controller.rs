//! Per-character ability bookkeeping: learned abilities, cooldowns, the
//! current cast and one queued activation.

use bevy::math::Vec3;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::ability::{Ability, ResourceConversion};
use super::objects::ObjectKey;
use super::spawn::{
    allocate_container_id, resolve_origin, run_spawn_pipeline, CasterInfo, SpawnOutcome,
    TargetInfo,
};
use super::AbilityId;
use crate::attributes::AttributeSet;
use crate::error::{GameplayError, GameplayResult};

/// Remaining cooldown per ability
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    /// ability_id → remaining cooldown seconds
    cooldowns: HashMap<AbilityId, f32>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self, ability_id: AbilityId) -> bool {
        self.cooldowns.get(&ability_id).is_none_or(|cd| *cd <= 0.0)
    }

    pub fn start(&mut self, ability_id: AbilityId, seconds: f32) {
        if seconds > 0.0 {
            self.cooldowns.insert(ability_id, seconds);
        }
    }

    pub fn tick(&mut self, delta: f32) {
        for cd in self.cooldowns.values_mut() {
            *cd = (*cd - delta).max(0.0);
        }
        self.cooldowns.retain(|_, cd| *cd > 0.0);
    }

    pub fn remaining(&self, ability_id: AbilityId) -> f32 {
        self.cooldowns.get(&ability_id).copied().unwrap_or(0.0)
    }

    pub fn clear(&mut self, ability_id: AbilityId) {
        self.cooldowns.remove(&ability_id);
    }
}

/// Everything an activation needs from the caster's side
pub struct ActivationContext<'a, R: Rng> {
    pub attributes: &'a mut AttributeSet,
    pub caster: CasterInfo,
    pub rng: &'a mut R,
    pub conversion: Option<&'a ResourceConversion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastState {
    pub ability_id: AbilityId,
    pub remaining: f32,
    pub target: TargetInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationReport {
    pub ability_id: AbilityId,
    /// `None` for abilities without a spawn target
    pub spawned: Option<SpawnOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated(ActivationReport),
    /// Cast started; resources are taken when it completes
    Casting { ability_id: AbilityId, cast_time: f32 },
    /// Will be attempted when the current cast ends
    Queued { ability_id: AbilityId },
}

/// What happened during one controller step
#[derive(Debug, Clone, Default)]
pub struct ControllerTick {
    pub activations: Vec<ActivationReport>,
    pub casts_started: Vec<AbilityId>,
    pub failures: Vec<(AbilityId, GameplayError)>,
    /// Objects whose active time ran out
    pub expired: Vec<(AbilityId, ObjectKey)>,
}

#[derive(Debug, Clone, Default)]
pub struct AbilityController {
    abilities: BTreeMap<AbilityId, Ability>,
    cooldowns: CooldownTracker,
    casting: Option<CastState>,
    queued: Option<(AbilityId, TargetInfo)>,
}

impl AbilityController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ability. IDs are unique per character.
    pub fn learn(&mut self, ability: Ability) -> GameplayResult<()> {
        if self.abilities.contains_key(&ability.id()) {
            return Err(GameplayError::InvalidArgument(format!(
                "ability id {} already learned",
                ability.id()
            )));
        }
        self.abilities.insert(ability.id(), ability);
        Ok(())
    }

    pub fn forget(&mut self, ability_id: AbilityId) -> Option<Ability> {
        if self.casting.as_ref().is_some_and(|c| c.ability_id == ability_id) {
            self.casting = None;
        }
        if self.queued.is_some_and(|(queued, _)| queued == ability_id) {
            self.queued = None;
        }
        self.cooldowns.clear(ability_id);
        self.abilities.remove(&ability_id)
    }

    pub fn ability(&self, ability_id: AbilityId) -> Option<&Ability> {
        self.abilities.get(&ability_id)
    }

    pub fn ability_mut(&mut self, ability_id: AbilityId) -> Option<&mut Ability> {
        self.abilities.get_mut(&ability_id)
    }

    pub fn abilities(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values()
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn cooldowns_mut(&mut self) -> &mut CooldownTracker {
        &mut self.cooldowns
    }

    pub fn casting(&self) -> Option<&CastState> {
        self.casting.as_ref()
    }

    pub fn is_casting(&self) -> bool {
        self.casting.is_some()
    }

    pub fn queued(&self) -> Option<AbilityId> {
        self.queued.map(|(ability_id, _)| ability_id)
    }

    /// Ask to use an ability.
    ///
    /// Checks run in order: cooldown, requirements, resources, target.
    /// Instant abilities commit immediately; abilities with a cast time
    /// start casting and commit when the cast completes.
    pub fn request_activation<R: Rng>(
        &mut self,
        ability_id: AbilityId,
        target: TargetInfo,
        ctx: &mut ActivationContext<'_, R>,
    ) -> GameplayResult<ActivationOutcome> {
        let ability = self
            .abilities
            .get(&ability_id)
            .ok_or(GameplayError::UnknownAbility(ability_id))?;

        if let Some(cast) = &self.casting {
            if self.queued.is_some() {
                return Err(GameplayError::Busy {
                    casting: cast.ability_id,
                });
            }
            self.queued = Some((ability_id, target));
            debug!(ability_id, casting = cast.ability_id, "Activation queued");
            return Ok(ActivationOutcome::Queued { ability_id });
        }

        let remaining = self.cooldowns.remaining(ability_id);
        if remaining > 0.0 {
            return Err(GameplayError::OnCooldown {
                ability_id,
                remaining,
            });
        }

        validate(ability, ctx.attributes, &ctx.caster, &target, ctx.conversion)?;

        let cast_time = ability.stats().activation_time;
        if cast_time > 0.0 {
            self.casting = Some(CastState {
                ability_id,
                remaining: cast_time,
                target,
            });
            debug!(ability_id, cast_time, "Cast started");
            return Ok(ActivationOutcome::Casting {
                ability_id,
                cast_time,
            });
        }

        self.commit(ability_id, &target, ctx)
            .map(ActivationOutcome::Activated)
    }

    /// Cancel the current cast and any queued activation.
    /// Nothing was consumed, so nothing is refunded.
    pub fn interrupt(&mut self) -> Option<AbilityId> {
        self.queued = None;
        let cast = self.casting.take()?;
        debug!(ability_id = cast.ability_id, "Cast interrupted");
        Some(cast.ability_id)
    }

    /// Advance cooldowns, every live object and then the current cast by `dt`
    pub fn tick<R: Rng>(&mut self, dt: f32, ctx: &mut ActivationContext<'_, R>) -> ControllerTick {
        let mut report = ControllerTick::default();
        self.cooldowns.tick(dt);

        // objects spawned by a cast finishing below start aging next step
        for ability in self.abilities.values_mut() {
            let ability_id = ability.id();
            report.expired.extend(
                ability
                    .tick_objects(dt)
                    .into_iter()
                    .map(|object| (ability_id, object.key())),
            );
        }

        let finished = match self.casting.as_mut() {
            Some(cast) => {
                cast.remaining -= dt;
                cast.remaining <= 0.0
            }
            None => false,
        };
        if finished {
            if let Some(cast) = self.casting.take() {
                match self.commit(cast.ability_id, &cast.target, ctx) {
                    Ok(activation) => report.activations.push(activation),
                    Err(err) => report.failures.push((cast.ability_id, err)),
                }
            }
            if let Some((ability_id, target)) = self.queued.take() {
                match self.request_activation(ability_id, target, ctx) {
                    Ok(ActivationOutcome::Activated(activation)) => {
                        report.activations.push(activation)
                    }
                    Ok(ActivationOutcome::Casting { ability_id, .. }) => {
                        report.casts_started.push(ability_id)
                    }
                    Ok(ActivationOutcome::Queued { .. }) => {}
                    Err(err) => report.failures.push((ability_id, err)),
                }
            }
        }
        report
    }

    /// Re-check, pay, spawn and start the cooldown
    fn commit<R: Rng>(
        &mut self,
        ability_id: AbilityId,
        target: &TargetInfo,
        ctx: &mut ActivationContext<'_, R>,
    ) -> GameplayResult<ActivationReport> {
        let ability = self
            .abilities
            .get_mut(&ability_id)
            .ok_or(GameplayError::UnknownAbility(ability_id))?;

        let origin = validate(ability, ctx.attributes, &ctx.caster, target, ctx.conversion)?;
        let container_id = match origin {
            Some(_) => Some(allocate_container_id(ability.objects(), &mut *ctx.rng)?),
            None => None,
        };
        ability.consume_resources(ctx.attributes, ctx.conversion)?;

        let spawned = match (origin, container_id) {
            (Some(origin), Some(container_id)) => Some(run_spawn_pipeline(
                ability,
                container_id,
                origin,
                &ctx.caster,
                target,
            )),
            _ => None,
        };
        self.cooldowns.start(ability_id, ability.stats().cooldown);

        info!(
            caster = ctx.caster.id,
            ability_id,
            container_id = ?spawned.as_ref().map(|s| s.container_id),
            "Ability activated"
        );
        Ok(ActivationReport {
            ability_id,
            spawned,
        })
    }
}

/// requirements → resources → target. Returns the spawn origin, if any.
fn validate(
    ability: &Ability,
    attributes: &AttributeSet,
    caster: &CasterInfo,
    target: &TargetInfo,
    conversion: Option<&ResourceConversion>,
) -> GameplayResult<Option<(Vec3, Vec3)>> {
    ability.meets_requirements(attributes)?;
    ability.check_resources(attributes, conversion)?;
    if ability.template().requires_target && target.target.is_none() {
        return Err(GameplayError::NoValidTarget {
            ability_id: ability.id(),
        });
    }
    resolve_origin(ability, caster, target)
}
