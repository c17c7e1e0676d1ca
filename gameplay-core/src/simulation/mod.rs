//! Authoritative simulation state.
//!
//! One [`Simulation`] owns every character and the template catalog, so
//! a hit from one character's object can mutate another character through
//! `&mut self` without any locking. Call [`Simulation::tick`] once per fixed
//! step; [`plugin::SimulationPlugin`] does this from Bevy's `FixedUpdate`.

pub mod plugin;

use bevy::math::Vec3;
use bevy::prelude::Event;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::abilities::{
    Ability, AbilityId, ActivationContext, ActivationOutcome, ActivationReport, EventId,
    AbilityTemplateId, HitApplication, ObjectKey, RequirementRemoval, ResourceConversion,
    TargetInfo,
};
use crate::attributes::{AttributeId, AttributeSet};
use crate::buffs::{BuffApplication, BuffTemplateId};
use crate::catalog::TemplateCatalog;
use crate::character::{Character, CharacterId};
use crate::constants::{DEFAULT_RNG_SEED, DEFAULT_TICK_RATE};
use crate::error::{GameplayError, GameplayResult};
use crate::logging::TickSpan;
use crate::persistence::{load_records, AttributeRecord, CharacterAttributeSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed steps per second
    pub tick_rate: u32,
    pub rng_seed: u64,
    pub requirement_removal: RequirementRemoval,
    pub resource_conversion: Option<ResourceConversion>,
    pub regen_enabled: bool,
    /// Attribute whose final value shortens object active time
    pub attack_speed_attribute: Option<AttributeId>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            rng_seed: DEFAULT_RNG_SEED,
            requirement_removal: RequirementRemoval::Mirrored,
            resource_conversion: None,
            regen_enabled: true,
            attack_speed_attribute: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> GameplayResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GameplayError::Configuration(format!("invalid simulation config: {e}")))
    }

    pub fn load_file(path: impl AsRef<Path>) -> GameplayResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GameplayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}

/// Collision notification from the physics layer
#[derive(Debug, Clone, Copy, PartialEq, Event)]
pub struct CollisionReport {
    pub caster: CharacterId,
    pub ability_id: AbilityId,
    pub key: ObjectKey,
    /// Character that was struck, if any
    pub other: Option<CharacterId>,
    pub contact_point: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitReport {
    pub key: ObjectKey,
    pub target: Option<CharacterId>,
    /// Total hit-count deduction of all hit events
    pub deduction: i32,
    pub applications: Vec<HitApplication>,
    pub destroyed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub regenerated: i32,
    pub activations: Vec<(CharacterId, ActivationReport)>,
    pub casts_started: Vec<(CharacterId, AbilityId)>,
    pub failures: Vec<(CharacterId, AbilityId, GameplayError)>,
    pub expired_objects: Vec<(CharacterId, AbilityId, ObjectKey)>,
    pub buff_ticks: Vec<(CharacterId, BuffTemplateId)>,
    pub buff_expirations: Vec<(CharacterId, BuffTemplateId)>,
}

pub struct Simulation {
    catalog: Arc<TemplateCatalog>,
    config: SimulationConfig,
    rng: Xoshiro256PlusPlus,
    characters: BTreeMap<CharacterId, Character>,
    tick: u64,
}

impl Simulation {
    pub fn new(catalog: Arc<TemplateCatalog>, config: SimulationConfig) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(config.rng_seed),
            catalog,
            config,
            characters: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<TemplateCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Create a character with every catalog attribute at its default
    pub fn spawn_character(
        &mut self,
        id: CharacterId,
        name: impl Into<String>,
    ) -> GameplayResult<&mut Character> {
        if self.characters.contains_key(&id) {
            return Err(GameplayError::InvalidArgument(format!(
                "character {id} already exists"
            )));
        }
        let attributes = AttributeSet::from_templates(self.catalog.attribute_templates());
        let character = Character::new(id, name, attributes);
        Ok(self.characters.entry(id).or_insert(character))
    }

    /// Create a character from stored attribute rows
    pub fn load_character(
        &mut self,
        id: CharacterId,
        name: impl Into<String>,
        records: &[AttributeRecord],
    ) -> GameplayResult<&mut Character> {
        let mut attributes = AttributeSet::from_templates(self.catalog.attribute_templates());
        let applied = load_records(&mut attributes, &self.catalog, id, records)?;
        attributes.clear_dirty();
        debug!(character = id, rows = applied, "Character attributes loaded");
        self.characters.remove(&id);
        Ok(self
            .characters
            .entry(id)
            .or_insert(Character::new(id, name, attributes)))
    }

    /// Insert or replace a character
    pub fn insert_character(&mut self, character: Character) -> Option<Character> {
        self.characters.insert(character.id, character)
    }

    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        self.characters.remove(&id)
    }

    pub fn character(&self, id: CharacterId) -> GameplayResult<&Character> {
        self.characters
            .get(&id)
            .ok_or(GameplayError::UnknownCharacter(id))
    }

    pub fn character_mut(&mut self, id: CharacterId) -> GameplayResult<&mut Character> {
        self.characters
            .get_mut(&id)
            .ok_or(GameplayError::UnknownCharacter(id))
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Give a character an instance of a template, with the template's
    /// default events attached
    pub fn learn_ability(
        &mut self,
        character_id: CharacterId,
        ability_id: AbilityId,
        template_id: AbilityTemplateId,
    ) -> GameplayResult<()> {
        let template = self.catalog.ability(template_id)?.clone();
        let events = template
            .events
            .iter()
            .map(|id| self.catalog.event(*id).cloned())
            .collect::<GameplayResult<Vec<_>>>()?;
        let ability =
            Ability::new(ability_id, template, self.config.requirement_removal).with_events(events);
        self.character_mut(character_id)?.abilities.learn(ability)
    }

    pub fn add_ability_event(
        &mut self,
        character_id: CharacterId,
        ability_id: AbilityId,
        event_id: EventId,
    ) -> GameplayResult<bool> {
        let event = self.catalog.event(event_id)?.clone();
        let ability = self
            .character_mut(character_id)?
            .abilities
            .ability_mut(ability_id)
            .ok_or(GameplayError::UnknownAbility(ability_id))?;
        Ok(ability.add_event(event))
    }

    pub fn remove_ability_event(
        &mut self,
        character_id: CharacterId,
        ability_id: AbilityId,
        event_id: EventId,
    ) -> GameplayResult<bool> {
        let ability = self
            .character_mut(character_id)?
            .abilities
            .ability_mut(ability_id)
            .ok_or(GameplayError::UnknownAbility(ability_id))?;
        Ok(ability.remove_event(event_id).is_some())
    }

    /// Build target info, reading the target character's position
    pub fn resolve_target(
        &self,
        target: Option<CharacterId>,
        point: Option<Vec3>,
    ) -> GameplayResult<TargetInfo> {
        let target_position = match target {
            Some(id) => Some(self.character(id)?.position),
            None => None,
        };
        Ok(TargetInfo {
            target,
            target_position,
            hit_position: point,
        })
    }

    pub fn activate(
        &mut self,
        character_id: CharacterId,
        ability_id: AbilityId,
        target: TargetInfo,
    ) -> GameplayResult<ActivationOutcome> {
        let Self {
            characters,
            rng,
            config,
            ..
        } = self;
        let character = characters
            .get_mut(&character_id)
            .ok_or(GameplayError::UnknownCharacter(character_id))?;
        let caster = character.caster_info(config.attack_speed_attribute);
        let mut ctx = ActivationContext {
            attributes: &mut character.attributes,
            caster,
            rng,
            conversion: config.resource_conversion.as_ref(),
        };
        let result = character
            .abilities
            .request_activation(ability_id, target, &mut ctx);
        if let Err(err) = &result {
            if err.is_rejection() {
                debug!(character = character_id, ability_id, code = err.code(), "Activation rejected");
            } else {
                warn!(character = character_id, ability_id, %err, "Activation failed");
            }
        }
        result
    }

    pub fn interrupt(&mut self, character_id: CharacterId) -> GameplayResult<Option<AbilityId>> {
        Ok(self.character_mut(character_id)?.abilities.interrupt())
    }

    pub fn apply_buff(
        &mut self,
        character_id: CharacterId,
        buff_id: BuffTemplateId,
    ) -> GameplayResult<BuffApplication> {
        let template = self.catalog.buff(buff_id)?.clone();
        let character = self.character_mut(character_id)?;
        Ok(character.buffs.apply(template, &mut character.attributes))
    }

    pub fn remove_buff(
        &mut self,
        character_id: CharacterId,
        buff_id: BuffTemplateId,
    ) -> GameplayResult<bool> {
        let character = self.character_mut(character_id)?;
        Ok(character.buffs.remove(buff_id, &mut character.attributes))
    }

    /// Resolve a collision between a live object and whatever it touched.
    ///
    /// Hit events run in registration order against the struck character.
    /// The object is destroyed if nothing character-shaped was hit or its
    /// hit budget drops below one. Reports for objects that no longer exist
    /// are ignored. Every hit event is checked before any is applied, so an
    /// error leaves both characters and the object untouched.
    pub fn handle_collision(&mut self, report: &CollisionReport) -> GameplayResult<HitReport> {
        let key = report.key;
        let hit_events: Vec<_> = {
            let ability = self
                .character(report.caster)?
                .abilities
                .ability(report.ability_id)
                .ok_or(GameplayError::UnknownAbility(report.ability_id))?;
            if !ability.objects().get(key).is_some_and(|o| o.is_active()) {
                return Ok(HitReport {
                    key,
                    target: report.other,
                    deduction: 0,
                    applications: Vec::new(),
                    destroyed: false,
                });
            }
            ability.hit_events().cloned().collect()
        };

        for event in &hit_events {
            event.check_hit(&self.catalog)?;
        }

        let target = report.other.filter(|id| self.characters.contains_key(id));
        let mut deduction = 0;
        let mut applications = Vec::new();
        for event in &hit_events {
            let struck = target.and_then(|id| self.characters.get_mut(&id));
            let (cost, applied) = event.invoke_hit(struck, &self.catalog)?;
            deduction += cost;
            applications.extend(applied);
        }

        let ability = self
            .character_mut(report.caster)?
            .abilities
            .ability_mut(report.ability_id)
            .ok_or(GameplayError::UnknownAbility(report.ability_id))?;
        let remaining = match ability.objects_mut().get_mut(key) {
            Some(object) => {
                object.hit_count -= deduction;
                object.hit_count
            }
            None => 0,
        };
        let destroyed = target.is_none() || remaining < 1;
        if destroyed {
            ability.remove_object(key);
        }
        debug!(
            caster = report.caster,
            ?key,
            ?target,
            deduction,
            destroyed,
            "Collision resolved"
        );
        Ok(HitReport {
            key,
            target,
            deduction,
            applications,
            destroyed,
        })
    }

    /// Advance every character by one step of `dt` seconds:
    /// regen, buffs, casts and cooldowns, then objects.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.tick += 1;
        let _span = TickSpan::new(self.tick);
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        let conversion = self.config.resource_conversion;
        let regen_enabled = self.config.regen_enabled;
        let attack_speed = self.config.attack_speed_attribute;

        for character in self.characters.values_mut() {
            let id = character.id;
            if regen_enabled {
                report.regenerated += character.attributes.regen(dt);
            }

            let buffs = character.buffs.tick(dt, &mut character.attributes);
            report.buff_ticks.extend(buffs.ticked.into_iter().map(|b| (id, b)));
            report
                .buff_expirations
                .extend(buffs.expired.into_iter().map(|b| (id, b)));

            let caster = character.caster_info(attack_speed);
            let mut ctx = ActivationContext {
                attributes: &mut character.attributes,
                caster,
                rng: &mut self.rng,
                conversion: conversion.as_ref(),
            };
            let step = character.abilities.tick(dt, &mut ctx);
            report
                .activations
                .extend(step.activations.into_iter().map(|a| (id, a)));
            report
                .casts_started
                .extend(step.casts_started.into_iter().map(|a| (id, a)));
            report
                .failures
                .extend(step.failures.into_iter().map(|(a, e)| (id, a, e)));
            report
                .expired_objects
                .extend(step.expired.into_iter().map(|(a, k)| (id, a, k)));
        }
        report
    }

    /// Snapshot every character whose attributes changed since the last
    /// drain, and mark them clean
    pub fn drain_save_batch(&mut self) -> Vec<CharacterAttributeSnapshot> {
        self.characters
            .values_mut()
            .filter(|c| c.attributes.is_dirty())
            .map(|c| {
                let snapshot = CharacterAttributeSnapshot::capture(c);
                c.attributes.clear_dirty();
                snapshot
            })
            .collect()
    }

    /// Mark characters dirty again after their saves failed, so the next
    /// drain captures them. Unknown ids are skipped. Returns how many were
    /// requeued.
    pub fn requeue_saves<I>(&mut self, character_ids: I) -> usize
    where
        I: IntoIterator<Item = CharacterId>,
    {
        let mut requeued = 0;
        for id in character_ids {
            match self.characters.get_mut(&id) {
                Some(character) => {
                    character.attributes.mark_dirty();
                    requeued += 1;
                }
                None => debug!(character = id, "Dropping save retry for removed character"),
            }
        }
        requeued
    }

    pub fn snapshot(&self, character_id: CharacterId) -> GameplayResult<CharacterAttributeSnapshot> {
        Ok(CharacterAttributeSnapshot::capture(self.character(character_id)?))
    }
}
