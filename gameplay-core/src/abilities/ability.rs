//! A character's instance of an ability template.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use super::event::{AbilityEvent, EventId, SpawnPhase};
use super::objects::{AbilityObject, ObjectKey, ObjectTable};
use super::template::AbilityTemplate;
use super::{merge_resources, subtract_resources, AbilityId, AbilityStats, ResourceMap};
use crate::attributes::{AttributeId, AttributeSet};
use crate::constants::TOOLTIP_LABEL_WIDTH;
use crate::error::{GameplayError, GameplayResult};

/// How removing an event treats its requirement entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementRemoval {
    /// Subtract, exactly undoing the add
    #[default]
    Mirrored,
    /// Add the entries again on removal (legacy behavior)
    AsObserved,
}

/// While `event_id` is attached, all costs are paid from `resource` alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConversion {
    pub event_id: EventId,
    pub resource: AttributeId,
}

#[derive(Debug, Clone)]
pub struct Ability {
    ability_id: AbilityId,
    template: Arc<AbilityTemplate>,
    stats: AbilityStats,
    resources: ResourceMap,
    requirements: ResourceMap,
    /// Insertion-ordered; event order is invocation order
    events: IndexMap<EventId, Arc<AbilityEvent>>,
    requirement_removal: RequirementRemoval,
    objects: ObjectTable,
}

impl Ability {
    pub fn new(
        ability_id: AbilityId,
        template: Arc<AbilityTemplate>,
        requirement_removal: RequirementRemoval,
    ) -> Self {
        Self {
            ability_id,
            stats: template.stats,
            resources: template.resources.clone(),
            requirements: template.requirements.clone(),
            template,
            events: IndexMap::new(),
            requirement_removal,
            objects: ObjectTable::new(),
        }
    }

    pub fn with_events<I>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = Arc<AbilityEvent>>,
    {
        for event in events {
            self.add_event(event);
        }
        self
    }

    pub fn id(&self) -> AbilityId {
        self.ability_id
    }

    pub fn template(&self) -> &Arc<AbilityTemplate> {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn stats(&self) -> &AbilityStats {
        &self.stats
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn requirements(&self) -> &ResourceMap {
        &self.requirements
    }

    pub fn requirement_removal(&self) -> RequirementRemoval {
        self.requirement_removal
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    /// Attach an event and fold in its contributions.
    /// Returns false (and changes nothing) if the event is already attached.
    pub fn add_event(&mut self, event: Arc<AbilityEvent>) -> bool {
        if self.events.contains_key(&event.id) {
            return false;
        }
        self.stats += event.stats;
        merge_resources(&mut self.resources, &event.resources);
        merge_resources(&mut self.requirements, &event.requirements);
        self.events.insert(event.id, event);
        true
    }

    /// Detach an event and take its contributions back out.
    /// Returns the removed event, or `None` if it was not attached.
    pub fn remove_event(&mut self, event_id: EventId) -> Option<Arc<AbilityEvent>> {
        let event = self.events.shift_remove(&event_id)?;
        self.stats -= event.stats;
        subtract_resources(&mut self.resources, &event.resources);
        match self.requirement_removal {
            RequirementRemoval::Mirrored => {
                subtract_resources(&mut self.requirements, &event.requirements)
            }
            RequirementRemoval::AsObserved => {
                merge_resources(&mut self.requirements, &event.requirements)
            }
        }
        Some(event)
    }

    pub fn has_event(&self, event_id: EventId) -> bool {
        self.events.contains_key(&event_id)
    }

    pub fn try_get_event(&self, event_id: EventId) -> Option<&Arc<AbilityEvent>> {
        self.events.get(&event_id)
    }

    pub fn events(&self) -> impl Iterator<Item = &Arc<AbilityEvent>> {
        self.events.values()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn spawn_events(&self, phase: SpawnPhase) -> impl Iterator<Item = &Arc<AbilityEvent>> {
        self.events
            .values()
            .filter(move |event| event.spawn_phase() == Some(phase))
    }

    pub fn move_events(&self) -> impl Iterator<Item = &Arc<AbilityEvent>> {
        self.events.values().filter(|event| event.is_move())
    }

    pub fn hit_events(&self) -> impl Iterator<Item = &Arc<AbilityEvent>> {
        self.events.values().filter(|event| event.is_hit())
    }

    /// Sum of all cost entries. Entries at or below zero cost nothing.
    pub fn total_resource_cost(&self) -> i32 {
        self.resources.values().map(|amount| (*amount).max(0)).sum()
    }

    fn active_conversion<'a>(
        &self,
        conversion: Option<&'a ResourceConversion>,
    ) -> Option<&'a ResourceConversion> {
        conversion.filter(|c| self.events.contains_key(&c.event_id))
    }

    /// Every requirement entry must be met by the caster's current pool value
    pub fn meets_requirements(&self, attributes: &AttributeSet) -> GameplayResult<()> {
        for (&attribute, &required) in &self.requirements {
            let current = attributes.current_value(attribute);
            if current.map_or(true, |value| value < required) {
                return Err(GameplayError::RequirementNotMet {
                    attribute,
                    required,
                    current,
                });
            }
        }
        Ok(())
    }

    /// Detailed affordability check
    pub fn check_resources(
        &self,
        attributes: &AttributeSet,
        conversion: Option<&ResourceConversion>,
    ) -> GameplayResult<()> {
        if let Some(conversion) = self.active_conversion(conversion) {
            let required = self.total_resource_cost();
            let available = attributes.current_value(conversion.resource);
            if available.map_or(true, |value| value < required) {
                return Err(GameplayError::InsufficientResource {
                    attribute: conversion.resource,
                    required,
                    available,
                });
            }
            return Ok(());
        }
        for (&attribute, &required) in &self.resources {
            if required <= 0 {
                continue;
            }
            let available = attributes.current_value(attribute);
            if available.map_or(true, |value| value < required) {
                return Err(GameplayError::InsufficientResource {
                    attribute,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    pub fn has_resource(
        &self,
        attributes: &AttributeSet,
        conversion: Option<&ResourceConversion>,
    ) -> bool {
        self.check_resources(attributes, conversion).is_ok()
    }

    /// Pay the activation cost. Nothing is debited unless everything can be.
    pub fn consume_resources(
        &self,
        attributes: &mut AttributeSet,
        conversion: Option<&ResourceConversion>,
    ) -> GameplayResult<()> {
        self.check_resources(attributes, conversion)?;

        let debits: Vec<(AttributeId, i32)> = match self.active_conversion(conversion) {
            Some(conversion) => vec![(conversion.resource, self.total_resource_cost())],
            None => self
                .resources
                .iter()
                .filter(|(_, amount)| **amount > 0)
                .map(|(attribute, amount)| (*attribute, *amount))
                .collect(),
        };
        for (attribute, amount) in debits {
            if let Some(pool) = attributes.resource_mut(attribute) {
                pool.consume(amount)?;
            }
        }
        Ok(())
    }

    /// Age and move every live object by `dt`. Returns the objects destroyed
    /// because their active time ran out.
    ///
    /// An `active_time` of zero means objects never expire on their own.
    pub fn tick_objects(&mut self, dt: f32) -> Vec<AbilityObject> {
        let Self {
            events,
            objects,
            stats,
            ..
        } = self;
        let timed = stats.active_time > 0.0;

        let mut expired = Vec::new();
        for object in objects.iter_mut() {
            if timed {
                object.remaining_active_time -= dt;
                if object.remaining_active_time < 0.0 {
                    expired.push(object.key());
                    continue;
                }
            }
            for event in events.values().filter(|event| event.is_move()) {
                event.invoke_move(object, dt);
            }
        }

        expired
            .into_iter()
            .filter_map(|key| objects.remove(key))
            .collect()
    }

    pub fn remove_object(&mut self, key: ObjectKey) -> Option<AbilityObject> {
        self.objects.remove(key)
    }

    /// Plain-text tooltip: name, description, stats, costs
    pub fn tooltip(&self) -> String {
        let width = TOOLTIP_LABEL_WIDTH;
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.template.name);
        if !self.template.description.is_empty() {
            let _ = writeln!(out, "{}", self.template.description);
        }
        let _ = writeln!(out, "{:<width$}{:.2}s", "Activation Time", self.stats.activation_time);
        let _ = writeln!(out, "{:<width$}{:.2}s", "Active Time", self.stats.active_time);
        let _ = writeln!(out, "{:<width$}{:.2}s", "Cooldown", self.stats.cooldown);
        let _ = writeln!(out, "{:<width$}{:.2}", "Range", self.stats.range);
        let _ = writeln!(out, "{:<width$}{:.2}", "Speed", self.stats.speed);
        for (attribute, amount) in &self.resources {
            let _ = writeln!(out, "{:<width$}{}", format!("Cost [{attribute}]"), amount);
        }
        for (attribute, amount) in &self.requirements {
            let _ = writeln!(out, "{:<width$}{}", format!("Requires [{attribute}]"), amount);
        }
        for event in self.events.values() {
            let _ = writeln!(out, "+ {}", event.name);
        }
        out
    }

    /// Compact JSON summary for debug endpoints and logs
    pub fn summary_json(&self) -> String {
        serde_json::json!({
            "ability_id": self.ability_id,
            "template_id": self.template.id,
            "name": self.template.name,
            "stats": self.stats,
            "resources": self.resources,
            "requirements": self.requirements,
            "events": self.events.keys().collect::<Vec<_>>(),
            "live_objects": self.objects.len(),
        })
        .to_string()
    }
}
