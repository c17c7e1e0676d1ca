//! Template catalog: every immutable definition the simulation reads.
//!
//! Loaded once from RON, validated, then shared as `Arc<TemplateCatalog>`.
//! Every cross-reference is checked at load, so a lookup that fails at
//! runtime means a caller passed an ID that was never in the data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::abilities::{
    AbilityEvent, AbilityEventKind, AbilityTemplate, AbilityTemplateId, EventId, HitEffect,
    ResourceMap, SpawnBehavior,
};
use crate::attributes::{AttributeId, AttributeTemplate};
use crate::buffs::{BuffTemplate, BuffTemplateId, BuffTickEffect};
use crate::error::{GameplayError, GameplayResult};

/// Serialized form of the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogData {
    pub attributes: Vec<AttributeTemplate>,
    pub abilities: Vec<AbilityTemplate>,
    pub events: Vec<AbilityEvent>,
    pub buffs: Vec<BuffTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    pub attributes: usize,
    pub abilities: usize,
    pub events: usize,
    pub buffs: usize,
}

impl CatalogStats {
    pub fn summary(&self) -> String {
        format!(
            "{} attributes, {} abilities, {} events, {} buffs",
            self.attributes, self.abilities, self.events, self.buffs
        )
    }
}

#[derive(Debug, Default)]
pub struct TemplateCatalog {
    attributes: HashMap<AttributeId, Arc<AttributeTemplate>>,
    abilities: HashMap<AbilityTemplateId, Arc<AbilityTemplate>>,
    events: HashMap<EventId, Arc<AbilityEvent>>,
    buffs: HashMap<BuffTemplateId, Arc<BuffTemplate>>,
}

fn config_err(message: String) -> GameplayError {
    GameplayError::Configuration(message)
}

fn index<T, F>(items: Vec<T>, kind: &str, id_of: F) -> GameplayResult<HashMap<u32, Arc<T>>>
where
    F: Fn(&T) -> u32,
{
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let id = id_of(&item);
        if map.insert(id, Arc::new(item)).is_some() {
            return Err(config_err(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(map)
}

impl TemplateCatalog {
    /// Index and validate catalog data.
    ///
    /// Zero-valued cost and requirement entries are dropped.
    pub fn from_data(mut data: CatalogData) -> GameplayResult<Self> {
        for ability in &mut data.abilities {
            ability.resources.retain(|_, v| *v != 0);
            ability.requirements.retain(|_, v| *v != 0);
        }
        for event in &mut data.events {
            event.resources.retain(|_, v| *v != 0);
            event.requirements.retain(|_, v| *v != 0);
        }

        let catalog = Self {
            attributes: index(data.attributes, "attribute", |t| t.id)?,
            abilities: index(data.abilities, "ability", |t| t.id)?,
            events: index(data.events, "event", |t| t.id)?,
            buffs: index(data.buffs, "buff", |t| t.id)?,
        };
        catalog.validate()?;
        info!(stats = %catalog.stats().summary(), "Template catalog loaded");
        Ok(catalog)
    }

    pub fn from_ron_str(text: &str) -> GameplayResult<Self> {
        let data: CatalogData = ron::from_str(text)
            .map_err(|e| config_err(format!("catalog parse error: {e}")))?;
        Self::from_data(data)
    }

    pub fn load_file(path: impl AsRef<Path>) -> GameplayResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_err(format!("cannot read catalog {}: {e}", path.display())))?;
        Self::from_ron_str(&text)
    }

    pub fn attribute(&self, id: AttributeId) -> GameplayResult<&Arc<AttributeTemplate>> {
        self.attributes
            .get(&id)
            .ok_or_else(|| config_err(format!("unknown attribute template {id}")))
    }

    pub fn ability(&self, id: AbilityTemplateId) -> GameplayResult<&Arc<AbilityTemplate>> {
        self.abilities
            .get(&id)
            .ok_or_else(|| config_err(format!("unknown ability template {id}")))
    }

    pub fn event(&self, id: EventId) -> GameplayResult<&Arc<AbilityEvent>> {
        self.events
            .get(&id)
            .ok_or_else(|| config_err(format!("unknown ability event {id}")))
    }

    pub fn buff(&self, id: BuffTemplateId) -> GameplayResult<&Arc<BuffTemplate>> {
        self.buffs
            .get(&id)
            .ok_or_else(|| config_err(format!("unknown buff template {id}")))
    }

    pub fn attribute_templates(&self) -> impl Iterator<Item = &Arc<AttributeTemplate>> {
        self.attributes.values()
    }

    pub fn ability_templates(&self) -> impl Iterator<Item = &Arc<AbilityTemplate>> {
        self.abilities.values()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            attributes: self.attributes.len(),
            abilities: self.abilities.len(),
            events: self.events.len(),
            buffs: self.buffs.len(),
        }
    }

    fn require_resource(&self, id: AttributeId, context: &str) -> GameplayResult<()> {
        let template = self
            .attributes
            .get(&id)
            .ok_or_else(|| config_err(format!("{context}: unknown attribute {id}")))?;
        if !template.is_resource_attribute {
            return Err(config_err(format!(
                "{context}: attribute {id} is not a resource attribute"
            )));
        }
        Ok(())
    }

    fn require_resources(&self, map: &ResourceMap, context: &str) -> GameplayResult<()> {
        map.keys().try_for_each(|id| self.require_resource(*id, context))
    }

    fn validate(&self) -> GameplayResult<()> {
        for template in self.attributes.values() {
            if template.regen_per_second < 0.0 {
                return Err(config_err(format!(
                    "attribute {}: negative regen",
                    template.id
                )));
            }
        }

        for ability in self.abilities.values() {
            let context = format!("ability {}", ability.id);
            self.require_resources(&ability.resources, &context)?;
            self.require_resources(&ability.requirements, &context)?;
            for event_id in &ability.events {
                if !self.events.contains_key(event_id) {
                    return Err(config_err(format!("{context}: unknown event {event_id}")));
                }
            }
            if ability.hit_count < 0 {
                return Err(config_err(format!("{context}: negative hit count")));
            }
        }

        for event in self.events.values() {
            let context = format!("event {}", event.id);
            self.require_resources(&event.resources, &context)?;
            self.require_resources(&event.requirements, &context)?;
            match &event.kind {
                AbilityEventKind::Spawn { behavior, .. } => match behavior {
                    SpawnBehavior::Spread { count: 0, .. } | SpawnBehavior::Ring { count: 0, .. } => {
                        return Err(config_err(format!("{context}: spawn count must be positive")));
                    }
                    _ => {}
                },
                AbilityEventKind::Hit { effect, hit_cost } => {
                    if *hit_cost < 0 {
                        return Err(config_err(format!("{context}: negative hit cost")));
                    }
                    match effect {
                        HitEffect::Damage { attribute, amount }
                        | HitEffect::Heal { attribute, amount } => {
                            self.require_resource(*attribute, &context)?;
                            if *amount < 0 {
                                return Err(config_err(format!("{context}: negative amount")));
                            }
                        }
                        HitEffect::ApplyBuff { buff } => {
                            if !self.buffs.contains_key(buff) {
                                return Err(config_err(format!("{context}: unknown buff {buff}")));
                            }
                        }
                    }
                }
                AbilityEventKind::Move(_) | AbilityEventKind::Passive => {}
            }
        }

        for buff in self.buffs.values() {
            let context = format!("buff {}", buff.id);
            if buff.duration < 0.0 || buff.tick_rate < 0.0 {
                return Err(config_err(format!("{context}: negative duration or tick rate")));
            }
            if buff.max_stacks == 0 {
                return Err(config_err(format!("{context}: max_stacks must be at least 1")));
            }
            for bonus in &buff.attribute_bonuses {
                if !self.attributes.contains_key(&bonus.attribute) {
                    return Err(config_err(format!(
                        "{context}: unknown attribute {}",
                        bonus.attribute
                    )));
                }
            }
            for effect in &buff.tick_effects {
                let (BuffTickEffect::Restore { attribute, amount }
                | BuffTickEffect::Drain { attribute, amount }) = *effect;
                self.require_resource(attribute, &context)?;
                if amount < 0 {
                    return Err(config_err(format!("{context}: negative tick amount")));
                }
            }
        }
        Ok(())
    }
}
