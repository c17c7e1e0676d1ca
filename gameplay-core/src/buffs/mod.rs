//! Timed status effects.
//!
//! A [`BuffTemplate`] describes what a buff does; its callbacks are data
//! driven (attribute bonuses while applied, resource deltas per tick).
//! A [`Buff`] is one application of a template to a character. Repeated
//! applications become stacks on the first instance, up to `max_stacks`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use crate::attributes::{AttributeId, AttributeSet};
use crate::constants::TOOLTIP_LABEL_WIDTH;

pub type BuffTemplateId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffAttributeBonus {
    pub attribute: AttributeId,
    pub value: i32,
}

/// Periodic effect, scaled by the stack count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuffTickEffect {
    Restore { attribute: AttributeId, amount: i32 },
    Drain { attribute: AttributeId, amount: i32 },
}

fn default_max_stacks() -> u32 {
    1
}

fn default_refresh() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTemplate {
    pub id: BuffTemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Seconds until expiry
    pub duration: f32,
    /// Seconds between periodic effects (0 = none)
    #[serde(default)]
    pub tick_rate: f32,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    /// Reset the remaining time when a stack is added
    #[serde(default = "default_refresh")]
    pub refresh_on_stack: bool,
    #[serde(default)]
    pub is_debuff: bool,
    #[serde(default)]
    pub attribute_bonuses: Vec<BuffAttributeBonus>,
    #[serde(default)]
    pub tick_effects: Vec<BuffTickEffect>,
}

impl BuffTemplate {
    /// Grant the template's bonuses to a fresh instance
    fn on_apply(&self, buff: &mut Buff, attributes: &mut AttributeSet) {
        for bonus in &self.attribute_bonuses {
            if attributes.add_modifier(bonus.attribute, bonus.value) {
                buff.attribute_bonuses.push(*bonus);
            }
        }
    }

    /// Take back every bonus granted by the instance and its stacks
    fn on_remove(&self, buff: &mut Buff, attributes: &mut AttributeSet) {
        for stack in &mut buff.stacks {
            self.on_remove(stack, attributes);
        }
        for bonus in buff.attribute_bonuses.drain(..) {
            attributes.add_modifier(bonus.attribute, -bonus.value);
        }
    }

    fn on_tick(&self, stack_count: u32, attributes: &mut AttributeSet) {
        let scale = stack_count as i32;
        for effect in &self.tick_effects {
            let (attribute, amount, restore) = match *effect {
                BuffTickEffect::Restore { attribute, amount } => (attribute, amount, true),
                BuffTickEffect::Drain { attribute, amount } => (attribute, amount, false),
            };
            let Some(pool) = attributes.resource_mut(attribute) else {
                continue;
            };
            let amount = amount.saturating_mul(scale);
            let result = if restore {
                pool.restore(amount)
            } else {
                pool.consume(amount)
            };
            if let Err(err) = result {
                debug!(buff = self.id, %err, "Skipped buff tick effect");
            }
        }
    }

    /// A new stack carries its own copy of the bonuses
    fn on_apply_stack(&self, stack: &mut Buff, attributes: &mut AttributeSet) {
        self.on_apply(stack, attributes);
    }
}

#[derive(Debug, Clone)]
pub struct Buff {
    template: Arc<BuffTemplate>,
    tick_time: f32,
    remaining_time: f32,
    attribute_bonuses: Vec<BuffAttributeBonus>,
    stacks: Vec<Buff>,
}

impl Buff {
    pub fn new(template: Arc<BuffTemplate>) -> Self {
        Self {
            tick_time: template.tick_rate,
            remaining_time: template.duration,
            template,
            attribute_bonuses: Vec::new(),
            stacks: Vec::new(),
        }
    }

    pub fn template(&self) -> &Arc<BuffTemplate> {
        &self.template
    }

    pub fn template_id(&self) -> BuffTemplateId {
        self.template.id
    }

    pub fn tick_time(&self) -> f32 {
        self.tick_time
    }

    pub fn remaining_time(&self) -> f32 {
        self.remaining_time
    }

    pub fn attribute_bonuses(&self) -> &[BuffAttributeBonus] {
        &self.attribute_bonuses
    }

    pub fn stacks(&self) -> &[Buff] {
        &self.stacks
    }

    /// The instance itself plus its stacks
    pub fn stack_count(&self) -> u32 {
        1 + self.stacks.len() as u32
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_time <= 0.0
    }

    pub fn subtract_time(&mut self, seconds: f32) {
        self.remaining_time -= seconds;
    }

    pub fn subtract_tick_time(&mut self, seconds: f32) {
        self.tick_time -= seconds;
    }

    pub fn reset_duration(&mut self) {
        self.remaining_time = self.template.duration;
    }

    /// Fire the periodic effect if it is due.
    ///
    /// At most one effect per call: a tick timer far below zero is reset,
    /// not replayed.
    pub fn try_tick(&mut self, attributes: &mut AttributeSet) -> bool {
        if self.template.tick_rate <= 0.0 || self.tick_time > 0.0 {
            return false;
        }
        self.template.on_tick(self.stack_count(), attributes);
        self.tick_time = self.template.tick_rate;
        true
    }

    pub fn apply(&mut self, attributes: &mut AttributeSet) {
        let template = self.template.clone();
        template.on_apply(self, attributes);
    }

    /// Run the remove callback and drop all bonuses and stacks
    pub fn remove(&mut self, attributes: &mut AttributeSet) {
        let template = self.template.clone();
        template.on_remove(self, attributes);
        self.stacks.clear();
    }

    pub fn add_stack(&mut self, mut stack: Buff, attributes: &mut AttributeSet) {
        let template = self.template.clone();
        template.on_apply_stack(&mut stack, attributes);
        self.stacks.push(stack);
    }

    /// Remove the newest stack. Returns false if there is none.
    pub fn remove_stack(&mut self, attributes: &mut AttributeSet) -> bool {
        let Some(mut stack) = self.stacks.pop() else {
            return false;
        };
        let template = self.template.clone();
        template.on_remove(&mut stack, attributes);
        true
    }

    pub fn tooltip(&self) -> String {
        let width = TOOLTIP_LABEL_WIDTH;
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.template.name);
        if !self.template.description.is_empty() {
            let _ = writeln!(out, "{}", self.template.description);
        }
        let _ = writeln!(out, "{:<width$}{:.1}s", "Remaining", self.remaining_time.max(0.0));
        if self.template.tick_rate > 0.0 {
            let _ = writeln!(out, "{:<width$}{:.1}s", "Tick Rate", self.template.tick_rate);
        }
        let _ = writeln!(out, "{:<width$}{}", "Stacks", self.stack_count());
        for bonus in &self.template.attribute_bonuses {
            let _ = writeln!(
                out,
                "{:<width$}{:+}",
                format!("Bonus [{}]", bonus.attribute),
                bonus.value.saturating_mul(self.stack_count() as i32)
            );
        }
        out
    }

    pub fn summary_json(&self) -> String {
        serde_json::json!({
            "template_id": self.template.id,
            "name": self.template.name,
            "remaining_time": self.remaining_time,
            "tick_time": self.tick_time,
            "stacks": self.stack_count(),
        })
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffApplication {
    Applied,
    Stacked { stacks: u32 },
    /// At the stack cap; only the duration was refreshed
    Refreshed,
    /// At the stack cap of a non-refreshing buff; nothing changed
    Capped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuffTickReport {
    pub ticked: Vec<BuffTemplateId>,
    pub expired: Vec<BuffTemplateId>,
}

/// Active buffs of one character, one instance per template
#[derive(Debug, Clone, Default)]
pub struct BuffController {
    buffs: BTreeMap<BuffTemplateId, Buff>,
}

impl BuffController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        template: Arc<BuffTemplate>,
        attributes: &mut AttributeSet,
    ) -> BuffApplication {
        let Some(existing) = self.buffs.get_mut(&template.id) else {
            let mut buff = Buff::new(template.clone());
            buff.apply(attributes);
            self.buffs.insert(template.id, buff);
            debug!(buff = template.id, "Buff applied");
            return BuffApplication::Applied;
        };

        if template.refresh_on_stack {
            existing.reset_duration();
        }
        if existing.stack_count() >= template.max_stacks.max(1) {
            return if template.refresh_on_stack {
                BuffApplication::Refreshed
            } else {
                BuffApplication::Capped
            };
        }
        existing.add_stack(Buff::new(template), attributes);
        BuffApplication::Stacked {
            stacks: existing.stack_count(),
        }
    }

    /// Dispel a buff entirely
    pub fn remove(&mut self, template_id: BuffTemplateId, attributes: &mut AttributeSet) -> bool {
        let Some(mut buff) = self.buffs.remove(&template_id) else {
            return false;
        };
        buff.remove(attributes);
        true
    }

    /// Drop one stack; the last stack removes the buff
    pub fn remove_stack(
        &mut self,
        template_id: BuffTemplateId,
        attributes: &mut AttributeSet,
    ) -> bool {
        let Some(buff) = self.buffs.get_mut(&template_id) else {
            return false;
        };
        if !buff.remove_stack(attributes) {
            return self.remove(template_id, attributes);
        }
        true
    }

    /// Advance every buff by `dt`: count down, fire due ticks, expire.
    pub fn tick(&mut self, dt: f32, attributes: &mut AttributeSet) -> BuffTickReport {
        let mut report = BuffTickReport::default();
        for (id, buff) in self.buffs.iter_mut() {
            buff.subtract_time(dt);
            buff.subtract_tick_time(dt);
            if buff.try_tick(attributes) {
                report.ticked.push(*id);
            }
            if buff.is_expired() {
                report.expired.push(*id);
            }
        }
        for id in &report.expired {
            if let Some(mut buff) = self.buffs.remove(id) {
                buff.remove(attributes);
                debug!(buff = id, "Buff expired");
            }
        }
        report
    }

    /// Remove every buff, running remove callbacks
    pub fn clear(&mut self, attributes: &mut AttributeSet) {
        for (_, mut buff) in std::mem::take(&mut self.buffs) {
            buff.remove(attributes);
        }
    }

    pub fn get(&self, template_id: BuffTemplateId) -> Option<&Buff> {
        self.buffs.get(&template_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.buffs.values()
    }

    pub fn len(&self) -> usize {
        self.buffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }

    /// Sum of bonuses currently granted, per attribute
    pub fn bonus_totals(&self) -> BTreeMap<AttributeId, i32> {
        fn collect(buff: &Buff, totals: &mut BTreeMap<AttributeId, i32>) {
            for bonus in &buff.attribute_bonuses {
                *totals.entry(bonus.attribute).or_insert(0) += bonus.value;
            }
            for stack in &buff.stacks {
                collect(stack, totals);
            }
        }
        let mut totals = BTreeMap::new();
        for buff in self.buffs.values() {
            collect(buff, &mut totals);
        }
        totals.retain(|_, value| *value != 0);
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeTemplate;

    const HEALTH: AttributeId = 1;
    const STRENGTH: AttributeId = 2;

    fn attributes() -> AttributeSet {
        let mut set = AttributeSet::new();
        set.set_resource_attribute(
            Arc::new(AttributeTemplate {
                id: HEALTH,
                name: "Health".into(),
                description: String::new(),
                is_resource_attribute: true,
                default_value: 100,
                regen_per_second: 0.0,
            }),
            100,
            0,
            100,
        )
        .unwrap();
        set.set_attribute(
            Arc::new(AttributeTemplate {
                id: STRENGTH,
                name: "Strength".into(),
                description: String::new(),
                is_resource_attribute: false,
                default_value: 10,
                regen_per_second: 0.0,
            }),
            10,
            0,
        )
        .unwrap();
        set
    }

    fn burning() -> Arc<BuffTemplate> {
        Arc::new(BuffTemplate {
            id: 1,
            name: "Burning".into(),
            description: String::new(),
            duration: 3.5,
            tick_rate: 1.0,
            max_stacks: 3,
            refresh_on_stack: true,
            is_debuff: true,
            attribute_bonuses: vec![BuffAttributeBonus {
                attribute: STRENGTH,
                value: -2,
            }],
            tick_effects: vec![BuffTickEffect::Drain {
                attribute: HEALTH,
                amount: 5,
            }],
        })
    }

    #[test]
    fn test_tick_fires_once_per_check() {
        let mut attrs = attributes();
        let mut buff = Buff::new(burning());
        buff.subtract_tick_time(10.0);
        assert!(buff.try_tick(&mut attrs));
        assert_eq!(buff.tick_time(), 1.0);
        assert!(!buff.try_tick(&mut attrs));
        assert_eq!(attrs.current_value(HEALTH), Some(95));
    }

    #[test]
    fn test_ticks_then_expires() {
        let mut attrs = attributes();
        let mut controller = BuffController::new();
        controller.apply(burning(), &mut attrs);

        let mut fired = 0;
        let mut expired_at = None;
        for step in 1..=4 {
            let report = controller.tick(1.5, &mut attrs);
            fired += report.ticked.len();
            if !report.expired.is_empty() && expired_at.is_none() {
                expired_at = Some(step);
            }
        }
        assert_eq!(fired, 3);
        assert_eq!(expired_at, Some(3));
        assert!(controller.is_empty());
        assert_eq!(attrs.current_value(HEALTH), Some(85));
        assert_eq!(attrs.final_value(STRENGTH), Some(10));
    }

    #[test]
    fn test_stacks_append_and_scale_ticks() {
        let mut attrs = attributes();
        let mut controller = BuffController::new();
        assert_eq!(controller.apply(burning(), &mut attrs), BuffApplication::Applied);
        assert_eq!(
            controller.apply(burning(), &mut attrs),
            BuffApplication::Stacked { stacks: 2 }
        );
        assert_eq!(attrs.final_value(STRENGTH), Some(6));
        assert_eq!(controller.bonus_totals(), BTreeMap::from([(STRENGTH, -4)]));

        controller.tick(1.0, &mut attrs);
        assert_eq!(attrs.current_value(HEALTH), Some(90));
    }

    #[test]
    fn test_stack_cap_refreshes() {
        let mut attrs = attributes();
        let mut controller = BuffController::new();
        for _ in 0..3 {
            controller.apply(burning(), &mut attrs);
        }
        controller.tick(2.0, &mut attrs);
        assert_eq!(controller.apply(burning(), &mut attrs), BuffApplication::Refreshed);
        let buff = controller.get(1).unwrap();
        assert_eq!(buff.stack_count(), 3);
        assert_eq!(buff.remaining_time(), 3.5);
    }

    #[test]
    fn test_stack_cap_without_refresh_keeps_duration() {
        let mut attrs = attributes();
        let mut controller = BuffController::new();
        let template = Arc::new(BuffTemplate {
            max_stacks: 2,
            refresh_on_stack: false,
            ..(*burning()).clone()
        });
        controller.apply(template.clone(), &mut attrs);
        controller.apply(template.clone(), &mut attrs);
        controller.tick(2.0, &mut attrs);
        assert_eq!(controller.apply(template, &mut attrs), BuffApplication::Capped);
        let buff = controller.get(1).unwrap();
        assert_eq!(buff.stack_count(), 2);
        assert_eq!(buff.remaining_time(), 1.5);
        assert_eq!(attrs.final_value(STRENGTH), Some(6));
    }

    #[test]
    fn test_remove_stack_then_dispel() {
        let mut attrs = attributes();
        let mut controller = BuffController::new();
        controller.apply(burning(), &mut attrs);
        controller.apply(burning(), &mut attrs);
        assert!(controller.remove_stack(1, &mut attrs));
        assert_eq!(attrs.final_value(STRENGTH), Some(8));
        assert!(controller.remove_stack(1, &mut attrs));
        assert!(controller.is_empty());
        assert_eq!(attrs.final_value(STRENGTH), Some(10));
        assert!(!controller.remove(1, &mut attrs));
    }

    #[test]
    fn test_tooltip_and_summary() {
        let buff = Buff::new(burning());
        let text = buff.tooltip();
        assert!(text.contains("Burning"));
        assert!(text.contains("Bonus [2]"));
        let json: serde_json::Value = serde_json::from_str(&buff.summary_json()).unwrap();
        assert_eq!(json["stacks"], 1);
    }
}
