//! Character attributes.
//!
//! Two kinds share one template type:
//! - plain attributes (strength, armor): `final = base + modifier`
//! - resource attributes (health, mana, stamina): a pool whose
//!   `current_value` always stays inside `[0, final]`
//!
//! Modifiers come from buffs and equipment and are applied through
//! [`AttributeSet::add_modifier`], which re-clamps any affected pool.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GameplayError, GameplayResult};

pub type AttributeId = u32;

/// Immutable attribute definition loaded from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTemplate {
    pub id: AttributeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_resource_attribute: bool,
    /// Base value given to freshly created characters
    #[serde(default)]
    pub default_value: i32,
    /// Passive regeneration of resource pools, in points per second
    #[serde(default)]
    pub regen_per_second: f32,
}

/// Plain numeric attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    template: Arc<AttributeTemplate>,
    base_value: i32,
    modifier: i32,
}

impl Attribute {
    pub fn new(template: Arc<AttributeTemplate>, base_value: i32, modifier: i32) -> Self {
        Self {
            template,
            base_value,
            modifier,
        }
    }

    pub fn template(&self) -> &AttributeTemplate {
        &self.template
    }

    pub fn id(&self) -> AttributeId {
        self.template.id
    }

    pub fn base_value(&self) -> i32 {
        self.base_value
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    pub fn final_value(&self) -> i32 {
        self.base_value.saturating_add(self.modifier)
    }

    pub fn set_values(&mut self, base_value: i32, modifier: i32) {
        self.base_value = base_value;
        self.modifier = modifier;
    }

    pub fn add_modifier(&mut self, delta: i32) {
        self.modifier = self.modifier.saturating_add(delta);
    }
}

/// Resource pool attribute (health, mana, ...)
#[derive(Debug, Clone)]
pub struct ResourceAttribute {
    attribute: Attribute,
    current_value: i32,
    /// Fractional regen not yet applied as a whole point
    regen_carry: f32,
}

impl ResourceAttribute {
    /// Create a pool; `current_value` is clamped into range.
    pub fn new(
        template: Arc<AttributeTemplate>,
        base_value: i32,
        modifier: i32,
        current_value: i32,
    ) -> Self {
        let mut pool = Self {
            attribute: Attribute::new(template, base_value, modifier),
            current_value,
            regen_carry: 0.0,
        };
        pool.clamp();
        pool
    }

    pub fn template(&self) -> &AttributeTemplate {
        self.attribute.template()
    }

    pub fn id(&self) -> AttributeId {
        self.attribute.id()
    }

    pub fn base_value(&self) -> i32 {
        self.attribute.base_value()
    }

    pub fn modifier(&self) -> i32 {
        self.attribute.modifier()
    }

    pub fn final_value(&self) -> i32 {
        self.attribute.final_value()
    }

    /// Upper bound of the pool; a negative final value empties it
    pub fn capacity(&self) -> i32 {
        self.final_value().max(0)
    }

    pub fn current_value(&self) -> i32 {
        self.current_value
    }

    pub fn is_full(&self) -> bool {
        self.current_value >= self.capacity()
    }

    pub fn is_depleted(&self) -> bool {
        self.current_value == 0
    }

    /// Remove up to `amount` from the pool. Returns the amount actually removed.
    ///
    /// Negative amounts are rejected with `InvalidArgument` and leave the pool
    /// untouched.
    pub fn consume(&mut self, amount: i32) -> GameplayResult<i32> {
        if amount < 0 {
            return Err(GameplayError::InvalidArgument(format!(
                "cannot consume negative amount {amount} from attribute {}",
                self.id()
            )));
        }
        let before = self.current_value;
        self.current_value = before.saturating_sub(amount).max(0);
        Ok(before - self.current_value)
    }

    /// Add up to `amount` to the pool. Returns the amount actually restored.
    pub fn restore(&mut self, amount: i32) -> GameplayResult<i32> {
        if amount < 0 {
            return Err(GameplayError::InvalidArgument(format!(
                "cannot restore negative amount {amount} to attribute {}",
                self.id()
            )));
        }
        let before = self.current_value;
        self.current_value = before.saturating_add(amount).min(self.capacity());
        Ok(self.current_value - before)
    }

    pub fn set_values(&mut self, base_value: i32, modifier: i32, current_value: i32) {
        self.attribute.set_values(base_value, modifier);
        self.current_value = current_value;
        self.clamp();
    }

    pub fn add_modifier(&mut self, delta: i32) {
        self.attribute.add_modifier(delta);
        self.clamp();
    }

    /// Apply passive regeneration for `dt` seconds. Returns points restored.
    pub fn regen(&mut self, dt: f32) -> i32 {
        let rate = self.template().regen_per_second;
        if rate <= 0.0 || dt <= 0.0 {
            return 0;
        }
        if self.is_full() {
            self.regen_carry = 0.0;
            return 0;
        }
        self.regen_carry += rate * dt;
        let whole = self.regen_carry.floor();
        if whole < 1.0 {
            return 0;
        }
        self.regen_carry -= whole;
        let restored = self.restore(whole as i32).unwrap_or(0);
        if self.is_full() {
            self.regen_carry = 0.0;
        }
        restored
    }

    fn clamp(&mut self) {
        self.current_value = self.current_value.clamp(0, self.capacity());
    }
}

/// All attributes owned by one character
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    attributes: BTreeMap<AttributeId, Attribute>,
    resources: BTreeMap<AttributeId, ResourceAttribute>,
    /// Set by every mutation; cleared when a save snapshot is taken
    dirty: bool,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default-initialize from templates: plain attributes at their default
    /// value, pools at their default value and full.
    pub fn from_templates<'a, I>(templates: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<AttributeTemplate>>,
    {
        let mut set = Self::new();
        for template in templates {
            let base = template.default_value;
            if template.is_resource_attribute {
                set.resources.insert(
                    template.id,
                    ResourceAttribute::new(template.clone(), base, 0, base),
                );
            } else {
                set.attributes
                    .insert(template.id, Attribute::new(template.clone(), base, 0));
            }
        }
        set
    }

    /// Upsert a plain attribute
    pub fn set_attribute(
        &mut self,
        template: Arc<AttributeTemplate>,
        base_value: i32,
        modifier: i32,
    ) -> GameplayResult<()> {
        if template.is_resource_attribute {
            return Err(GameplayError::InvalidArgument(format!(
                "attribute {} is a resource attribute",
                template.id
            )));
        }
        self.attributes
            .entry(template.id)
            .and_modify(|a| a.set_values(base_value, modifier))
            .or_insert_with(|| Attribute::new(template.clone(), base_value, modifier));
        self.dirty = true;
        Ok(())
    }

    /// Upsert a resource attribute; `current_value` is clamped
    pub fn set_resource_attribute(
        &mut self,
        template: Arc<AttributeTemplate>,
        base_value: i32,
        modifier: i32,
        current_value: i32,
    ) -> GameplayResult<()> {
        if !template.is_resource_attribute {
            return Err(GameplayError::InvalidArgument(format!(
                "attribute {} is not a resource attribute",
                template.id
            )));
        }
        self.resources
            .entry(template.id)
            .and_modify(|r| r.set_values(base_value, modifier, current_value))
            .or_insert_with(|| {
                ResourceAttribute::new(template.clone(), base_value, modifier, current_value)
            });
        self.dirty = true;
        Ok(())
    }

    pub fn get_attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.get(&id)
    }

    pub fn try_get_resource_attribute(&self, id: AttributeId) -> Option<&ResourceAttribute> {
        self.resources.get(&id)
    }

    /// Mutable pool access. Marks the set dirty.
    pub fn resource_mut(&mut self, id: AttributeId) -> Option<&mut ResourceAttribute> {
        let pool = self.resources.get_mut(&id)?;
        self.dirty = true;
        Some(pool)
    }

    /// Final value of either kind of attribute
    pub fn final_value(&self, id: AttributeId) -> Option<i32> {
        self.attributes
            .get(&id)
            .map(Attribute::final_value)
            .or_else(|| self.resources.get(&id).map(ResourceAttribute::final_value))
    }

    /// Current pool value (resource attributes only)
    pub fn current_value(&self, id: AttributeId) -> Option<i32> {
        self.resources.get(&id).map(ResourceAttribute::current_value)
    }

    /// Add `delta` to the modifier of either kind of attribute.
    /// Returns false when the character has no such attribute.
    pub fn add_modifier(&mut self, id: AttributeId, delta: i32) -> bool {
        if let Some(attribute) = self.attributes.get_mut(&id) {
            attribute.add_modifier(delta);
        } else if let Some(pool) = self.resources.get_mut(&id) {
            pool.add_modifier(delta);
        } else {
            return false;
        }
        self.dirty = true;
        true
    }

    /// Regenerate every pool. Returns total points restored.
    pub fn regen(&mut self, dt: f32) -> i32 {
        let restored: i32 = self.resources.values_mut().map(|r| r.regen(dt)).sum();
        if restored > 0 {
            self.dirty = true;
        }
        restored
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceAttribute> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len() + self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
