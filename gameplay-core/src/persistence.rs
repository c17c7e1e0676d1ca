//! Attribute save/load records exchanged with the storage layer.
//!
//! One row per `(character_id, template_id)`. Plain attributes are stored
//! with `current_value = 0`. The stored modifier excludes bonuses granted
//! by active buffs, which are not persisted and would otherwise be counted
//! twice after a reload.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attributes::{AttributeId, AttributeSet};
use crate::buffs::BuffController;
use crate::catalog::TemplateCatalog;
use crate::character::{Character, CharacterId};
use crate::error::GameplayResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub character_id: CharacterId,
    pub template_id: AttributeId,
    pub base_value: i32,
    pub modifier: i32,
    pub current_value: i32,
}

/// Full attribute state of one character, committed as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterAttributeSnapshot {
    pub character_id: CharacterId,
    pub records: Vec<AttributeRecord>,
}

impl CharacterAttributeSnapshot {
    pub fn capture(character: &Character) -> Self {
        Self::from_parts(character.id, &character.attributes, &character.buffs)
    }

    pub fn from_parts(
        character_id: CharacterId,
        attributes: &AttributeSet,
        buffs: &BuffController,
    ) -> Self {
        let bonuses = buffs.bonus_totals();
        let bonus = |id: AttributeId| bonuses.get(&id).copied().unwrap_or(0);

        let plain = attributes.attributes().map(|a| AttributeRecord {
            character_id,
            template_id: a.id(),
            base_value: a.base_value(),
            modifier: a.modifier() - bonus(a.id()),
            current_value: 0,
        });
        let pools = attributes.resources().map(|r| AttributeRecord {
            character_id,
            template_id: r.id(),
            base_value: r.base_value(),
            modifier: r.modifier() - bonus(r.id()),
            current_value: r.current_value(),
        });
        let mut records: Vec<AttributeRecord> = plain.chain(pools).collect();
        records.sort_by_key(|r| r.template_id);
        Self {
            character_id,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Apply stored rows onto `attributes`.
///
/// Rows for another character are skipped. A row naming a template the
/// catalog does not know is a configuration error. Returns rows applied.
pub fn load_records(
    attributes: &mut AttributeSet,
    catalog: &TemplateCatalog,
    character_id: CharacterId,
    records: &[AttributeRecord],
) -> GameplayResult<usize> {
    let mut applied = 0;
    for record in records {
        if record.character_id != character_id {
            warn!(
                expected = character_id,
                found = record.character_id,
                "Skipping attribute row for another character"
            );
            continue;
        }
        let template = catalog.attribute(record.template_id)?.clone();
        if template.is_resource_attribute {
            attributes.set_resource_attribute(
                template,
                record.base_value,
                record.modifier,
                record.current_value,
            )?;
        } else {
            attributes.set_attribute(template, record.base_value, record.modifier)?;
        }
        applied += 1;
    }
    Ok(applied)
}
