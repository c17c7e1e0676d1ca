//! A simulated character: attributes, abilities and buffs under one owner.

use bevy::math::Vec3;

use crate::abilities::{speed_reduction, AbilityController, CasterInfo};
use crate::attributes::{AttributeId, AttributeSet};
use crate::buffs::BuffController;

pub type CharacterId = i64;

#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub position: Vec3,
    /// Unit vector the character faces
    pub facing: Vec3,
    /// Casting socket relative to `position`
    pub hand_offset: Vec3,
    pub attributes: AttributeSet,
    pub abilities: AbilityController,
    pub buffs: BuffController,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>, attributes: AttributeSet) -> Self {
        Self {
            id,
            name: name.into(),
            position: Vec3::ZERO,
            facing: Vec3::Z,
            hand_offset: Vec3::new(0.4, 1.2, 0.3),
            attributes,
            abilities: AbilityController::new(),
            buffs: BuffController::new(),
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Point the character at `point`; ignored if it is the current position
    pub fn face_towards(&mut self, point: Vec3) {
        let direction = (point - self.position).normalize_or_zero();
        if direction != Vec3::ZERO {
            self.facing = direction;
        }
    }

    pub fn hand_position(&self) -> Vec3 {
        self.position + self.hand_offset
    }

    /// Caster snapshot. `attack_speed` names the attribute whose final
    /// value shortens object lifetimes; `None` disables the reduction.
    pub fn caster_info(&self, attack_speed: Option<AttributeId>) -> CasterInfo {
        let points = attack_speed
            .and_then(|id| self.attributes.final_value(id))
            .unwrap_or(0);
        CasterInfo {
            id: self.id,
            position: self.position,
            facing: self.facing,
            hand_position: self.hand_position(),
            speed_reduction: speed_reduction(points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_towards() {
        let mut character = Character::new(1, "Ayla", AttributeSet::new());
        character.face_towards(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(character.facing, Vec3::X);
        character.face_towards(Vec3::ZERO);
        assert_eq!(character.facing, Vec3::X);
    }

    #[test]
    fn test_caster_info_uses_hand_socket() {
        let character = Character::new(1, "Ayla", AttributeSet::new())
            .with_position(Vec3::new(1.0, 0.0, 0.0));
        let info = character.caster_info(None);
        assert_eq!(info.hand_position, Vec3::new(1.4, 1.2, 0.3));
        assert_eq!(info.facing, Vec3::Z);
        assert_eq!(info.speed_reduction, 1.0);
        // unknown attribute counts as no attack speed
        assert_eq!(character.caster_info(Some(9)).speed_reduction, 1.0);
    }
}
