//! Error taxonomy for the gameplay core.
//!
//! Activation rejections (`RequirementNotMet`, `InsufficientResource`,
//! `NoValidTarget`, `OnCooldown`, `Busy`) are expected outcomes and are
//! returned as values. `Configuration` and `InvalidArgument` indicate broken
//! data or a caller bug.

use crate::abilities::AbilityId;
use crate::attributes::AttributeId;
use crate::character::CharacterId;

/// Result alias used across the crate
pub type GameplayResult<T> = Result<T, GameplayError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameplayError {
    /// Missing or invalid template reference. Fatal at load time.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("requirement not met: attribute {attribute} needs {required}, has {current:?}")]
    RequirementNotMet {
        attribute: AttributeId,
        required: i32,
        /// `None` when the character lacks the attribute entirely
        current: Option<i32>,
    },

    #[error("insufficient resource: attribute {attribute} needs {required}, has {available:?}")]
    InsufficientResource {
        attribute: AttributeId,
        required: i32,
        available: Option<i32>,
    },

    #[error("ability {ability_id} requires a target")]
    NoValidTarget { ability_id: AbilityId },

    #[error("ability {ability_id} is on cooldown ({remaining:.2}s remaining)")]
    OnCooldown { ability_id: AbilityId, remaining: f32 },

    #[error("character is already casting ability {casting}")]
    Busy { casting: AbilityId },

    #[error("unknown ability {0}")]
    UnknownAbility(AbilityId),

    #[error("unknown character {0}")]
    UnknownCharacter(CharacterId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GameplayError {
    /// Expected activation outcome (report to the player, keep running)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RequirementNotMet { .. }
                | Self::InsufficientResource { .. }
                | Self::NoValidTarget { .. }
                | Self::OnCooldown { .. }
                | Self::Busy { .. }
        )
    }

    /// Broken data reference; the process should not continue with this catalog
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Stable identifier for logs and metrics
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::RequirementNotMet { .. } => "requirement_not_met",
            Self::InsufficientResource { .. } => "insufficient_resource",
            Self::NoValidTarget { .. } => "no_valid_target",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::Busy { .. } => "busy",
            Self::UnknownAbility(_) => "unknown_ability",
            Self::UnknownCharacter(_) => "unknown_character",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_recoverable() {
        assert!(GameplayError::NoValidTarget { ability_id: 1 }.is_rejection());
        assert!(GameplayError::InsufficientResource {
            attribute: 2,
            required: 10,
            available: Some(3),
        }
        .is_rejection());
        assert!(!GameplayError::Configuration("missing".into()).is_rejection());
        assert!(!GameplayError::InvalidArgument("negative".into()).is_rejection());
    }

    #[test]
    fn test_configuration_is_fatal() {
        assert!(GameplayError::Configuration("bad ref".into()).is_fatal());
        assert!(!GameplayError::UnknownAbility(3).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = GameplayError::RequirementNotMet {
            attribute: 4,
            required: 20,
            current: None,
        };
        let text = err.to_string();
        assert!(text.contains("attribute 4"));
        assert!(text.contains("20"));
        assert_eq!(err.code(), "requirement_not_met");
    }
}
