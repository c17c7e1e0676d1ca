//! Centralized gameplay constants.
//!
//! Per-module tuning (template values, buff durations) lives in the catalog
//! data, not here. Only values the simulation itself depends on belong in
//! this file.

// =====================================================
// Simulation loop
// =====================================================

/// Default fixed-step rate of the authoritative simulation (Hz)
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Default seed for the simulation RNG (container IDs)
pub const DEFAULT_RNG_SEED: u64 = 0x5EED_CAFE;

// =====================================================
// Ability objects
// =====================================================

/// Upper bound on container ID draws before a spawn is rejected.
///
/// With a 32-bit ID space the chance of needing more than a handful of draws
/// is negligible; hitting this bound means the table is pathologically full.
pub const MAX_CONTAINER_ID_ATTEMPTS: u32 = 64;

/// Object index assigned to the first object of each container
pub const FIRST_OBJECT_ID: i32 = 0;

/// Hit-count deduction of a hit event that leaves it unspecified
pub const DEFAULT_HIT_COST: i32 = 1;

/// Attack speed points that halve an object's active time
pub const ATTACK_SPEED_SCALE: f32 = 100.0;

// =====================================================
// Presentation
// =====================================================

/// Width of the stat column in plain-text tooltips
pub const TOOLTIP_LABEL_WIDTH: usize = 16;
