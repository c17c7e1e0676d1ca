//! Object spawning: container allocation, origin resolution and the
//! prespawn → spawn → activate pipeline.

use bevy::math::Vec3;
use rand::Rng;
use tracing::debug;

use super::ability::Ability;
use super::event::SpawnPhase;
use super::objects::{AbilityObject, ContainerId, ObjectId, ObjectKey, ObjectState, ObjectTable};
use super::template::SpawnTarget;
use crate::character::CharacterId;
use crate::constants::{ATTACK_SPEED_SCALE, FIRST_OBJECT_ID, MAX_CONTAINER_ID_ATTEMPTS};
use crate::error::{GameplayError, GameplayResult};

/// Caster snapshot taken at activation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasterInfo {
    pub id: CharacterId,
    pub position: Vec3,
    pub facing: Vec3,
    pub hand_position: Vec3,
    /// Multiplier on object active time, from attack speed (1.0 = none)
    pub speed_reduction: f32,
}

/// Active-time multiplier for `points` of attack speed.
///
/// Diminishing: 100 points halve lifetimes, 300 quarter them. Negative
/// values count as zero.
pub fn speed_reduction(points: i32) -> f32 {
    ATTACK_SPEED_SCALE / (ATTACK_SPEED_SCALE + points.max(0) as f32)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetInfo {
    pub target: Option<CharacterId>,
    pub target_position: Option<Vec3>,
    /// Surface point under the cursor/reticle, if any
    pub hit_position: Option<Vec3>,
}

impl TargetInfo {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn character(id: CharacterId, position: Vec3) -> Self {
        Self {
            target: Some(id),
            target_position: Some(position),
            hit_position: None,
        }
    }

    pub fn point(position: Vec3) -> Self {
        Self {
            target: None,
            target_position: None,
            hit_position: Some(position),
        }
    }
}

/// State handed to spawn behaviors while a container is built
pub struct SpawnContext<'a> {
    pub caster: &'a CasterInfo,
    pub target: &'a TargetInfo,
    pub prototype: &'a mut AbilityObject,
    pub next_id: &'a mut ObjectId,
    pub objects: &'a mut Vec<AbilityObject>,
}

impl SpawnContext<'_> {
    /// Number and collect an object built from the prototype
    pub fn emit(&mut self, mut object: AbilityObject) {
        object.object_id = *self.next_id;
        object.state = ObjectState::Pending;
        *self.next_id += 1;
        self.objects.push(object);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOutcome {
    pub container_id: ContainerId,
    pub objects: Vec<ObjectKey>,
}

/// Resolve where objects appear and which way they travel.
///
/// `None` origin means the ability spawns nothing.
pub fn resolve_origin(
    ability: &Ability,
    caster: &CasterInfo,
    target: &TargetInfo,
) -> GameplayResult<Option<(Vec3, Vec3)>> {
    let Some(spawn_target) = ability.template().spawn_target else {
        return Ok(None);
    };
    let origin = match spawn_target {
        SpawnTarget::Caster => (caster.position, caster.facing),
        SpawnTarget::Hand => (caster.hand_position, caster.facing),
        SpawnTarget::Target => {
            let point = target
                .hit_position
                .or(target.target_position)
                .ok_or(GameplayError::NoValidTarget {
                    ability_id: ability.id(),
                })?;
            let direction = (point - caster.position).normalize_or_zero();
            let direction = if direction == Vec3::ZERO {
                caster.facing
            } else {
                direction
            };
            (point, direction)
        }
    };
    Ok(Some(origin))
}

/// Draw a container ID not present in `table`.
///
/// Draws from the full `i32` range and retries on collision, up to
/// [`MAX_CONTAINER_ID_ATTEMPTS`] times.
pub fn allocate_container_id<R: Rng>(
    table: &ObjectTable,
    rng: &mut R,
) -> GameplayResult<ContainerId> {
    for _ in 0..MAX_CONTAINER_ID_ATTEMPTS {
        let candidate: ContainerId = rng.gen();
        if !table.contains_container(candidate) {
            return Ok(candidate);
        }
    }
    Err(GameplayError::Configuration(format!(
        "no free container id after {MAX_CONTAINER_ID_ATTEMPTS} attempts"
    )))
}

/// Build a container of objects and activate them.
///
/// Pre-spawn events shape the prototype, spawn events emit copies of it.
/// Objects enter the table only after every spawn event has run, so a
/// partially built container is never visible.
pub fn run_spawn_pipeline(
    ability: &mut Ability,
    container_id: ContainerId,
    origin: (Vec3, Vec3),
    caster: &CasterInfo,
    target: &TargetInfo,
) -> SpawnOutcome {
    let (position, direction) = origin;
    let stats = *ability.stats();
    let mut prototype = AbilityObject {
        container_id,
        object_id: FIRST_OBJECT_ID,
        ability_id: ability.id(),
        caster: caster.id,
        hit_count: ability.template().hit_count,
        remaining_active_time: stats.active_time * caster.speed_reduction,
        position,
        velocity: direction.normalize_or_zero() * stats.speed,
        state: ObjectState::Pending,
    };

    let mut next_id = FIRST_OBJECT_ID;
    let mut objects = Vec::new();
    for phase in [SpawnPhase::PreSpawn, SpawnPhase::Spawn] {
        let events: Vec<_> = ability.spawn_events(phase).cloned().collect();
        for event in events {
            let mut ctx = SpawnContext {
                caster,
                target,
                prototype: &mut prototype,
                next_id: &mut next_id,
                objects: &mut objects,
            };
            event.invoke_spawn(&mut ctx);
        }
    }

    let table = ability.objects_mut();
    table.reserve_container(container_id);
    let keys: Vec<ObjectKey> = objects
        .into_iter()
        .map(|object| {
            let key = object.key();
            table.insert(object);
            key
        })
        .collect();
    if keys.is_empty() {
        table.release_container(container_id);
    }

    debug!(
        container_id,
        objects = keys.len(),
        ability_id = ability.id(),
        "Spawned ability objects"
    );
    SpawnOutcome {
        container_id,
        objects: keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::event::{AbilityEvent, AbilityEventKind, SpawnBehavior};
    use crate::abilities::template::AbilityTemplate;
    use crate::abilities::{AbilityStats, RequirementRemoval, ResourceMap};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    fn caster() -> CasterInfo {
        CasterInfo {
            id: 1,
            position: Vec3::ZERO,
            facing: Vec3::Z,
            hand_position: Vec3::new(0.5, 1.0, 0.0),
            speed_reduction: 1.0,
        }
    }

    fn spawn_event(id: u32, phase: SpawnPhase, behavior: SpawnBehavior) -> Arc<AbilityEvent> {
        Arc::new(AbilityEvent {
            id,
            name: format!("spawn_{id}"),
            description: String::new(),
            stats: AbilityStats::default(),
            resources: ResourceMap::new(),
            requirements: ResourceMap::new(),
            kind: AbilityEventKind::Spawn { phase, behavior },
        })
    }

    fn ability(spawn_target: SpawnTarget) -> Ability {
        let template = Arc::new(AbilityTemplate {
            id: 1,
            name: "Volley".into(),
            description: String::new(),
            stats: AbilityStats {
                active_time: 3.0,
                speed: 4.0,
                ..AbilityStats::default()
            },
            resources: ResourceMap::new(),
            requirements: ResourceMap::new(),
            spawn_target: Some(spawn_target),
            hit_count: 2,
            requires_target: false,
            events: Vec::new(),
        });
        Ability::new(1, template, RequirementRemoval::Mirrored)
    }

    #[test]
    fn test_target_origin_needs_a_point() {
        let ability = ability(SpawnTarget::Target);
        assert_eq!(
            resolve_origin(&ability, &caster(), &TargetInfo::none()),
            Err(GameplayError::NoValidTarget { ability_id: 1 })
        );
        let origin = resolve_origin(&ability, &caster(), &TargetInfo::point(Vec3::new(0.0, 0.0, 8.0)))
            .unwrap()
            .unwrap();
        assert_eq!(origin.0, Vec3::new(0.0, 0.0, 8.0));
        assert_eq!(origin.1, Vec3::Z);
    }

    #[test]
    fn test_hand_origin() {
        let ability = ability(SpawnTarget::Hand);
        let (position, _) = resolve_origin(&ability, &caster(), &TargetInfo::none())
            .unwrap()
            .unwrap();
        assert_eq!(position, Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_container_ids_are_unique() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut table = ObjectTable::new();
        for _ in 0..100 {
            let id = allocate_container_id(&table, &mut rng).unwrap();
            assert!(table.reserve_container(id));
        }
        assert_eq!(table.container_count(), 100);
    }

    #[test]
    fn test_pipeline_runs_prespawn_first() {
        let mut ability = ability(SpawnTarget::Caster);
        // spawn registered before the pre-spawn offset still sees the offset
        ability.add_event(spawn_event(1, SpawnPhase::Spawn, SpawnBehavior::Single));
        ability.add_event(spawn_event(
            2,
            SpawnPhase::PreSpawn,
            SpawnBehavior::Offset { forward: 2.0, up: 1.0 },
        ));
        let outcome = run_spawn_pipeline(&mut ability, 42, (Vec3::ZERO, Vec3::Z), &caster(), &TargetInfo::none());
        assert_eq!(outcome.objects, vec![ObjectKey::new(42, 0)]);
        let object = ability.objects().get(ObjectKey::new(42, 0)).unwrap();
        assert_eq!(object.position, Vec3::new(0.0, 1.0, 2.0));
        assert_eq!(object.hit_count, 2);
        assert_eq!(object.remaining_active_time, 3.0);
        assert!(object.is_active());
    }

    #[test]
    fn test_speed_reduction_curve() {
        assert_eq!(speed_reduction(0), 1.0);
        assert_eq!(speed_reduction(-40), 1.0);
        assert_eq!(speed_reduction(100), 0.5);
        assert_eq!(speed_reduction(300), 0.25);
    }

    #[test]
    fn test_attack_speed_shortens_active_time() {
        let mut ability = ability(SpawnTarget::Caster);
        ability.add_event(spawn_event(1, SpawnPhase::Spawn, SpawnBehavior::Single));
        let hasted = CasterInfo {
            speed_reduction: speed_reduction(100),
            ..caster()
        };
        run_spawn_pipeline(&mut ability, 9, (Vec3::ZERO, Vec3::Z), &hasted, &TargetInfo::none());
        let object = ability.objects().get(ObjectKey::new(9, 0)).unwrap();
        assert_eq!(object.remaining_active_time, 1.5);
    }

    #[test]
    fn test_spread_numbers_objects_sequentially() {
        let mut ability = ability(SpawnTarget::Caster);
        ability.add_event(spawn_event(
            1,
            SpawnPhase::Spawn,
            SpawnBehavior::Spread { count: 3, arc_degrees: 90.0 },
        ));
        ability.add_event(spawn_event(2, SpawnPhase::Spawn, SpawnBehavior::Single));
        let outcome = run_spawn_pipeline(&mut ability, 7, (Vec3::ZERO, Vec3::Z), &caster(), &TargetInfo::none());
        let ids: Vec<_> = outcome.objects.iter().map(|k| k.object_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(ability.objects().container_len(7), 4);
        for object in ability.objects().iter() {
            assert!((object.velocity.length() - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_empty_pipeline_releases_container() {
        let mut ability = ability(SpawnTarget::Caster);
        let outcome = run_spawn_pipeline(&mut ability, 7, (Vec3::ZERO, Vec3::Z), &caster(), &TargetInfo::none());
        assert!(outcome.objects.is_empty());
        assert!(!ability.objects().contains_container(7));
    }
}
