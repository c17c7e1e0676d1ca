//! End-to-end activation, object lifecycle and buff scenarios against the
//! sample catalog.

use bevy::math::Vec3;
use std::sync::Arc;

use gameplay_core::abilities::{ActivationOutcome, HitApplication, ObjectKey, ResourceConversion};
use gameplay_core::buffs::BuffApplication;
use gameplay_core::simulation::{CollisionReport, HitReport};
use gameplay_core::{GameplayError, Simulation, SimulationConfig, TemplateCatalog};

const HEALTH: u32 = 1;
const MANA: u32 = 2;
const STAMINA: u32 = 3;
const BLOOD: u32 = 4;
const ARMOR: u32 = 6;
const HASTE: u32 = 7;

const FIREBALL: u32 = 1;
const SHARD_VOLLEY: u32 = 2;
const BLOOD_BOLT: u32 = 3;
const METEOR: u32 = 4;

const BLOOD_MAGIC: u32 = 400;
const QUICKENED: u32 = 401;
const BURNING: u32 = 1;

const CASTER: i64 = 1;
const TARGET: i64 = 2;

fn catalog() -> Arc<TemplateCatalog> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/catalog.ron");
    Arc::new(TemplateCatalog::load_file(path).unwrap())
}

fn config() -> SimulationConfig {
    SimulationConfig {
        regen_enabled: false,
        ..SimulationConfig::default()
    }
}

/// Caster at the origin facing +Z, target 10 units ahead
fn arena(config: SimulationConfig) -> Simulation {
    let mut sim = Simulation::new(catalog(), config);
    sim.spawn_character(CASTER, "Caster").unwrap();
    sim.spawn_character(TARGET, "Target")
        .unwrap()
        .position = Vec3::new(0.0, 0.0, 10.0);
    sim
}

fn current(sim: &Simulation, character: i64, attribute: u32) -> i32 {
    sim.character(character)
        .unwrap()
        .attributes
        .current_value(attribute)
        .unwrap()
}

fn only_object(sim: &Simulation, ability_id: u32) -> ObjectKey {
    let ability = sim.character(CASTER).unwrap().abilities.ability(ability_id).unwrap();
    let keys = ability.objects().keys();
    assert_eq!(keys.len(), 1);
    keys[0]
}

fn hit(sim: &mut Simulation, ability_id: u32, key: ObjectKey, other: Option<i64>) -> HitReport {
    sim.handle_collision(&CollisionReport {
        caster: CASTER,
        ability_id,
        key,
        other,
        contact_point: Vec3::new(0.0, 1.0, 10.0),
    })
    .unwrap()
}

#[test]
fn test_sample_catalog_loads() {
    let catalog = catalog();
    let stats = catalog.stats();
    assert_eq!(stats.attributes, 7);
    assert_eq!(stats.abilities, 5);
    assert_eq!(stats.buffs, 3);
}

// ============================================================
// Targeting
// ============================================================

#[test]
fn test_missing_target_consumes_nothing() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, BLOOD_BOLT).unwrap();

    let err = sim.activate(CASTER, 1, sim.resolve_target(None, None).unwrap());
    assert_eq!(err, Err(GameplayError::NoValidTarget { ability_id: 1 }));
    assert_eq!(current(&sim, CASTER, HEALTH), 100);
    let ability = sim.character(CASTER).unwrap().abilities.ability(1).unwrap();
    assert!(ability.objects().is_empty());
    assert!(sim.character(CASTER).unwrap().abilities.cooldowns().is_ready(1));
}

#[test]
fn test_unknown_target_is_rejected() {
    let sim = arena(config());
    assert_eq!(
        sim.resolve_target(Some(99), None),
        Err(GameplayError::UnknownCharacter(99))
    );
}

#[test]
fn test_requirement_checked_before_resources() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, BLOOD_BOLT).unwrap();
    sim.character_mut(CASTER)
        .unwrap()
        .attributes
        .resource_mut(HEALTH)
        .unwrap()
        .consume(85)
        .unwrap();
    let target = sim.resolve_target(Some(TARGET), None).unwrap();
    assert_eq!(
        sim.activate(CASTER, 1, target),
        Err(GameplayError::RequirementNotMet {
            attribute: HEALTH,
            required: 20,
            current: Some(15),
        })
    );
}

#[test]
fn test_target_spawn_needs_a_point() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 4, METEOR).unwrap();
    assert_eq!(
        sim.activate(CASTER, 4, sim.resolve_target(None, None).unwrap()),
        Err(GameplayError::NoValidTarget { ability_id: 4 })
    );
    let outcome = sim
        .activate(CASTER, 4, sim.resolve_target(None, Some(Vec3::new(3.0, 0.0, 3.0))).unwrap())
        .unwrap();
    assert!(matches!(outcome, ActivationOutcome::Casting { ability_id: 4, .. }));
}

// ============================================================
// Resources
// ============================================================

#[test]
fn test_conversion_without_enough_blood_is_a_noop() {
    let mut sim = arena(SimulationConfig {
        resource_conversion: Some(ResourceConversion {
            event_id: BLOOD_MAGIC,
            resource: BLOOD,
        }),
        ..config()
    });
    sim.learn_ability(CASTER, 2, SHARD_VOLLEY).unwrap();
    assert!(sim.add_ability_event(CASTER, 2, QUICKENED).unwrap());
    assert!(sim.add_ability_event(CASTER, 2, BLOOD_MAGIC).unwrap());
    assert_eq!(
        sim.character(CASTER).unwrap().abilities.ability(2).unwrap().total_resource_cost(),
        30
    );
    sim.character_mut(CASTER)
        .unwrap()
        .attributes
        .resource_mut(BLOOD)
        .unwrap()
        .consume(25)
        .unwrap();

    let result = sim.activate(CASTER, 2, sim.resolve_target(None, None).unwrap());
    assert_eq!(
        result,
        Err(GameplayError::InsufficientResource {
            attribute: BLOOD,
            required: 30,
            available: Some(25),
        })
    );
    assert_eq!(current(&sim, CASTER, BLOOD), 25);
    assert_eq!(current(&sim, CASTER, MANA), 100);
    assert_eq!(current(&sim, CASTER, STAMINA), 100);
    let ability = sim.character(CASTER).unwrap().abilities.ability(2).unwrap();
    assert!(ability.objects().is_empty());
}

#[test]
fn test_conversion_pays_from_blood() {
    let mut sim = arena(SimulationConfig {
        resource_conversion: Some(ResourceConversion {
            event_id: BLOOD_MAGIC,
            resource: BLOOD,
        }),
        ..config()
    });
    sim.learn_ability(CASTER, 2, SHARD_VOLLEY).unwrap();
    sim.add_ability_event(CASTER, 2, BLOOD_MAGIC).unwrap();
    sim.activate(CASTER, 2, sim.resolve_target(None, None).unwrap())
        .unwrap();
    assert_eq!(current(&sim, CASTER, BLOOD), 25);
    assert_eq!(current(&sim, CASTER, MANA), 100);

    // detaching the event restores normal costs
    assert!(sim.remove_ability_event(CASTER, 2, BLOOD_MAGIC).unwrap());
    let ability = sim.character(CASTER).unwrap().abilities.ability(2).unwrap();
    assert_eq!(ability.stats().range, 20.0);
}

// ============================================================
// Object lifecycle
// ============================================================

#[test]
fn test_volley_expires_in_one_long_step() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 2, SHARD_VOLLEY).unwrap();
    let outcome = sim
        .activate(CASTER, 2, sim.resolve_target(None, None).unwrap())
        .unwrap();
    let ActivationOutcome::Activated(report) = outcome else {
        panic!("shard volley is instant");
    };
    let spawned = report.spawned.unwrap();
    assert_eq!(spawned.objects.len(), 5);

    let tick = sim.tick(2.5);
    assert_eq!(tick.expired_objects.len(), 5);
    let ability = sim.character(CASTER).unwrap().abilities.ability(2).unwrap();
    assert!(ability.objects().is_empty());
    assert!(!ability.objects().contains_container(spawned.container_id));

    assert!(sim.tick(2.5).expired_objects.is_empty());
    let late = hit(&mut sim, 2, spawned.objects[0], Some(TARGET));
    assert!(!late.destroyed);
    assert_eq!(current(&sim, TARGET, HEALTH), 100);
}

#[test]
fn test_haste_shortens_object_lifetime() {
    let mut sim = arena(SimulationConfig {
        attack_speed_attribute: Some(HASTE),
        ..config()
    });
    sim.spawn_character(3, "Slowpoke").unwrap();
    for caster in [CASTER, 3] {
        sim.learn_ability(caster, 2, SHARD_VOLLEY).unwrap();
    }
    assert!(sim.character_mut(CASTER).unwrap().attributes.add_modifier(HASTE, 100));
    for caster in [CASTER, 3] {
        sim.activate(caster, 2, sim.resolve_target(None, None).unwrap())
            .unwrap();
    }
    let lifetimes: Vec<f32> = [CASTER, 3]
        .iter()
        .map(|id| {
            let ability = sim.character(*id).unwrap().abilities.ability(2).unwrap();
            ability.objects().iter().next().unwrap().remaining_active_time
        })
        .collect();
    assert_eq!(lifetimes, vec![1.0, 2.0]);

    // only the hasted volley runs out
    let tick = sim.tick(1.5);
    assert_eq!(tick.expired_objects.len(), 5);
    assert!(tick.expired_objects.iter().all(|(id, _, _)| *id == CASTER));
}

#[test]
fn test_fireball_cast_hit_and_burn() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, FIREBALL).unwrap();
    let target = sim.resolve_target(Some(TARGET), None).unwrap();
    assert!(matches!(
        sim.activate(CASTER, 1, target).unwrap(),
        ActivationOutcome::Casting { .. }
    ));
    assert_eq!(current(&sim, CASTER, MANA), 100);

    assert!(sim.tick(0.5).activations.is_empty());
    let tick = sim.tick(0.5);
    assert_eq!(tick.activations.len(), 1);
    assert_eq!(current(&sim, CASTER, MANA), 80);

    let key = only_object(&sim, 1);
    let report = hit(&mut sim, 1, key, Some(TARGET));
    assert!(report.destroyed);
    assert_eq!(report.deduction, 1);
    assert!(report.applications.contains(&HitApplication::Damaged {
        target: TARGET,
        attribute: HEALTH,
        amount: 25,
    }));
    assert!(report.applications.contains(&HitApplication::BuffApplied {
        target: TARGET,
        buff: BURNING,
        application: BuffApplication::Applied,
    }));
    assert_eq!(current(&sim, TARGET, HEALTH), 75);
    let victim = sim.character(TARGET).unwrap();
    assert_eq!(victim.attributes.final_value(ARMOR), Some(4));
    assert!(victim.buffs.get(BURNING).is_some());

    // second report for the same object is ignored
    assert!(!hit(&mut sim, 1, key, Some(TARGET)).destroyed);
    assert_eq!(current(&sim, TARGET, HEALTH), 75);
}

#[test]
fn test_fireball_goes_on_cooldown() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, FIREBALL).unwrap();
    sim.activate(CASTER, 1, sim.resolve_target(Some(TARGET), None).unwrap())
        .unwrap();
    sim.tick(1.0);
    assert!(matches!(
        sim.activate(CASTER, 1, sim.resolve_target(Some(TARGET), None).unwrap()),
        Err(GameplayError::OnCooldown { ability_id: 1, .. })
    ));
}

#[test]
fn test_miss_destroys_without_effect() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, FIREBALL).unwrap();
    sim.activate(CASTER, 1, sim.resolve_target(Some(TARGET), None).unwrap())
        .unwrap();
    sim.tick(1.0);
    let key = only_object(&sim, 1);
    let report = hit(&mut sim, 1, key, None);
    assert!(report.destroyed);
    assert!(report.applications.is_empty());
    assert_eq!(current(&sim, TARGET, HEALTH), 100);
}

#[test]
fn test_meteor_falls_and_survives_until_hit_budget_spent() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 4, METEOR).unwrap();
    let point = Vec3::new(0.0, 0.0, 10.0);
    sim.activate(CASTER, 4, sim.resolve_target(None, Some(point)).unwrap())
        .unwrap();
    // commits at full lifetime; falling starts on the next step
    let tick = sim.tick(1.5);
    assert_eq!(tick.activations.len(), 1);
    let key = only_object(&sim, 4);
    {
        let ability = sim.character(CASTER).unwrap().abilities.ability(4).unwrap();
        let object = ability.objects().get(key).unwrap();
        assert_eq!(object.hit_count, 3);
        assert_eq!(object.position, Vec3::new(0.0, 12.0, 10.0));
        assert_eq!(object.remaining_active_time, 4.0);
    }
    sim.tick(0.5);
    {
        let ability = sim.character(CASTER).unwrap().abilities.ability(4).unwrap();
        let object = ability.objects().get(key).unwrap();
        assert!(object.velocity.y < 0.0);
        assert!(object.position.y < 12.0);
        assert!((object.remaining_active_time - 3.5).abs() < 1e-5);
    }

    assert!(!hit(&mut sim, 4, key, Some(TARGET)).destroyed);
    assert!(!hit(&mut sim, 4, key, Some(TARGET)).destroyed);
    assert!(hit(&mut sim, 4, key, Some(TARGET)).destroyed);
    assert_eq!(current(&sim, TARGET, HEALTH), 0);
}

#[test]
fn test_interrupted_cast_costs_nothing() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 1, FIREBALL).unwrap();
    sim.activate(CASTER, 1, sim.resolve_target(Some(TARGET), None).unwrap())
        .unwrap();
    sim.tick(0.5);
    assert_eq!(sim.interrupt(CASTER).unwrap(), Some(1));
    let tick = sim.tick(1.0);
    assert!(tick.activations.is_empty());
    assert_eq!(current(&sim, CASTER, MANA), 100);
}

#[test]
fn test_ten_thousand_containers_stay_unique() {
    let catalog = TemplateCatalog::from_ron_str(
        r#"(
            attributes: [(id: 1, name: "Mana", is_resource_attribute: true, default_value: 10)],
            abilities: [(id: 1, name: "Spam", spawn_target: Some(Caster), events: [1])],
            events: [(id: 1, name: "Single", kind: Spawn(phase: Spawn, behavior: Single))],
        )"#,
    )
    .unwrap();
    let mut sim = Simulation::new(Arc::new(catalog), config());
    sim.spawn_character(CASTER, "Spammer").unwrap();
    sim.learn_ability(CASTER, 1, 1).unwrap();

    for _ in 0..10_000 {
        sim.activate(CASTER, 1, sim.resolve_target(None, None).unwrap())
            .unwrap();
    }
    let ability = sim.character(CASTER).unwrap().abilities.ability(1).unwrap();
    assert_eq!(ability.objects().len(), 10_000);
    assert_eq!(ability.objects().container_count(), 10_000);
}

// ============================================================
// Buffs
// ============================================================

#[test]
fn test_burning_ticks_three_times_then_expires() {
    let mut sim = arena(config());
    assert_eq!(sim.apply_buff(TARGET, BURNING).unwrap(), BuffApplication::Applied);
    assert_eq!(
        sim.character(TARGET).unwrap().attributes.final_value(ARMOR),
        Some(4)
    );

    let mut ticks = 0;
    for step in 1..=3 {
        let report = sim.tick(1.5);
        ticks += report.buff_ticks.len();
        assert_eq!(report.buff_expirations.is_empty(), step < 3);
    }
    assert_eq!(ticks, 3);
    assert_eq!(current(&sim, TARGET, HEALTH), 88);
    let target = sim.character(TARGET).unwrap();
    assert!(target.buffs.is_empty());
    assert_eq!(target.attributes.final_value(ARMOR), Some(5));
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn test_save_batch_contains_changed_characters_once() {
    let mut sim = arena(config());
    sim.learn_ability(CASTER, 2, SHARD_VOLLEY).unwrap();
    assert!(sim.drain_save_batch().is_empty());

    sim.activate(CASTER, 2, sim.resolve_target(None, None).unwrap())
        .unwrap();
    let batch = sim.drain_save_batch();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].character_id, CASTER);
    let mana = batch[0].records.iter().find(|r| r.template_id == MANA).unwrap();
    assert_eq!(mana.current_value, 85);
    assert!(sim.drain_save_batch().is_empty());

    let records = batch[0].records.clone();
    sim.remove_character(CASTER);
    sim.load_character(CASTER, "Caster", &records).unwrap();
    assert_eq!(current(&sim, CASTER, MANA), 85);
}
