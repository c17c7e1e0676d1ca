use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;

use gameplay_core::abilities::TargetInfo;
use gameplay_core::{Simulation, SimulationConfig, TemplateCatalog};

fn catalog() -> Arc<TemplateCatalog> {
    let text = include_str!("../data/catalog.ron");
    Arc::new(TemplateCatalog::from_ron_str(text).unwrap())
}

/// `characters` casters, each with a live shard volley and a burning debuff
fn populated(characters: i64) -> Simulation {
    let mut sim = Simulation::new(catalog(), SimulationConfig::default());
    for id in 0..characters {
        sim.spawn_character(id, format!("bench_{id}")).unwrap();
        sim.learn_ability(id, 2, 2).unwrap();
        sim.activate(id, 2, TargetInfo::none()).unwrap();
        sim.apply_buff(id, 1).unwrap();
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    for characters in [10, 100, 1000] {
        c.bench_function(&format!("tick_{characters}_characters"), |b| {
            b.iter_batched(
                || populated(characters),
                |mut sim| {
                    sim.tick(black_box(0.05));
                    sim
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_activation(c: &mut Criterion) {
    c.bench_function("activate_shard_volley", |b| {
        b.iter_batched(
            || {
                let mut sim = Simulation::new(catalog(), SimulationConfig::default());
                sim.spawn_character(1, "bench").unwrap();
                sim.learn_ability(1, 2, 2).unwrap();
                sim
            },
            |mut sim| {
                sim.activate(black_box(1), black_box(2), TargetInfo::none())
                    .unwrap();
                sim
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_save_batch(c: &mut Criterion) {
    c.bench_function("drain_save_batch_100", |b| {
        b.iter_batched(
            || populated(100),
            |mut sim| black_box(sim.drain_save_batch()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_catalog_load(c: &mut Criterion) {
    let text = include_str!("../data/catalog.ron");
    c.bench_function("catalog_from_ron", |b| {
        b.iter(|| TemplateCatalog::from_ron_str(black_box(text)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_tick,
    bench_activation,
    bench_save_batch,
    bench_catalog_load
);
criterion_main!(benches);
