use bevy::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CollisionReport, HitReport, Simulation, SimulationConfig, TickReport};
use crate::abilities::{AbilityId, ActivationOutcome};
use crate::catalog::TemplateCatalog;
use crate::character::CharacterId;
use crate::error::GameplayError;
use crate::persistence::CharacterAttributeSnapshot;

/// Runs the authoritative simulation on Bevy's fixed timestep
pub struct SimulationPlugin {
    pub catalog: Arc<TemplateCatalog>,
    pub config: SimulationConfig,
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let simulation = Simulation::new(self.catalog.clone(), self.config.clone());

        app.insert_resource(Time::<Fixed>::from_hz(self.config.tick_rate.max(1) as f64))
            .insert_resource(SimulationResource(simulation))
            .init_resource::<PendingSaves>()
            .init_resource::<LastTickReport>()
            .add_event::<ActivationRequest>()
            .add_event::<InterruptRequest>()
            .add_event::<CollisionReport>()
            .add_event::<ActivationResolved>()
            .add_event::<CollisionResolved>()
            .add_systems(
                FixedUpdate,
                (
                    interrupt_system,
                    activation_system,
                    collision_system,
                    simulation_tick_system,
                    collect_saves_system,
                )
                    .chain(),
            );
    }
}

#[derive(Resource)]
pub struct SimulationResource(pub Simulation);

/// Attribute snapshots waiting for the persistence layer
#[derive(Resource, Default)]
pub struct PendingSaves(pub Vec<CharacterAttributeSnapshot>);

#[derive(Resource, Default)]
pub struct LastTickReport(pub TickReport);

#[derive(Event, Debug, Clone)]
pub struct ActivationRequest {
    pub caster: CharacterId,
    pub ability_id: AbilityId,
    pub target: Option<CharacterId>,
    pub point: Option<Vec3>,
}

#[derive(Event, Debug, Clone)]
pub struct InterruptRequest {
    pub caster: CharacterId,
}

#[derive(Event, Debug, Clone)]
pub struct ActivationResolved {
    pub caster: CharacterId,
    pub ability_id: AbilityId,
    pub result: Result<ActivationOutcome, GameplayError>,
}

#[derive(Event, Debug, Clone)]
pub struct CollisionResolved(pub Result<HitReport, GameplayError>);

fn interrupt_system(
    mut requests: EventReader<InterruptRequest>,
    mut sim: ResMut<SimulationResource>,
) {
    for request in requests.read() {
        if let Err(err) = sim.0.interrupt(request.caster) {
            warn!(caster = request.caster, %err, "Interrupt for unknown character");
        }
    }
}

fn activation_system(
    mut requests: EventReader<ActivationRequest>,
    mut sim: ResMut<SimulationResource>,
    mut resolved: EventWriter<ActivationResolved>,
) {
    for request in requests.read() {
        let result = sim
            .0
            .resolve_target(request.target, request.point)
            .and_then(|target| sim.0.activate(request.caster, request.ability_id, target));
        resolved.send(ActivationResolved {
            caster: request.caster,
            ability_id: request.ability_id,
            result,
        });
    }
}

fn collision_system(
    mut reports: EventReader<CollisionReport>,
    mut sim: ResMut<SimulationResource>,
    mut resolved: EventWriter<CollisionResolved>,
) {
    for report in reports.read() {
        resolved.send(CollisionResolved(sim.0.handle_collision(report)));
    }
}

fn simulation_tick_system(
    time: Res<Time<Fixed>>,
    mut sim: ResMut<SimulationResource>,
    mut last: ResMut<LastTickReport>,
) {
    last.0 = sim.0.tick(time.timestep().as_secs_f32());
}

fn collect_saves_system(mut sim: ResMut<SimulationResource>, mut pending: ResMut<PendingSaves>) {
    let batch = sim.0.drain_save_batch();
    if !batch.is_empty() {
        debug!(characters = batch.len(), "Queued attribute saves");
        pending.0.extend(batch);
    }
}
