//! Bevy Persistence Plugin
//!
//! Moves attribute snapshots collected by the simulation onto a tokio
//! channel after every fixed step. [`run_writer`] drains the channel on the
//! async side and commits each snapshot through the repository. Characters
//! whose save fails land in [`FailedSaves`] and are marked dirty again on
//! the next step, so their latest state is offered until a write commits.

use bevy::prelude::*;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use gameplay_core::persistence::CharacterAttributeSnapshot;
use gameplay_core::simulation::plugin::{PendingSaves, SimulationResource};
use gameplay_core::CharacterId;

use super::repository::{CharacterAttributeRepo, SaveSummary};

pub type SaveBatch = Vec<CharacterAttributeSnapshot>;

/// Sending half of the save channel, held as a Bevy resource
#[derive(Resource, Clone)]
pub struct SaveSender(mpsc::UnboundedSender<SaveBatch>);

impl SaveSender {
    pub fn send(&self, batch: SaveBatch) -> Result<(), mpsc::error::SendError<SaveBatch>> {
        self.0.send(batch)
    }
}

/// Characters whose last save failed, shared by the writer and the app
#[derive(Resource, Clone, Default)]
pub struct FailedSaves(Arc<Mutex<BTreeSet<CharacterId>>>);

impl FailedSaves {
    pub fn record(&self, character_id: CharacterId) {
        self.0.lock().insert(character_id);
    }

    pub fn take(&self) -> BTreeSet<CharacterId> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

pub fn save_channel() -> (SaveSender, mpsc::UnboundedReceiver<SaveBatch>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SaveSender(tx), rx)
}

/// Requires `SimulationPlugin` (for `PendingSaves` and the simulation)
pub struct PersistencePlugin {
    pub sender: SaveSender,
    /// Pass the same set to [`run_writer`]
    pub failed: FailedSaves,
}

impl Plugin for PersistencePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.sender.clone())
            .insert_resource(self.failed.clone())
            .add_systems(
                FixedPostUpdate,
                (requeue_failed_saves_system, flush_saves_system).chain(),
            );
    }
}

fn requeue_failed_saves_system(failed: Res<FailedSaves>, mut sim: ResMut<SimulationResource>) {
    if failed.is_empty() {
        return;
    }
    let ids = failed.take();
    let requeued = sim.0.requeue_saves(ids.iter().copied());
    warn!(failed = ids.len(), requeued, "Retrying failed attribute saves");
}

fn flush_saves_system(mut pending: ResMut<PendingSaves>, sender: Res<SaveSender>) {
    if pending.0.is_empty() {
        return;
    }
    let batch = std::mem::take(&mut pending.0);
    if let Err(mpsc::error::SendError(batch)) = sender.send(batch) {
        // keep the rows for the next attempt
        warn!(characters = batch.len(), "Persistence writer closed, batch retained");
        pending.0 = batch;
    }
}

/// Commit batches until every sender is dropped. Returns the running total.
///
/// A failed snapshot is logged and its character recorded in `failed`.
pub async fn run_writer(
    repo: Arc<dyn CharacterAttributeRepo>,
    mut batches: mpsc::UnboundedReceiver<SaveBatch>,
    failed: FailedSaves,
) -> SaveSummary {
    let mut total = SaveSummary::default();
    while let Some(batch) = batches.recv().await {
        let mut summary = SaveSummary::default();
        for snapshot in &batch {
            match repo.save(snapshot).await {
                Ok(saved) => summary.merge(saved),
                Err(e) => {
                    error!(character = snapshot.character_id, "Attribute save failed: {}", e);
                    failed.record(snapshot.character_id);
                    summary.failed += 1;
                }
            }
        }
        info!(
            characters = batch.len(),
            written = summary.written(),
            unchanged = summary.unchanged,
            failed = summary.failed,
            "Attribute batch persisted"
        );
        total.merge(summary);
    }
    info!("Persistence writer stopped");
    total
}
