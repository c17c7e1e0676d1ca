use anyhow::Context;
use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use gameplay_core::logging::{init_tracing, LogLevel, TracingConfig};
use gameplay_core::simulation::plugin::{SimulationPlugin, SimulationResource};
use gameplay_core::{SimulationConfig, TemplateCatalog};
use gameplay_server::storage::plugin::{run_writer, save_channel, FailedSaves, PersistencePlugin};
use gameplay_server::storage::{open_repository, restore_roster};
use gameplay_server::ServerConfig;

fn main() -> anyhow::Result<()> {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogLevel::Info);
    init_tracing(&TracingConfig::default().with_level(level));

    let config = ServerConfig::from_env();
    info!("Starting gameplay server with {:?}", config);

    // ========================================================================
    // 1. Template catalog and simulation config
    // ========================================================================
    let catalog = TemplateCatalog::load_file(&config.catalog_path)
        .with_context(|| format!("loading catalog {}", config.catalog_path.display()))?;
    info!("Catalog loaded: {}", catalog.stats().summary());

    let base = match &config.simulation_config_path {
        Some(path) => SimulationConfig::load_file(path)
            .with_context(|| format!("loading simulation config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    let sim_config = config.simulation_config(base);

    // ========================================================================
    // 2. LMDB attribute store + async writer on a tokio runtime
    // ========================================================================
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let repo = open_repository(&config).context("opening LMDB attribute store")?;
    let (sender, batches) = save_channel();
    let failed = FailedSaves::default();
    let writer = rt.spawn(run_writer(repo.clone(), batches, failed.clone()));

    // ========================================================================
    // 3. Headless Bevy app driving the fixed-step simulation
    // ========================================================================
    let frame = Duration::from_secs_f32(sim_config.tick_interval());
    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)))
        .add_plugins(SimulationPlugin {
            catalog: Arc::new(catalog),
            config: sim_config,
        })
        .add_plugins(PersistencePlugin { sender, failed });

    // ========================================================================
    // 4. Roster: restore stored characters, create the rest
    // ========================================================================
    {
        let mut sim = app.world_mut().resource_mut::<SimulationResource>();
        let roster = rt
            .block_on(restore_roster(repo.as_ref(), &mut sim.0, &config.roster))
            .context("restoring roster")?;
        info!(
            restored = roster.restored,
            created = roster.created,
            "Simulation populated"
        );
    }

    app.insert_resource(config);
    let exit = app.run();
    // dropping the app closes the save channel and lets the writer finish
    drop(app);
    match rt.block_on(writer) {
        Ok(total) => info!(written = total.written(), failed = total.failed, "Writer stopped"),
        Err(e) => error!("Writer task failed: {}", e),
    }

    info!(?exit, "Gameplay server stopped");
    Ok(())
}
