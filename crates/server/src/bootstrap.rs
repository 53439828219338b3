use std::time::Duration;

use engine::{
    compile_def_database, resolve_app_paths, ContentCompileError, ContentRequest,
    ScriptEnvironment, StartupError, World, ZoneId,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};
use crate::loop_runner::LoopSettings;
use crate::server::Server;

const CONSOLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub(crate) enum ServerError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Content(#[from] ContentCompileError),
    #[error(transparent)]
    Scripts(#[from] engine::scripting::ScriptError),
    #[error("failed to start console input: {0}")]
    Console(#[source] std::io::Error),
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Resolves paths, compiles item and creature defs, then runs every zone script.
pub(crate) fn build_server(config: &ServerConfig) -> Result<Server, ServerError> {
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        base_content_dir = %paths.base_content_dir.display(),
        mods_dir = %paths.mods_dir.display(),
        save_dir = %paths.save_dir.display(),
        "startup"
    );

    let defs = compile_def_database(
        &paths,
        &ContentRequest {
            enabled_mods: config.enabled_mods.clone(),
        },
    )?;
    info!(
        items = defs.items().len(),
        creatures = defs.creatures().len(),
        "defs_compiled"
    );

    let mut world = World::new(defs);
    if let Some(seed) = config.rng_seed {
        world = world.with_rng_seed(seed);
    }

    let mut scripts = ScriptEnvironment::new();
    let script_dir = config.resolved_script_dir(&paths.root);
    if script_dir.is_dir() {
        let report = scripts.load_dir(&script_dir, &mut world)?;
        for chunk in &report.failed {
            warn!(chunk = chunk.as_str(), "script_not_loaded");
        }
    } else {
        warn!(dir = %script_dir.display(), "script_dir_missing");
    }
    info!(npcs = world.npcs().len(), "world_ready");

    Ok(Server::new(
        world,
        scripts,
        paths,
        script_dir,
        ZoneId::new(config.start_zone.clone()),
        config.metrics_interval(),
    ))
}

pub(crate) fn loop_settings(config: &ServerConfig) -> LoopSettings {
    LoopSettings {
        turn_duration: config.turn_duration(),
        max_turns_per_frame: config.max_turns_per_frame,
        max_turns: config.max_turns,
        poll_interval: CONSOLE_POLL_INTERVAL,
    }
}
