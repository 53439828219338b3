mod bootstrap;
mod config;
mod console;
mod loop_runner;
mod server;

use std::process::ExitCode;

use tracing::{error, info};

use crate::bootstrap::{build_server, init_tracing, loop_settings, ServerError};
use crate::loop_runner::run_server_loop;

fn main() -> ExitCode {
    init_tracing();
    info!("=== RPG Server Startup ===");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ServerError> {
    let config = config::load_config()?;
    let mut server = build_server(&config)?;
    let console_lines = if config.console {
        Some(console::spawn_stdin_reader().map_err(ServerError::Console)?)
    } else {
        None
    };

    let summary = run_server_loop(&mut server, console_lines, loop_settings(&config), |line| {
        println!("{line}")
    });
    let metrics = server.metrics().snapshot();
    info!(
        turns_run = summary.turns_run,
        final_turn = metrics.current_turn,
        "shutdown"
    );
    Ok(())
}
