use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use engine::persistence::{load_player, save_player};
use engine::{
    AppPaths, CombatEvent, EntityId, ScriptEnvironment, TurnMetrics, TurnMetricsAccumulator,
    TurnReport, World, ZoneId,
};
use tracing::{debug, info, warn};

use crate::console::ServerCommand;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CommandResult {
    pub(crate) lines: Vec<String>,
    pub(crate) quit: bool,
}

impl CommandResult {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            quit: false,
        }
    }
}

/// Everything the simulation thread owns: the world, its scripts and the
/// logged-in sessions by lowercased player name.
pub(crate) struct Server {
    world: World,
    scripts: ScriptEnvironment,
    paths: AppPaths,
    script_dir: PathBuf,
    start_zone: ZoneId,
    sessions: BTreeMap<String, EntityId>,
    metrics: TurnMetrics,
    metrics_accumulator: TurnMetricsAccumulator,
}

impl Server {
    pub(crate) fn new(
        world: World,
        scripts: ScriptEnvironment,
        paths: AppPaths,
        script_dir: PathBuf,
        start_zone: ZoneId,
        metrics_interval: Duration,
    ) -> Self {
        Self {
            world,
            scripts,
            paths,
            script_dir,
            start_zone,
            sessions: BTreeMap::new(),
            metrics: TurnMetrics::default(),
            metrics_accumulator: TurnMetricsAccumulator::new(metrics_interval),
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn metrics(&self) -> &TurnMetrics {
        &self.metrics
    }

    pub(crate) fn advance_turn(&mut self) -> TurnReport {
        let started = Instant::now();
        let report = self.world.advance_turn(&mut self.scripts);
        for event in &report.combat {
            if let CombatEvent::Exchange {
                player,
                creature,
                dealt,
                received,
            } = event
            {
                debug!(
                    turn = report.turn,
                    player = %player,
                    creature = %creature,
                    dealt,
                    received,
                    "combat_exchange"
                );
            }
        }
        let deltas = self.world.take_deltas();
        if !deltas.is_empty() {
            debug!(turn = report.turn, entities = deltas.len(), "entity_deltas_ready");
        }
        self.metrics_accumulator
            .record_turn(&report, started.elapsed());
        report
    }

    pub(crate) fn publish_metrics(&mut self, now: Instant) {
        if let Some(snapshot) = self.metrics_accumulator.maybe_snapshot(now) {
            self.metrics.publish(snapshot);
            info!(
                turns_per_second = snapshot.turns_per_second,
                callbacks_fired = snapshot.callbacks_fired,
                combat_exchanges = snapshot.combat_exchanges,
                turn_time_ms = snapshot.turn_time_ms,
                current_turn = snapshot.current_turn,
                "turn_metrics"
            );
        }
    }

    pub(crate) fn execute(&mut self, command: ServerCommand) -> CommandResult {
        match command {
            ServerCommand::Turn => {
                let turns = self.world.turns();
                let next = turns
                    .turns_until_next()
                    .map(|left| format!(", next in {left}"))
                    .unwrap_or_default();
                CommandResult::line(format!(
                    "turn {} ({} callbacks pending{next}, {} players online)",
                    self.world.current_turn(),
                    turns.pending_count(),
                    self.sessions.len()
                ))
            }
            ServerCommand::Advance { turns } => {
                for _ in 0..turns {
                    self.advance_turn();
                }
                CommandResult::line(format!("advanced to turn {}", self.world.current_turn()))
            }
            ServerCommand::Login { name } => self.login(&name),
            ServerCommand::Logout { name } => self.logout(&name),
            ServerCommand::Talk { player, npc, text } => self.talk(&player, &npc, &text),
            ServerCommand::Npcs => {
                let lines: Vec<String> = self
                    .world
                    .npcs()
                    .iter()
                    .map(|npc| format!("{} ({})", npc.name(), npc.zone()))
                    .collect();
                if lines.is_empty() {
                    CommandResult::line("no NPCs registered")
                } else {
                    CommandResult {
                        lines,
                        quit: false,
                    }
                }
            }
            ServerCommand::Spawn { def_name, zone } => {
                let zone = zone.map_or_else(|| self.start_zone.clone(), ZoneId::new);
                match self.world.spawn_creature(&def_name, zone.clone()) {
                    Some(id) => {
                        CommandResult::line(format!("spawned {def_name} as {id} in {zone}"))
                    }
                    None => CommandResult::line(format!("error: unknown creature '{def_name}'")),
                }
            }
            ServerCommand::Engage { player, creature } => {
                let Some(player_id) = self.session(&player) else {
                    return not_logged_in(&player);
                };
                let creature = EntityId(creature);
                if self.world.engage(player_id, creature) {
                    CommandResult::line(format!("{player} engages {creature}"))
                } else {
                    CommandResult::line(format!("error: no creature {creature}"))
                }
            }
            ServerCommand::Save { name } => {
                let Some(id) = self.session(&name) else {
                    return not_logged_in(&name);
                };
                match self.save(id) {
                    Ok(path) => CommandResult::line(format!("saved {name} to {}", path.display())),
                    Err(message) => CommandResult::line(message),
                }
            }
            ServerCommand::Reload => {
                match self.scripts.load_dir(&self.script_dir, &mut self.world) {
                    Ok(report) => {
                        let mut lines = vec![format!(
                            "scripts: {} loaded, {} failed",
                            report.loaded.len(),
                            report.failed.len()
                        )];
                        lines.extend(
                            report.failed.iter().map(|chunk| format!("  failed: {chunk}")),
                        );
                        CommandResult { lines, quit: false }
                    }
                    Err(error) => CommandResult::line(format!("error: {error}")),
                }
            }
            ServerCommand::Metrics => {
                let snapshot = self.metrics.snapshot();
                CommandResult::line(format!(
                    "{:.2} turns/s, {} callbacks, {} combat exchanges, {:.3} ms/turn, turn {}",
                    snapshot.turns_per_second,
                    snapshot.callbacks_fired,
                    snapshot.combat_exchanges,
                    snapshot.turn_time_ms,
                    snapshot.current_turn
                ))
            }
            ServerCommand::Quit => CommandResult {
                lines: vec!["shutting down".to_string()],
                quit: true,
            },
        }
    }

    /// Saves every logged-in player; called once before the process exits.
    pub(crate) fn shutdown(&mut self) {
        let ids: Vec<EntityId> = self.sessions.values().copied().collect();
        for id in ids {
            if let Err(message) = self.save(id) {
                warn!(player = %id, error = %message, "shutdown_save_failed");
            }
        }
        info!(players = self.sessions.len(), turn = self.world.current_turn(), "server_stopped");
    }

    fn session(&self, name: &str) -> Option<EntityId> {
        self.sessions.get(&name.to_ascii_lowercase()).copied()
    }

    fn save(&self, id: EntityId) -> Result<PathBuf, String> {
        let player = self
            .world
            .player(id)
            .ok_or_else(|| format!("error: player {id} is not in the world"))?;
        save_player(&self.paths.save_dir, player).map_err(|error| format!("error: {error}"))
    }

    fn login(&mut self, name: &str) -> CommandResult {
        if self.session(name).is_some() {
            return CommandResult::line(format!("{name} is already logged in"));
        }
        let id = match load_player(&self.paths.save_dir, name) {
            Ok(Some(snapshot)) => {
                let id = self.world.allocate_id();
                let player = snapshot.restore(id, self.world.defs());
                self.world.insert_player(player)
            }
            Ok(None) => self.world.spawn_player(name, self.start_zone.clone()),
            Err(error) => return CommandResult::line(format!("error: {error}")),
        };
        self.sessions.insert(name.to_ascii_lowercase(), id);
        let zone = self
            .world
            .player(id)
            .map(|player| player.entity().zone().to_string())
            .unwrap_or_default();
        CommandResult::line(format!("{name} logged in as {id} in {zone}"))
    }

    fn logout(&mut self, name: &str) -> CommandResult {
        let Some(id) = self.session(name) else {
            return not_logged_in(name);
        };
        let saved = self.save(id);
        self.world.logout(id);
        self.sessions.remove(&name.to_ascii_lowercase());
        match saved {
            Ok(_) => CommandResult::line(format!("{name} logged out")),
            Err(message) => {
                CommandResult::line(format!("{name} logged out without saving: {message}"))
            }
        }
    }

    fn talk(&mut self, player: &str, npc: &str, text: &str) -> CommandResult {
        let Some(id) = self.session(player) else {
            return not_logged_in(player);
        };
        match self.world.talk(id, npc, text) {
            Some(outcome) => match outcome.reply {
                Some(reply) => CommandResult::line(format!("{npc}: {reply}")),
                None => CommandResult::line(format!("{npc} does not respond")),
            },
            None => CommandResult::line(format!("error: no NPC named '{npc}'")),
        }
    }
}

fn not_logged_in(name: &str) -> CommandResult {
    CommandResult::line(format!("error: {name} is not logged in"))
}
