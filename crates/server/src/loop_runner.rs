use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

use crate::console::{ConsoleCommandProcessor, ServerCommand};
use crate::server::Server;

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopSettings {
    pub(crate) turn_duration: Duration,
    pub(crate) max_turns_per_frame: u32,
    pub(crate) max_turns: Option<u64>,
    pub(crate) poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    TurnLimit,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoopSummary {
    pub(crate) turns_run: u64,
    pub(crate) stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy)]
struct TurnPlan {
    turns_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Drives the server until `quit` arrives or the turn limit is reached.
///
/// Console lines are drained between frames; a closed console stops being polled
/// but the loop keeps turning. Every reply line goes to `output`.
pub(crate) fn run_server_loop(
    server: &mut Server,
    console_lines: Option<Receiver<String>>,
    settings: LoopSettings,
    mut output: impl FnMut(&str),
) -> LoopSummary {
    let turn_duration =
        normalize_non_zero_duration(settings.turn_duration, Duration::from_millis(300));
    let max_turns_per_frame = settings.max_turns_per_frame.max(1);
    let poll_interval =
        normalize_non_zero_duration(settings.poll_interval, Duration::from_millis(10));

    let mut console_lines = console_lines;
    let mut processor = ConsoleCommandProcessor::new();
    let mut pending = Vec::new();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut turns_run = 0u64;

    info!(
        turn_duration_ms = turn_duration.as_millis() as u64,
        max_turns_per_frame,
        max_turns = ?settings.max_turns,
        "server_loop_started"
    );

    loop {
        if let Some(lines) = &console_lines {
            loop {
                match lines.try_recv() {
                    Ok(line) => {
                        for reply in processor.process_line(&line) {
                            output(&reply);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("console_disconnected");
                        console_lines = None;
                        break;
                    }
                }
            }
        }

        processor.drain_commands_into(&mut pending);
        for command in pending.drain(..) {
            let advanced = matches!(command, ServerCommand::Advance { .. });
            let before = server.world().current_turn();
            let result = server.execute(command);
            if advanced {
                turns_run += server.world().current_turn().saturating_sub(before);
            }
            for line in &result.lines {
                output(line);
            }
            if result.quit {
                return finish(server, turns_run, StopReason::Quit);
            }
        }

        let now = Instant::now();
        accumulator = accumulator.saturating_add(now.saturating_duration_since(last_frame_instant));
        last_frame_instant = now;

        let plan = plan_turns(accumulator, turn_duration, max_turns_per_frame);
        for _ in 0..plan.turns_to_run {
            if settings.max_turns.is_some_and(|limit| turns_run >= limit) {
                break;
            }
            server.advance_turn();
            turns_run += 1;
        }
        accumulator = plan.remaining_accumulator;

        if plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_turns_per_frame, "turn_clamp_triggered"
            );
        }

        server.publish_metrics(Instant::now());

        if settings.max_turns.is_some_and(|limit| turns_run >= limit) {
            return finish(server, turns_run, StopReason::TurnLimit);
        }

        thread::sleep(poll_interval);
    }
}

fn finish(server: &mut Server, turns_run: u64, stop_reason: StopReason) -> LoopSummary {
    info!(turns_run, reason = ?stop_reason, "server_loop_stopped");
    server.shutdown();
    LoopSummary {
        turns_run,
        stop_reason,
    }
}

fn plan_turns(
    mut accumulator: Duration,
    turn_duration: Duration,
    max_turns_per_frame: u32,
) -> TurnPlan {
    let mut turns_to_run = 0u32;

    while accumulator >= turn_duration && turns_to_run < max_turns_per_frame {
        accumulator = accumulator.saturating_sub(turn_duration);
        turns_to_run = turns_to_run.saturating_add(1);
    }

    if accumulator >= turn_duration {
        TurnPlan {
            turns_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        TurnPlan {
            turns_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
