use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::world::TurnReport;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnMetricsSnapshot {
    pub turns_per_second: f32,
    pub callbacks_fired: u32,
    pub combat_exchanges: u32,
    pub turn_time_ms: f32,
    pub current_turn: u64,
}

/// Shared, read-mostly view of the latest interval; cloned into observers.
#[derive(Clone, Debug)]
pub struct TurnMetrics {
    snapshot: Arc<RwLock<TurnMetricsSnapshot>>,
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(TurnMetricsSnapshot::default())),
        }
    }
}

impl TurnMetrics {
    pub fn snapshot(&self) -> TurnMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn publish(&self, snapshot: TurnMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub struct TurnMetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    turns: u32,
    callbacks: u32,
    exchanges: u32,
    turn_time_sum: Duration,
    current_turn: u64,
}

impl TurnMetricsAccumulator {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval_start: start,
            interval,
            turns: 0,
            callbacks: 0,
            exchanges: 0,
            turn_time_sum: Duration::ZERO,
            current_turn: 0,
        }
    }

    pub fn record_turn(&mut self, report: &TurnReport, turn_time: Duration) {
        self.turns = self.turns.saturating_add(1);
        self.callbacks = self
            .callbacks
            .saturating_add(u32::try_from(report.fired).unwrap_or(u32::MAX));
        let exchanges = report
            .combat
            .iter()
            .filter(|event| matches!(event, crate::world::CombatEvent::Exchange { .. }))
            .count();
        self.exchanges = self
            .exchanges
            .saturating_add(u32::try_from(exchanges).unwrap_or(u32::MAX));
        self.turn_time_sum = self.turn_time_sum.saturating_add(turn_time);
        self.current_turn = report.turn;
    }

    pub fn maybe_snapshot(&mut self, now: Instant) -> Option<TurnMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let turn_time_ms = if self.turns == 0 {
            0.0
        } else {
            (self.turn_time_sum.as_secs_f32() / self.turns as f32) * 1000.0
        };

        let snapshot = TurnMetricsSnapshot {
            turns_per_second: self.turns as f32 / elapsed_seconds,
            callbacks_fired: self.callbacks,
            combat_exchanges: self.exchanges,
            turn_time_ms,
            current_turn: self.current_turn,
        };

        self.interval_start = now;
        self.turns = 0;
        self.callbacks = 0;
        self.exchanges = 0;
        self.turn_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;
    use crate::entity::EntityId;
    use crate::world::CombatEvent;

    fn poison_lock(lock: &RwLock<TurnMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    fn report(turn: u64, fired: usize, exchanges: usize) -> TurnReport {
        TurnReport {
            turn,
            fired,
            combat: (0..exchanges)
                .map(|_| CombatEvent::Exchange {
                    player: EntityId(1),
                    creature: EntityId(2),
                    dealt: 3,
                    received: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn snapshot_summarizes_interval() {
        let base = Instant::now();
        let mut accumulator = TurnMetricsAccumulator::starting_at(Duration::from_secs(1), base);

        accumulator.record_turn(&report(1, 2, 0), Duration::from_millis(4));
        accumulator.record_turn(&report(2, 0, 1), Duration::from_millis(2));
        accumulator.record_turn(&report(3, 1, 1), Duration::from_millis(3));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.turns_per_second - 3.0).abs() < 0.05);
        assert_eq!(snapshot.callbacks_fired, 3);
        assert_eq!(snapshot.combat_exchanges, 2);
        assert!((snapshot.turn_time_ms - 3.0).abs() < 0.001);
        assert_eq!(snapshot.current_turn, 3);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = TurnMetricsAccumulator::starting_at(Duration::from_secs(1), base);
        accumulator.record_turn(&report(1, 0, 0), Duration::from_millis(1));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn handle_recovers_after_poison_without_panic() {
        let handle = TurnMetrics::default();
        poison_lock(handle.snapshot.as_ref());

        assert_eq!(handle.snapshot(), TurnMetricsSnapshot::default());

        let expected = TurnMetricsSnapshot {
            turns_per_second: 3.3,
            callbacks_fired: 2,
            combat_exchanges: 0,
            turn_time_ms: 1.5,
            current_turn: 40,
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
