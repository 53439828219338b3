use rand::RngCore;
use tracing::warn;

use crate::entity::RpEntity;

use super::formula::{CombatSnapshot, DamageFormula};
use super::report::RoundTally;

pub const DEFAULT_TURN_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Decisive,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    PlayerWon,
    EnemyWon,
    Tie,
    Incomplete,
}

impl RoundOutcome {
    pub fn label(self) -> &'static str {
        match self {
            RoundOutcome::PlayerWon => "player",
            RoundOutcome::EnemyWon => "enemy",
            RoundOutcome::Tie => "tie",
            RoundOutcome::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    pub turns: u32,
    pub player_hp: u32,
    pub enemy_hp: u32,
    pub status: RoundStatus,
}

impl RoundResult {
    pub fn outcome(&self) -> RoundOutcome {
        if self.status == RoundStatus::Incomplete {
            return RoundOutcome::Incomplete;
        }
        match self.player_hp.cmp(&self.enemy_hp) {
            std::cmp::Ordering::Greater => RoundOutcome::PlayerWon,
            std::cmp::Ordering::Less => RoundOutcome::EnemyWon,
            std::cmp::Ordering::Equal => RoundOutcome::Tie,
        }
    }
}

/// One exchange of blows. Both damages come from the state before the turn and
/// are applied together. Returns `(dealt_by_first, dealt_by_second)`.
pub fn resolve_turn(
    first: &mut RpEntity,
    second: &mut RpEntity,
    formula: &dyn DamageFormula,
    rng: &mut dyn RngCore,
) -> (u32, u32) {
    let first_snapshot = CombatSnapshot::of(first);
    let second_snapshot = CombatSnapshot::of(second);
    let dealt = formula.damage(&first_snapshot, &second_snapshot, rng);
    let received = formula.damage(&second_snapshot, &first_snapshot, rng);
    second.damage(dealt);
    first.damage(received);
    (dealt, received)
}

/// Heals both sides, then trades turns until one side drops to zero HP or
/// `turn_limit` turns have passed with both alive.
pub fn resolve_round(
    player: &mut RpEntity,
    enemy: &mut RpEntity,
    formula: &dyn DamageFormula,
    rng: &mut dyn RngCore,
    turn_limit: u32,
) -> RoundResult {
    player.heal();
    enemy.heal();

    let mut turns = 0u32;
    while !player.is_dead() && !enemy.is_dead() {
        if turns >= turn_limit {
            warn!(
                turn_limit,
                player_hp = player.hp(),
                enemy_hp = enemy.hp(),
                "combat_round_turn_limit_reached"
            );
            return RoundResult {
                turns,
                player_hp: player.hp(),
                enemy_hp: enemy.hp(),
                status: RoundStatus::Incomplete,
            };
        }
        resolve_turn(player, enemy, formula, rng);
        turns += 1;
    }

    RoundResult {
        turns,
        player_hp: player.hp(),
        enemy_hp: enemy.hp(),
        status: RoundStatus::Decisive,
    }
}

/// Runs `rounds` rounds back to back, reporting each one to `on_round` (1-based index).
pub fn simulate(
    player: &mut RpEntity,
    enemy: &mut RpEntity,
    formula: &dyn DamageFormula,
    rng: &mut dyn RngCore,
    rounds: u32,
    turn_limit: u32,
    mut on_round: impl FnMut(u32, &RoundResult),
) -> RoundTally {
    let mut tally = RoundTally::default();
    for index in 1..=rounds {
        let result = resolve_round(player, enemy, formula, rng, turn_limit);
        tally.record(result.outcome());
        on_round(index, &result);
    }
    tally
}
