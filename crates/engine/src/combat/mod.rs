//! Damage rolls, level curves and round resolution between two combatants.

mod formula;
mod level_curve;
mod report;
mod round;

pub use formula::{CombatSnapshot, DamageFormula, LogarithmicFormula};
pub use level_curve::LevelCurve;
pub use report::{Beneficiary, RoundTally, SimulationReport};
pub use round::{
    resolve_round, resolve_turn, simulate, RoundOutcome, RoundResult, RoundStatus,
    DEFAULT_TURN_LIMIT,
};
