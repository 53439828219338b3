use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use crate::entity::{DamageType, RpEntity};

/// What a damage roll may look at: no references back into live entities.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatSnapshot {
    pub level: u32,
    pub attack: i64,
    pub defense: i64,
    pub damage_type: DamageType,
    pub susceptibilities: BTreeMap<DamageType, f64>,
}

impl CombatSnapshot {
    pub fn of(entity: &RpEntity) -> Self {
        let susceptibilities = DamageType::ALL
            .into_iter()
            .map(|kind| (kind, entity.susceptibility(kind)))
            .collect();
        Self {
            level: entity.level(),
            attack: entity.effective_atk(),
            defense: entity.effective_def(),
            damage_type: entity.damage_type(),
            susceptibilities,
        }
    }

    pub fn susceptibility(&self, kind: DamageType) -> f64 {
        self.susceptibilities.get(&kind).copied().unwrap_or(1.0)
    }
}

pub trait DamageFormula {
    /// Damage `attacker` deals to `defender` in one combat turn.
    fn damage(
        &self,
        attacker: &CombatSnapshot,
        defender: &CombatSnapshot,
        rng: &mut dyn RngCore,
    ) -> u32;
}

impl<F> DamageFormula for F
where
    F: Fn(&CombatSnapshot, &CombatSnapshot, &mut dyn RngCore) -> u32,
{
    fn damage(
        &self,
        attacker: &CombatSnapshot,
        defender: &CombatSnapshot,
        rng: &mut dyn RngCore,
    ) -> u32 {
        self(attacker, defender, rng)
    }
}

/// Attack and defense both grow with `ln(level + level_offset)`; each side rolls
/// uniformly up to its maximum and the attacker keeps the positive difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogarithmicFormula {
    pub attack_scale: f64,
    pub defense_scale: f64,
    pub level_offset: f64,
}

impl Default for LogarithmicFormula {
    fn default() -> Self {
        Self {
            attack_scale: 1.0,
            defense_scale: 0.6,
            level_offset: 5.0,
        }
    }
}

impl LogarithmicFormula {
    fn level_factor(&self, level: u32) -> f64 {
        (f64::from(level) + self.level_offset).max(1.0).ln().max(0.0)
    }

    pub fn max_attack(&self, attacker: &CombatSnapshot) -> f64 {
        self.attack_scale * attacker.attack as f64 * self.level_factor(attacker.level)
    }

    pub fn max_defense(&self, defender: &CombatSnapshot) -> f64 {
        self.defense_scale * defender.defense as f64 * self.level_factor(defender.level)
    }
}

impl DamageFormula for LogarithmicFormula {
    fn damage(
        &self,
        attacker: &CombatSnapshot,
        defender: &CombatSnapshot,
        rng: &mut dyn RngCore,
    ) -> u32 {
        let attack_roll = rng.gen::<f64>() * self.max_attack(attacker);
        let defense_roll = rng.gen::<f64>() * self.max_defense(defender);
        let raw = (attack_roll - defense_roll) * defender.susceptibility(attacker.damage_type);
        if raw <= 0.0 || !raw.is_finite() {
            0
        } else {
            raw.round().min(f64::from(u32::MAX)) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn snapshot(level: u32, attack: i64, defense: i64) -> CombatSnapshot {
        CombatSnapshot {
            level,
            attack,
            defense,
            damage_type: DamageType::Cut,
            susceptibilities: BTreeMap::new(),
        }
    }

    fn mean_damage(formula: &LogarithmicFormula, attacker: &CombatSnapshot) -> f64 {
        let defender = snapshot(10, 0, 20);
        let mut rng = StdRng::seed_from_u64(42);
        let total = (0..4_000)
            .map(|_| u64::from(formula.damage(attacker, &defender, &mut rng)))
            .sum::<u64>();
        total as f64 / 4_000.0
    }

    #[test]
    fn zero_attack_never_damages() {
        let formula = LogarithmicFormula::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(
                formula.damage(&snapshot(50, 0, 0), &snapshot(1, 0, 0), &mut rng),
                0
            );
        }
    }

    #[test]
    fn expected_damage_grows_with_attack() {
        let formula = LogarithmicFormula::default();
        let weak = mean_damage(&formula, &snapshot(10, 20, 0));
        let strong = mean_damage(&formula, &snapshot(10, 60, 0));
        assert!(strong > weak, "weak={weak} strong={strong}");
    }

    #[test]
    fn immune_defender_takes_nothing() {
        let formula = LogarithmicFormula::default();
        let mut defender = snapshot(1, 0, 0);
        defender.susceptibilities.insert(DamageType::Cut, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(formula.damage(&snapshot(30, 80, 0), &defender, &mut rng), 0);
        }
    }
}
