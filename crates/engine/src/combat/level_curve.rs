/// Level-derived base stats for players.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCurve {
    pub level_shift: f64,
    pub atk_log_factor: f64,
    pub atk_offset: f64,
    pub def_log_factor: f64,
    pub def_level_factor: f64,
    pub def_offset: f64,
    pub base_hp: u32,
    pub hp_per_level: u32,
    pub highest_level: u32,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            level_shift: 4.0,
            atk_log_factor: 9.0,
            atk_offset: -10.0,
            def_log_factor: 20.0,
            def_level_factor: 1.0,
            def_offset: -26.0,
            base_hp: 100,
            hp_per_level: 10,
            highest_level: 597,
        }
    }
}

impl LevelCurve {
    pub fn clamp_level(&self, level: u32) -> u32 {
        level.min(self.highest_level)
    }

    pub fn atk(&self, level: u32) -> u32 {
        let level = f64::from(self.clamp_level(level));
        to_stat((level + self.level_shift).ln() * self.atk_log_factor + self.atk_offset)
    }

    pub fn def(&self, level: u32) -> u32 {
        let level = f64::from(self.clamp_level(level));
        to_stat(
            (level + self.level_shift).ln() * self.def_log_factor
                + level * self.def_level_factor
                + self.def_offset,
        )
    }

    pub fn hp(&self, level: u32) -> u32 {
        self.base_hp
            .saturating_add(self.hp_per_level.saturating_mul(self.clamp_level(level)))
    }
}

fn to_stat(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_points_on_default_curve() {
        let curve = LevelCurve::default();
        assert_eq!(curve.atk(0), 2);
        assert_eq!(curve.def(0), 2);
        assert_eq!(curve.atk(10), 14);
        assert_eq!(curve.def(10), 37);
        assert_eq!(curve.hp(10), 200);
    }

    #[test]
    fn levels_above_highest_are_capped() {
        let curve = LevelCurve::default();
        assert_eq!(curve.atk(10_000), curve.atk(597));
        assert_eq!(curve.hp(10_000), 100 + 10 * 597);
    }
}
