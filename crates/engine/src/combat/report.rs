use super::round::RoundOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundTally {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub incomplete: u32,
}

impl RoundTally {
    pub fn record(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::PlayerWon => self.wins += 1,
            RoundOutcome::EnemyWon => self.losses += 1,
            RoundOutcome::Tie => self.ties += 1,
            RoundOutcome::Incomplete => self.incomplete += 1,
        }
    }

    pub fn rounds(&self) -> u32 {
        self.wins + self.losses + self.ties + self.incomplete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beneficiary {
    None,
    Player,
    Enemy,
}

impl Beneficiary {
    pub fn label(self) -> &'static str {
        match self {
            Beneficiary::None => "none",
            Beneficiary::Player => "player",
            Beneficiary::Enemy => "enemy",
        }
    }
}

/// Percentages are rounded and taken over every simulated round, incomplete ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationReport {
    pub tally: RoundTally,
    pub win_ratio: i64,
    pub loss_ratio: i64,
    pub tie_ratio: i64,
    pub diff_ratio: i64,
    pub beneficiary: Beneficiary,
    pub threshold: u32,
}

impl SimulationReport {
    pub fn from_tally(tally: RoundTally, threshold: u32) -> Self {
        let rounds = tally.rounds();
        let percent = |count: u32| {
            if rounds == 0 {
                0
            } else {
                (f64::from(count) / f64::from(rounds) * 100.0).round() as i64
            }
        };
        let win_ratio = percent(tally.wins);
        let loss_ratio = percent(tally.losses);
        let tie_ratio = percent(tally.ties);

        let (diff_ratio, beneficiary) = match tally.wins.cmp(&tally.losses) {
            std::cmp::Ordering::Greater => {
                (win_ratio - loss_ratio - tie_ratio, Beneficiary::Player)
            }
            std::cmp::Ordering::Less => (loss_ratio - win_ratio - tie_ratio, Beneficiary::Enemy),
            std::cmp::Ordering::Equal => (0, Beneficiary::None),
        };

        Self {
            tally,
            win_ratio,
            loss_ratio,
            tie_ratio,
            diff_ratio,
            beneficiary,
            threshold,
        }
    }

    pub fn within_threshold(&self) -> bool {
        self.diff_ratio <= i64::from(self.threshold)
    }
}
