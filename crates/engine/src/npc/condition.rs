use crate::entity::Player;

/// Guard evaluated against the talking player before a transition is taken.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    QuestNotStarted(String),
    QuestInState { slot: String, state: String },
    QuestCompleted(String),
    HasItem { name: String, quantity: u32 },
    KarmaAtLeast(f64),
    LevelAtLeast(u32),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn holds(&self, player: &Player) -> bool {
        match self {
            Condition::Always => true,
            Condition::QuestNotStarted(slot) => player.quests().is_not_started(slot),
            Condition::QuestInState { slot, state } => player.quests().is_in_state(slot, state),
            Condition::QuestCompleted(slot) => player.quests().is_completed(slot),
            Condition::HasItem { name, quantity } => player.number_of_equipped(name) >= *quantity,
            Condition::KarmaAtLeast(min) => player.karma() >= *min,
            Condition::LevelAtLeast(min) => player.entity().level() >= *min,
            Condition::Not(inner) => !inner.holds(player),
            Condition::All(all) => all.iter().all(|condition| condition.holds(player)),
            Condition::Any(any) => any.iter().any(|condition| condition.holds(player)),
        }
    }
}
