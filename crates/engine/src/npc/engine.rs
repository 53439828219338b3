use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::content::DefDatabase;
use crate::entity::{EntityId, Player};
use crate::turn::TurnNotifier;
use crate::world::TurnAction;

use super::condition::Condition;
use super::effect::Effect;
use super::expression::{Expression, Vocabulary};
use super::matcher::{CaseInsensitiveMatcher, ExpressionMatcher};
use super::state::ConversationState;

pub const DEFAULT_UNKNOWN_REPLY: &str = "Sorry, I did not understand you.";

/// The registries a dialogue step may touch.
pub struct DialogueContext<'a> {
    pub turns: &'a mut TurnNotifier<TurnAction>,
    pub defs: &'a DefDatabase,
}

impl<'a> DialogueContext<'a> {
    pub fn new(turns: &'a mut TurnNotifier<TurnAction>, defs: &'a DefDatabase) -> Self {
        Self { turns, defs }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition from {from} has no trigger expressions")]
    NoTriggers { from: String },
    #[error("transition from {from} has an empty trigger")]
    EmptyTrigger { from: String },
    #[error("transition from {from} on '{trigger}' has no reply text")]
    EmptyReply { from: String, trigger: String },
    #[error("transition from {from} on '{trigger}' targets ANY, which is only valid as a source state")]
    AnyTarget { from: String, trigger: String },
}

#[derive(Debug, Clone)]
pub struct Transition {
    from: ConversationState,
    triggers: Vec<Expression>,
    condition: Option<Condition>,
    to: ConversationState,
    reply: String,
    effects: Vec<Effect>,
}

impl Transition {
    /// Validates and normalizes a transition; triggers go through the default vocabulary.
    pub fn new<I, S>(
        from: ConversationState,
        triggers: I,
        to: ConversationState,
        reply: impl Into<String>,
    ) -> Result<Self, TransitionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocabulary = Vocabulary::default();
        let triggers = triggers
            .into_iter()
            .map(|trigger| vocabulary.parse(trigger.as_ref()))
            .collect::<Vec<_>>();
        let reply = reply.into();

        let Some(first) = triggers.first() else {
            return Err(TransitionError::NoTriggers {
                from: from.to_string(),
            });
        };
        if triggers.iter().any(Expression::is_empty) {
            return Err(TransitionError::EmptyTrigger {
                from: from.to_string(),
            });
        }
        if reply.trim().is_empty() {
            return Err(TransitionError::EmptyReply {
                from: from.to_string(),
                trigger: first.normalized().to_string(),
            });
        }
        if to == ConversationState::Any {
            return Err(TransitionError::AnyTarget {
                from: from.to_string(),
                trigger: first.normalized().to_string(),
            });
        }

        Ok(Self {
            from,
            triggers,
            condition: None,
            to,
            reply,
            effects: Vec::new(),
        })
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn from(&self) -> &ConversationState {
        &self.from
    }

    pub fn to(&self) -> &ConversationState {
        &self.to
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn triggers(&self) -> &[Expression] {
        &self.triggers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub state: ConversationState,
    pub reply: Option<String>,
    pub transitioned: bool,
}

/// Transition table plus one conversation session per player.
#[derive(Debug)]
pub struct DialogueEngine {
    speaker: String,
    transitions: Vec<Transition>,
    sessions: HashMap<EntityId, ConversationState>,
    vocabulary: Vocabulary,
    matcher: Box<dyn ExpressionMatcher>,
    unknown_reply: Option<String>,
}

impl DialogueEngine {
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            transitions: Vec::new(),
            sessions: HashMap::new(),
            vocabulary: Vocabulary::default(),
            matcher: Box::new(CaseInsensitiveMatcher),
            unknown_reply: Some(DEFAULT_UNKNOWN_REPLY.to_string()),
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn ExpressionMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn set_unknown_reply(&mut self, reply: Option<String>) {
        self.unknown_reply = reply;
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn add(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn add_transition(
        &mut self,
        from: ConversationState,
        triggers: &[&str],
        condition: Option<Condition>,
        to: ConversationState,
        reply: &str,
        effects: Vec<Effect>,
    ) -> Result<(), TransitionError> {
        let mut transition = Transition::new(from, triggers, to, reply)?.with_effects(effects);
        transition.condition = condition;
        self.add(transition);
        Ok(())
    }

    /// IDLE --hi--> ATTENDING.
    pub fn add_greeting(&mut self, reply: &str) -> Result<(), TransitionError> {
        self.add_transition(
            ConversationState::Idle,
            &["hi"],
            None,
            ConversationState::Attending,
            reply,
            Vec::new(),
        )
    }

    /// ANY --bye--> IDLE.
    pub fn add_goodbye(&mut self, reply: &str) -> Result<(), TransitionError> {
        self.add_transition(
            ConversationState::Any,
            &["bye"],
            None,
            ConversationState::Idle,
            reply,
            Vec::new(),
        )
    }

    /// ATTENDING --triggers--> ATTENDING with a fixed reply.
    pub fn add_reply(&mut self, triggers: &[&str], reply: &str) -> Result<(), TransitionError> {
        self.add_transition(
            ConversationState::Attending,
            triggers,
            None,
            ConversationState::Attending,
            reply,
            Vec::new(),
        )
    }

    /// ATTENDING --quest--> QUEST_OFFERED while the quest has not been started.
    pub fn add_quest_offer(&mut self, slot: &str, offer: &str) -> Result<(), TransitionError> {
        self.add_transition(
            ConversationState::Attending,
            &["quest"],
            Some(Condition::QuestNotStarted(slot.to_string())),
            ConversationState::QuestOffered,
            offer,
            Vec::new(),
        )
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn current_state(&self, player: EntityId) -> ConversationState {
        self.sessions.get(&player).cloned().unwrap_or_default()
    }

    pub fn end_session(&mut self, player: EntityId) {
        self.sessions.remove(&player);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn step(
        &mut self,
        ctx: &mut DialogueContext<'_>,
        player: &mut Player,
        text: &str,
    ) -> StepOutcome {
        let player_id = player.id();
        let current = self.current_state(player_id);
        let said = self.vocabulary.parse(text);

        let Some(index) = self.find_transition(&current, &said, player) else {
            debug!(
                npc = %self.speaker,
                player = %player_id,
                state = %current,
                said = said.normalized(),
                "dialogue_no_match"
            );
            let reply = if current == ConversationState::Idle {
                None
            } else {
                self.unknown_reply.clone()
            };
            return StepOutcome {
                state: current,
                reply,
                transitioned: false,
            };
        };

        let transition = &self.transitions[index];
        for effect in &transition.effects {
            effect.apply(ctx, &self.speaker, player);
        }
        let next = transition.to.clone();
        let reply = transition.reply.clone();
        debug!(
            npc = %self.speaker,
            player = %player_id,
            from = %current,
            to = %next,
            "dialogue_transition"
        );

        if next == ConversationState::Idle {
            self.sessions.remove(&player_id);
        } else {
            self.sessions.insert(player_id, next.clone());
        }

        StepOutcome {
            state: next,
            reply: Some(reply),
            transitioned: true,
        }
    }

    fn find_transition(
        &self,
        current: &ConversationState,
        said: &Expression,
        player: &Player,
    ) -> Option<usize> {
        let applies = |transition: &Transition| {
            transition
                .triggers
                .iter()
                .any(|trigger| self.matcher.matches(said, trigger))
                && transition
                    .condition
                    .as_ref()
                    .map_or(true, |condition| condition.holds(player))
                && transition.effects.iter().all(|effect| effect.is_payable(player))
        };

        self.transitions
            .iter()
            .position(|transition| &transition.from == current && applies(transition))
            .or_else(|| {
                if *current == ConversationState::Idle {
                    return None;
                }
                self.transitions.iter().position(|transition| {
                    transition.from == ConversationState::Any && applies(transition)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ItemTemplate, ZoneId};

    struct Fixture {
        turns: TurnNotifier<TurnAction>,
        defs: DefDatabase,
        player: Player,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                turns: TurnNotifier::new(),
                defs: DefDatabase::default(),
                player: Player::new(EntityId(3), ZoneId::new("z"), "player"),
            }
        }

        fn say(&mut self, engine: &mut DialogueEngine, text: &str) -> StepOutcome {
            let mut ctx = DialogueContext::new(&mut self.turns, &self.defs);
            engine.step(&mut ctx, &mut self.player, text)
        }
    }

    fn smith() -> DialogueEngine {
        let mut engine = DialogueEngine::new("Smith");
        engine.add_greeting("Welcome.").expect("greeting");
        engine.add_goodbye("Bye.").expect("goodbye");
        engine.add_reply(&["job"], "I forge.").expect("job");
        engine
    }

    #[test]
    fn greeting_attends_and_goodbye_ends_session() {
        let mut fixture = Fixture::new();
        let mut engine = smith();

        let outcome = fixture.say(&mut engine, "Hello!");
        assert_eq!(outcome.state, ConversationState::Attending);
        assert_eq!(outcome.reply.as_deref(), Some("Welcome."));
        assert_eq!(engine.active_sessions(), 1);

        let outcome = fixture.say(&mut engine, "JOB");
        assert_eq!(outcome.reply.as_deref(), Some("I forge."));

        let outcome = fixture.say(&mut engine, "bye");
        assert_eq!(outcome.state, ConversationState::Idle);
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn unmatched_input_keeps_state() {
        let mut fixture = Fixture::new();
        let mut engine = smith();

        let idle = fixture.say(&mut engine, "weather");
        assert!(!idle.transitioned);
        assert_eq!(idle.reply, None);

        fixture.say(&mut engine, "hi");
        let attending = fixture.say(&mut engine, "weather");
        assert_eq!(attending.state, ConversationState::Attending);
        assert_eq!(attending.reply.as_deref(), Some(DEFAULT_UNKNOWN_REPLY));
    }

    #[test]
    fn goodbye_is_ignored_while_idle() {
        let mut fixture = Fixture::new();
        let mut engine = smith();
        let outcome = fixture.say(&mut engine, "bye");
        assert!(!outcome.transitioned);
    }

    #[test]
    fn exact_state_transitions_win_over_any() {
        let mut fixture = Fixture::new();
        let mut engine = smith();
        engine
            .add_transition(
                ConversationState::Attending,
                &["bye"],
                None,
                ConversationState::Idle,
                "Leaving so soon?",
                Vec::new(),
            )
            .expect("attending bye");

        fixture.say(&mut engine, "hi");
        let outcome = fixture.say(&mut engine, "bye");
        assert_eq!(outcome.reply.as_deref(), Some("Leaving so soon?"));
    }

    #[test]
    fn effects_run_before_reply_and_delayed_effects_are_scheduled() {
        let mut fixture = Fixture::new();
        let mut engine = smith();
        engine
            .add_transition(
                ConversationState::Attending,
                &["help"],
                Some(Condition::QuestNotStarted("rats".to_string())),
                ConversationState::Attending,
                "Thanks!",
                vec![
                    Effect::SetQuest {
                        slot: "rats".to_string(),
                        state: "start".to_string(),
                    },
                    Effect::IncreaseXp(10),
                    Effect::SayAfter {
                        turns: 2,
                        text: "Hurry up.".to_string(),
                    },
                ],
            )
            .expect("help");

        fixture.say(&mut engine, "hi");
        let outcome = fixture.say(&mut engine, "help");
        assert!(outcome.transitioned);
        assert!(fixture.player.quests().is_in_state("rats", "start"));
        assert_eq!(fixture.player.entity().xp(), 10);
        assert_eq!(fixture.turns.pending_count(), 1);

        let again = fixture.say(&mut engine, "help");
        assert_eq!(again.reply.as_deref(), Some(DEFAULT_UNKNOWN_REPLY));
        assert_eq!(fixture.player.entity().xp(), 10);
    }

    fn trader() -> DialogueEngine {
        let mut engine = smith();
        engine
            .add_transition(
                ConversationState::Attending,
                &["sell"],
                None,
                ConversationState::Attending,
                "Here is your money.",
                vec![
                    Effect::DropItem {
                        name: "club".to_string(),
                        quantity: 1,
                    },
                    Effect::EquipItem {
                        name: "money".to_string(),
                        quantity: 100,
                    },
                ],
            )
            .expect("sell");
        engine
    }

    #[test]
    fn selling_takes_an_equipped_item_before_paying() {
        let mut fixture = Fixture::new();
        let mut engine = trader();
        let club = ItemTemplate::new("club", "club").with_slots(["rhand"]);
        assert!(fixture.player.entity_mut().equip("rhand", club.instantiate()));

        fixture.say(&mut engine, "hi");
        let outcome = fixture.say(&mut engine, "sell");
        assert_eq!(outcome.reply.as_deref(), Some("Here is your money."));
        assert_eq!(fixture.player.number_of_equipped("club"), 0);
        assert_eq!(fixture.player.number_of_equipped("money"), 100);

        let again = fixture.say(&mut engine, "sell");
        assert!(!again.transitioned);
        assert_eq!(again.reply.as_deref(), Some(DEFAULT_UNKNOWN_REPLY));
        assert_eq!(fixture.player.number_of_equipped("money"), 100);
    }

    #[test]
    fn sessions_are_tracked_per_player() {
        let mut fixture = Fixture::new();
        let mut engine = smith();
        fixture.say(&mut engine, "hi");

        let other = EntityId(99);
        assert_eq!(engine.current_state(other), ConversationState::Idle);
        assert_eq!(
            engine.current_state(fixture.player.id()),
            ConversationState::Attending
        );
    }

    #[test]
    fn invalid_registrations_fail_fast() {
        let mut engine = DialogueEngine::new("Broken");
        assert!(matches!(
            engine.add_reply(&[], "text"),
            Err(TransitionError::NoTriggers { .. })
        ));
        assert!(matches!(
            engine.add_reply(&["job"], "   "),
            Err(TransitionError::EmptyReply { .. })
        ));
        assert!(matches!(
            engine.add_reply(&["?"], "text"),
            Err(TransitionError::EmptyTrigger { .. })
        ));
        assert!(matches!(
            engine.add_transition(
                ConversationState::Idle,
                &["hi"],
                None,
                ConversationState::Any,
                "text",
                Vec::new()
            ),
            Err(TransitionError::AnyTarget { .. })
        ));
        assert!(engine.transitions().is_empty());
    }
}
