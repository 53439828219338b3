//! NPC conversations: utterance parsing, matching strategies and the per-player
//! transition table that drives quests.

mod condition;
mod effect;
mod engine;
mod expression;
mod matcher;
mod speaker;
mod state;

pub use condition::Condition;
pub use effect::Effect;
pub use engine::{
    DialogueContext, DialogueEngine, StepOutcome, Transition, TransitionError,
    DEFAULT_UNKNOWN_REPLY,
};
pub use expression::{Expression, Vocabulary, TYPE_NUMBER, TYPE_OBJECT, TYPE_VERB};
pub use matcher::{CaseInsensitiveMatcher, ExactMatcher, ExpressionMatcher, TypeMatcher};
pub use speaker::{NpcList, SpeakerNpc};
pub use state::ConversationState;
