use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    Attending,
    QuestOffered,
    QuestItemQuestion,
    ServiceOffered,
    Custom(String),
    /// Wildcard source state for transitions; never a session's current state.
    Any,
}

impl ConversationState {
    /// Parses names such as `ATTENDING` or `quest_offered`; unknown names become custom states.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let state = match upper.as_str() {
            "" => return None,
            "IDLE" => ConversationState::Idle,
            "ATTENDING" => ConversationState::Attending,
            "QUEST_OFFERED" => ConversationState::QuestOffered,
            "QUEST_ITEM_QUESTION" => ConversationState::QuestItemQuestion,
            "SERVICE_OFFERED" => ConversationState::ServiceOffered,
            "ANY" => ConversationState::Any,
            _ => ConversationState::Custom(upper),
        };
        Some(state)
    }

    pub fn name(&self) -> &str {
        match self {
            ConversationState::Idle => "IDLE",
            ConversationState::Attending => "ATTENDING",
            ConversationState::QuestOffered => "QUEST_OFFERED",
            ConversationState::QuestItemQuestion => "QUEST_ITEM_QUESTION",
            ConversationState::ServiceOffered => "SERVICE_OFFERED",
            ConversationState::Custom(name) => name,
            ConversationState::Any => "ANY",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_custom_states_are_uppercased() {
        assert_eq!(
            ConversationState::from_name("quest_offered"),
            Some(ConversationState::QuestOffered)
        );
        assert_eq!(
            ConversationState::from_name("asked_for_horns"),
            Some(ConversationState::Custom("ASKED_FOR_HORNS".to_string()))
        );
        assert_eq!(ConversationState::from_name("  "), None);
        assert_eq!(ConversationState::ServiceOffered.to_string(), "SERVICE_OFFERED");
    }
}
