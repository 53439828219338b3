use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-player quest progress: slot name to its comma-separated state tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestLog {
    slots: BTreeMap<String, Vec<String>>,
}

impl QuestLog {
    pub fn has_quest(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// Full state as stored, tokens joined with commas.
    pub fn quest(&self, slot: &str) -> Option<String> {
        self.slots.get(slot).map(|tokens| tokens.join(","))
    }

    pub fn quest_tokens(&self, slot: &str) -> Option<&[String]> {
        self.slots.get(slot).map(Vec::as_slice)
    }

    pub fn quest_at(&self, slot: &str, index: usize) -> Option<&str> {
        self.slots
            .get(slot)
            .and_then(|tokens| tokens.get(index))
            .map(String::as_str)
    }

    /// Replaces the whole state; a comma-separated value becomes several tokens.
    pub fn set_quest(&mut self, slot: &str, state: &str) {
        let tokens = state.split(',').map(|token| token.trim().to_string()).collect();
        self.slots.insert(slot.to_string(), tokens);
    }

    pub fn is_in_state(&self, slot: &str, state: &str) -> bool {
        self.quest_at(slot, 0) == Some(state)
    }

    pub fn is_completed(&self, slot: &str) -> bool {
        self.is_in_state(slot, "done")
    }

    /// Never offered, or offered and turned down.
    pub fn is_not_started(&self, slot: &str) -> bool {
        !self.has_quest(slot) || self.is_in_state(slot, "rejected")
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.slots
            .iter()
            .map(|(slot, tokens)| (slot.as_str(), tokens.as_slice()))
    }
}
