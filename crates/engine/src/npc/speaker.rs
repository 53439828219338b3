use std::collections::BTreeMap;

use tracing::info;

use crate::entity::{EntityId, Player, ZoneId};

use super::engine::{DialogueContext, DialogueEngine, StepOutcome};
use super::state::ConversationState;

/// A talking NPC: its dialogue engine plus the last thing it said.
#[derive(Debug)]
pub struct SpeakerNpc {
    name: String,
    zone: ZoneId,
    description: Option<String>,
    engine: DialogueEngine,
    last_reply: Option<String>,
}

impl SpeakerNpc {
    pub fn new(name: impl Into<String>, zone: ZoneId) -> Self {
        let name = name.into();
        Self {
            engine: DialogueEngine::new(name.clone()),
            name,
            zone,
            description: None,
            last_reply: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut DialogueEngine {
        &mut self.engine
    }

    pub fn current_state(&self, player: EntityId) -> ConversationState {
        self.engine.current_state(player)
    }

    pub fn step(
        &mut self,
        ctx: &mut DialogueContext<'_>,
        player: &mut Player,
        text: &str,
    ) -> StepOutcome {
        let outcome = self.engine.step(ctx, player, text);
        if let Some(reply) = &outcome.reply {
            self.record_reply(reply.clone());
        }
        outcome
    }

    /// Speaks a line outside of any transition, e.g. a delayed remark.
    pub fn say(&mut self, text: &str, to: Option<EntityId>) {
        match to {
            Some(player) => info!(npc = %self.name, player = %player, text, "npc_say"),
            None => info!(npc = %self.name, text, "npc_say"),
        }
        self.record_reply(text.to_string());
    }

    /// Most recent line spoken, cleared on read.
    pub fn take_reply(&mut self) -> Option<String> {
        self.last_reply.take()
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    fn record_reply(&mut self, text: String) {
        self.last_reply = Some(text);
    }
}

/// Name-keyed NPC registry; lookups ignore case.
#[derive(Debug, Default)]
pub struct NpcList {
    npcs: BTreeMap<String, SpeakerNpc>,
}

impl NpcList {
    /// Returns false and keeps the existing NPC when the name is taken.
    pub fn add(&mut self, npc: SpeakerNpc) -> bool {
        let key = npc.name().to_lowercase();
        if self.npcs.contains_key(&key) {
            return false;
        }
        self.npcs.insert(key, npc);
        true
    }

    pub fn get(&self, name: &str) -> Option<&SpeakerNpc> {
        self.npcs.get(&name.to_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SpeakerNpc> {
        self.npcs.get_mut(&name.to_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<SpeakerNpc> {
        self.npcs.remove(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeakerNpc> {
        self.npcs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SpeakerNpc> {
        self.npcs.values_mut()
    }
}
