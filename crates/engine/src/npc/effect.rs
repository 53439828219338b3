use tracing::{debug, warn};

use crate::entity::Player;
use crate::scripting::ScriptCallback;
use crate::world::TurnAction;

use super::engine::DialogueContext;

/// Side effect of a dialogue transition, applied before the reply is recorded.
#[derive(Debug, Clone)]
pub enum Effect {
    SetQuest { slot: String, state: String },
    IncreaseXp(i64),
    IncreaseKarma(f64),
    EquipItem { name: String, quantity: u32 },
    DropItem { name: String, quantity: u32 },
    SetQuestAfter { turns: u64, slot: String, state: String },
    SayAfter { turns: u64, text: String },
    RunScriptAfter { turns: u64, callback: ScriptCallback },
}

impl Effect {
    /// Whether `player` can pay for this effect; only item drops can fail.
    pub fn is_payable(&self, player: &Player) -> bool {
        match self {
            Effect::DropItem { name, quantity } => player.number_of_equipped(name) >= *quantity,
            _ => true,
        }
    }

    pub fn apply(&self, ctx: &mut DialogueContext<'_>, speaker: &str, player: &mut Player) {
        match self {
            Effect::SetQuest { slot, state } => player.quests_mut().set_quest(slot, state),
            Effect::IncreaseXp(amount) => player.entity_mut().add_xp(*amount),
            Effect::IncreaseKarma(amount) => player.add_karma(*amount),
            Effect::EquipItem { name, quantity } => {
                if ctx.defs.item(name).is_none() {
                    debug!(item = %name, "granting_item_without_definition");
                }
                player.equip_stackable(name, *quantity);
            }
            Effect::DropItem { name, quantity } => {
                if !player.drop_carried(name, *quantity) {
                    warn!(
                        player = %player.id(),
                        item = %name,
                        quantity,
                        "dialogue_drop_item_not_carried"
                    );
                }
            }
            Effect::SetQuestAfter { turns, slot, state } => {
                ctx.turns.notify_in_turns(
                    *turns,
                    TurnAction::SetQuestState {
                        player: player.id(),
                        slot: slot.clone(),
                        state: state.clone(),
                    },
                );
            }
            Effect::SayAfter { turns, text } => {
                ctx.turns.notify_in_turns(
                    *turns,
                    TurnAction::NpcSay {
                        npc: speaker.to_string(),
                        player: Some(player.id()),
                        text: text.clone(),
                    },
                );
            }
            Effect::RunScriptAfter { turns, callback } => {
                ctx.turns
                    .notify_in_turns(*turns, TurnAction::Script(callback.clone()));
            }
        }
    }
}
