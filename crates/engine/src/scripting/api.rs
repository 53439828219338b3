use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, FLOAT, INT};
use tracing::{info, warn};

use crate::entity::ZoneId;
use crate::npc::{Condition, ConversationState, Effect, SpeakerNpc, Transition};

use super::log_context::{chunk_label, SharedLogContext};
use super::music::BackgroundMusicSource;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// A script function to call on a later turn, tagged with the module that owns it.
#[derive(Debug, Clone)]
pub struct ScriptCallback {
    pub module: String,
    pub callback: FnPtr,
}

/// World changes requested by a script, applied once the script body has finished.
#[derive(Debug, Clone)]
pub enum ScriptCommand {
    RegisterNpc(NpcBuilder),
    AddMusic(BackgroundMusicSource),
    RunAfter { turns: u64, callback: ScriptCallback },
}

#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub zone: Option<ZoneId>,
    pub commands: Vec<ScriptCommand>,
}

impl SharedState {
    pub fn take_commands(&mut self) -> Vec<ScriptCommand> {
        std::mem::take(&mut self.commands)
    }
}

pub(crate) type SharedScriptState = Rc<RefCell<SharedState>>;

/// The `game` object in script scope.
#[derive(Clone)]
pub struct GameApi {
    shared: SharedScriptState,
    log: SharedLogContext,
}

impl GameApi {
    pub(crate) fn new(shared: SharedScriptState, log: SharedLogContext) -> Self {
        Self { shared, log }
    }

    fn current_module(&self) -> ScriptResult<String> {
        self.log
            .borrow()
            .current()
            .map(str::to_string)
            .ok_or_else(|| "no script module is running".into())
    }

    fn set_zone(&mut self, zone: &str) -> ScriptResult<()> {
        let zone = zone.trim();
        if zone.is_empty() {
            return Err("zone name must not be empty".into());
        }
        self.shared.borrow_mut().zone = Some(ZoneId::new(zone));
        Ok(())
    }

    fn set_music(&mut self, name: &str) -> ScriptResult<()> {
        self.set_music_with(name, Map::new())
    }

    fn set_music_with(&mut self, name: &str, options: Map) -> ScriptResult<()> {
        let zone = self
            .shared
            .borrow()
            .zone
            .clone()
            .ok_or("game.set_zone must be called before game.set_music")?;
        let mut source = BackgroundMusicSource::new(zone, name.trim());
        for key in source.apply_options(&options) {
            warn!(chunk = %chunk_label(&self.log), key = %key, "unknown_music_option");
        }
        self.shared
            .borrow_mut()
            .commands
            .push(ScriptCommand::AddMusic(source));
        Ok(())
    }

    fn run_after(&mut self, turns: INT, callback: FnPtr) -> ScriptResult<()> {
        let turns = to_turns(turns)?;
        let callback = ScriptCallback {
            module: self.current_module()?,
            callback,
        };
        self.shared
            .borrow_mut()
            .commands
            .push(ScriptCommand::RunAfter { turns, callback });
        Ok(())
    }

    fn callback_after(&mut self, turns: INT, callback: FnPtr) -> ScriptResult<Effect> {
        Ok(Effect::RunScriptAfter {
            turns: to_turns(turns)?,
            callback: ScriptCallback {
                module: self.current_module()?,
                callback,
            },
        })
    }

    fn log_info(&mut self, message: &str) {
        info!(chunk = %chunk_label(&self.log), "{message}");
    }

    fn log_warn(&mut self, message: &str) {
        warn!(chunk = %chunk_label(&self.log), "{message}");
    }
}

/// The `npcs` object in script scope.
#[derive(Clone)]
pub struct NpcApi {
    shared: SharedScriptState,
}

impl NpcApi {
    pub(crate) fn new(shared: SharedScriptState) -> Self {
        Self { shared }
    }

    fn create(&mut self, name: &str) -> ScriptResult<NpcBuilder> {
        let name = name.trim();
        if name.is_empty() {
            return Err("NPC name must not be empty".into());
        }
        let zone = self
            .shared
            .borrow()
            .zone
            .clone()
            .ok_or("game.set_zone must be called before npcs.create")?;
        Ok(NpcBuilder {
            name: name.to_string(),
            zone,
            description: None,
            transitions: Vec::new(),
        })
    }

    fn add(&mut self, npc: NpcBuilder) {
        self.shared
            .borrow_mut()
            .commands
            .push(ScriptCommand::RegisterNpc(npc));
    }
}

/// An NPC under construction; every transition is validated as it is added.
#[derive(Debug, Clone)]
pub struct NpcBuilder {
    name: String,
    zone: ZoneId,
    description: Option<String>,
    transitions: Vec<Transition>,
}

impl NpcBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(self) -> SpeakerNpc {
        let mut npc = SpeakerNpc::new(self.name, self.zone);
        if let Some(description) = self.description {
            npc.set_description(description);
        }
        for transition in self.transitions {
            npc.engine_mut().add(transition);
        }
        npc
    }

    fn set_description(&mut self, text: &str) {
        self.description = Some(text.to_string());
    }

    fn push(
        &mut self,
        transition: Result<Transition, crate::npc::TransitionError>,
    ) -> ScriptResult<()> {
        let transition =
            transition.map_err(|error| format!("NPC {}: {error}", self.name))?;
        self.transitions.push(transition);
        Ok(())
    }

    fn greeting(&mut self, reply: &str) -> ScriptResult<()> {
        self.push(Transition::new(
            ConversationState::Idle,
            ["hi"],
            ConversationState::Attending,
            reply,
        ))
    }

    fn goodbye(&mut self, reply: &str) -> ScriptResult<()> {
        self.push(Transition::new(
            ConversationState::Any,
            ["bye"],
            ConversationState::Idle,
            reply,
        ))
    }

    fn reply(&mut self, triggers: Dynamic, reply: &str) -> ScriptResult<()> {
        let triggers = triggers_from(triggers)?;
        self.push(Transition::new(
            ConversationState::Attending,
            triggers,
            ConversationState::Attending,
            reply,
        ))
    }

    fn quest_offer(&mut self, slot: &str, offer: &str) -> ScriptResult<()> {
        let transition = Transition::new(
            ConversationState::Attending,
            ["quest"],
            ConversationState::QuestOffered,
            offer,
        )
        .map(|transition| transition.with_condition(Condition::QuestNotStarted(slot.to_string())));
        self.push(transition)
    }

    fn transition(
        &mut self,
        from: &str,
        triggers: Dynamic,
        to: &str,
        reply: &str,
    ) -> ScriptResult<()> {
        let triggers = triggers_from(triggers)?;
        self.push(Transition::new(state_from(from)?, triggers, state_from(to)?, reply))
    }

    fn transition_full(
        &mut self,
        from: &str,
        triggers: Dynamic,
        condition: Condition,
        to: &str,
        reply: &str,
        effects: Array,
    ) -> ScriptResult<()> {
        let triggers = triggers_from(triggers)?;
        let effects = effects_from(effects)?;
        let transition = Transition::new(state_from(from)?, triggers, state_from(to)?, reply)
            .map(|transition| transition.with_condition(condition).with_effects(effects));
        self.push(transition)
    }
}

fn to_turns(turns: INT) -> ScriptResult<u64> {
    u64::try_from(turns).map_err(|_| format!("turn delay must be >= 0, got {turns}").into())
}

fn to_quantity(quantity: INT) -> ScriptResult<u32> {
    u32::try_from(quantity).map_err(|_| format!("quantity out of range: {quantity}").into())
}

fn state_from(name: &str) -> ScriptResult<ConversationState> {
    ConversationState::from_name(name)
        .ok_or_else(|| "conversation state name must not be empty".into())
}

fn triggers_from(value: Dynamic) -> ScriptResult<Vec<String>> {
    if value.is_string() {
        return Ok(vec![value.into_string()?]);
    }
    let type_name = value.type_name();
    let items = value
        .into_array()
        .map_err(|_| format!("triggers must be a string or an array of strings, got {type_name}"))?;
    items
        .into_iter()
        .map(|item| {
            let type_name = item.type_name();
            item.into_string()
                .map_err(|_| format!("trigger must be a string, got {type_name}").into())
        })
        .collect()
}

fn conditions_from(values: Array) -> ScriptResult<Vec<Condition>> {
    values
        .into_iter()
        .map(|value| {
            let type_name = value.type_name();
            value
                .try_cast::<Condition>()
                .ok_or_else(|| format!("expected a Condition, got {type_name}").into())
        })
        .collect()
}

fn effects_from(values: Array) -> ScriptResult<Vec<Effect>> {
    values
        .into_iter()
        .map(|value| {
            let type_name = value.type_name();
            value
                .try_cast::<Effect>()
                .ok_or_else(|| format!("expected an Effect, got {type_name}").into())
        })
        .collect()
}

pub(crate) fn register_api(engine: &mut Engine) {
    engine.register_type_with_name::<GameApi>("Game");
    engine.register_fn("set_zone", GameApi::set_zone);
    engine.register_fn("set_music", GameApi::set_music);
    engine.register_fn("set_music", GameApi::set_music_with);
    engine.register_fn("run_after", GameApi::run_after);
    engine.register_fn("callback_after", GameApi::callback_after);
    engine.register_fn("log_info", GameApi::log_info);
    engine.register_fn("log_warn", GameApi::log_warn);

    engine.register_type_with_name::<NpcApi>("Npcs");
    engine.register_fn("create", NpcApi::create);
    engine.register_fn("add", NpcApi::add);

    engine.register_type_with_name::<NpcBuilder>("Npc");
    engine.register_fn("description", NpcBuilder::set_description);
    engine.register_fn("greeting", NpcBuilder::greeting);
    engine.register_fn("goodbye", NpcBuilder::goodbye);
    engine.register_fn("reply", NpcBuilder::reply);
    engine.register_fn("quest_offer", NpcBuilder::quest_offer);
    engine.register_fn("transition", NpcBuilder::transition);
    engine.register_fn("transition", NpcBuilder::transition_full);

    engine.register_type_with_name::<Condition>("Condition");
    engine.register_fn("always", || Condition::Always);
    engine.register_fn("quest_not_started", |slot: &str| {
        Condition::QuestNotStarted(slot.to_string())
    });
    engine.register_fn("quest_in_state", |slot: &str, state: &str| {
        Condition::QuestInState {
            slot: slot.to_string(),
            state: state.to_string(),
        }
    });
    engine.register_fn("quest_completed", |slot: &str| {
        Condition::QuestCompleted(slot.to_string())
    });
    engine.register_fn("has_item", |name: &str, quantity: INT| -> ScriptResult<Condition> {
        Ok(Condition::HasItem {
            name: name.to_string(),
            quantity: to_quantity(quantity)?,
        })
    });
    engine.register_fn("karma_at_least", |min: FLOAT| Condition::KarmaAtLeast(min));
    engine.register_fn("karma_at_least", |min: INT| Condition::KarmaAtLeast(min as f64));
    engine.register_fn("level_at_least", |min: INT| -> ScriptResult<Condition> {
        Ok(Condition::LevelAtLeast(to_quantity(min)?))
    });
    engine.register_fn("negate", |condition: Condition| {
        Condition::Not(Box::new(condition))
    });
    engine.register_fn("all_of", |conditions: Array| -> ScriptResult<Condition> {
        Ok(Condition::All(conditions_from(conditions)?))
    });
    engine.register_fn("any_of", |conditions: Array| -> ScriptResult<Condition> {
        Ok(Condition::Any(conditions_from(conditions)?))
    });

    engine.register_type_with_name::<Effect>("Effect");
    engine.register_fn("set_quest", |slot: &str, state: &str| Effect::SetQuest {
        slot: slot.to_string(),
        state: state.to_string(),
    });
    engine.register_fn("increase_xp", |amount: INT| Effect::IncreaseXp(amount));
    engine.register_fn("increase_karma", |amount: FLOAT| Effect::IncreaseKarma(amount));
    engine.register_fn("increase_karma", |amount: INT| {
        Effect::IncreaseKarma(amount as f64)
    });
    engine.register_fn("equip_item", |name: &str, quantity: INT| -> ScriptResult<Effect> {
        Ok(Effect::EquipItem {
            name: name.to_string(),
            quantity: to_quantity(quantity)?,
        })
    });
    engine.register_fn("drop_item", |name: &str, quantity: INT| -> ScriptResult<Effect> {
        Ok(Effect::DropItem {
            name: name.to_string(),
            quantity: to_quantity(quantity)?,
        })
    });
    engine.register_fn(
        "set_quest_after",
        |turns: INT, slot: &str, state: &str| -> ScriptResult<Effect> {
            Ok(Effect::SetQuestAfter {
                turns: to_turns(turns)?,
                slot: slot.to_string(),
                state: state.to_string(),
            })
        },
    );
    engine.register_fn("say_after", |turns: INT, text: &str| -> ScriptResult<Effect> {
        Ok(Effect::SayAfter {
            turns: to_turns(turns)?,
            text: text.to_string(),
        })
    });
}
