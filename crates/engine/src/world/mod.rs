//! The explicit simulation context: every registry the turn loop, dialogue and
//! scripts operate on lives here instead of in globals.

mod engagement;

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::combat::{DamageFormula, LevelCurve, LogarithmicFormula};
use crate::content::DefDatabase;
use crate::entity::{Creature, EntityDelta, EntityId, Player, ZoneId};
use crate::npc::{DialogueContext, NpcList, StepOutcome};
use crate::scripting::{BackgroundMusicSource, ScriptCallback, ScriptEnvironment};
use crate::turn::TurnNotifier;

pub use engagement::CombatEvent;

/// What a scheduled turn callback does when it fires.
#[derive(Debug, Clone)]
pub enum TurnAction {
    Script(ScriptCallback),
    SetQuestState {
        player: EntityId,
        slot: String,
        state: String,
    },
    NpcSay {
        npc: String,
        player: Option<EntityId>,
        text: String,
    },
}

impl TurnAction {
    fn concerns_player(&self, id: EntityId) -> bool {
        match self {
            TurnAction::Script(_) => false,
            TurnAction::SetQuestState { player, .. } => *player == id,
            TurnAction::NpcSay { player, .. } => *player == Some(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    pub turn: u64,
    pub fired: usize,
    pub combat: Vec<CombatEvent>,
}

pub struct World {
    turns: TurnNotifier<TurnAction>,
    defs: DefDatabase,
    players: BTreeMap<EntityId, Player>,
    creatures: BTreeMap<EntityId, Creature>,
    npcs: NpcList,
    music: BTreeMap<ZoneId, Vec<BackgroundMusicSource>>,
    engagements: BTreeMap<EntityId, EntityId>,
    level_curve: LevelCurve,
    formula: Box<dyn DamageFormula>,
    rng: SmallRng,
    next_id: u64,
}

impl World {
    pub fn new(defs: DefDatabase) -> Self {
        Self {
            turns: TurnNotifier::new(),
            defs,
            players: BTreeMap::new(),
            creatures: BTreeMap::new(),
            npcs: NpcList::default(),
            music: BTreeMap::new(),
            engagements: BTreeMap::new(),
            level_curve: LevelCurve::default(),
            formula: Box::new(LogarithmicFormula::default()),
            rng: SmallRng::from_entropy(),
            next_id: 1,
        }
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn with_formula(mut self, formula: Box<dyn DamageFormula>) -> Self {
        self.formula = formula;
        self
    }

    pub fn defs(&self) -> &DefDatabase {
        &self.defs
    }

    pub fn level_curve(&self) -> &LevelCurve {
        &self.level_curve
    }

    pub fn turns(&self) -> &TurnNotifier<TurnAction> {
        &self.turns
    }

    pub fn turns_mut(&mut self) -> &mut TurnNotifier<TurnAction> {
        &mut self.turns
    }

    pub fn current_turn(&self) -> u64 {
        self.turns.current_turn()
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Logs in a fresh level-0 player with stats from the level curve.
    pub fn spawn_player(&mut self, name: &str, zone: ZoneId) -> EntityId {
        let id = self.allocate_id();
        let mut player = Player::new(id, zone, name);
        let entity = player.entity_mut();
        entity.set_base_hp(self.level_curve.hp(0));
        entity.heal();
        entity.set_atk(self.level_curve.atk(0));
        entity.set_def(self.level_curve.def(0));
        self.insert_player(player)
    }

    pub fn insert_player(&mut self, player: Player) -> EntityId {
        let id = player.id();
        self.next_id = self.next_id.max(id.0 + 1);
        info!(player = %id, name = player.name(), zone = %player.entity().zone(), "player_entered");
        self.players.insert(id, player);
        id
    }

    /// Removes the player along with its sessions, engagement and pending turn actions.
    pub fn logout(&mut self, id: EntityId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        let cancelled = self.turns.cancel_where(|action| action.concerns_player(id));
        for npc in self.npcs.iter_mut() {
            npc.engine_mut().end_session(id);
        }
        self.engagements.remove(&id);
        info!(player = %id, cancelled, "player_left");
        Some(player)
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players
            .values()
            .find(|player| player.name().eq_ignore_ascii_case(name))
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn spawn_creature(&mut self, def_name: &str, zone: ZoneId) -> Option<EntityId> {
        let template = self.defs.creature(def_name)?.clone();
        let id = self.allocate_id();
        let creature = template.spawn(id, zone);
        debug!(creature = %id, def = def_name, "creature_spawned");
        self.creatures.insert(id, creature);
        Some(id)
    }

    pub fn creature(&self, id: EntityId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creature_mut(&mut self, id: EntityId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn npcs(&self) -> &NpcList {
        &self.npcs
    }

    pub fn npcs_mut(&mut self) -> &mut NpcList {
        &mut self.npcs
    }

    pub fn add_music_source(&mut self, source: BackgroundMusicSource) {
        self.music.entry(source.zone.clone()).or_default().push(source);
    }

    pub fn music_sources(&self, zone: &ZoneId) -> &[BackgroundMusicSource] {
        self.music.get(zone).map(Vec::as_slice).unwrap_or_default()
    }

    /// Feeds one utterance from `player` to the named NPC.
    pub fn talk(&mut self, player: EntityId, npc: &str, text: &str) -> Option<StepOutcome> {
        let speaker = self.npcs.get_mut(npc)?;
        let player = self.players.get_mut(&player)?;
        let mut ctx = DialogueContext::new(&mut self.turns, &self.defs);
        Some(speaker.step(&mut ctx, player, text))
    }

    /// Moves to the next turn: fires due actions in registration order, then
    /// runs one combat exchange for every engaged pair.
    pub fn advance_turn(&mut self, scripts: &mut ScriptEnvironment) -> TurnReport {
        let fired = self.turns.advance();
        let turn = self.turns.current_turn();
        let fired_count = fired.len();
        for action in fired {
            self.dispatch(action, scripts);
        }
        let combat = self.resolve_engagements();
        TurnReport {
            turn,
            fired: fired_count,
            combat,
        }
    }

    fn dispatch(&mut self, action: TurnAction, scripts: &mut ScriptEnvironment) {
        match action {
            TurnAction::Script(callback) => {
                scripts.run_callback(&callback, self);
            }
            TurnAction::SetQuestState {
                player,
                slot,
                state,
            } => match self.players.get_mut(&player) {
                Some(target) => target.quests_mut().set_quest(&slot, &state),
                None => debug!(player = %player, slot = %slot, "quest_update_player_gone"),
            },
            TurnAction::NpcSay { npc, player, text } => match self.npcs.get_mut(&npc) {
                Some(speaker) => speaker.say(&text, player),
                None => debug!(npc = %npc, "npc_say_npc_gone"),
            },
        }
    }

    /// Changed attributes of every player and creature since the last call.
    pub fn take_deltas(&mut self) -> Vec<EntityDelta> {
        let players = self
            .players
            .values_mut()
            .filter(|player| player.entity().has_changes())
            .map(Player::take_delta);
        let creatures = self
            .creatures
            .values_mut()
            .filter(|creature| creature.entity().has_changes())
            .map(|creature| creature.entity_mut().take_delta());
        players.chain(creatures).collect()
    }
}
