//! Player saves: one JSON document per character, quest log included.

mod atomic_io;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::DefDatabase;
use crate::entity::{EntityId, Player, QuestLog, ZoneId};

use atomic_io::write_text_atomic;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("player name {0:?} cannot be used as a save file name")]
    InvalidName(String),
    #[error("failed to read save {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse save {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize player {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("save {path} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub slot: String,
    pub item: String,
    pub atk: i32,
    pub def: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub version: u32,
    pub name: String,
    pub zone: String,
    pub level: u32,
    pub base_hp: u32,
    pub hp: u32,
    pub atk: u32,
    pub def: u32,
    pub xp: i64,
    pub karma: f64,
    #[serde(default)]
    pub quests: QuestLog,
    #[serde(default)]
    pub bag: BTreeMap<String, u32>,
    #[serde(default)]
    pub equipment: Vec<EquippedItem>,
}

impl PlayerSnapshot {
    pub fn capture(player: &Player) -> Self {
        let entity = player.entity();
        Self {
            version: SNAPSHOT_VERSION,
            name: player.name().to_string(),
            zone: entity.zone().as_str().to_string(),
            level: entity.level(),
            base_hp: entity.base_hp(),
            hp: entity.hp(),
            atk: entity.atk(),
            def: entity.def(),
            xp: entity.xp(),
            karma: player.karma(),
            quests: player.quests().clone(),
            bag: player
                .bag()
                .map(|(name, count)| (name.to_string(), count))
                .collect(),
            equipment: entity
                .equipped()
                .map(|(slot, item)| EquippedItem {
                    slot: slot.to_string(),
                    item: item.name().to_string(),
                    atk: item.atk(),
                    def: item.def(),
                })
                .collect(),
        }
    }

    /// Rebuilds the player under `id`. Equipment whose definition no longer
    /// exists is dropped with a warning; equipment whose saved slot is taken
    /// moves to the first free slot that accepts it.
    pub fn restore(&self, id: EntityId, defs: &DefDatabase) -> Player {
        let mut player = Player::new(id, ZoneId::new(self.zone.clone()), self.name.clone());
        let entity = player.entity_mut();
        entity.set_level(self.level);
        entity.set_base_hp(self.base_hp);
        entity.set_hp(self.hp);
        entity.set_atk(self.atk);
        entity.set_def(self.def);
        entity.set_xp(self.xp);

        for equipped in &self.equipment {
            let Some(template) = defs.item(&equipped.item) else {
                warn!(player = %self.name, item = %equipped.item, "saved_item_definition_missing");
                continue;
            };
            let mut item = template.instantiate();
            item.set_atk(equipped.atk);
            item.set_def(equipped.def);
            if entity.equip(&equipped.slot, item.clone()) {
                continue;
            }
            let fallback = entity.free_slot_for(&item).map(str::to_owned);
            if let Some(slot) = fallback.filter(|slot| entity.equip(slot, item)) {
                debug!(
                    player = %self.name,
                    item = %equipped.item,
                    from = %equipped.slot,
                    to = %slot,
                    "saved_item_moved_to_free_slot"
                );
            } else {
                warn!(
                    player = %self.name,
                    item = %equipped.item,
                    slot = %equipped.slot,
                    "saved_item_equip_failed"
                );
            }
        }

        player.set_karma(self.karma);
        *player.quests_mut() = self.quests.clone();
        for (name, count) in &self.bag {
            player.equip_stackable(name, *count);
        }
        player
    }
}

pub fn save_path(save_dir: &Path, name: &str) -> Result<PathBuf, PersistenceError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid {
        return Err(PersistenceError::InvalidName(name.to_string()));
    }
    Ok(save_dir.join(format!("{}.json", name.to_ascii_lowercase())))
}

pub fn save_player(save_dir: &Path, player: &Player) -> Result<PathBuf, PersistenceError> {
    let path = save_path(save_dir, player.name())?;
    let snapshot = PlayerSnapshot::capture(player);
    let text =
        serde_json::to_string_pretty(&snapshot).map_err(|source| PersistenceError::Serialize {
            name: snapshot.name.clone(),
            source,
        })?;
    write_text_atomic(&path, &text).map_err(|source| PersistenceError::Write {
        path: path.clone(),
        source,
    })?;
    info!(player = %snapshot.name, path = %path.display(), "player_saved");
    Ok(path)
}

/// Reads a save; `Ok(None)` when the character has never been saved.
pub fn load_player(
    save_dir: &Path,
    name: &str,
) -> Result<Option<PlayerSnapshot>, PersistenceError> {
    let path = save_path(save_dir, name)?;
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PersistenceError::Read { path, source }),
    };
    let snapshot: PlayerSnapshot =
        serde_json::from_str(&text).map_err(|source| PersistenceError::Parse {
            path: path.clone(),
            source,
        })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            path,
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(Some(snapshot))
}
