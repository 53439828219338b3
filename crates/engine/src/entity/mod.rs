mod creature;
mod delta;
mod item;
mod player;
mod quest;
mod rp_entity;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use creature::Creature;
pub use delta::{Attribute, AttributeChange, AttributeValue, EntityDelta};
pub use item::{Item, ItemTemplate};
pub use player::{Player, PLAYER_SLOTS};
pub use quest::QuestLog;
pub use rp_entity::{RpEntity, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Cut,
    Fire,
    Ice,
    Light,
    Dark,
}

impl DamageType {
    pub const ALL: [DamageType; 5] = [
        DamageType::Cut,
        DamageType::Fire,
        DamageType::Ice,
        DamageType::Light,
        DamageType::Dark,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DamageType::Cut => "cut",
            DamageType::Fire => "fire",
            DamageType::Ice => "ice",
            DamageType::Light => "light",
            DamageType::Dark => "dark",
        }
    }
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DamageType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                format!("unknown damage type '{value}'; allowed values: cut, fire, ice, light, dark")
            })
    }
}
