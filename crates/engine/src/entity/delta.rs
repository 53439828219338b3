use serde::{Deserialize, Serialize};

use super::{EntityId, ZoneId};

/// Replicated attributes, in the order deltas list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Hp,
    BaseHp,
    Level,
    Atk,
    Def,
    Xp,
    Karma,
    ItemAtk,
    ItemDef,
}

impl Attribute {
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Hp => "hp",
            Attribute::BaseHp => "base_hp",
            Attribute::Level => "level",
            Attribute::Atk => "atk",
            Attribute::Def => "def",
            Attribute::Xp => "xp",
            Attribute::Karma => "karma",
            Attribute::ItemAtk => "item_atk",
            Attribute::ItemDef => "item_def",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub attribute: Attribute,
    pub value: AttributeValue,
}

/// Changed attributes of one object since the previous delta was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    pub id: EntityId,
    pub zone: ZoneId,
    pub changes: Vec<AttributeChange>,
}

impl EntityDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn value_of(&self, attribute: Attribute) -> Option<AttributeValue> {
        self.changes
            .iter()
            .find(|change| change.attribute == attribute)
            .map(|change| change.value)
    }
}
