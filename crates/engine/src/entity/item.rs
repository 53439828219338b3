use serde::{Deserialize, Serialize};

/// Immutable item definition; equipped copies are created with [`ItemTemplate::instantiate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub name: String,
    pub class: String,
    pub possible_slots: Vec<String>,
    pub atk: i32,
    pub def: i32,
}

impl ItemTemplate {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            possible_slots: Vec::new(),
            atk: 0,
            def: 0,
        }
    }

    pub fn with_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_atk(mut self, atk: i32) -> Self {
        self.atk = atk;
        self
    }

    pub fn with_def(mut self, def: i32) -> Self {
        self.def = def;
        self
    }

    pub fn instantiate(&self) -> Item {
        Item {
            name: self.name.clone(),
            class: self.class.clone(),
            possible_slots: self.possible_slots.clone(),
            atk: self.atk,
            def: self.def,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    name: String,
    class: String,
    possible_slots: Vec<String>,
    atk: i32,
    def: i32,
}

impl Item {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn possible_slots(&self) -> &[String] {
        &self.possible_slots
    }

    pub fn fits_slot(&self, slot: &str) -> bool {
        self.possible_slots.iter().any(|candidate| candidate == slot)
    }

    pub fn atk(&self) -> i32 {
        self.atk
    }

    pub fn def(&self) -> i32 {
        self.def
    }

    pub fn set_atk(&mut self, atk: i32) {
        self.atk = atk;
    }

    pub fn set_def(&mut self, def: i32) {
        self.def = def;
    }
}
