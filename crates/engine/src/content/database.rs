use std::collections::HashMap;

use crate::entity::{Creature, DamageType, EntityId, ItemTemplate, RpEntity, ZoneId};

#[derive(Debug, Clone, PartialEq)]
pub struct CreatureTemplate {
    pub def_name: String,
    pub level: u32,
    pub hp: u32,
    pub atk: u32,
    pub def: u32,
    pub xp: u32,
    pub damage_type: DamageType,
    pub slots: Vec<String>,
}

impl CreatureTemplate {
    /// A full-health creature of this kind; slots are only those the definition declares.
    pub fn spawn(&self, id: EntityId, zone: ZoneId) -> Creature {
        let mut entity = RpEntity::new(id, zone, self.def_name.clone())
            .with_slots(self.slots.iter().map(String::as_str));
        entity.set_level(self.level);
        entity.set_base_hp(self.hp);
        entity.heal();
        entity.set_atk(self.atk);
        entity.set_def(self.def);
        entity.set_damage_type(self.damage_type);
        Creature::new(entity, self.def_name.clone(), self.xp)
    }
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    items: Vec<ItemTemplate>,
    item_index_by_name: HashMap<String, usize>,
    creatures: Vec<CreatureTemplate>,
    creature_index_by_name: HashMap<String, usize>,
}

impl DefDatabase {
    pub fn from_defs(items: Vec<ItemTemplate>, creatures: Vec<CreatureTemplate>) -> Self {
        let item_index_by_name = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.name.clone(), idx))
            .collect();
        let creature_index_by_name = creatures
            .iter()
            .enumerate()
            .map(|(idx, creature)| (creature.def_name.clone(), idx))
            .collect();
        Self {
            items,
            item_index_by_name,
            creatures,
            creature_index_by_name,
        }
    }

    pub fn item(&self, name: &str) -> Option<&ItemTemplate> {
        self.item_index_by_name
            .get(name)
            .and_then(|idx| self.items.get(*idx))
    }

    pub fn creature(&self, name: &str) -> Option<&CreatureTemplate> {
        self.creature_index_by_name
            .get(name)
            .and_then(|idx| self.creatures.get(*idx))
    }

    pub fn items(&self) -> &[ItemTemplate] {
        &self.items
    }

    pub fn creatures(&self) -> &[CreatureTemplate] {
        &self.creatures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_sets_stats_at_full_health() {
        let template = CreatureTemplate {
            def_name: "rat".to_string(),
            level: 2,
            hp: 20,
            atk: 6,
            def: 2,
            xp: 5,
            damage_type: DamageType::Cut,
            slots: Vec::new(),
        };
        let creature = template.spawn(EntityId(4), ZoneId::new("semos"));
        assert_eq!(creature.entity().hp(), 20);
        assert_eq!(creature.entity().level(), 2);
        assert_eq!(creature.xp_reward(), 5);
        assert_eq!(creature.entity().slot_names().count(), 0);
    }
}
