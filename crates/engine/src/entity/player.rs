use std::collections::BTreeMap;

use super::delta::{Attribute, AttributeValue, EntityDelta};
use super::quest::QuestLog;
use super::rp_entity::RpEntity;
use super::{EntityId, ZoneId};

pub const PLAYER_SLOTS: [&str; 8] = [
    "head", "armor", "lhand", "rhand", "legs", "feet", "finger", "cloak",
];

#[derive(Debug, Clone)]
pub struct Player {
    entity: RpEntity,
    karma: f64,
    quests: QuestLog,
    bag: BTreeMap<String, u32>,
}

impl Player {
    pub fn new(id: EntityId, zone: ZoneId, name: impl Into<String>) -> Self {
        Self::from_entity(RpEntity::new(id, zone, name).with_slots(PLAYER_SLOTS))
    }

    pub fn from_entity(entity: RpEntity) -> Self {
        Self {
            entity,
            karma: 0.0,
            quests: QuestLog::default(),
            bag: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn entity(&self) -> &RpEntity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut RpEntity {
        &mut self.entity
    }

    pub fn karma(&self) -> f64 {
        self.karma
    }

    pub fn set_karma(&mut self, karma: f64) {
        self.karma = karma;
        self.entity.mark_dirty(Attribute::Karma);
    }

    pub fn add_karma(&mut self, amount: f64) {
        self.set_karma(self.karma + amount);
    }

    pub fn quests(&self) -> &QuestLog {
        &self.quests
    }

    pub fn quests_mut(&mut self) -> &mut QuestLog {
        &mut self.quests
    }

    pub fn equip_stackable(&mut self, name: &str, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let count = self.bag.entry(name.to_string()).or_insert(0);
        *count = count.saturating_add(quantity);
    }

    /// Removes `quantity` from the bag; fails without change when fewer are carried.
    pub fn drop_stackable(&mut self, name: &str, quantity: u32) -> bool {
        let Some(count) = self.bag.get_mut(name) else {
            return quantity == 0;
        };
        if *count < quantity {
            return false;
        }
        *count -= quantity;
        if *count == 0 {
            self.bag.remove(name);
        }
        true
    }

    /// Removes `quantity` of `name`, emptying the bag before equipped slots.
    /// Nothing is removed unless the full quantity is carried.
    pub fn drop_carried(&mut self, name: &str, quantity: u32) -> bool {
        if self.number_of_equipped(name) < quantity {
            return false;
        }
        let from_bag = self.bag.get(name).copied().unwrap_or(0).min(quantity);
        if !self.drop_stackable(name, from_bag) {
            return false;
        }
        (from_bag..quantity).all(|_| self.entity.take_equipped(name).is_some())
    }

    /// Carried quantity of `name`, counting the bag and equipped slots.
    pub fn number_of_equipped(&self, name: &str) -> u32 {
        self.bag
            .get(name)
            .copied()
            .unwrap_or(0)
            .saturating_add(self.entity.count_equipped(name))
    }

    pub fn bag(&self) -> impl Iterator<Item = (&str, u32)> {
        self.bag.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn take_delta(&mut self) -> EntityDelta {
        let karma = self.karma;
        self.entity.take_delta_with(|attribute| match attribute {
            Attribute::Karma => Some(AttributeValue::Float(karma)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ItemTemplate;

    fn player() -> Player {
        Player::new(EntityId(7), ZoneId::new("int_semos_town_hall"), "tester")
    }

    #[test]
    fn stackables_add_and_drop() {
        let mut player = player();
        player.equip_stackable("money", 20);
        player.equip_stackable("money", 5);
        assert_eq!(player.number_of_equipped("money"), 25);
        assert!(!player.drop_stackable("money", 30));
        assert_eq!(player.number_of_equipped("money"), 25);
        assert!(player.drop_stackable("money", 25));
        assert_eq!(player.bag().count(), 0);
    }

    #[test]
    fn equipped_items_count_toward_carried_total() {
        let mut player = player();
        let dagger = ItemTemplate::new("soul dagger", "sword").with_slots(["rhand"]);
        assert!(player.entity_mut().equip("rhand", dagger.instantiate()));
        player.equip_stackable("soul dagger", 1);
        assert_eq!(player.number_of_equipped("soul dagger"), 2);
    }

    #[test]
    fn dropping_empties_bag_before_equipped_slots() {
        let mut player = player();
        let club = ItemTemplate::new("club", "club")
            .with_slots(["rhand", "lhand"])
            .with_atk(10);
        assert!(player.entity_mut().equip("rhand", club.instantiate()));
        assert!(player.entity_mut().equip("lhand", club.instantiate()));
        player.equip_stackable("club", 1);

        assert!(!player.drop_carried("club", 4));
        assert_eq!(player.number_of_equipped("club"), 3);

        assert!(player.drop_carried("club", 2));
        assert_eq!(player.bag().count(), 0);
        assert_eq!(player.entity().count_equipped("club"), 1);
        assert_eq!(player.entity().item_atk(), 10);
    }

    #[test]
    fn karma_change_appears_in_delta() {
        let mut player = player();
        player.take_delta();
        player.add_karma(5.0);
        let delta = player.take_delta();
        assert_eq!(
            delta.value_of(Attribute::Karma),
            Some(AttributeValue::Float(5.0))
        );
    }
}
