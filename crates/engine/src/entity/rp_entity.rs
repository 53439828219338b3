use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::delta::{Attribute, AttributeChange, AttributeValue, EntityDelta};
use super::item::Item;
use super::{DamageType, EntityId, ZoneId};

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    capacity: usize,
    items: Vec<Item>,
}

impl Slot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::with_capacity(1)
    }
}

/// Stats shared by every combat-capable object: players, creatures and NPCs.
///
/// Every setter records the attribute it touched; [`RpEntity::take_delta`]
/// reports those attributes once and forgets them.
#[derive(Debug, Clone)]
pub struct RpEntity {
    id: EntityId,
    zone: ZoneId,
    name: String,
    level: u32,
    base_hp: u32,
    hp: u32,
    atk: u32,
    def: u32,
    xp: i64,
    damage_type: DamageType,
    susceptibilities: BTreeMap<DamageType, f64>,
    slots: BTreeMap<String, Slot>,
    item_atk: i32,
    item_def: i32,
    dirty: BTreeSet<Attribute>,
}

impl RpEntity {
    pub fn new(id: EntityId, zone: ZoneId, name: impl Into<String>) -> Self {
        Self {
            id,
            zone,
            name: name.into(),
            level: 0,
            base_hp: 0,
            hp: 0,
            atk: 0,
            def: 0,
            xp: 0,
            damage_type: DamageType::default(),
            susceptibilities: BTreeMap::new(),
            slots: BTreeMap::new(),
            item_atk: 0,
            item_def: 0,
            dirty: BTreeSet::new(),
        }
    }

    /// Adds one capacity-1 slot per name; existing slots are kept.
    pub fn with_slots<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.add_slot(name, 1);
        }
        self
    }

    pub fn add_slot(&mut self, name: &str, capacity: usize) {
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| Slot::with_capacity(capacity.max(1)));
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    pub fn set_zone(&mut self, zone: ZoneId) {
        self.zone = zone;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level;
        self.dirty.insert(Attribute::Level);
    }

    pub fn base_hp(&self) -> u32 {
        self.base_hp
    }

    /// Lowers current HP when it would exceed the new maximum.
    pub fn set_base_hp(&mut self, base_hp: u32) {
        self.base_hp = base_hp;
        self.dirty.insert(Attribute::BaseHp);
        if self.hp > base_hp {
            self.set_hp(base_hp);
        }
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn set_hp(&mut self, hp: u32) {
        self.hp = hp.min(self.base_hp);
        self.dirty.insert(Attribute::Hp);
    }

    pub fn heal(&mut self) {
        self.set_hp(self.base_hp);
    }

    /// Subtracts `amount` from HP, stopping at zero. Returns the HP actually lost.
    pub fn damage(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.hp);
        if lost > 0 {
            self.set_hp(self.hp - lost);
        }
        lost
    }

    pub fn is_dead(&self) -> bool {
        self.hp == 0
    }

    pub fn atk(&self) -> u32 {
        self.atk
    }

    pub fn set_atk(&mut self, atk: u32) {
        self.atk = atk;
        self.dirty.insert(Attribute::Atk);
    }

    pub fn def(&self) -> u32 {
        self.def
    }

    pub fn set_def(&mut self, def: u32) {
        self.def = def;
        self.dirty.insert(Attribute::Def);
    }

    pub fn xp(&self) -> i64 {
        self.xp
    }

    pub fn set_xp(&mut self, xp: i64) {
        self.xp = xp;
        self.dirty.insert(Attribute::Xp);
    }

    pub fn add_xp(&mut self, amount: i64) {
        self.set_xp(self.xp.saturating_add(amount));
    }

    pub fn damage_type(&self) -> DamageType {
        self.damage_type
    }

    pub fn set_damage_type(&mut self, damage_type: DamageType) {
        self.damage_type = damage_type;
    }

    /// Damage multiplier for incoming damage of `kind`; 1.0 unless configured.
    pub fn susceptibility(&self, kind: DamageType) -> f64 {
        self.susceptibilities.get(&kind).copied().unwrap_or(1.0)
    }

    pub fn set_susceptibility(&mut self, kind: DamageType, factor: f64) {
        self.susceptibilities.insert(kind, factor.max(0.0));
    }

    pub fn item_atk(&self) -> i32 {
        self.item_atk
    }

    pub fn item_def(&self) -> i32 {
        self.item_def
    }

    pub fn effective_atk(&self) -> i64 {
        (i64::from(self.atk) + i64::from(self.item_atk)).max(0)
    }

    pub fn effective_def(&self) -> i64 {
        (i64::from(self.def) + i64::from(self.item_def)).max(0)
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Places `item` into `slot_name`. Returns false without touching any state
    /// when the slot is missing, full, or not among the item's possible slots.
    pub fn equip(&mut self, slot_name: &str, item: Item) -> bool {
        if !item.fits_slot(slot_name) {
            debug!(
                entity = %self.id,
                item = item.name(),
                slot = slot_name,
                "equip_rejected_slot_not_allowed"
            );
            return false;
        }
        let Some(slot) = self.slots.get_mut(slot_name) else {
            debug!(entity = %self.id, slot = slot_name, "equip_rejected_missing_slot");
            return false;
        };
        if slot.is_full() {
            debug!(entity = %self.id, slot = slot_name, "equip_rejected_slot_full");
            return false;
        }
        slot.items.push(item);
        self.recompute_item_bonus();
        true
    }

    /// First slot the entity has that is free and allowed for `item`.
    pub fn free_slot_for<'a>(&self, item: &'a Item) -> Option<&'a str> {
        item.possible_slots()
            .iter()
            .map(String::as_str)
            .find(|name| self.slots.get(*name).is_some_and(|slot| !slot.is_full()))
    }

    /// Removes the most recently equipped item of `slot_name`.
    pub fn unequip(&mut self, slot_name: &str) -> Option<Item> {
        let item = self.slots.get_mut(slot_name)?.items.pop()?;
        self.recompute_item_bonus();
        Some(item)
    }

    /// Unequips one item called `item_name` from whichever slot holds it.
    pub fn take_equipped(&mut self, item_name: &str) -> Option<Item> {
        let item = self.slots.values_mut().find_map(|slot| {
            let index = slot.items.iter().rposition(|item| item.name() == item_name)?;
            Some(slot.items.remove(index))
        })?;
        self.recompute_item_bonus();
        Some(item)
    }

    /// Edits the most recently equipped item of `slot_name` in place.
    pub fn modify_equipped(&mut self, slot_name: &str, edit: impl FnOnce(&mut Item)) -> bool {
        let Some(item) = self
            .slots
            .get_mut(slot_name)
            .and_then(|slot| slot.items.last_mut())
        else {
            return false;
        };
        edit(item);
        self.recompute_item_bonus();
        true
    }

    pub fn equipped(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.slots
            .iter()
            .flat_map(|(name, slot)| slot.items.iter().map(move |item| (name.as_str(), item)))
    }

    pub fn count_equipped(&self, item_name: &str) -> u32 {
        self.equipped()
            .filter(|(_, item)| item.name() == item_name)
            .count() as u32
    }

    fn recompute_item_bonus(&mut self) {
        let (atk, def) = self
            .equipped()
            .fold((0i32, 0i32), |(atk, def), (_, item)| {
                (atk.saturating_add(item.atk()), def.saturating_add(item.def()))
            });
        if atk != self.item_atk {
            self.item_atk = atk;
            self.dirty.insert(Attribute::ItemAtk);
        }
        if def != self.item_def {
            self.item_def = def;
            self.dirty.insert(Attribute::ItemDef);
        }
    }

    pub(crate) fn mark_dirty(&mut self, attribute: Attribute) {
        self.dirty.insert(attribute);
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Value of an attribute this entity owns; `None` for player-only attributes.
    pub fn attribute_value(&self, attribute: Attribute) -> Option<AttributeValue> {
        let value = match attribute {
            Attribute::Hp => i64::from(self.hp),
            Attribute::BaseHp => i64::from(self.base_hp),
            Attribute::Level => i64::from(self.level),
            Attribute::Atk => i64::from(self.atk),
            Attribute::Def => i64::from(self.def),
            Attribute::Xp => self.xp,
            Attribute::ItemAtk => i64::from(self.item_atk),
            Attribute::ItemDef => i64::from(self.item_def),
            Attribute::Karma => return None,
        };
        Some(AttributeValue::Int(value))
    }

    pub fn take_delta(&mut self) -> EntityDelta {
        self.take_delta_with(|_| None)
    }

    pub(crate) fn take_delta_with(
        &mut self,
        extra: impl Fn(Attribute) -> Option<AttributeValue>,
    ) -> EntityDelta {
        let dirty = std::mem::take(&mut self.dirty);
        let changes = dirty
            .into_iter()
            .filter_map(|attribute| {
                self.attribute_value(attribute)
                    .or_else(|| extra(attribute))
                    .map(|value| AttributeChange { attribute, value })
            })
            .collect();
        EntityDelta {
            id: self.id,
            zone: self.zone.clone(),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::entity::ItemTemplate;

    fn fighter() -> RpEntity {
        let mut entity = RpEntity::new(EntityId(1), ZoneId::new("test_zone"), "fighter")
            .with_slots(["rhand", "lhand", "head"]);
        entity.set_base_hp(100);
        entity.heal();
        entity
    }

    fn club() -> ItemTemplate {
        ItemTemplate::new("club", "club")
            .with_slots(["rhand", "lhand"])
            .with_atk(10)
    }

    #[test]
    fn equip_rejects_slot_outside_possible_set() {
        let mut entity = fighter();
        assert!(!entity.equip("head", club().instantiate()));
        assert!(entity.slot("head").expect("head").is_empty());
        assert_eq!(entity.item_atk(), 0);
    }

    #[test]
    fn equip_rejects_missing_and_full_slots() {
        let mut entity = fighter();
        let dagger = ItemTemplate::new("dagger", "sword").with_slots(["rhand", "belt"]);
        assert!(!entity.equip("belt", dagger.instantiate()));
        assert!(entity.equip("rhand", club().instantiate()));
        assert!(!entity.equip("rhand", dagger.instantiate()));
        assert_eq!(entity.slot("rhand").expect("rhand").items().len(), 1);
        assert_eq!(entity.item_atk(), 10);
    }

    #[test]
    fn item_bonus_tracks_equip_unequip_and_edits() {
        let mut entity = fighter();
        let shield = ItemTemplate::new("shield", "shield")
            .with_slots(["lhand"])
            .with_def(7);
        let helmet = ItemTemplate::new("helmet", "helmet")
            .with_slots(["head"])
            .with_def(2)
            .with_atk(-1);

        assert!(entity.equip("rhand", club().instantiate()));
        assert!(entity.equip("lhand", shield.instantiate()));
        assert!(entity.equip("head", helmet.instantiate()));
        assert_eq!((entity.item_atk(), entity.item_def()), (9, 9));

        assert!(entity.modify_equipped("rhand", |item| item.set_atk(15)));
        assert_eq!(entity.item_atk(), 14);

        let removed = entity.unequip("lhand").expect("shield");
        assert_eq!(removed.name(), "shield");
        assert_eq!((entity.item_atk(), entity.item_def()), (14, 2));
        assert_eq!(entity.effective_atk(), 14);

        assert!(entity.unequip("lhand").is_none());
        assert!(!entity.modify_equipped("lhand", |item| item.set_def(1)));
    }

    #[test]
    fn hp_saturates_between_zero_and_base() {
        let mut entity = fighter();
        assert_eq!(entity.damage(30), 30);
        assert_eq!(entity.hp(), 70);
        assert_eq!(entity.damage(500), 70);
        assert!(entity.is_dead());
        entity.set_hp(1_000);
        assert_eq!(entity.hp(), 100);
        entity.set_base_hp(40);
        assert_eq!(entity.hp(), 40);
    }

    #[test]
    fn free_slot_prefers_declared_order() {
        let mut entity = fighter();
        let item = club().instantiate();
        assert_eq!(entity.free_slot_for(&item), Some("rhand"));
        assert!(entity.equip("rhand", item.clone()));
        assert_eq!(entity.free_slot_for(&item), Some("lhand"));
    }

    #[test]
    fn item_bonus_matches_gear_after_random_edits() {
        let mut rng = StdRng::seed_from_u64(41);
        let mut entity = fighter();
        let gear = [
            club(),
            ItemTemplate::new("buckler", "shield")
                .with_slots(["lhand"])
                .with_def(4),
            ItemTemplate::new("cap", "helmet")
                .with_slots(["head"])
                .with_def(1),
        ];
        let slots = ["rhand", "lhand", "head"];

        for _ in 0..500 {
            let slot = slots[rng.gen_range(0..slots.len())];
            match rng.gen_range(0..4) {
                0 => {
                    let template = &gear[rng.gen_range(0..gear.len())];
                    entity.equip(slot, template.instantiate());
                }
                1 => {
                    entity.unequip(slot);
                }
                2 => {
                    let atk = rng.gen_range(-5..20);
                    let def = rng.gen_range(-5..20);
                    entity.modify_equipped(slot, |item| {
                        item.set_atk(atk);
                        item.set_def(def);
                    });
                }
                _ => {
                    entity.take_equipped("club");
                }
            }

            let (atk, def) = entity
                .equipped()
                .fold((0, 0), |(atk, def), (_, item)| (atk + item.atk(), def + item.def()));
            assert_eq!(entity.item_atk(), atk);
            assert_eq!(entity.item_def(), def);
        }
    }

    #[test]
    fn take_delta_reports_each_change_once() {
        let mut entity = fighter();
        entity.take_delta();

        entity.damage(5);
        entity.set_level(3);
        assert!(entity.equip("rhand", club().instantiate()));
        let delta = entity.take_delta();
        let attributes = delta
            .changes
            .iter()
            .map(|change| change.attribute)
            .collect::<Vec<_>>();
        assert_eq!(
            attributes,
            vec![Attribute::Hp, Attribute::Level, Attribute::ItemAtk]
        );
        assert_eq!(delta.value_of(Attribute::Hp), Some(AttributeValue::Int(95)));
        assert!(entity.take_delta().is_empty());
    }
}
