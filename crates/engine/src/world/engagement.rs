use tracing::{debug, info};

use super::World;
use crate::combat::resolve_turn;
use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatEvent {
    Exchange {
        player: EntityId,
        creature: EntityId,
        dealt: u32,
        received: u32,
    },
    CreatureKilled {
        player: EntityId,
        creature: EntityId,
        xp: u32,
    },
    PlayerDefeated {
        player: EntityId,
        creature: EntityId,
    },
}

impl World {
    /// Pairs a player with a creature; each later turn runs one exchange
    /// between them until either side falls. Returns false when either id is unknown.
    pub fn engage(&mut self, player: EntityId, creature: EntityId) -> bool {
        if !self.players.contains_key(&player) || !self.creatures.contains_key(&creature) {
            return false;
        }
        debug!(player = %player, creature = %creature, "combat_engaged");
        self.engagements.insert(player, creature);
        true
    }

    pub fn disengage(&mut self, player: EntityId) -> bool {
        self.engagements.remove(&player).is_some()
    }

    pub fn engaged_with(&self, player: EntityId) -> Option<EntityId> {
        self.engagements.get(&player).copied()
    }

    pub(super) fn resolve_engagements(&mut self) -> Vec<CombatEvent> {
        let pairs: Vec<(EntityId, EntityId)> = self
            .engagements
            .iter()
            .map(|(player, creature)| (*player, *creature))
            .collect();
        let mut events = Vec::new();

        for (player_id, creature_id) in pairs {
            let (Some(player), Some(creature)) = (
                self.players.get_mut(&player_id),
                self.creatures.get_mut(&creature_id),
            ) else {
                self.engagements.remove(&player_id);
                continue;
            };

            let (dealt, received) = resolve_turn(
                player.entity_mut(),
                creature.entity_mut(),
                self.formula.as_ref(),
                &mut self.rng,
            );
            events.push(CombatEvent::Exchange {
                player: player_id,
                creature: creature_id,
                dealt,
                received,
            });

            if creature.entity().is_dead() {
                let xp = creature.xp_reward();
                player.entity_mut().add_xp(i64::from(xp));
                info!(player = %player_id, creature = %creature_id, xp, "creature_killed");
                self.creatures.remove(&creature_id);
                self.engagements.retain(|_, target| *target != creature_id);
                events.push(CombatEvent::CreatureKilled {
                    player: player_id,
                    creature: creature_id,
                    xp,
                });
            }
            if player.entity().is_dead() {
                info!(player = %player_id, creature = %creature_id, "player_defeated");
                player.entity_mut().heal();
                self.engagements.remove(&player_id);
                events.push(CombatEvent::PlayerDefeated {
                    player: player_id,
                    creature: creature_id,
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::{CombatSnapshot, DamageFormula};
    use crate::content::{CreatureTemplate, DefDatabase};
    use crate::entity::{DamageType, ZoneId};
    use crate::scripting::ScriptEnvironment;
    use rand::RngCore;

    fn world_with_rat(formula: Box<dyn DamageFormula>) -> (World, EntityId, EntityId) {
        let defs = DefDatabase::from_defs(
            Vec::new(),
            vec![CreatureTemplate {
                def_name: "rat".to_string(),
                level: 0,
                hp: 10,
                atk: 2,
                def: 2,
                xp: 7,
                damage_type: DamageType::Cut,
                slots: Vec::new(),
            }],
        );
        let mut world = World::new(defs).with_rng_seed(3).with_formula(formula);
        let player = world.spawn_player("fighter", ZoneId::new("semos"));
        let rat = world
            .spawn_creature("rat", ZoneId::new("semos"))
            .expect("rat spawns");
        (world, player, rat)
    }

    #[test]
    fn killing_a_creature_awards_xp_and_ends_engagement() {
        let (mut world, player, rat) = world_with_rat(Box::new(FixedDamage(4)));
        let mut scripts = ScriptEnvironment::new();
        assert!(world.engage(player, rat));

        let mut killed = false;
        for _ in 0..5 {
            let report = world.advance_turn(&mut scripts);
            if report
                .combat
                .iter()
                .any(|event| matches!(event, CombatEvent::CreatureKilled { xp: 7, .. }))
            {
                killed = true;
                break;
            }
        }
        assert!(killed);
        assert!(world.creature(rat).is_none());
        assert_eq!(world.engaged_with(player), None);
        assert_eq!(world.player(player).map(|p| p.entity().xp()), Some(7));
    }

    #[test]
    fn mutual_kill_still_revives_the_player() {
        let (mut world, player, rat) = world_with_rat(Box::new(FixedDamage(10_000)));
        let mut scripts = ScriptEnvironment::new();
        assert!(world.engage(player, rat));

        let report = world.advance_turn(&mut scripts);
        assert!(report
            .combat
            .iter()
            .any(|event| matches!(event, CombatEvent::CreatureKilled { xp: 7, .. })));
        assert!(report
            .combat
            .iter()
            .any(|event| matches!(event, CombatEvent::PlayerDefeated { .. })));
        let entity = world.player(player).expect("player").entity();
        assert!(!entity.is_dead());
        assert_eq!(entity.hp(), entity.base_hp());
        assert_eq!(entity.xp(), 7);
        assert_eq!(world.engaged_with(player), None);
    }

    #[test]
    fn engage_rejects_unknown_ids() {
        let (mut world, player, _) = world_with_rat(Box::new(FixedDamage(1)));
        assert!(!world.engage(player, EntityId(999)));
        assert!(!world.engage(EntityId(999), player));
    }

    struct FixedDamage(u32);

    impl DamageFormula for FixedDamage {
        fn damage(&self, _: &CombatSnapshot, _: &CombatSnapshot, _: &mut dyn RngCore) -> u32 {
            self.0
        }
    }
}
