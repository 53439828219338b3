use super::rp_entity::RpEntity;
use super::EntityId;

#[derive(Debug, Clone)]
pub struct Creature {
    entity: RpEntity,
    def_name: String,
    xp_reward: u32,
}

impl Creature {
    pub fn new(entity: RpEntity, def_name: impl Into<String>, xp_reward: u32) -> Self {
        Self {
            entity,
            def_name: def_name.into(),
            xp_reward,
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    pub fn xp_reward(&self) -> u32 {
        self.xp_reward
    }

    pub fn entity(&self) -> &RpEntity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut RpEntity {
        &mut self.entity
    }
}
