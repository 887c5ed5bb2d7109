//! Entity store and component tables.
//!
//! Every table shares the entity store's identity space: a component is keyed by the id
//! of the entity that owns it, the entity records which tables hold a slot for it, and
//! [`World::delete`] is the only place component slots are released on entity removal.

pub mod components;
pub mod entity;
pub mod table;

pub use components::{
    AiComponent, AiState, InventoryComponent, PlayerComponent, Skill, SkillComponent,
    StatsComponent,
};
pub use entity::{
    ComponentKind, ComponentMask, Entity, EntityDesc, EntityId, EntityKind, EntityStore, SlotKey,
};
pub use table::ComponentTable;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("entity {id} has no {kind} component")]
    ComponentNotFound { kind: ComponentKind, id: EntityId },

    #[error("entity id {0} is already in use")]
    IdInUse(EntityId),

    #[error("entity capacity of {0} exhausted")]
    CapacityExceeded(usize),
}

/// A type stored in one of the world's component tables.
pub trait Component: Sized {
    const KIND: ComponentKind;

    fn table(world: &World) -> &ComponentTable<Self>;
    fn table_mut(world: &mut World) -> &mut ComponentTable<Self>;
}

macro_rules! impl_component {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = $kind;

            fn table(world: &World) -> &ComponentTable<Self> {
                &world.$field
            }

            fn table_mut(world: &mut World) -> &mut ComponentTable<Self> {
                &mut world.$field
            }
        }
    };
}

impl_component!(StatsComponent, ComponentKind::Stats, stats);
impl_component!(PlayerComponent, ComponentKind::Player, players);
impl_component!(SkillComponent, ComponentKind::Skill, skills);
impl_component!(AiComponent, ComponentKind::Ai, ai);
impl_component!(InventoryComponent, ComponentKind::Inventory, inventories);

#[derive(Debug)]
pub struct World {
    pub entities: EntityStore,
    pub stats: ComponentTable<StatsComponent>,
    pub players: ComponentTable<PlayerComponent>,
    pub skills: ComponentTable<SkillComponent>,
    pub ai: ComponentTable<AiComponent>,
    pub inventories: ComponentTable<InventoryComponent>,
}

impl World {
    pub fn new(max_entities: usize) -> Self {
        Self {
            entities: EntityStore::new(max_entities),
            stats: ComponentTable::new(ComponentKind::Stats),
            players: ComponentTable::new(ComponentKind::Player),
            skills: ComponentTable::new(ComponentKind::Skill),
            ai: ComponentTable::new(ComponentKind::Ai),
            inventories: ComponentTable::new(ComponentKind::Inventory),
        }
    }

    pub fn spawn(&mut self, desc: EntityDesc) -> Result<EntityId, EcsError> {
        self.entities.create(desc)
    }

    /// Attaches (or replaces) a component and records the reference on the entity.
    pub fn attach<T: Component>(&mut self, id: EntityId, value: T) -> Result<&mut T, EcsError> {
        self.entities.get_mut(id)?.components.add(T::KIND);
        Ok(T::table_mut(self).create_for(id, value))
    }

    pub fn detach<T: Component>(&mut self, id: EntityId) -> Option<T> {
        if let Ok(entity) = self.entities.get_mut(id) {
            entity.components.remove(T::KIND);
        }
        T::table_mut(self).delete_for(id)
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Result<&T, EcsError> {
        T::table(self).get_by_id(id)
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T, EcsError> {
        T::table_mut(self).get_by_id_mut(id)
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.exists(id)
    }

    /// Removes an entity after releasing every component slot it references.
    pub fn delete(&mut self, id: EntityId) -> Result<Entity, EcsError> {
        let mask = self.entities.get(id)?.components;
        for kind in mask.kinds() {
            match kind {
                ComponentKind::Stats => {
                    self.stats.delete_for(id);
                }
                ComponentKind::Player => {
                    self.players.delete_for(id);
                }
                ComponentKind::Skill => {
                    self.skills.delete_for(id);
                }
                ComponentKind::Ai => {
                    self.ai.delete_for(id);
                }
                ComponentKind::Inventory => {
                    self.inventories.delete_for(id);
                }
            }
        }
        self.entities.remove(id)
    }

    /// True when any table still holds a slot for `id`.
    pub fn has_any_component(&self, id: EntityId) -> bool {
        self.stats.contains(id)
            || self.players.contains(id)
            || self.skills.contains(id)
            || self.ai.contains(id)
            || self.inventories.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vec3;

    fn world() -> World {
        World::new(100)
    }

    #[test]
    fn test_attach_records_reference() {
        let mut world = world();
        let id = world
            .spawn(EntityDesc::new(EntityKind::Npc, "Dummy", Vec3::ZERO))
            .unwrap();

        world.attach(id, StatsComponent::default()).unwrap().health = 42;

        let entity = world.entities.get(id).unwrap();
        assert!(entity.components.has(ComponentKind::Stats));
        assert!(!entity.components.has(ComponentKind::Ai));
        assert_eq!(world.get::<StatsComponent>(id).unwrap().health, 42);
    }

    #[test]
    fn test_attach_to_missing_entity_fails() {
        let mut world = world();
        let err = world
            .attach(EntityId(99), StatsComponent::default())
            .unwrap_err();
        assert_eq!(err, EcsError::EntityNotFound(EntityId(99)));
        assert!(world.stats.is_empty());
    }

    #[test]
    fn test_delete_cascades_to_every_table() {
        let mut world = world();
        let id = world
            .spawn(EntityDesc::new(EntityKind::Npc, "Dummy", Vec3::ZERO))
            .unwrap();
        let other = world
            .spawn(EntityDesc::new(EntityKind::Npc, "Other", Vec3::ZERO))
            .unwrap();

        world.attach(id, StatsComponent::default()).unwrap();
        world.attach(id, SkillComponent::default()).unwrap();
        world.attach(id, AiComponent::stationary(Vec3::ZERO)).unwrap();
        world.attach(id, InventoryComponent::default()).unwrap();
        world.attach(other, StatsComponent::default()).unwrap();

        world.delete(id).unwrap();

        assert!(!world.exists(id));
        assert!(!world.has_any_component(id));
        assert!(world.get::<StatsComponent>(other).is_ok());
        assert_eq!(world.stats.len(), 1);
    }

    #[test]
    fn test_detach_clears_reference() {
        let mut world = world();
        let id = world
            .spawn(EntityDesc::new(EntityKind::Npc, "Dummy", Vec3::ZERO))
            .unwrap();
        world.attach(id, AiComponent::stationary(Vec3::ZERO)).unwrap();

        assert!(world.detach::<AiComponent>(id).is_some());
        assert!(!world
            .entities
            .get(id)
            .unwrap()
            .components
            .has(ComponentKind::Ai));
        assert!(world.get::<AiComponent>(id).is_err());
    }

    #[test]
    fn test_delete_missing_entity() {
        let mut world = world();
        assert_eq!(
            world.delete(EntityId(5)).unwrap_err(),
            EcsError::EntityNotFound(EntityId(5))
        );
    }
}
