//! Entity store: owns every entity's transform, type and name, and decides whether an
//! entity id is alive.
//!
//! Entities live in a generational arena. The public [`EntityId`] is a stable integer
//! that goes over the wire; it is mapped to an arena [`SlotKey`] whose generation is
//! bumped whenever the slot is released, so a stale key can never reach a newer
//! occupant of the same slot.

use super::EcsError;
use shared::Vec3;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an entity for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(EntityId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Npc,
    StaticObject,
}

/// Component kinds an entity can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Stats,
    Player,
    Skill,
    Ai,
    Inventory,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Stats,
        ComponentKind::Player,
        ComponentKind::Skill,
        ComponentKind::Ai,
        ComponentKind::Inventory,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Stats => "stats",
            ComponentKind::Player => "player",
            ComponentKind::Skill => "skill",
            ComponentKind::Ai => "ai",
            ComponentKind::Inventory => "inventory",
        };
        f.write_str(name)
    }
}

/// Which component tables hold a slot for an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentMask(u8);

impl ComponentMask {
    pub const fn has(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn add(&mut self, kind: ComponentKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: ComponentKind) {
        self.0 &= !kind.bit();
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL.into_iter().filter(move |k| self.has(*k))
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub speed: f32,
    pub movement: Vec3,
    pub is_static: bool,
    pub name: String,
    pub model_id: u32,
    pub texture_id: u32,
    pub components: ComponentMask,
}

/// Everything needed to create an entity. Optional parts default to a dynamic entity
/// with a store-assigned id.
#[derive(Debug, Clone)]
pub struct EntityDesc {
    pub kind: EntityKind,
    pub name: String,
    pub position: Vec3,
    pub scale: Vec3,
    pub speed: f32,
    pub explicit_id: Option<EntityId>,
    pub is_static: bool,
    pub model_id: u32,
    pub texture_id: u32,
}

impl EntityDesc {
    pub fn new(kind: EntityKind, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            kind,
            name: name.into(),
            position,
            scale: Vec3::new(1.0, 1.0, 1.0),
            speed: 0.0,
            explicit_id: None,
            is_static: kind == EntityKind::StaticObject,
            model_id: 0,
            texture_id: 0,
        }
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.explicit_id = Some(id);
        self
    }

    pub fn static_object(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn appearance(mut self, model_id: u32, texture_id: u32) -> Self {
        self.model_id = model_id;
        self.texture_id = texture_id;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

#[derive(Debug)]
pub struct EntityStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    index: HashMap<EntityId, SlotKey>,
    /// Live ids in creation order.
    order: Vec<EntityId>,
    next_id: u32,
    capacity: usize,
}

impl EntityStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn create(&mut self, desc: EntityDesc) -> Result<EntityId, EcsError> {
        if self.index.len() >= self.capacity {
            return Err(EcsError::CapacityExceeded(self.capacity));
        }

        let id = match desc.explicit_id {
            Some(id) if self.index.contains_key(&id) => return Err(EcsError::IdInUse(id)),
            Some(id) => id,
            None => self.allocate_id(),
        };

        let entity = Entity {
            id,
            kind: desc.kind,
            position: desc.position,
            scale: desc.scale,
            speed: desc.speed,
            movement: Vec3::ZERO,
            is_static: desc.is_static,
            name: desc.name,
            model_id: desc.model_id,
            texture_id: desc.texture_id,
            components: ComponentMask::default(),
        };

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(entity);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                SlotKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.index.insert(id, key);
        self.order.push(id);
        Ok(id)
    }

    /// Store-assigned ids only ever grow, skipping ids claimed explicitly.
    fn allocate_id(&mut self) -> EntityId {
        while self.index.contains_key(&EntityId(self.next_id)) {
            self.next_id += 1;
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Releases the entity's slot. Component slots are not touched here; callers go
    /// through [`super::World::delete`] which releases them first.
    pub(super) fn remove(&mut self, id: EntityId) -> Result<Entity, EcsError> {
        let key = self.index.remove(&id).ok_or(EcsError::EntityNotFound(id))?;
        let slot = &mut self.slots[key.index as usize];
        let entity = slot.entity.take().ok_or(EcsError::EntityNotFound(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.order.retain(|other| *other != id);
        Ok(entity)
    }

    pub fn slot_key(&self, id: EntityId) -> Option<SlotKey> {
        self.index.get(&id).copied()
    }

    /// Resolves an arena key, failing for keys whose slot has since been reused.
    pub fn resolve(&self, key: SlotKey) -> Option<&Entity> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity, EcsError> {
        self.slot_key(id)
            .and_then(|key| self.resolve(key))
            .ok_or(EcsError::EntityNotFound(id))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity, EcsError> {
        let key = self.slot_key(id).ok_or(EcsError::EntityNotFound(id))?;
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entity.as_mut())
            .ok_or(EcsError::EntityNotFound(id))
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Live entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(|id| self.get(*id).ok())
    }

    /// Snapshot of live ids in creation order, for loops that mutate the store.
    pub fn ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
