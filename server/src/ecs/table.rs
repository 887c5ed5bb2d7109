//! Dense component storage addressed by entity id through a sparse index.

use super::{ComponentKind, EcsError, EntityId};
use std::collections::HashMap;

#[derive(Debug)]
pub struct ComponentTable<T> {
    kind: ComponentKind,
    index: HashMap<EntityId, usize>,
    slots: Vec<(EntityId, T)>,
}

impl<T> ComponentTable<T> {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            index: HashMap::new(),
            slots: Vec::new(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Stores `value` for `id`, replacing any previous value in place.
    pub fn create_for(&mut self, id: EntityId, value: T) -> &mut T {
        let slot = match self.index.get(&id) {
            Some(&slot) => {
                self.slots[slot].1 = value;
                slot
            }
            None => {
                self.slots.push((id, value));
                let slot = self.slots.len() - 1;
                self.index.insert(id, slot);
                slot
            }
        };
        &mut self.slots[slot].1
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.index.get(&id).map(|&slot| &self.slots[slot].1)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        match self.index.get(&id) {
            Some(&slot) => Some(&mut self.slots[slot].1),
            None => None,
        }
    }

    pub fn get_by_id(&self, id: EntityId) -> Result<&T, EcsError> {
        self.get(id).ok_or(EcsError::ComponentNotFound {
            kind: self.kind,
            id,
        })
    }

    pub fn get_by_id_mut(&mut self, id: EntityId) -> Result<&mut T, EcsError> {
        let kind = self.kind;
        self.get_mut(id)
            .ok_or(EcsError::ComponentNotFound { kind, id })
    }

    /// Frees the slot owned by `id`. The last slot is moved into the hole.
    pub fn delete_for(&mut self, id: EntityId) -> Option<T> {
        let slot = self.index.remove(&id)?;
        let (_, value) = self.slots.swap_remove(slot);
        if let Some((moved, _)) = self.slots.get(slot) {
            self.index.insert(*moved, slot);
        }
        Some(value)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.slots.iter().map(|(id, value)| (*id, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.slots.iter_mut().map(|(id, value)| (*id, value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
