//! Live ability objects and the arena that owns them.
//!
//! Objects are addressed two ways: by [`ObjectKey`] (container + index, the
//! identity the physics layer reports back) and by [`ObjectHandle`]
//! (arena slot + generation). A handle kept past its object's removal no
//! longer resolves.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::AbilityId;
use crate::character::CharacterId;

pub type ContainerId = i32;
pub type ObjectId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub container_id: ContainerId,
    pub object_id: ObjectId,
}

impl ObjectKey {
    pub fn new(container_id: ContainerId, object_id: ObjectId) -> Self {
        Self {
            container_id,
            object_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

/// Lifecycle: Pending → Active → Destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    /// Being built by the spawn pipeline
    Pending,
    Active,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbilityObject {
    pub container_id: ContainerId,
    pub object_id: ObjectId,
    pub ability_id: AbilityId,
    pub caster: CharacterId,
    pub hit_count: i32,
    pub remaining_active_time: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub state: ObjectState,
}

impl AbilityObject {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.container_id, self.object_id)
    }

    pub fn is_active(&self) -> bool {
        self.state == ObjectState::Active
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    object: Option<AbilityObject>,
}

/// Arena of an ability's live objects, grouped by container
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_key: HashMap<ObjectKey, ObjectHandle>,
    /// container → live object count (0 while a spawn is still building it)
    containers: HashMap<ContainerId, usize>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_container(&self, container_id: ContainerId) -> bool {
        self.containers.contains_key(&container_id)
    }

    /// Claim a container ID. Returns false if it is already in use.
    pub fn reserve_container(&mut self, container_id: ContainerId) -> bool {
        if self.containers.contains_key(&container_id) {
            return false;
        }
        self.containers.insert(container_id, 0);
        true
    }

    /// Drop a reservation that never received objects
    pub fn release_container(&mut self, container_id: ContainerId) {
        if self.containers.get(&container_id) == Some(&0) {
            self.containers.remove(&container_id);
        }
    }

    /// Move an object into the table and mark it active
    pub fn insert(&mut self, mut object: AbilityObject) -> ObjectHandle {
        object.state = ObjectState::Active;
        let key = object.key();
        if let Some(existing) = self.by_key.get(&key).copied() {
            if let Some(slot) = self.slots.get_mut(existing.index as usize) {
                slot.object = Some(object);
            }
            return existing;
        }
        *self.containers.entry(key.container_id).or_insert(0) += 1;

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                ObjectHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjectHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.by_key.insert(key, handle);
        handle
    }

    pub fn get(&self, key: ObjectKey) -> Option<&AbilityObject> {
        let handle = self.by_key.get(&key)?;
        self.resolve(*handle)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut AbilityObject> {
        let handle = *self.by_key.get(&key)?;
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn resolve(&self, handle: ObjectHandle) -> Option<&AbilityObject> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    /// Remove an object. Removing an absent object is a no-op.
    ///
    /// The container disappears with its last object.
    pub fn remove(&mut self, key: ObjectKey) -> Option<AbilityObject> {
        let handle = self.by_key.remove(&key)?;
        let slot = self.slots.get_mut(handle.index as usize)?;
        let mut object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        if let Some(count) = self.containers.get_mut(&key.container_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.containers.remove(&key.container_id);
            }
        }
        object.state = ObjectState::Destroyed;
        Some(object)
    }

    /// Keys of all live objects, in slot order
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.iter().map(AbilityObject::key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityObject> {
        self.slots.iter().filter_map(|slot| slot.object.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AbilityObject> {
        self.slots.iter_mut().filter_map(|slot| slot.object.as_mut())
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn container_len(&self, container_id: ContainerId) -> usize {
        self.containers.get(&container_id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_key.clear();
        self.containers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(container_id: ContainerId, object_id: ObjectId) -> AbilityObject {
        AbilityObject {
            container_id,
            object_id,
            ability_id: 1,
            caster: 1,
            hit_count: 1,
            remaining_active_time: 2.0,
            position: Vec3::ZERO,
            velocity: Vec3::X,
            state: ObjectState::Pending,
        }
    }

    #[test]
    fn test_insert_activates_and_counts() {
        let mut table = ObjectTable::new();
        assert!(table.reserve_container(5));
        table.insert(object(5, 0));
        table.insert(object(5, 1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.container_len(5), 2);
        assert!(table.get(ObjectKey::new(5, 1)).unwrap().is_active());
    }

    #[test]
    fn test_reserve_rejects_duplicate() {
        let mut table = ObjectTable::new();
        assert!(table.reserve_container(5));
        assert!(!table.reserve_container(5));
        table.release_container(5);
        assert!(table.reserve_container(5));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut table = ObjectTable::new();
        table.insert(object(3, 0));
        let removed = table.remove(ObjectKey::new(3, 0)).unwrap();
        assert_eq!(removed.state, ObjectState::Destroyed);
        assert!(table.remove(ObjectKey::new(3, 0)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_container_drops_with_last_object() {
        let mut table = ObjectTable::new();
        table.insert(object(3, 0));
        table.insert(object(3, 1));
        table.remove(ObjectKey::new(3, 0));
        assert!(table.contains_container(3));
        table.remove(ObjectKey::new(3, 1));
        assert!(!table.contains_container(3));
        assert_eq!(table.container_count(), 0);
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut table = ObjectTable::new();
        let handle = table.insert(object(3, 0));
        table.remove(ObjectKey::new(3, 0));
        let reused = table.insert(object(4, 0));
        assert!(table.resolve(handle).is_none());
        assert_eq!(table.resolve(reused).unwrap().container_id, 4);
    }
}
