use std::any::Any;

use crate::component::{Component, ComponentTypeId, ControlBlock};
use crate::entity::EntityId;
use crate::pool::MemoryPool;

const DATA_CHUNK_SIZE: usize = crate::pool::DEFAULT_CHUNK_SIZE;

struct DataSlot<T> {
    value: T,
    /// Index of the control block that currently owns this payload slot.
    /// Read after a swap-remove to repair the moved owner's `data_index`.
    owner: u32,
}

impl<T: Default> Default for DataSlot<T> {
    fn default() -> Self {
        DataSlot {
            value: T::default(),
            owner: u32::MAX,
        }
    }
}

/// Per-type pool of component values plus one pinned [`ControlBlock`] per
/// slot. Control blocks live in their own arena and are never moved; the
/// data payload lives in a separate, relocatable arena addressed
/// indirectly through `ControlBlock::data_index`.
pub struct ComponentStorage<T> {
    type_id: ComponentTypeId,
    ctrl: Vec<ControlBlock>,
    ctrl_free: Vec<u32>,
    data: MemoryPool<DataSlot<T>>,
}

impl<T: Component> ComponentStorage<T> {
    pub fn new(type_id: ComponentTypeId) -> Self {
        ComponentStorage {
            type_id,
            ctrl: Vec::new(),
            ctrl_free: Vec::new(),
            data: MemoryPool::new(DATA_CHUNK_SIZE),
        }
    }

    fn release_slot(&mut self, ctrl_index: u32) {
        let data_index = self.ctrl[ctrl_index as usize].data_index;
        let moved = self.data.remove(data_index);
        if moved {
            let owner = self.data.get(data_index).owner;
            self.ctrl[owner as usize].data_index = data_index;
        }
        let ctrl = &mut self.ctrl[ctrl_index as usize];
        ctrl.ref_count = 0;
        ctrl.entity_id = EntityId::INVALID;
        self.ctrl_free.push(ctrl_index);
        log::trace!(
            "released component slot {ctrl_index} of type {:?}",
            self.type_id
        );
    }

    pub fn get_value(&self, ctrl_index: u32) -> &T {
        let data_index = self.ctrl[ctrl_index as usize].data_index;
        &self.data.get(data_index).value
    }

    pub fn get_value_mut(&mut self, ctrl_index: u32) -> &mut T {
        let data_index = self.ctrl[ctrl_index as usize].data_index;
        &mut self.data.get_mut(data_index).value
    }

    pub fn iter_ctrl_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.ctrl
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_valid())
            .map(|(i, _)| i as u32)
    }
}

/// Type-erased access to a [`ComponentStorage`], keyed by `type_id` in a
/// dense `Vec` held by [`crate::registry::Registry`] rather than a hash
/// table.
pub trait AnyComponentStorage: Any {
    fn component_type_id(&self) -> ComponentTypeId;
    /// Allocates a default-constructed slot and returns its control-block
    /// index with `ref_count` initialized to 1.
    fn create(&mut self) -> u32;
    fn get_ctrl(&self, ctrl_index: u32) -> &ControlBlock;
    fn incr_ref(&mut self, ctrl_index: u32);
    /// Returns `true` if the decrement released the slot (ref_count hit 0).
    fn decr_ref(&mut self, ctrl_index: u32) -> bool;
    fn set_entity(&mut self, ctrl_index: u32, entity_id: EntityId);
    fn clear_entity(&mut self, ctrl_index: u32);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn dump(&self) -> String;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyComponentStorage for ComponentStorage<T> {
    fn component_type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    fn create(&mut self) -> u32 {
        let (data_index, slot) = self.data.allocate();
        *slot = DataSlot::default();
        let ctrl_index = match self.ctrl_free.pop() {
            Some(free) => free,
            None => {
                self.ctrl.push(ControlBlock {
                    type_id: self.type_id,
                    data_index: 0,
                    entity_id: EntityId::INVALID,
                    ref_count: 0,
                });
                (self.ctrl.len() - 1) as u32
            }
        };
        self.ctrl[ctrl_index as usize] = ControlBlock {
            type_id: self.type_id,
            data_index,
            entity_id: EntityId::INVALID,
            ref_count: 1,
        };
        self.data.get_mut(data_index).owner = ctrl_index;
        log::trace!(
            "created component slot {ctrl_index} of type {:?}",
            self.type_id
        );
        ctrl_index
    }

    fn get_ctrl(&self, ctrl_index: u32) -> &ControlBlock {
        &self.ctrl[ctrl_index as usize]
    }

    fn incr_ref(&mut self, ctrl_index: u32) {
        self.ctrl[ctrl_index as usize].ref_count += 1;
    }

    fn decr_ref(&mut self, ctrl_index: u32) -> bool {
        let ctrl = &mut self.ctrl[ctrl_index as usize];
        debug_assert!(ctrl.ref_count > 0, "decr_ref on an already-dead slot");
        ctrl.ref_count -= 1;
        if ctrl.ref_count <= 0 {
            self.release_slot(ctrl_index);
            true
        } else {
            false
        }
    }

    fn set_entity(&mut self, ctrl_index: u32, entity_id: EntityId) {
        self.ctrl[ctrl_index as usize].entity_id = entity_id;
    }

    fn clear_entity(&mut self, ctrl_index: u32) {
        self.ctrl[ctrl_index as usize].entity_id = EntityId::INVALID;
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn dump(&self) -> String {
        format!(
            "ComponentStorage<type_id={:?}>{{ live: {}, ctrl_slots: {}, free: {} }}",
            self.type_id,
            self.data.len(),
            self.ctrl.len(),
            self.ctrl_free.len()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Foo {
        value: u32,
    }
    impl Component for Foo {}

    #[test]
    fn create_initializes_control_block_with_ref_count_one() {
        // Given an empty storage
        let mut storage: ComponentStorage<Foo> = ComponentStorage::new(ComponentTypeId(0));
        // When creating a slot
        let idx = storage.create();
        // Then its control block is attach-ready with ref_count 1
        let ctrl = storage.get_ctrl(idx);
        assert_eq!(ctrl.ref_count, 1);
        assert_eq!(ctrl.entity_id, EntityId::INVALID);
        assert!(ctrl.is_valid());
    }

    #[test]
    fn swap_remove_preserves_sibling_ref_validity() {
        // Given 1024 slots, keeping index 7's ctrl index
        let mut storage: ComponentStorage<Foo> = ComponentStorage::new(ComponentTypeId(0));
        let mut ctrl_indices = Vec::new();
        for i in 0..1024u32 {
            let idx = storage.create();
            storage.get_value_mut(idx).value = i;
            ctrl_indices.push(idx);
        }
        let kept = ctrl_indices[7];
        let expected_value = storage.get_value(kept).value;

        // When destroying the slot at index 3 (decrementing its only ref)
        storage.decr_ref(ctrl_indices[3]);

        // Then the kept control block still resolves to the same value
        assert_eq!(storage.get_value(kept).value, expected_value);
        assert!(storage.get_ctrl(kept).is_valid());
    }

    #[test]
    fn ref_count_releases_slot_at_zero() {
        // Given a created slot with two refs
        let mut storage: ComponentStorage<Foo> = ComponentStorage::new(ComponentTypeId(0));
        let idx = storage.create();
        storage.incr_ref(idx);
        assert_eq!(storage.get_ctrl(idx).ref_count, 2);

        // When dropping both
        let released_first = storage.decr_ref(idx);
        let released_second = storage.decr_ref(idx);

        // Then only the second decrement releases the slot
        assert!(!released_first);
        assert!(released_second);
        assert!(!storage.get_ctrl(idx).is_valid());
    }
}
