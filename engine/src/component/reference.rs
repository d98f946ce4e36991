use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::component::storage::AnyComponentStorage;
use crate::component::{Component, ComponentStorage, ComponentTypeId, ControlBlock};
use crate::entity::EntityId;

pub(crate) type SharedStorage = Rc<RefCell<Box<dyn AnyComponentStorage>>>;

/// A counted, non-owning reference into a component slot via its pinned
/// control block.
///
/// `Clone` increments the control block's `ref_count`; `Drop` decrements it
/// and, on the 1→0 transition, releases the slot back to its storage,
/// running the value's destructor. Both happen unconditionally, including
/// on panic-unwind paths, since they are ordinary `Drop` glue, replacing
/// the source's manual `AddRef`/`RemoveRef` calls.
pub struct ComponentRef {
    storage: SharedStorage,
    type_id: ComponentTypeId,
    ctrl_index: u32,
}

impl ComponentRef {
    pub(crate) fn new(storage: SharedStorage, type_id: ComponentTypeId, ctrl_index: u32) -> Self {
        ComponentRef {
            storage,
            type_id,
            ctrl_index,
        }
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    pub fn entity_id(&self) -> EntityId {
        self.storage.borrow().get_ctrl(self.ctrl_index).entity_id
    }

    pub fn is_valid(&self) -> bool {
        self.storage.borrow().get_ctrl(self.ctrl_index).ref_count > 0
    }

    pub fn ctrl(&self) -> ControlBlock {
        *self.storage.borrow().get_ctrl(self.ctrl_index)
    }

    pub(crate) fn ctrl_index(&self) -> u32 {
        self.ctrl_index
    }

    pub(crate) fn storage_handle(&self) -> &SharedStorage {
        &self.storage
    }

    /// Look up another component attached to the same entity. Returns
    /// `None` if this ref is invalid, unattached, or the sibling type is
    /// absent.
    pub fn get_sibling(&self, table: &crate::entity::EntityTable, sibling: ComponentTypeId) -> Option<ComponentRef> {
        let entity_id = self.entity_id();
        if entity_id == EntityId::INVALID {
            return None;
        }
        table.get_component(entity_id, sibling)
    }

    /// Attempts to narrow this erased ref to a `TypedRef<T>`, checking that
    /// `T`'s registered type-id matches. Returns `None` on mismatch.
    pub fn downcast<T: Component>(self, expected: ComponentTypeId) -> Option<TypedRef<T>> {
        if self.type_id != expected {
            return None;
        }
        Some(TypedRef {
            inner: self,
            _marker: PhantomData,
        })
    }
}

impl Clone for ComponentRef {
    fn clone(&self) -> Self {
        self.storage.borrow_mut().incr_ref(self.ctrl_index);
        ComponentRef {
            storage: Rc::clone(&self.storage),
            type_id: self.type_id,
            ctrl_index: self.ctrl_index,
        }
    }
}

impl Drop for ComponentRef {
    fn drop(&mut self) {
        self.storage.borrow_mut().decr_ref(self.ctrl_index);
    }
}

/// A strongly-typed wrapper over [`ComponentRef`] with checked downcasting.
pub struct TypedRef<T> {
    inner: ComponentRef,
    _marker: PhantomData<T>,
}

impl<T: Component> TypedRef<T> {
    pub(crate) fn new(inner: ComponentRef) -> Self {
        TypedRef {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn erased(&self) -> &ComponentRef {
        &self.inner
    }

    pub fn into_erased(self) -> ComponentRef {
        self.inner
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    pub fn entity_id(&self) -> EntityId {
        self.inner.entity_id()
    }

    /// Scoped read access to the underlying value. Safe Rust cannot hand
    /// back an unguarded `&T` that outlives this call (the value lives
    /// behind the storage's `RefCell`), so access goes through a closure
    /// instead of a raw `data_ptr()` (see DESIGN.md open question 4).
    /// Returns `None` if the ref is no longer valid.
    pub fn get<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        if !self.inner.is_valid() {
            return None;
        }
        let guard = self.inner.storage_handle().borrow();
        let storage = guard
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
            .expect("ComponentRef type_id did not match its own storage's concrete type");
        Some(f(storage.get_value(self.inner.ctrl_index())))
    }

    pub fn get_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.inner.is_valid() {
            return None;
        }
        let mut guard = self.inner.storage_handle().borrow_mut();
        let storage = guard
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
            .expect("ComponentRef type_id did not match its own storage's concrete type");
        Some(f(storage.get_value_mut(self.inner.ctrl_index())))
    }
}

impl<T> Clone for TypedRef<T> {
    fn clone(&self) -> Self {
        TypedRef {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}
