//! Typed component storage: dense per-type pools addressed through pinned
//! control blocks, exposed to the rest of the engine as type-erased
//! [`storage::AnyComponentStorage`] trait objects.

pub mod control;
pub mod reference;
pub mod storage;

pub use control::ControlBlock;
pub use reference::{ComponentRef, TypedRef};
pub use storage::{AnyComponentStorage, ComponentStorage};

/// Dense component type identifier, assigned in registration order.
///
/// Spec caps this at 128 distinct types (`EntityRecord::component_mask` is a
/// 128-bit set); `Registry::register_component_type` panics past that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub u8);

impl ComponentTypeId {
    pub const MAX_TYPES: usize = 128;

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Marker trait for a value that can live in a [`ComponentStorage`].
///
/// Implemented by hand or via `#[derive(Component)]` from `ecs_core_macros`.
/// `Default` is required because [`crate::pool::MemoryPool::allocate`]
/// default-constructs every slot before the caller fills it in, mirroring
/// the source's placement-new-then-initialize pattern.
pub trait Component: 'static + Default + Sized {}
