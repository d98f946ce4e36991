//! A single-threaded entity-component-system core: typed component pools
//! addressed through stable, reference-counted handles, an entity table
//! with intrusive per-entity component/child lists, cascading
//! activation, a reactive tuple-to-entity-set cache, and a
//! priority-ordered system scheduler.

// Lets `#[derive(Component)]` resolve `::ecs_core::component::Component`
// from this crate's own tests and doctests, the same way it would from a
// downstream crate depending on `ecs_core` normally.
extern crate self as ecs_core;

pub mod activation;
pub mod component;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod pool;
pub mod registry;
pub mod system;
pub mod tuple_cache;
pub mod util;

pub use component::{Component, ComponentRef, ComponentTypeId, TypedRef};
pub use config::{EngineConfig, PoolConfig};
pub use engine::Engine;
pub use entity::{EntityHandle, EntityId};
pub use error::EcsError;
pub use registry::Registry;
pub use system::{System, SystemId, SystemRegistry};
pub use tuple_cache::{Tuple, TupleCacheSet, TupleSpec};

// `Component` the trait and `Component` the derive macro live in separate
// namespaces, so re-exporting both under one name lets `use ecs_core::*`
// (or `use ecs_core::Component`) bring in `#[derive(Component)]` too.
pub use ecs_core_macros::Component;
