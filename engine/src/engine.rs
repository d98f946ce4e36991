//! Top-level facade bundling one [`Registry`], one [`EntityTable`], one
//! [`TupleCacheSet`], and one [`SystemRegistry`] — additive, not a new
//! interface surface over what those four already expose.

use crate::component::{Component, ComponentRef, ComponentTypeId, TypedRef};
use crate::config::EngineConfig;
use crate::entity::{EntityHandle, EntityId, EntityTable};
use crate::error::EcsError;
use crate::registry::Registry;
use crate::system::{System, SystemId, SystemRegistry};
use crate::tuple_cache::{Tuple, TupleCacheSet, TupleSpec};
use crate::util::IntoTupleSpec;

pub struct Engine {
    registry: Registry,
    entities: EntityTable,
    tuple_caches: TupleCacheSet,
    systems: SystemRegistry,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            registry: Registry::new(),
            entities: EntityTable::new(
                config.entity_pool.chunk_size,
                config.component_link_pool.chunk_size,
                config.child_link_pool.chunk_size,
            ),
            tuple_caches: TupleCacheSet::new(),
            systems: SystemRegistry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }

    pub fn tuple_caches(&self) -> &TupleCacheSet {
        &self.tuple_caches
    }

    pub fn systems_mut(&mut self) -> &mut SystemRegistry {
        &mut self.systems
    }

    /// Closes component-type registration and moves the registry into its
    /// running state. Call once, after every `register_component_type`
    /// and before the first `tick`.
    pub fn init(&mut self) {
        self.registry.init();
        log::info!("engine initialized");
    }

    pub fn register_component_type<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        self.registry.register_component_type::<T>(name)
    }

    pub fn register_tuple(&mut self, spec: TupleSpec) -> u64 {
        self.tuple_caches.register_tuple(spec)
    }

    pub fn register_tuple_of<Tup: IntoTupleSpec>(&mut self) -> u64 {
        let spec = TupleSpec::of::<Tup>(&self.registry);
        self.tuple_caches.register_tuple(spec)
    }

    pub fn view_tuple(&self, hash: u64) -> Result<impl Iterator<Item = (&EntityId, &Tuple)>, EcsError> {
        self.tuple_caches.view(hash)
    }

    pub fn register_system(&mut self, system: impl System) -> SystemId {
        self.systems.add_system(Box::new(system))
    }

    pub fn remove_system(&mut self, id: SystemId) {
        let mut systems = self.systems.take_for_update();
        systems.remove_system(id, self);
        let placeholder = std::mem::replace(&mut self.systems, systems);
        self.systems.merge_staged_from(placeholder);
    }

    pub fn create_entity(&mut self) -> EntityHandle {
        let handle = self.entities.create_entity();
        self.registry.on_entity_created().borrow_mut().broadcast(handle.clone());
        handle
    }

    pub fn destroy_entity(&mut self, id: EntityId) {
        self.entities.destroy_entity(id, &self.registry, &mut self.tuple_caches);
    }

    pub fn create_component<T: Component>(&self) -> Result<TypedRef<T>, EcsError> {
        self.registry.create_component::<T>()
    }

    pub fn create_component_by_name(&self, name: &str) -> Result<ComponentRef, EcsError> {
        self.registry.create_component_by_name(name)
    }

    pub fn add_component(&mut self, entity: EntityId, comp_ref: &ComponentRef) {
        self.entities
            .add_component(entity, comp_ref, &self.registry, &mut self.tuple_caches);
    }

    pub fn remove_component(&mut self, entity: EntityId, type_id: ComponentTypeId) {
        self.entities
            .remove_component(entity, type_id, &self.registry, &mut self.tuple_caches);
    }

    pub fn get_component(&self, entity: EntityId, type_id: ComponentTypeId) -> Option<ComponentRef> {
        self.entities.get_component(entity, type_id)
    }

    pub fn add_child(&mut self, parent: EntityId, child: EntityId) {
        self.entities.add_child(parent, child, &self.registry);
    }

    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) {
        self.entities.remove_child(parent, child, &self.registry);
    }

    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool) {
        self.entities.set_enabled(entity, enabled, &self.registry);
    }

    /// Force-activates `entity` as the root of a fresh tree — the usual
    /// way to bring a newly assembled entity (and, transitively, its
    /// already-attached children) online.
    pub fn activate(&mut self, entity: EntityId) {
        crate::activation::refresh_activation(&mut self.entities, entity, true, &self.registry);
    }

    /// Runs every registered system once, in descending-priority order,
    /// then reaps any entity whose last handle dropped during the tick.
    pub fn tick(&mut self) {
        let mut systems = self.systems.take_for_update();
        systems.update(self);
        let placeholder = std::mem::replace(&mut self.systems, systems);
        self.systems.merge_staged_from(placeholder);
        self.entities.reap();
    }

    pub fn destroy(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        systems.destroy_all(self);
        self.registry.destroy();
        log::info!("engine destroyed");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Position {
        x: i32,
        y: i32,
    }
    impl Component for Position {}

    #[test]
    fn full_round_trip_create_attach_tick_destroy() {
        // Given an engine with one registered component type
        let mut engine = Engine::default();
        engine.register_component_type::<Position>("Position");
        engine.init();

        // When an entity is created and a component attached and activated
        let handle = engine.create_entity();
        let pos = engine.create_component::<Position>().unwrap();
        pos.get_mut(|p| {
            p.x = 3;
            p.y = 4;
        });
        engine.add_component(handle.id(), pos.erased());
        engine.activate(handle.id());

        // Then it is visible through the entity table
        let pos_id = engine.registry().id_by_type::<Position>().unwrap();
        assert!(engine.entities().has_component(handle.id(), pos_id));
        assert!(engine.entities().record(handle.id()).activated);

        // And a tick with no systems registered is a no-op
        engine.tick();

        // And destroying the entity releases its components
        engine.destroy_entity(handle.id());
        assert!(!engine.entities().has_component(handle.id(), pos_id));

        engine.destroy();
    }
}
