//! Component-type registry: owns every [`ComponentStorage`]'s type-erased
//! handle, resolves names/`TypeId`s to dense [`ComponentTypeId`]s, and
//! hosts the lifecycle broadcast channels entities and components fire
//! through.

pub mod broadcast;

pub use broadcast::{BindingId, Broadcast};

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::component::{Component, ComponentRef, ComponentStorage, ComponentTypeId, TypedRef};
use crate::entity::{EntityHandle, EntityId};
use crate::error::EcsError;

type SharedStorage = Rc<RefCell<Box<dyn crate::component::AnyComponentStorage>>>;

/// Central owner of every component storage and the registry-level
/// broadcast channels. Almost every method takes `&self`: like the
/// manifest it's grounded on, interior mutability (`DashMap`, `RefCell`,
/// `AtomicU32`) does the work a `&mut self` signature would otherwise
/// force onto every caller, which matters once `Registry` is shared
/// behind the same `&self` borrows as `EntityTable`'s mutators.
pub struct Registry {
    next_id: AtomicU32,
    type_map: DashMap<TypeId, ComponentTypeId>,
    name_map: DashMap<String, ComponentTypeId>,
    names: RefCell<Vec<String>>,
    storages: RefCell<Vec<SharedStorage>>,
    initialized: Cell<bool>,

    on_entity_created: RefCell<Broadcast<EntityHandle>>,
    on_entity_destroyed: RefCell<Broadcast<EntityId>>,
    on_component_created: RefCell<Broadcast<ComponentRef>>,
    on_component_attached: RefCell<Broadcast<(EntityHandle, ComponentRef)>>,
    on_component_detached: RefCell<Broadcast<(EntityHandle, ComponentRef)>>,
    on_component_destroyed: RefCell<Broadcast<ComponentRef>>,

    per_type_attached: RefCell<std::collections::HashMap<ComponentTypeId, Broadcast<ComponentRef>>>,
    per_type_detached: RefCell<std::collections::HashMap<ComponentTypeId, Broadcast<ComponentRef>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next_id: AtomicU32::new(0),
            type_map: DashMap::new(),
            name_map: DashMap::new(),
            names: RefCell::new(Vec::new()),
            storages: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
            on_entity_created: RefCell::new(Broadcast::new()),
            on_entity_destroyed: RefCell::new(Broadcast::new()),
            on_component_created: RefCell::new(Broadcast::new()),
            on_component_attached: RefCell::new(Broadcast::new()),
            on_component_detached: RefCell::new(Broadcast::new()),
            on_component_destroyed: RefCell::new(Broadcast::new()),
            per_type_attached: RefCell::new(std::collections::HashMap::new()),
            per_type_detached: RefCell::new(std::collections::HashMap::new()),
        }
    }

    /// Registers `T` under `name`, returning its freshly assigned
    /// [`ComponentTypeId`]. Panics on a duplicate type or name, and once
    /// [`Registry::init`] has run — registration is a startup-time-only
    /// concern, mirroring the source's "types are declared before the
    /// world starts" assumption.
    pub fn register_component_type<T: Component>(&self, name: &str) -> ComponentTypeId {
        assert!(!self.initialized.get(), "cannot register component types after init()");
        let key = TypeId::of::<T>();
        assert!(self.type_map.get(&key).is_none(), "component type already registered");
        assert!(
            self.name_map.get(name).is_none(),
            "component name '{name}' already registered"
        );

        let raw_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        assert!(
            (raw_id as usize) < ComponentTypeId::MAX_TYPES,
            "exceeded the maximum number of component types"
        );
        let id = ComponentTypeId(raw_id as u8);

        self.type_map.insert(key, id);
        self.name_map.insert(name.to_string(), id);
        self.names.borrow_mut().push(name.to_string());
        let storage: Box<dyn crate::component::AnyComponentStorage> = Box::new(ComponentStorage::<T>::new(id));
        self.storages.borrow_mut().push(Rc::new(RefCell::new(storage)));

        log::info!("registered component type '{name}' as id {}", id.0);
        id
    }

    pub fn id_by_type<T: Component>(&self) -> Option<ComponentTypeId> {
        self.type_map.get(&TypeId::of::<T>()).map(|e| *e)
    }

    pub fn id_by_name(&self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.name_map
            .get(name)
            .map(|e| *e)
            .ok_or_else(|| EcsError::UnknownComponentName(name.to_string()))
    }

    pub fn name_by_id(&self, id: ComponentTypeId) -> Result<String, EcsError> {
        self.names
            .borrow()
            .get(id.index())
            .cloned()
            .ok_or(EcsError::UnknownComponentTypeId(id.0))
    }

    fn storage_for(&self, id: ComponentTypeId) -> Result<SharedStorage, EcsError> {
        self.storages
            .borrow()
            .get(id.index())
            .cloned()
            .ok_or(EcsError::UnknownComponentTypeId(id.0))
    }

    pub fn create_component_by_id(&self, id: ComponentTypeId) -> Result<ComponentRef, EcsError> {
        let storage = self.storage_for(id)?;
        let ctrl_index = storage.borrow_mut().create();
        let comp_ref = ComponentRef::new(storage, id, ctrl_index);
        self.on_component_created.borrow_mut().broadcast(comp_ref.clone());
        Ok(comp_ref)
    }

    pub fn create_component_by_name(&self, name: &str) -> Result<ComponentRef, EcsError> {
        let id = self.id_by_name(name)?;
        self.create_component_by_id(id)
    }

    pub fn create_component<T: Component>(&self) -> Result<TypedRef<T>, EcsError> {
        let id = self
            .id_by_type::<T>()
            .ok_or_else(|| EcsError::UnknownComponentName(std::any::type_name::<T>().to_string()))?;
        let comp_ref = self.create_component_by_id(id)?;
        comp_ref
            .downcast(id)
            .ok_or_else(|| EcsError::UnknownComponentTypeId(id.0))
    }

    pub fn init(&self) {
        assert!(!self.initialized.get(), "Registry::init called twice");
        self.initialized.set(true);
        log::info!(
            "registry initialized with {} component type(s)",
            self.storages.borrow().len()
        );
    }

    pub fn destroy(&self) {
        assert!(self.initialized.get(), "Registry::destroy called before init");
        self.initialized.set(false);
        log::info!("registry destroyed");
    }

    pub fn on_entity_created(&self) -> &RefCell<Broadcast<EntityHandle>> {
        &self.on_entity_created
    }

    pub fn on_entity_destroyed(&self) -> &RefCell<Broadcast<EntityId>> {
        &self.on_entity_destroyed
    }

    pub fn on_component_created(&self) -> &RefCell<Broadcast<ComponentRef>> {
        &self.on_component_created
    }

    pub fn on_component_attached(&self) -> &RefCell<Broadcast<(EntityHandle, ComponentRef)>> {
        &self.on_component_attached
    }

    pub fn on_component_detached(&self) -> &RefCell<Broadcast<(EntityHandle, ComponentRef)>> {
        &self.on_component_detached
    }

    pub fn on_component_destroyed(&self) -> &RefCell<Broadcast<ComponentRef>> {
        &self.on_component_destroyed
    }

    /// Subscribes to attaches of one specific component type only.
    pub fn bind_component_attached_for_type(
        &self,
        type_id: ComponentTypeId,
        listener: impl Fn(ComponentRef) + 'static,
    ) -> BindingId {
        self.per_type_attached
            .borrow_mut()
            .entry(type_id)
            .or_insert_with(Broadcast::new)
            .bind(listener)
    }

    pub fn bind_component_detached_for_type(
        &self,
        type_id: ComponentTypeId,
        listener: impl Fn(ComponentRef) + 'static,
    ) -> BindingId {
        self.per_type_detached
            .borrow_mut()
            .entry(type_id)
            .or_insert_with(Broadcast::new)
            .bind(listener)
    }

    pub(crate) fn broadcast_entity_destroyed(&self, id: EntityId) {
        self.on_entity_destroyed.borrow_mut().broadcast(id);
    }

    pub(crate) fn broadcast_component_attached(&self, entity: EntityHandle, comp_ref: ComponentRef) {
        let type_id = comp_ref.type_id();
        self.on_component_attached
            .borrow_mut()
            .broadcast((entity, comp_ref.clone()));
        if let Some(channel) = self.per_type_attached.borrow_mut().get_mut(&type_id) {
            channel.broadcast(comp_ref);
        }
    }

    pub(crate) fn broadcast_component_detached(&self, entity: EntityHandle, comp_ref: ComponentRef) {
        let type_id = comp_ref.type_id();
        self.on_component_detached
            .borrow_mut()
            .broadcast((entity, comp_ref.clone()));
        if let Some(channel) = self.per_type_detached.borrow_mut().get_mut(&type_id) {
            channel.broadcast(comp_ref);
        }
    }

    /// Notification hook invoked whenever `refresh_activation` changes a
    /// component's owning entity's activation state. There's no dedicated
    /// channel for this yet (unlike attach/detach/create), so for now this
    /// only logs; a future caller wanting to react to activation
    /// transitions would extend this with its own broadcast.
    pub fn refresh_component_activation(&self, comp_ref: &ComponentRef, enabled: bool, activated: bool) {
        log::trace!(
            "component type {} on entity {:?}: enabled={enabled} activated={activated}",
            comp_ref.type_id().0,
            comp_ref.entity_id()
        );
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Default)]
    struct Health {
        hp: u32,
    }
    impl Component for Health {}

    #[test]
    fn register_then_create_round_trips_through_name_and_type() {
        // Given a registered component type
        let registry = Registry::new();
        let id = registry.register_component_type::<Health>("Health");

        // Then it resolves both by type and by name
        assert_eq!(registry.id_by_type::<Health>(), Some(id));
        assert_eq!(registry.id_by_name("Health").unwrap(), id);
        assert_eq!(registry.name_by_id(id).unwrap(), "Health");

        // When creating an instance by name
        let comp = registry.create_component_by_name("Health").unwrap();
        assert!(comp.is_valid());
    }

    #[test]
    fn unknown_name_lookup_is_an_error_not_a_panic() {
        let registry = Registry::new();
        assert_eq!(
            registry.id_by_name("Ghost"),
            Err(EcsError::UnknownComponentName("Ghost".to_string()))
        );
    }

    #[test]
    fn typed_create_produces_a_working_typed_ref() {
        let registry = Registry::new();
        registry.register_component_type::<Health>("Health");
        let typed = registry.create_component::<Health>().unwrap();
        typed.get_mut(|h| h.hp = 42);
        assert_eq!(typed.get(|h| h.hp), Some(42));
    }

    #[test]
    fn component_created_broadcast_fires_once_per_create() {
        let registry = Registry::new();
        registry.register_component_type::<Health>("Health");
        let count = Rc::new(Cell::new(0));
        let count_inner = Rc::clone(&count);
        registry
            .on_component_created()
            .borrow_mut()
            .bind(move |_| count_inner.set(count_inner.get() + 1));

        registry.create_component::<Health>().unwrap();
        registry.create_component::<Health>().unwrap();

        assert_eq!(count.get(), 2);
    }
}
