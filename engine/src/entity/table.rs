use std::cell::RefCell;
use std::rc::Rc;

use crate::component::{ComponentRef, ComponentTypeId};
use crate::entity::link::{ChildLink, ComponentLink, INVALID_LINK};
use crate::entity::{EntityHandle, EntityId, EntityRecord, RefDeltaQueue};
use crate::pool::MemoryPool;
use crate::registry::Registry;
use crate::tuple_cache::TupleCacheSet;

/// Owns every [`EntityRecord`] plus the two intrusive link pools
/// (components, children) they thread through. Ids are never reused, so
/// `locations` is a plain `Vec` indexed by `EntityId` rather than a hash
/// map.
///
/// Higher-level mutators (`add_component`, `remove_component`,
/// `destroy_entity`, `add_child`, `remove_child`, `set_enabled`) take
/// `&Registry`/`&mut TupleCacheSet` as parameters instead of owning them,
/// so an [`crate::engine::Engine`] can hold all four collaborators and
/// pass itself through at each call site without a borrow cycle.
pub struct EntityTable {
    entities: MemoryPool<EntityRecord>,
    component_links: MemoryPool<ComponentLink>,
    child_links: MemoryPool<ChildLink>,
    locations: Vec<Option<u32>>,
    next_id: u32,
    deltas: RefDeltaQueue,
}

impl EntityTable {
    pub fn new(entity_chunk: usize, component_link_chunk: usize, child_link_chunk: usize) -> Self {
        EntityTable {
            entities: MemoryPool::new(entity_chunk),
            component_links: MemoryPool::new(component_link_chunk),
            child_links: MemoryPool::new(child_link_chunk),
            locations: Vec::new(),
            next_id: 0,
            deltas: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn record(&self, id: EntityId) -> &EntityRecord {
        let idx = self.location_of(id);
        self.entities.get(idx)
    }

    pub fn record_mut(&mut self, id: EntityId) -> &mut EntityRecord {
        let idx = self.location_of(id);
        self.entities.get_mut(idx)
    }

    fn location_of(&self, id: EntityId) -> u32 {
        self.locations
            .get(id.0 as usize)
            .copied()
            .flatten()
            .expect("unknown or already-reclaimed entity id")
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.locations.get(id.0 as usize).copied().flatten().is_some()
    }

    /// Mints a new handle for an already-live entity, incrementing its
    /// refcount through the usual deferred delta (used to hand out an
    /// `EntityHandle` from a raw `EntityId`, e.g. for broadcast payloads).
    pub fn handle_for(&self, id: EntityId) -> EntityHandle {
        EntityHandle::new(id, Rc::clone(&self.deltas))
    }

    pub fn create_entity(&mut self) -> EntityHandle {
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let (storage_location, record) = self.entities.allocate();
        record.id = id;
        record.storage_location = storage_location;
        record.enabled = true;

        let (comp_sentinel, _) = self.component_links.allocate();
        let (child_sentinel, _) = self.child_links.allocate();
        {
            let record = self.entities.get_mut(storage_location);
            record.components_head = comp_sentinel;
            record.children_head = child_sentinel;
        }

        if self.locations.len() <= id.0 as usize {
            self.locations.resize(id.0 as usize + 1, None);
        }
        self.locations[id.0 as usize] = Some(storage_location);

        log::debug!("created entity {:?}", id);
        EntityHandle::new(id, Rc::clone(&self.deltas))
    }

    pub fn has_component(&self, id: EntityId, type_id: ComponentTypeId) -> bool {
        self.record(id).component_mask.contains(type_id.index())
    }

    pub fn get_component(&self, id: EntityId, type_id: ComponentTypeId) -> Option<ComponentRef> {
        if !self.has_component(id, type_id) {
            return None;
        }
        let mut cur = self.record(id).components_head;
        loop {
            let link = self.component_links.get(cur);
            if let Some(comp_ref) = &link.component_ref {
                if comp_ref.type_id() == type_id {
                    return Some(comp_ref.clone());
                }
            }
            if link.next == INVALID_LINK {
                return None;
            }
            cur = link.next;
        }
    }

    pub fn iterate_components<'a>(&'a self, id: EntityId) -> impl Iterator<Item = ComponentRef> + 'a {
        let mut cur = self.record(id).components_head;
        let mut done = false;
        std::iter::from_fn(move || {
            while !done {
                let link = self.component_links.get(cur);
                let next = link.next;
                let hit = link.component_ref.clone();
                if next == INVALID_LINK {
                    done = true;
                } else {
                    cur = next;
                }
                if hit.is_some() {
                    return hit;
                }
            }
            None
        })
    }

    pub fn iterate_children<'a>(&'a self, id: EntityId) -> impl Iterator<Item = EntityId> + 'a {
        let mut cur = self.record(id).children_head;
        let mut done = false;
        std::iter::from_fn(move || {
            while !done {
                let link = self.child_links.get(cur);
                let next = link.next;
                let hit = if link.child_id.is_valid() { Some(link.child_id) } else { None };
                if next == INVALID_LINK {
                    done = true;
                } else {
                    cur = next;
                }
                if hit.is_some() {
                    return hit;
                }
            }
            None
        })
    }

    /// Attaches an already-created component (see
    /// `Registry::create_component_by_id`) to `entity`, refreshes
    /// activation, broadcasts `on_component_attached`, and touches every
    /// tuple cache that references this type-id.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        comp_ref: &ComponentRef,
        registry: &Registry,
        tuple_caches: &mut TupleCacheSet,
    ) {
        let type_id = comp_ref.type_id();
        let head = self.record(entity).components_head;

        let mut cur = head;
        let mut reuse = None;
        loop {
            if self.component_links.get(cur).component_ref.is_none() {
                reuse = Some(cur);
                break;
            }
            let next = self.component_links.get(cur).next;
            if next == INVALID_LINK {
                break;
            }
            cur = next;
        }
        let link_index = match reuse {
            Some(idx) => idx,
            None => {
                let (idx, _) = self.component_links.allocate();
                self.component_links.get_mut(cur).next = idx;
                idx
            }
        };

        let attached = comp_ref.clone();
        attached
            .storage_handle()
            .borrow_mut()
            .set_entity(attached.ctrl_index(), entity);
        self.component_links.get_mut(link_index).component_ref = Some(attached);
        self.record_mut(entity).component_mask.set(type_id.index(), true);

        crate::activation::refresh_activation(self, entity, false, registry);

        let handle = self.handle_for(entity);
        registry.broadcast_component_attached(handle, comp_ref.clone());
        tuple_caches.touch_type(type_id, entity, self);
        log::debug!("attached component type {} to entity {:?}", type_id.0, entity);
    }

    /// Unlinks the component of `type_id` from `entity`'s list, if present.
    /// The head-of-list sentinel is never structurally removed — only its
    /// payload is cleared — but non-head links, once spliced out, aren't
    /// returned to a free list; see DESIGN.md for why that's acceptable
    /// here.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        registry: &Registry,
        tuple_caches: &mut TupleCacheSet,
    ) {
        if !self.has_component(entity, type_id) {
            return;
        }
        let head = self.record(entity).components_head;
        let mut prev: Option<u32> = None;
        let mut cur = head;
        let found = loop {
            let (next, is_match) = {
                let link = self.component_links.get(cur);
                (
                    link.next,
                    link.component_ref.as_ref().map(|r| r.type_id()) == Some(type_id),
                )
            };
            if is_match {
                break true;
            }
            if next == INVALID_LINK {
                break false;
            }
            prev = Some(cur);
            cur = next;
        };
        if !found {
            return;
        }

        let removed = self.component_links.get_mut(cur).component_ref.take();
        let Some(removed) = removed else { return };
        removed
            .storage_handle()
            .borrow_mut()
            .clear_entity(removed.ctrl_index());

        if cur != head {
            let next_of_cur = self.component_links.get(cur).next;
            if let Some(p) = prev {
                self.component_links.get_mut(p).next = next_of_cur;
            }
        }

        self.record_mut(entity).component_mask.set(type_id.index(), false);
        let handle = self.handle_for(entity);
        registry.broadcast_component_detached(handle, removed.clone());
        tuple_caches.touch_type(type_id, entity, self);
        log::debug!("detached component type {} from entity {:?}", type_id.0, entity);
        // `removed` drops here, decrementing the slot's own ref_count.
    }

    /// Walks `start`'s ancestor chain (via `parent_id`) looking for
    /// `candidate`, including `start` itself.
    fn is_ancestor(&self, candidate: EntityId, start: EntityId) -> bool {
        let mut cur = start;
        loop {
            if cur == candidate {
                return true;
            }
            if !cur.is_valid() {
                return false;
            }
            cur = self.record(cur).parent_id;
        }
    }

    /// Panics if attaching `child` under `parent` would create a cycle,
    /// i.e. `child` is `parent` itself or already one of its ancestors.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId, registry: &Registry) {
        assert!(
            !self.is_ancestor(child, parent),
            "add_child would create a cycle: {child:?} is already an ancestor of {parent:?}"
        );

        let head = self.record(parent).children_head;
        let mut cur = head;
        let mut reuse = None;
        loop {
            if !self.child_links.get(cur).child_id.is_valid() {
                reuse = Some(cur);
                break;
            }
            let next = self.child_links.get(cur).next;
            if next == INVALID_LINK {
                break;
            }
            cur = next;
        }
        let link_index = match reuse {
            Some(idx) => idx,
            None => {
                let (idx, _) = self.child_links.allocate();
                self.child_links.get_mut(cur).next = idx;
                idx
            }
        };
        self.child_links.get_mut(link_index).child_id = child;

        let order = self.record(parent).children_count;
        self.record_mut(parent).children_count += 1;
        self.record_mut(child).order_in_parent = order;

        crate::activation::refresh_hierarchy_depth(self, child, parent, false);
        crate::activation::refresh_activation(self, child, false, registry);
        log::debug!("added child {:?} to parent {:?}", child, parent);
    }

    pub fn remove_child(&mut self, parent: EntityId, child: EntityId, registry: &Registry) {
        let head = self.record(parent).children_head;
        let mut prev: Option<u32> = None;
        let mut cur = head;
        let found = loop {
            let (next, is_match) = {
                let link = self.child_links.get(cur);
                (link.next, link.child_id == child)
            };
            if is_match {
                break true;
            }
            if next == INVALID_LINK {
                break false;
            }
            prev = Some(cur);
            cur = next;
        };
        if !found {
            return;
        }
        self.child_links.get_mut(cur).child_id = EntityId::INVALID;
        if cur != head {
            let next_of_cur = self.child_links.get(cur).next;
            if let Some(p) = prev {
                self.child_links.get_mut(p).next = next_of_cur;
            }
        }
        self.record_mut(parent).children_count = self.record(parent).children_count.saturating_sub(1);

        crate::activation::refresh_hierarchy_depth(self, child, EntityId::INVALID, false);
        crate::activation::refresh_activation(self, child, false, registry);
        log::debug!("removed child {:?} from parent {:?}", child, parent);
    }

    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool, registry: &Registry) {
        self.record_mut(entity).enabled = enabled;
        crate::activation::refresh_activation(self, entity, false, registry);
    }

    /// Detaches every component, unlinks from any parent, marks the record
    /// destroyed, and reaps it immediately if nothing else holds a handle.
    pub fn destroy_entity(&mut self, entity: EntityId, registry: &Registry, tuple_caches: &mut TupleCacheSet) {
        let attached: Vec<ComponentTypeId> = self
            .record(entity)
            .component_mask
            .ones()
            .map(|i| ComponentTypeId(i as u8))
            .collect();
        for type_id in attached {
            self.remove_component(entity, type_id, registry, tuple_caches);
        }

        let children: Vec<EntityId> = self.iterate_children(entity).collect();
        for child in children {
            self.remove_child(entity, child, registry);
        }

        let parent = self.record(entity).parent_id;
        if parent.is_valid() {
            self.remove_child(parent, entity, registry);
        }

        self.record_mut(entity).destroyed = true;
        let id = entity;
        registry.broadcast_entity_destroyed(id);
        log::info!("destroyed entity {:?}", entity);
        self.reap();
    }

    /// Applies every queued `EntityHandle` refcount delta and physically
    /// reclaims any record that is both destroyed and unreferenced.
    pub fn reap(&mut self) {
        let deltas: Vec<(EntityId, i32)> = self.deltas.borrow_mut().drain(..).collect();
        for (id, delta) in deltas {
            let Some(idx) = self.locations.get(id.0 as usize).copied().flatten() else {
                continue;
            };
            let record = self.entities.get_mut(idx);
            let new_count = record.ref_count as i32 + delta;
            record.ref_count = new_count.max(0) as u16;
            if record.ref_count == 0 && record.destroyed {
                self.reclaim(id);
            }
        }
    }

    fn reclaim(&mut self, id: EntityId) {
        let idx = self.locations[id.0 as usize]
            .take()
            .expect("reclaim of an entity id that was never located");
        let moved = self.entities.remove(idx);
        if moved {
            let moved_id = self.entities.get(idx).id;
            self.locations[moved_id.0 as usize] = Some(idx);
            self.entities.get_mut(idx).storage_location = idx;
        }
        log::trace!("reclaimed entity record {:?}", id);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Default)]
    struct Pos {
        x: i32,
    }
    impl Component for Pos {}

    fn fresh() -> (EntityTable, Registry, TupleCacheSet) {
        let table = EntityTable::new(16, 16, 16);
        let registry = Registry::new();
        let id = registry.register_component_type::<Pos>("Pos");
        let _ = id;
        (table, registry, TupleCacheSet::new())
    }

    #[test]
    fn create_entity_starts_enabled_with_empty_lists() {
        // Given a fresh table
        let (mut table, _registry, _caches) = fresh();
        // When creating an entity
        let handle = table.create_entity();
        // Then it is enabled, has no components and no children
        let record = table.record(handle.id());
        assert!(record.enabled);
        assert_eq!(record.component_mask.count_ones(..), 0);
        assert_eq!(table.iterate_children(handle.id()).count(), 0);
    }

    #[test]
    fn add_then_remove_component_updates_mask_and_storage() {
        // Given an entity and a freshly created Pos component
        let (mut table, registry, mut caches) = fresh();
        let handle = table.create_entity();
        let pos_id = registry.id_by_type::<Pos>().unwrap();
        let comp = registry.create_component_by_id(pos_id).unwrap();

        // When attaching it
        table.add_component(handle.id(), &comp, &registry, &mut caches);
        // Then the mask reflects it and it can be fetched back
        assert!(table.has_component(handle.id(), pos_id));
        assert!(table.get_component(handle.id(), pos_id).is_some());

        // When detaching it
        table.remove_component(handle.id(), pos_id, &registry, &mut caches);
        // Then the mask clears and the entity's own component_ref is gone
        assert!(!table.has_component(handle.id(), pos_id));
        assert!(table.get_component(handle.id(), pos_id).is_none());
        // But the caller's own reference, `comp`, is still independently valid
        assert!(comp.is_valid());
    }

    #[test]
    fn destroy_entity_detaches_components_and_marks_destroyed() {
        let (mut table, registry, mut caches) = fresh();
        let handle = table.create_entity();
        let pos_id = registry.id_by_type::<Pos>().unwrap();
        let comp = registry.create_component_by_id(pos_id).unwrap();
        table.add_component(handle.id(), &comp, &registry, &mut caches);

        table.destroy_entity(handle.id(), &registry, &mut caches);

        assert!(!table.has_component(handle.id(), pos_id));
        assert!(comp.is_valid(), "caller's own component ref outlives detachment");
    }

    #[test]
    fn reap_reclaims_once_last_handle_drops() {
        let (mut table, registry, mut caches) = fresh();
        let handle = table.create_entity();
        let id = handle.id();
        table.destroy_entity(id, &registry, &mut caches);
        assert!(table.is_alive(id), "still referenced by `handle`");

        drop(handle);
        table.reap();
        assert!(!table.is_alive(id));
    }

    #[test]
    fn add_child_sets_order_and_parent() {
        let (mut table, registry, _caches) = fresh();
        let parent = table.create_entity();
        let child_a = table.create_entity();
        let child_b = table.create_entity();

        table.add_child(parent.id(), child_a.id(), &registry);
        table.add_child(parent.id(), child_b.id(), &registry);

        assert_eq!(table.record(child_a.id()).order_in_parent, 0);
        assert_eq!(table.record(child_b.id()).order_in_parent, 1);
        assert_eq!(table.record(parent.id()).children_count, 2);
        let children: Vec<_> = table.iterate_children(parent.id()).collect();
        assert_eq!(children, vec![child_a.id(), child_b.id()]);
    }

    #[test]
    #[should_panic(expected = "would create a cycle")]
    fn add_child_panics_on_cycle() {
        // Given a grandparent/parent/child chain
        let (mut table, registry, _caches) = fresh();
        let grandparent = table.create_entity();
        let parent = table.create_entity();
        let child = table.create_entity();
        table.add_child(grandparent.id(), parent.id(), &registry);
        table.add_child(parent.id(), child.id(), &registry);

        // When the grandparent is attached as a child of its own descendant
        table.add_child(child.id(), grandparent.id(), &registry);

        // Then it panics instead of recursing through the cycle
    }
}
