//! Reactive cache mapping a fixed set of component type-ids to the set of
//! entities currently carrying all of them.

use std::collections::HashMap;

use crate::component::{ComponentRef, ComponentTypeId};
use crate::entity::{EntityId, EntityTable};

/// A sorted, deduplicated set of component type-ids a [`TupleCache`]
/// tracks membership for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleSpec {
    ids: Vec<ComponentTypeId>,
}

impl TupleSpec {
    pub fn new(mut ids: Vec<ComponentTypeId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        TupleSpec { ids }
    }

    pub fn ids(&self) -> &[ComponentTypeId] {
        &self.ids
    }

    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    fn contains_all(&self, mask: &fixedbitset::FixedBitSet) -> bool {
        self.ids.iter().all(|id| mask.contains(id.index()))
    }

    /// FNV-1a-style combine, but folded "backwards": each step mixes the
    /// running seed into the per-element hash and then XORs that back into
    /// the seed, rather than the conventional seed-into-element order.
    /// Two specs built from the same ids in different insertion order
    /// still collide to the same value because `ids` is sorted first; the
    /// asymmetry only affects how strongly later ids perturb the final
    /// bits, which this cache's use (a stable lookup key, not a
    /// cryptographic digest) doesn't depend on.
    pub fn hash_value(&self) -> u64 {
        let mut seed: u64 = 0xcbf29ce484222325;
        for id in &self.ids {
            let mut h = seed.wrapping_mul(0x100000001b3);
            h ^= id.0 as u64;
            seed ^= h;
        }
        seed
    }
}

/// A snapshot of one entity's components matching a [`TupleSpec`], in
/// spec order.
pub struct Tuple {
    pub refs: Vec<ComponentRef>,
}

/// One registered tuple spec plus the live set of entities satisfying it.
pub struct TupleCache {
    spec: TupleSpec,
    entities: HashMap<EntityId, Tuple>,
}

impl TupleCache {
    fn new(spec: TupleSpec) -> Self {
        TupleCache {
            spec,
            entities: HashMap::new(),
        }
    }

    pub fn spec(&self) -> &TupleSpec {
        &self.spec
    }

    fn snapshot(&self, entity: EntityId, table: &EntityTable) -> Tuple {
        let refs = self
            .spec
            .ids()
            .iter()
            .map(|id| {
                table
                    .get_component(entity, *id)
                    .expect("mask is a superset of spec so every member must be present")
            })
            .collect();
        Tuple { refs }
    }

    /// Re-evaluates whether `entity` belongs in this cache and adds or
    /// removes it if membership changed.
    pub fn touch(&mut self, entity: EntityId, table: &EntityTable) {
        let is_member = self.spec.contains_all(&table.record(entity).component_mask);
        let was_member = self.entities.contains_key(&entity);
        match (is_member, was_member) {
            (true, false) => {
                let tuple = self.snapshot(entity, table);
                self.entities.insert(entity, tuple);
            }
            (false, true) => {
                self.entities.remove(&entity);
            }
            _ => {}
        }
    }

    pub fn view(&self) -> impl Iterator<Item = (&EntityId, &Tuple)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Owns every registered [`TupleCache`], keyed by its spec's hash, plus a
/// reverse index from type-id to the caches that reference it so a touch
/// triggered by one component attach/detach only re-evaluates caches that
/// could possibly care.
pub struct TupleCacheSet {
    caches: HashMap<u64, TupleCache>,
    reverse: HashMap<ComponentTypeId, Vec<u64>>,
}

impl TupleCacheSet {
    pub fn new() -> Self {
        TupleCacheSet {
            caches: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Registers `spec`, returning its hash as the handle used with
    /// [`TupleCacheSet::view`]. Idempotent: registering the same spec
    /// twice returns the same hash without rebuilding the cache.
    pub fn register_tuple(&mut self, spec: TupleSpec) -> u64 {
        let hash = spec.hash_value();
        if self.caches.contains_key(&hash) {
            return hash;
        }
        for id in spec.ids() {
            self.reverse.entry(*id).or_default().push(hash);
        }
        log::info!("registered tuple spec {:?} as {hash:#x}", spec.ids());
        self.caches.insert(hash, TupleCache::new(spec));
        hash
    }

    /// Re-evaluates every cache that references `type_id` for `entity`.
    /// Called once per component attach/detach, after the mask bit has
    /// already been flipped.
    pub fn touch_type(&mut self, type_id: ComponentTypeId, entity: EntityId, table: &EntityTable) {
        let Some(hashes) = self.reverse.get(&type_id) else {
            return;
        };
        for hash in hashes.clone() {
            if let Some(cache) = self.caches.get_mut(&hash) {
                cache.touch(entity, table);
            }
        }
    }

    pub fn view(&self, hash: u64) -> Result<impl Iterator<Item = (&EntityId, &Tuple)>, crate::error::EcsError> {
        self.caches
            .get(&hash)
            .map(TupleCache::view)
            .ok_or(crate::error::EcsError::TupleNotRegistered)
    }

    pub fn get(&self, hash: u64) -> Option<&TupleCache> {
        self.caches.get(&hash)
    }
}

impl Default for TupleCacheSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::registry::Registry;

    #[derive(Default)]
    struct A;
    impl Component for A {}
    #[derive(Default)]
    struct B;
    impl Component for B {}

    #[test]
    fn entity_enters_cache_once_every_member_type_is_attached() {
        // Given a registered (A, B) tuple and an entity with only A attached
        let mut table = EntityTable::new(16, 16, 16);
        let registry = Registry::new();
        let a_id = registry.register_component_type::<A>("A");
        let b_id = registry.register_component_type::<B>("B");
        let mut caches = TupleCacheSet::new();
        let hash = caches.register_tuple(TupleSpec::new(vec![a_id, b_id]));

        let handle = table.create_entity();
        let a_comp = registry.create_component_by_id(a_id).unwrap();
        table.add_component(handle.id(), &a_comp, &registry, &mut caches);
        assert_eq!(caches.get(hash).unwrap().len(), 0);

        // When B is also attached
        let b_comp = registry.create_component_by_id(b_id).unwrap();
        table.add_component(handle.id(), &b_comp, &registry, &mut caches);

        // Then the entity appears in the cache
        assert_eq!(caches.get(hash).unwrap().len(), 1);
        assert!(caches.get(hash).unwrap().view().any(|(id, _)| *id == handle.id()));
    }

    #[test]
    fn removing_a_member_component_evicts_the_entity() {
        let mut table = EntityTable::new(16, 16, 16);
        let registry = Registry::new();
        let a_id = registry.register_component_type::<A>("A");
        let b_id = registry.register_component_type::<B>("B");
        let mut caches = TupleCacheSet::new();
        let hash = caches.register_tuple(TupleSpec::new(vec![a_id, b_id]));

        let handle = table.create_entity();
        let a_comp = registry.create_component_by_id(a_id).unwrap();
        let b_comp = registry.create_component_by_id(b_id).unwrap();
        table.add_component(handle.id(), &a_comp, &registry, &mut caches);
        table.add_component(handle.id(), &b_comp, &registry, &mut caches);
        assert_eq!(caches.get(hash).unwrap().len(), 1);

        table.remove_component(handle.id(), a_id, &registry, &mut caches);

        assert_eq!(caches.get(hash).unwrap().len(), 0);
    }

    #[test]
    fn registering_the_same_spec_twice_is_idempotent() {
        let mut caches = TupleCacheSet::new();
        let registry = Registry::new();
        let a_id = registry.register_component_type::<A>("A");
        let h1 = caches.register_tuple(TupleSpec::new(vec![a_id]));
        let h2 = caches.register_tuple(TupleSpec::new(vec![a_id]));
        assert_eq!(h1, h2);
        assert_eq!(caches.caches.len(), 1);
    }
}
