//! Pure functions over [`EntityTable`] that keep `hierarchy_depth` and
//! `activated` consistent whenever parentage, `enabled`, or activation
//! state changes. Kept outside `EntityTable` itself since both
//! recurse into children and need a `&Registry` to notify attached
//! components of the activation change.

use crate::entity::{EntityId, EntityTable, INVALID_DEPTH};
use crate::registry::Registry;

/// Recomputes whether `entity` should be considered active: either forced
/// (root-of-a-newly-built-tree case) or `enabled && parent.activated`.
/// Recurses into children only when the computed state actually changes,
/// and notifies every attached component's storage either way when it
/// does.
pub fn refresh_activation(table: &mut EntityTable, entity: EntityId, force_activate: bool, registry: &Registry) {
    let (enabled, parent_id, was_activated) = {
        let record = table.record(entity);
        (record.enabled, record.parent_id, record.activated)
    };
    let parent_activated = parent_id.is_valid() && table.record(parent_id).activated;
    let should_activate = force_activate || (enabled && parent_activated);

    if should_activate == was_activated {
        return;
    }

    table.record_mut(entity).activated = should_activate;
    if force_activate {
        refresh_hierarchy_depth(table, entity, parent_id, true);
    }

    for comp_ref in table.iterate_components(entity).collect::<Vec<_>>() {
        registry.refresh_component_activation(&comp_ref, enabled, should_activate);
    }

    log::debug!("entity {:?} activation -> {}", entity, should_activate);

    for child in table.iterate_children(entity).collect::<Vec<_>>() {
        refresh_activation(table, child, false, registry);
    }
}

/// Recomputes `entity.hierarchy_depth` from `new_parent` and reparents it.
/// `build_new_tree` makes an otherwise-unparented (or not-yet-activated)
/// entity the root of a fresh depth-0 tree rather than leaving its depth
/// invalid; used only from the forced-activation path in
/// [`refresh_activation`] and from `EntityTable::add_child`/`remove_child`.
pub fn refresh_hierarchy_depth(table: &mut EntityTable, entity: EntityId, new_parent: EntityId, build_new_tree: bool) {
    let parent_depth = if new_parent.is_valid() {
        let parent = table.record(new_parent);
        parent.activated.then_some(parent.hierarchy_depth)
    } else {
        None
    };
    let new_depth = match parent_depth {
        Some(depth) => depth.saturating_add(1),
        None if build_new_tree => 0,
        None => INVALID_DEPTH,
    };

    {
        let record = table.record_mut(entity);
        record.hierarchy_depth = new_depth;
        record.parent_id = new_parent;
    }

    for child in table.iterate_children(entity).collect::<Vec<_>>() {
        refresh_hierarchy_depth(table, child, entity, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::registry::Registry;
    use crate::tuple_cache::TupleCacheSet;

    #[derive(Default)]
    struct Marker;
    impl Component for Marker {}

    #[test]
    fn activating_root_cascades_depth_and_activation_to_descendants() {
        // Given a grandparent/parent/child chain, all initially inactive
        let mut table = EntityTable::new(16, 16, 16);
        let registry = Registry::new();
        let _caches = TupleCacheSet::new();

        let root = table.create_entity();
        let mid = table.create_entity();
        let leaf = table.create_entity();
        table.add_child(root.id(), mid.id(), &registry);
        table.add_child(mid.id(), leaf.id(), &registry);

        assert!(!table.record(leaf.id()).activated);

        // When the root is force-activated
        refresh_activation(&mut table, root.id(), true, &registry);

        // Then the whole chain activates with strictly increasing depth
        assert!(table.record(root.id()).activated);
        assert!(table.record(mid.id()).activated);
        assert!(table.record(leaf.id()).activated);
        assert_eq!(table.record(root.id()).hierarchy_depth, 0);
        assert_eq!(table.record(mid.id()).hierarchy_depth, 1);
        assert_eq!(table.record(leaf.id()).hierarchy_depth, 2);
    }

    #[test]
    fn disabling_parent_deactivates_children_without_changing_depth_field_directly() {
        let mut table = EntityTable::new(16, 16, 16);
        let registry = Registry::new();

        let root = table.create_entity();
        let child = table.create_entity();
        table.add_child(root.id(), child.id(), &registry);
        refresh_activation(&mut table, root.id(), true, &registry);
        assert!(table.record(child.id()).activated);

        table.set_enabled(root.id(), false, &registry);

        assert!(!table.record(root.id()).activated);
        assert!(!table.record(child.id()).activated);
    }
}
