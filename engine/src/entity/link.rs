use crate::component::ComponentRef;
use crate::entity::EntityId;

/// Sentinel value for "no next link" / "no sentinel payload yet", mirroring
/// "no next link", i.e. `next: u32 or INVALID`.
pub const INVALID_LINK: u32 = u32::MAX;

/// Intrusive entry in a per-entity singly-linked list of attached
/// components. The head link of every entity's list is a permanent
/// sentinel: an empty list has `component_ref: None`, `next: INVALID_LINK`;
/// insertion fills the sentinel's payload first, then chains new links at
/// the tail.
pub struct ComponentLink {
    pub next: u32,
    pub component_ref: Option<ComponentRef>,
}

impl Default for ComponentLink {
    fn default() -> Self {
        ComponentLink {
            next: INVALID_LINK,
            component_ref: None,
        }
    }
}

/// Intrusive entry in a per-entity singly-linked list of children. Same
/// sentinel convention as [`ComponentLink`].
pub struct ChildLink {
    pub next: u32,
    pub child_id: EntityId,
}

impl Default for ChildLink {
    fn default() -> Self {
        ChildLink {
            next: INVALID_LINK,
            child_id: EntityId::INVALID,
        }
    }
}
