use std::fmt;

/// Errors surfaced at the trust boundary: lookups keyed by caller-supplied
/// names or raw ids that a well-formed internal caller can never get wrong,
/// but an external caller (deserializing a save file, parsing a config)
/// can. Everything else — `get_component` on a possibly-absent component,
/// `Broadcast::unbind` on an already-gone binding — returns `Option`/is a
/// silent no-op instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    UnknownComponentName(String),
    UnknownComponentTypeId(u8),
    TupleNotRegistered,
    DuplicateComponentName(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::UnknownComponentName(name) => {
                write!(f, "no component type is registered under the name '{name}'")
            }
            EcsError::UnknownComponentTypeId(id) => {
                write!(f, "no component type is registered with type-id {id}")
            }
            EcsError::TupleNotRegistered => {
                write!(f, "the requested tuple spec was never registered")
            }
            EcsError::DuplicateComponentName(name) => {
                write!(f, "a component type is already registered under the name '{name}'")
            }
        }
    }
}

impl std::error::Error for EcsError {}
