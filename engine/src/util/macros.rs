//! Tuple-arity helper bounded to eight members — callers needing a
//! [`TupleSpec`](crate::tuple_cache::TupleSpec) over more distinct
//! component types than that are almost certainly modeling something else
//! (a whole archetype, not a query).

use crate::component::{Component, ComponentTypeId};
use crate::registry::Registry;
use crate::tuple_cache::TupleSpec;

/// Implemented for tuples of up to eight [`Component`] types so a tuple
/// spec can be built from a type-level tuple instead of a hand-rolled
/// `Vec<ComponentTypeId>`.
pub trait IntoTupleSpec {
    fn type_ids(registry: &Registry) -> Vec<ComponentTypeId>;
}

macro_rules! impl_into_tuple_spec {
    ($($t:ident),+) => {
        impl<$($t: Component),+> IntoTupleSpec for ($($t,)+) {
            fn type_ids(registry: &Registry) -> Vec<ComponentTypeId> {
                vec![$(
                    registry.id_by_type::<$t>().unwrap_or_else(|| {
                        panic!(
                            "component type {} was never registered",
                            std::any::type_name::<$t>()
                        )
                    })
                ),+]
            }
        }
    };
}

impl_into_tuple_spec!(A);
impl_into_tuple_spec!(A, B);
impl_into_tuple_spec!(A, B, C);
impl_into_tuple_spec!(A, B, C, D);
impl_into_tuple_spec!(A, B, C, D, E);
impl_into_tuple_spec!(A, B, C, D, E, F);
impl_into_tuple_spec!(A, B, C, D, E, F, G);
impl_into_tuple_spec!(A, B, C, D, E, F, G, H);

impl TupleSpec {
    /// Builds a spec from a type-level tuple, e.g.
    /// `TupleSpec::of::<(Position, Velocity)>(&registry)`.
    pub fn of<Tup: IntoTupleSpec>(registry: &Registry) -> TupleSpec {
        TupleSpec::new(Tup::type_ids(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Default)]
    struct Position;
    impl Component for Position {}
    #[derive(Default)]
    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn builds_the_same_spec_as_the_hand_rolled_vec_form() {
        let registry = Registry::new();
        let p = registry.register_component_type::<Position>("Position");
        let v = registry.register_component_type::<Velocity>("Velocity");

        let from_macro = TupleSpec::of::<(Position, Velocity)>(&registry);
        let by_hand = TupleSpec::new(vec![p, v]);

        assert_eq!(from_macro, by_hand);
    }
}
