//! Priority-ordered system scheduling.

pub mod registry;

pub use registry::{SystemId, SystemRegistry};

use std::any::TypeId;

use crate::engine::Engine;

/// One unit of per-tick behavior. Higher `priority()` values run first;
/// ties preserve registration order (a stable sort).
pub trait System: 'static {
    fn priority(&self) -> i32 {
        100
    }

    /// Systems marked thread-safe are the ones a future parallel scheduler
    /// would be allowed to run off the main thread; this crate's
    /// scheduler is single-threaded throughout, so the flag is
    /// advisory only today.
    fn thread_safe(&self) -> bool {
        false
    }

    /// Component types this system reads or writes, for a future scheduler
    /// to use when deciding which systems may run concurrently. Unused by
    /// the single-threaded scheduler today; defaults to none.
    fn dependencies(&self) -> &[TypeId] {
        &[]
    }

    fn init(&mut self, engine: &mut Engine) {
        let _ = engine;
    }

    fn update(&mut self, engine: &mut Engine);

    fn destroy(&mut self, engine: &mut Engine) {
        let _ = engine;
    }

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
