use crate::engine::Engine;
use crate::system::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(u32);

struct Entry {
    id: SystemId,
    system: Box<dyn System>,
    priority: i32,
}

/// Priority-ordered collection of [`System`]s. `add_system`/`remove_system`
/// called from inside a system's own `update` are staged rather than
/// applied immediately, so a system can safely add or remove systems
/// (including itself) mid-tick without invalidating the in-progress
/// iteration: a system moves `Staged → Initialized → (Active)* →
/// Destroying → Gone`.
pub struct SystemRegistry {
    next_id: u32,
    active: Vec<Entry>,
    pending_add: Vec<Entry>,
    pending_remove: Vec<SystemId>,
    priority_dirty: bool,
    updating: bool,
}

impl SystemRegistry {
    pub fn new() -> Self {
        SystemRegistry {
            next_id: 0,
            active: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            priority_dirty: false,
            updating: false,
        }
    }

    /// Stages `system` for insertion. It becomes `Active` (after its
    /// `init` call) either immediately, if called between ticks, or at
    /// the start of the next `update` if called from inside one.
    pub fn add_system(&mut self, system: Box<dyn System>) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        let priority = system.priority();
        let entry = Entry { id, system, priority };
        if self.updating {
            self.pending_add.push(entry);
        } else {
            self.insert_sorted(entry);
        }
        id
    }

    /// Stages `id` for removal. Its `destroy` runs either immediately, if
    /// called between ticks, or after the in-progress update finishes.
    pub fn remove_system(&mut self, id: SystemId, engine: &mut Engine) {
        if self.updating {
            self.pending_remove.push(id);
            return;
        }
        if let Some(pos) = self.active.iter().position(|e| e.id == id) {
            let mut entry = self.active.remove(pos);
            entry.system.destroy(engine);
        }
    }

    /// Marks the active list for re-sorting the next time `update` runs —
    /// call after a system's `priority()` would now return something
    /// different.
    pub fn notify_priority_changed(&mut self) {
        self.priority_dirty = true;
    }

    pub fn get<T: System>(&self) -> Option<&T> {
        self.active
            .iter()
            .find_map(|e| e.system.as_any().downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn insert_sorted(&mut self, entry: Entry) {
        let pos = self
            .active
            .iter()
            .position(|e| e.priority < entry.priority)
            .unwrap_or(self.active.len());
        self.active.insert(pos, entry);
    }

    /// Runs one tick: flushes staged additions (calling `init` on each),
    /// re-sorts if priorities changed, calls `update` on every active
    /// system in descending-priority order, then flushes staged removals
    /// (calling `destroy` on each).
    pub fn update(&mut self, engine: &mut Engine) {
        for mut entry in std::mem::take(&mut self.pending_add) {
            entry.system.init(engine);
            self.insert_sorted(entry);
        }

        if self.priority_dirty {
            self.active.sort_by_key(|e| std::cmp::Reverse(e.priority));
            self.priority_dirty = false;
        }

        self.updating = true;
        for entry in &mut self.active {
            entry.system.update(engine);
        }
        self.updating = false;

        for id in std::mem::take(&mut self.pending_remove) {
            if let Some(pos) = self.active.iter().position(|e| e.id == id) {
                let mut entry = self.active.remove(pos);
                entry.system.destroy(engine);
            }
        }
    }

    /// Tears down every active and pending system, in priority order.
    pub fn destroy_all(&mut self, engine: &mut Engine) {
        self.pending_add.clear();
        self.pending_remove.clear();
        for mut entry in std::mem::take(&mut self.active) {
            entry.system.destroy(engine);
        }
    }

    /// Swaps out this registry's real contents for an empty placeholder
    /// that defers every `add_system`/`remove_system` call it receives,
    /// keeping the id counter continuous. Used by
    /// [`crate::engine::Engine::tick`] to call `update` on `self` while
    /// still handing systems a `&mut Engine` that structurally can't
    /// alias the list currently being iterated.
    pub(crate) fn take_for_update(&mut self) -> SystemRegistry {
        let mut placeholder = SystemRegistry::new();
        placeholder.next_id = self.next_id;
        placeholder.updating = true;
        std::mem::replace(self, placeholder)
    }

    /// Folds whatever a placeholder produced by [`take_for_update`] staged
    /// during the window back into `self`, the restored real registry.
    pub(crate) fn merge_staged_from(&mut self, mut placeholder: SystemRegistry) {
        self.next_id = self.next_id.max(placeholder.next_id);
        self.pending_add.append(&mut placeholder.pending_add);
        self.pending_remove.append(&mut placeholder.pending_remove);
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        log: Rc<RefCell<Vec<&'static str>>>,
        priority: i32,
        name: &'static str,
    }
    impl System for Recording {
        fn priority(&self) -> i32 {
            self.priority
        }
        fn update(&mut self, _engine: &mut Engine) {
            self.log.borrow_mut().push(self.name);
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn systems_run_in_descending_priority_order() {
        // Given three systems registered out of priority order
        let mut engine = Engine::new(EngineConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        engine.systems_mut().add_system(Box::new(Recording {
            log: Rc::clone(&log),
            priority: 50,
            name: "mid",
        }));
        engine.systems_mut().add_system(Box::new(Recording {
            log: Rc::clone(&log),
            priority: 10,
            name: "first",
        }));
        engine.systems_mut().add_system(Box::new(Recording {
            log: Rc::clone(&log),
            priority: 90,
            name: "last",
        }));

        // When ticking once
        engine.tick();

        // Then they ran highest-priority-first
        assert_eq!(*log.borrow(), vec!["last", "mid", "first"]);
    }

    #[test]
    fn adding_a_system_mid_update_stages_it_for_next_tick() {
        let mut engine = Engine::new(EngineConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        struct Spawner {
            log: Rc<RefCell<Vec<&'static str>>>,
            spawned: bool,
        }
        impl System for Spawner {
            fn update(&mut self, engine: &mut Engine) {
                self.log.borrow_mut().push("spawner");
                if !self.spawned {
                    self.spawned = true;
                    let log = Rc::clone(&self.log);
                    engine.systems_mut().add_system(Box::new(Recording { log, priority: 1, name: "spawned" }));
                }
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        engine.systems_mut().add_system(Box::new(Spawner { log: Rc::clone(&log), spawned: false }));

        engine.tick();
        assert_eq!(*log.borrow(), vec!["spawner"]);

        // The spawned system's priority (1) is lower than the spawner's
        // default priority (100), so it runs after the spawner once active.
        engine.tick();
        assert_eq!(*log.borrow(), vec!["spawner", "spawner", "spawned"]);
    }
}
