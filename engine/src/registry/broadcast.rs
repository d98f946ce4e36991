/// Handle returned by [`Broadcast::bind`], used to `unbind` a specific
/// listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingId(u32);

/// A reentrancy-safe multicast channel.
///
/// Grounded on the source's `MulticastDelegate`: `unbind`/`unbind_all`
/// called from inside a listener (while `broadcast` is iterating bindings)
/// defer their effect until the broadcast completes, rather than mutating
/// the binding list mid-iteration. Bindings run in registration order.
pub struct Broadcast<Args> {
    next_id: u32,
    bindings: Vec<(u32, Box<dyn Fn(Args)>)>,
    is_broadcasting: bool,
    pending_unbind_all: bool,
    pending_unbind: Vec<u32>,
}

impl<Args> Default for Broadcast<Args> {
    fn default() -> Self {
        Broadcast {
            next_id: 0,
            bindings: Vec::new(),
            is_broadcasting: false,
            pending_unbind_all: false,
            pending_unbind: Vec::new(),
        }
    }
}

impl<Args: Clone> Broadcast<Args> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, listener: impl Fn(Args) + 'static) -> BindingId {
        let id = self.next_id;
        self.next_id += 1;
        self.bindings.push((id, Box::new(listener)));
        BindingId(id)
    }

    pub fn unbind(&mut self, binding: BindingId) {
        if self.is_broadcasting {
            self.pending_unbind.push(binding.0);
        } else {
            self.bindings.retain(|(id, _)| *id != binding.0);
        }
    }

    pub fn unbind_all(&mut self) {
        if self.is_broadcasting {
            self.pending_unbind_all = true;
        } else {
            self.bindings.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn broadcast(&mut self, args: Args) {
        self.is_broadcasting = true;
        for (_, listener) in &self.bindings {
            listener(args.clone());
        }
        self.is_broadcasting = false;
        self.apply_deferred();
    }

    fn apply_deferred(&mut self) {
        if self.pending_unbind_all {
            self.bindings.clear();
            self.pending_unbind_all = false;
            self.pending_unbind.clear();
            return;
        }
        if !self.pending_unbind.is_empty() {
            let ids = std::mem::take(&mut self.pending_unbind);
            self.bindings.retain(|(id, _)| !ids.contains(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn bindings_run_in_registration_order() {
        // Given three listeners appending their index to a shared log
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ch: Broadcast<i32> = Broadcast::new();
        for i in 0..3 {
            let log = Rc::clone(&log);
            ch.bind(move |_| log.borrow_mut().push(i));
        }
        // When broadcasting once
        ch.broadcast(1);
        // Then they ran in bind order
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn unbind_all_during_broadcast_is_deferred() {
        // Given a channel whose single listener unbinds everything reentrantly
        let calls = Rc::new(RefCell::new(0));
        let mut ch: Broadcast<i32> = Broadcast::new();
        let calls_inner = Rc::clone(&calls);
        // We can't call ch.unbind_all() from inside the closure without a
        // shared handle to `ch` itself, so this test exercises the
        // lower-level contract directly: is_broadcasting prevents immediate
        // mutation, and apply_deferred runs it after.
        ch.bind(move |_| *calls_inner.borrow_mut() += 1);
        ch.is_broadcasting = true;
        ch.unbind_all();
        assert!(ch.pending_unbind_all);
        assert_eq!(ch.bindings.len(), 1, "bindings untouched while broadcasting");
        ch.is_broadcasting = false;
        ch.apply_deferred();
        assert!(ch.bindings.is_empty());
    }

    #[test]
    fn unbind_outside_broadcast_is_immediate() {
        let mut ch: Broadcast<i32> = Broadcast::new();
        let id = ch.bind(|_| {});
        assert_eq!(ch.len(), 1);
        ch.unbind(id);
        assert_eq!(ch.len(), 0);
    }
}
