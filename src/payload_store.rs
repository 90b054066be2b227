//! Current/previous payload slices (spec.md §4.C). Only the dispatcher
//! writes here, and only after a successful handler invocation, committing
//! the payload the handler actually observed (§3 invariant 4).

use dashmap::DashMap;

use crate::types::{ActionId, Payload};

#[derive(Clone, Default)]
struct Slot {
    current: Option<Payload>,
    previous: Option<Payload>,
}

#[derive(Default)]
pub struct PayloadStore {
    slots: DashMap<ActionId, Slot>,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store at registration time (§4.G "Registry insert →
    /// Payload Store seed").
    pub fn seed(&self, id: &ActionId, payload: Option<Payload>) {
        self.slots.insert(
            id.clone(),
            Slot {
                current: payload,
                previous: None,
            },
        );
    }

    /// Commits a successful handler invocation's payload (§3 invariants 4-5):
    /// current becomes `payload`, previous becomes whatever current was.
    pub fn commit(&self, id: &ActionId, payload: Payload) {
        let mut entry = self.slots.entry(id.clone()).or_default();
        let previous = entry.current.take();
        entry.previous = previous;
        entry.current = Some(payload);
    }

    pub fn current(&self, id: &ActionId) -> Option<Payload> {
        self.slots.get(id).and_then(|s| s.current.clone())
    }

    pub fn previous(&self, id: &ActionId) -> Option<Payload> {
        self.slots.get(id).and_then(|s| s.previous.clone())
    }

    /// §4.C `hasChanged`: true iff the current slice is absent or
    /// structurally unequal to `payload`.
    pub fn has_changed(&self, id: &ActionId, payload: &Payload) -> bool {
        match self.slots.get(id).and_then(|s| s.current.clone()) {
            None => true,
            Some(current) => &current != payload,
        }
    }

    pub fn forget(&self, id: &ActionId) {
        self.slots.remove(id);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}
