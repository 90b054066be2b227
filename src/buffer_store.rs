//! Ephemeral scratch for in-flight debounce/buffer windows (spec.md §4.D).
//! Entries exist only while a timer is pending for that id; they are cleared
//! synchronously when the timer fires or the channel is forgotten (§3
//! invariant 6).

use dashmap::DashMap;

use crate::types::{ActionId, Payload};

enum Slot {
    Single(Payload),
    Ordered(Vec<Payload>),
}

#[derive(Default)]
pub struct BufferStore {
    slots: DashMap<ActionId, Slot>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite strategy / debounce: replaces whatever was buffered.
    pub fn set(&self, id: &ActionId, payload: Payload) {
        self.slots.insert(id.clone(), Slot::Single(payload));
    }

    /// Append strategy: preserves arrival order within the window (§5
    /// "Ordering guarantees": "For buffer with `append`, order within the
    /// window is preserved").
    pub fn append(&self, id: &ActionId, payload: Payload) {
        self.slots
            .entry(id.clone())
            .and_modify(|slot| match slot {
                Slot::Ordered(items) => items.push(payload.clone()),
                Slot::Single(existing) => {
                    *slot = Slot::Ordered(vec![existing.clone(), payload.clone()]);
                }
            })
            .or_insert_with(|| Slot::Ordered(vec![payload]));
    }

    /// Returns the single buffered payload (overwrite strategy / debounce).
    pub fn get_single(&self, id: &ActionId) -> Option<Payload> {
        self.slots.get(id).and_then(|s| match &*s {
            Slot::Single(p) => Some(p.clone()),
            Slot::Ordered(items) => items.last().cloned(),
        })
    }

    /// Returns the accumulated ordered list (append strategy).
    pub fn get_ordered(&self, id: &ActionId) -> Vec<Payload> {
        self.slots
            .get(id)
            .map(|s| match &*s {
                Slot::Ordered(items) => items.clone(),
                Slot::Single(p) => vec![p.clone()],
            })
            .unwrap_or_default()
    }

    pub fn has_pending(&self, id: &ActionId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn forget(&self, id: &ActionId) {
        self.slots.remove(id);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_preserves_arrival_order() {
        let store = BufferStore::new();
        let id = ActionId::new("b");
        store.append(&id, Payload::from(json!(1)));
        store.append(&id, Payload::from(json!(2)));
        store.append(&id, Payload::from(json!(3)));
        assert_eq!(
            store.get_ordered(&id),
            vec![
                Payload::from(json!(1)),
                Payload::from(json!(2)),
                Payload::from(json!(3)),
            ]
        );
    }

    #[test]
    fn overwrite_keeps_only_latest() {
        let store = BufferStore::new();
        let id = ActionId::new("d");
        store.set(&id, Payload::from(json!(1)));
        store.set(&id, Payload::from(json!(2)));
        assert_eq!(store.get_single(&id), Some(Payload::from(json!(2))));
    }
}
