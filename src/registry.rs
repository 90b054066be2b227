//! The Action Registry (spec.md §4.B): `id → Action` plus a prefix index over
//! `path`. Insert replaces the prior entry in place so a recompiled pipeline
//! is visible on the very next call without a second lookup.

use dashmap::DashMap;

use crate::action::CompiledAction;
use crate::buffer_store::BufferStore;
use crate::payload_store::PayloadStore;
use crate::subscriber::SubscriberTable;
use crate::timer::TimerWheel;
use crate::types::{ActionId, ActionPath};

#[derive(Default)]
pub struct ActionRegistry {
    actions: DashMap<ActionId, CompiledAction>,
    /// `path -> ids registered under it`, supporting both the exact-match
    /// lookup and an O(depth) prefix traversal (§4.B).
    paths: DashMap<ActionPath, Vec<ActionId>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the action, recomputing the path index (§3
    /// lifecycle: "Replaced in place on re-registration with same id").
    pub fn insert(&self, action: CompiledAction) {
        if let Some(old) = self.actions.get(&action.id) {
            if let Some(old_path) = &old.path {
                self.remove_from_path_index(old_path, &action.id);
            }
        }
        if let Some(path) = &action.path {
            self.paths
                .entry(path.clone())
                .or_default()
                .push(action.id.clone());
        }
        self.actions.insert(action.id.clone(), action);
    }

    pub fn get(&self, id: &ActionId) -> Option<CompiledAction> {
        self.actions.get(id).map(|a| a.clone())
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id)
    }

    /// §4.B: removes the registry entry and cancels any timers namespaced
    /// under this id (`debounce-<id>`, `buffer-<id>`, `interval-<id>` and its
    /// `-delay` pre-timer), plus the Payload/Buffer/Subscriber entries, in
    /// one step.
    pub fn forget(
        &self,
        id: &ActionId,
        timers: &TimerWheel,
        payloads: &PayloadStore,
        buffers: &BufferStore,
        subscribers: &SubscriberTable,
    ) -> bool {
        let removed = if let Some((_, action)) = self.actions.remove(id) {
            if let Some(path) = &action.path {
                self.remove_from_path_index(path, id);
            }
            true
        } else {
            false
        };

        timers.forget(&id.debounce_timer_id());
        timers.forget(&id.buffer_timer_id());
        timers.forget(&id.interval_timer_id());
        timers.forget(&format!("{}-delay", id.interval_timer_id()));
        payloads.forget(id);
        buffers.forget(id);
        subscribers.forget(id);

        removed
    }

    /// All registered ids, for external collaborators that need to traverse
    /// the whole registry (§6 "A snapshot collaborator MAY serialize
    /// `{ id -> current payload }` by traversing the Registry and Payload
    /// Store").
    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Exact-match plus descendant ids under `prefix` in the `/` hierarchy.
    pub fn ids_under(&self, prefix: &ActionPath) -> Vec<ActionId> {
        let mut out = Vec::new();
        for entry in self.paths.iter() {
            if entry.key().starts_with(prefix) {
                out.extend(entry.value().iter().cloned());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&self) {
        self.actions.clear();
        self.paths.clear();
    }

    fn remove_from_path_index(&self, path: &ActionPath, id: &ActionId) {
        if let Some(mut ids) = self.paths.get_mut(path) {
            ids.retain(|existing| existing != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionConfig;

    #[test]
    fn reinserting_same_id_replaces_in_place() {
        let registry = ActionRegistry::new();
        let a1 = ActionConfig::new("x").compile().unwrap();
        registry.insert(a1);
        assert_eq!(registry.len(), 1);

        let a2 = ActionConfig::new("x").compile().unwrap();
        registry.insert(a2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn prefix_index_finds_descendants() {
        let registry = ActionRegistry::new();
        registry.insert(
            ActionConfig::new("a")
                .path("app/users")
                .compile()
                .unwrap(),
        );
        registry.insert(
            ActionConfig::new("b")
                .path("app/users/create")
                .compile()
                .unwrap(),
        );
        registry.insert(ActionConfig::new("c").path("app/orders").compile().unwrap());

        let under_users = registry.ids_under(&ActionPath::new("app/users"));
        assert_eq!(under_users.len(), 2);
    }
}
