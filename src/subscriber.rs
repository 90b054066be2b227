//! The Subscriber Table (spec.md §4.E): one handler per channel id, with a
//! replace-and-warn policy when a second `on()` targets the same id.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;

use crate::events::{EventLevel, SensorEvent, SharedSink};
use crate::types::{ActionId, Payload};

/// What a handler returns (§4.E, §9 "Intra-link recognition"). A handler may
/// resolve a plain payload, or it may return the `{ id, payload }` shape that
/// the dispatcher recognizes as an intra-link request into another channel.
///
/// The spec leaves the exact recognition mechanism as an open question
/// between a tagged variant and structural duck-typing on the returned JSON
/// shape; this crate keeps the handler's return type a plain [`Payload`] and
/// lets the dispatcher do the structural recognition against the raw JSON
/// value, matching the behavior spec.md §9 describes as currently in place
/// (see DESIGN.md).
pub type HandlerResult = Payload;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered consumer (§4.E). Implementors receive the payload that
/// survived the protection pipeline and produce a [`HandlerResult`].
pub trait Handler: Send + Sync {
    fn handle(&self, payload: Payload) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, payload: Payload) -> HandlerFuture {
        Box::pin((self)(payload))
    }
}

pub type SharedHandler = Arc<dyn Handler>;

#[derive(Default)]
pub struct SubscriberTable {
    handlers: DashMap<ActionId, SharedHandler>,
}

impl SubscriberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.E `on(id, handler)`: registers a handler, replacing and warning if
    /// one already exists for `id` (exactly one handler may be bound per
    /// channel at a time).
    pub fn on(&self, id: &ActionId, handler: SharedHandler, sink: &SharedSink) {
        if self.handlers.insert(id.clone(), handler).is_some() {
            sink.emit(SensorEvent::action(
                EventLevel::Warn,
                id.clone(),
                "subscriber-replaced",
            ));
        }
    }

    pub fn get(&self, id: &ActionId) -> Option<SharedHandler> {
        self.handlers.get(id).map(|h| h.clone())
    }

    pub fn has(&self, id: &ActionId) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn forget(&self, id: &ActionId) {
        self.handlers.remove(id);
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }
}
