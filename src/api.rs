//! Free functions over a process-wide default [`Cyre`] instance (§9 "the
//! public API then operates on a default instance"). Embedding applications
//! that need more than one isolated engine should construct [`Cyre`] values
//! directly instead of using this module.

use std::sync::OnceLock;

use crate::action::ActionConfig;
use crate::engine::Cyre;
use crate::response::{ActionOutcome, ChannelMetricsReport, InitResponse, Response, SystemMetricsReport};
use crate::subscriber::SharedHandler;
use crate::types::{ActionId, Payload};

static DEFAULT_ENGINE: OnceLock<Cyre> = OnceLock::new();

fn default_engine() -> &'static Cyre {
    DEFAULT_ENGINE.get_or_init(Cyre::default)
}

pub async fn init() -> InitResponse {
    default_engine().init().await
}

pub fn action(config: ActionConfig) -> ActionOutcome {
    default_engine().action(config)
}

pub fn on(id: impl Into<ActionId>, handler: SharedHandler) {
    default_engine().on(id, handler);
}

pub async fn call(id: impl Into<ActionId>, payload: Option<Payload>) -> Response {
    default_engine().call(id, payload).await
}

pub fn forget(id: impl Into<ActionId>) -> bool {
    default_engine().forget(id)
}

pub fn pause(id: Option<&str>) {
    default_engine().pause(id);
}

pub fn resume(id: Option<&str>) {
    default_engine().resume(id);
}

pub fn lock() {
    default_engine().lock();
}

pub fn unlock() {
    default_engine().unlock();
}

pub fn get(id: impl Into<ActionId>) -> Option<Payload> {
    default_engine().get(id)
}

pub fn get_previous(id: impl Into<ActionId>) -> Option<Payload> {
    default_engine().get_previous(id)
}

pub fn has_changed(id: impl Into<ActionId>, payload: &Payload) -> bool {
    default_engine().has_changed(id, payload)
}

pub fn clear() {
    default_engine().clear();
}

pub fn reset() {
    default_engine().reset();
}

pub fn shutdown() {
    default_engine().shutdown();
}

pub fn status() -> bool {
    default_engine().status()
}

pub fn get_channel_metrics(id: impl Into<ActionId>) -> Option<ChannelMetricsReport> {
    default_engine().get_channel_metrics(id)
}

pub fn get_system_metrics() -> SystemMetricsReport {
    default_engine().get_system_metrics()
}
