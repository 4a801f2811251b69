use std::sync::Arc;

use courier_events::EventBus;
use courier_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: courier_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub pipeline: Pipeline,
    /// Settings-change notifications (audit cache invalidation).
    pub event_bus: Arc<EventBus>,
}
