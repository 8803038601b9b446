use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::models::driver::Driver;
use crate::models::ride::Ride;
use crate::notify::live::WsChannelRegistry;
use crate::notify::push::{LoggingPushGateway, PushGateway};
use crate::notify::store::{InMemoryNotificationStore, NotificationStore};
use crate::notify::FanOut;
use crate::observability::metrics::Metrics;
use crate::routes::{InMemoryRouteCatalog, RouteCatalog};

pub struct AppState {
    pub rides: DashMap<Uuid, Ride>,
    pub drivers: DashMap<Uuid, Driver>,
    /// Active ride claim per driver (driver id -> ride id). The `entry` API
    /// on this map is the atomic test-and-set behind assignment.
    pub claims: DashMap<Uuid, Uuid>,
    pub routes: Arc<dyn RouteCatalog>,
    pub live: Arc<WsChannelRegistry>,
    pub notifications: Arc<dyn NotificationStore>,
    pub fan_out: FanOut,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryNotificationStore::new()),
            Arc::new(LoggingPushGateway::new()),
            Arc::new(InMemoryRouteCatalog::new()),
        )
    }

    /// Collaborator-injecting constructor, used by tests to fake the
    /// notification store, push gateway, or route catalog.
    pub fn with_collaborators(
        config: &Config,
        notifications: Arc<dyn NotificationStore>,
        push: Arc<dyn PushGateway>,
        routes: Arc<dyn RouteCatalog>,
    ) -> Self {
        let metrics = Metrics::new();
        let live = Arc::new(WsChannelRegistry::new(config.event_buffer_size));

        let fan_out = FanOut::new(
            live.clone(),
            notifications.clone(),
            push,
            Duration::from_millis(config.delivery_timeout_ms),
            metrics.clone(),
        );

        Self {
            rides: DashMap::new(),
            drivers: DashMap::new(),
            claims: DashMap::new(),
            routes,
            live,
            notifications,
            fan_out,
            metrics,
        }
    }
}
