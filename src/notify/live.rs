use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::notify::DeliveryError;

/// Live-channel capability injected into the fan-out so tests can fake it.
/// Implementations deliver only to targets with an open connection.
#[async_trait]
pub trait LiveChannelRegistry: Send + Sync {
    async fn push_to(&self, user_id: Uuid, payload: String) -> Result<(), DeliveryError>;

    async fn broadcast(&self, payload: String) -> Result<(), DeliveryError>;
}

/// Connection map backing the websocket endpoint: one bounded lane per
/// attached user plus a shared broadcast lane for untargeted events.
pub struct WsChannelRegistry {
    connections: DashMap<Uuid, mpsc::Sender<String>>,
    broadcast_tx: broadcast::Sender<String>,
    lane_capacity: usize,
}

impl WsChannelRegistry {
    pub fn new(event_buffer_size: usize) -> Self {
        let (broadcast_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        Self {
            connections: DashMap::new(),
            broadcast_tx,
            lane_capacity: event_buffer_size,
        }
    }

    /// Registers a user's connection, replacing any previous one.
    pub fn attach(&self, user_id: Uuid) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.lane_capacity);
        self.connections.insert(user_id, tx);
        rx
    }

    pub fn detach(&self, user_id: Uuid) {
        self.connections.remove(&user_id);
    }

    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    pub fn connected(&self) -> usize {
        self.connections.len()
    }
}

#[async_trait]
impl LiveChannelRegistry for WsChannelRegistry {
    async fn push_to(&self, user_id: Uuid, payload: String) -> Result<(), DeliveryError> {
        let sender = match self.connections.get(&user_id) {
            Some(entry) => entry.value().clone(),
            None => return Err(DeliveryError::NoConnection),
        };

        sender
            .send(payload)
            .await
            .map_err(|_| DeliveryError::Channel("live lane closed".to_string()))
    }

    async fn broadcast(&self, payload: String) -> Result<(), DeliveryError> {
        // A send error only means nobody is subscribed right now.
        let _ = self.broadcast_tx.send(payload);
        Ok(())
    }
}
