use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ride::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewRideRequest,
    DriverAssigned,
    RideStatusUpdate,
    DriverLocationUpdate,
    AdminBroadcast,
}

/// Resolved delivery target. `Broadcast` reaches every connected client on
/// the live channel and is never persisted per-user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Target {
    Broadcast,
    Party { role: Role, id: Uuid },
}

/// Payload handed to the fan-out on every accepted transition. Transient;
/// the persisted form is `NotificationRecord`.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub targets: Vec<Target>,
    pub ride_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub correlation_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(kind: EventKind, targets: Vec<Target>, ride_id: Option<Uuid>) -> Self {
        Self {
            kind,
            targets,
            ride_id,
            payload: serde_json::Value::Null,
            correlation_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Admin- and system-initiated messages carry a correlation id so the
    /// same logical message arriving on several channels can be deduplicated
    /// by the receiving client.
    pub fn with_correlation_id(mut self) -> Self {
        self.correlation_id = Some(Uuid::new_v4());
        self
    }
}

/// Durable record written through the persisted-notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub target_id: Uuid,
    pub kind: EventKind,
    pub ride_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub correlation_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
