use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Waiting,
    Assigned,
    PickedUp,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

/// Role of an acting party, as attached by the auth middleware.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
    pub status: RideStatus,
    pub requested_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<Role>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub duration_seconds: Option<i64>,
}

impl Ride {
    pub fn new(
        requester_id: Uuid,
        pickup: GeoPoint,
        destination: GeoPoint,
        route_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            driver_id: None,
            route_id,
            pickup,
            destination,
            status: RideStatus::Waiting,
            requested_at: Utc::now(),
            assigned_at: None,
            picked_up_at: None,
            ended_at: None,
            cancel_reason: None,
            cancelled_by: None,
            rating: None,
            feedback: None,
            duration_seconds: None,
        }
    }
}
