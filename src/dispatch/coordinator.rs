use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::dispatch::transitions;
use crate::error::AppError;
use crate::geo;
use crate::models::driver::{Driver, DriverStatus, GeoPoint};
use crate::models::event::{EventKind, NotificationEvent, Target};
use crate::models::ride::{Ride, RideStatus, Role};
use crate::notify::DeliveryReport;
use crate::state::AppState;

/// Caller identity as attached by the external auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RequestRide,
    ReadRide,
    AssignDriver,
    UpdateRideStatus,
    CancelRide,
    UpdateDriver,
    Broadcast,
}

/// Central policy table: role x operation. Ownership checks are layered on
/// top per operation.
fn role_allows(role: Role, op: Operation) -> bool {
    use Operation::*;
    match role {
        Role::Admin => true,
        Role::Passenger => matches!(op, RequestRide | ReadRide | CancelRide),
        Role::Driver => matches!(
            op,
            ReadRide | AssignDriver | UpdateRideStatus | CancelRide | UpdateDriver
        ),
    }
}

fn authorize(caller: &Caller, op: Operation) -> Result<(), AppError> {
    if role_allows(caller.role, op) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "role {:?} may not perform this operation",
            caller.role
        )))
    }
}

/// A ride is visible to its requester, its assigned driver's user, or an
/// admin.
fn ensure_ride_party(state: &AppState, caller: &Caller, ride: &Ride) -> Result<(), AppError> {
    if caller.role == Role::Admin || ride.requester_id == caller.user_id {
        return Ok(());
    }

    if let Some(driver_id) = ride.driver_id {
        if driver_user_id(state, driver_id) == Some(caller.user_id) {
            return Ok(());
        }
    }

    Err(AppError::Unauthorized(
        "not a party to this ride".to_string(),
    ))
}

fn driver_user_id(state: &AppState, driver_id: Uuid) -> Option<Uuid> {
    state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().user_id)
}

#[derive(Debug, Deserialize)]
pub struct RideRequest {
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
    pub route_id: Option<Uuid>,
}

pub async fn request_ride(
    state: &AppState,
    caller: &Caller,
    request: RideRequest,
) -> Result<Ride, AppError> {
    authorize(caller, Operation::RequestRide)?;

    if !request.pickup.is_valid() || !request.destination.is_valid() {
        return Err(AppError::InvalidLocation);
    }

    if let Some(route_id) = request.route_id {
        if !state.routes.exists(route_id).await {
            return Err(AppError::RouteNotFound(route_id));
        }
    }

    let ride = Ride::new(
        caller.user_id,
        request.pickup,
        request.destination,
        request.route_id,
    );
    state.rides.insert(ride.id, ride.clone());

    state.metrics.active_rides.inc();
    state
        .metrics
        .ride_transitions_total
        .with_label_values(&["waiting"])
        .inc();
    info!(ride_id = %ride.id, requester = %ride.requester_id, "ride requested");

    // Broadcast so candidate drivers can self-select.
    let event = NotificationEvent::new(
        EventKind::NewRideRequest,
        vec![Target::Broadcast],
        Some(ride.id),
    )
    .with_payload(json!({
        "ride_id": ride.id,
        "pickup": ride.pickup,
        "destination": ride.destination,
        "route_id": ride.route_id,
    }));
    state.fan_out.notify(&event).await;

    Ok(ride)
}

pub async fn get_ride(state: &AppState, caller: &Caller, ride_id: Uuid) -> Result<Ride, AppError> {
    authorize(caller, Operation::ReadRide)?;

    let ride = state
        .rides
        .get(&ride_id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::RideNotFound(ride_id))?;

    ensure_ride_party(state, caller, &ride)?;
    Ok(ride)
}

pub async fn assign_driver(
    state: &AppState,
    caller: &Caller,
    ride_id: Uuid,
    driver_id: Uuid,
) -> Result<Ride, AppError> {
    authorize(caller, Operation::AssignDriver)?;

    let driver = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::DriverNotFound(driver_id))?;

    // A driver self-selects only for themself.
    if caller.role == Role::Driver && driver.user_id != caller.user_id {
        return Err(AppError::Unauthorized(
            "drivers may only accept rides for themselves".to_string(),
        ));
    }

    // Atomic claim: one non-terminal ride per driver.
    match state.claims.entry(driver_id) {
        Entry::Occupied(_) => {
            state.metrics.assignment_races_lost_total.inc();
            return Err(AppError::DriverUnavailable(driver_id));
        }
        Entry::Vacant(slot) => {
            slot.insert(ride_id);
        }
    }

    // Conditional write: assign only while still waiting. The claim is
    // rolled back if the ride side loses.
    let ride = {
        let mut entry = match state.rides.get_mut(&ride_id) {
            Some(entry) => entry,
            None => {
                state.claims.remove(&driver_id);
                return Err(AppError::RideNotFound(ride_id));
            }
        };

        if entry.status != RideStatus::Waiting {
            drop(entry);
            state.claims.remove(&driver_id);
            state.metrics.assignment_races_lost_total.inc();
            return Err(AppError::RideNotAvailable);
        }

        entry.status = RideStatus::Assigned;
        entry.driver_id = Some(driver_id);
        entry.assigned_at = Some(Utc::now());
        entry.clone()
    };

    state
        .metrics
        .ride_transitions_total
        .with_label_values(&["assigned"])
        .inc();
    info!(ride_id = %ride.id, driver_id = %driver_id, "driver assigned");

    let event = NotificationEvent::new(
        EventKind::DriverAssigned,
        vec![Target::Party {
            role: Role::Passenger,
            id: ride.requester_id,
        }],
        Some(ride.id),
    )
    .with_payload(json!({
        "ride_id": ride.id,
        "driver_id": driver_id,
    }));
    state.fan_out.notify(&event).await;

    Ok(ride)
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: RideStatus,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub duration_seconds: Option<i64>,
    pub reason: Option<String>,
}

pub async fn update_status(
    state: &AppState,
    caller: &Caller,
    ride_id: Uuid,
    update: StatusUpdate,
) -> Result<Ride, AppError> {
    let op = if update.status == RideStatus::Cancelled {
        Operation::CancelRide
    } else {
        Operation::UpdateRideStatus
    };
    authorize(caller, op)?;

    if update.status == RideStatus::Assigned {
        return Err(AppError::BadRequest(
            "assignment goes through the assign operation".to_string(),
        ));
    }

    if let Some(rating) = update.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest("rating must be 1-5".to_string()));
        }
    }

    // Snapshot for the ownership check; legality is re-validated under the
    // entry lock so concurrent transitions serialize.
    let snapshot = state
        .rides
        .get(&ride_id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::RideNotFound(ride_id))?;
    ensure_ride_party(state, caller, &snapshot)?;

    let ride = {
        let mut entry = state
            .rides
            .get_mut(&ride_id)
            .ok_or(AppError::RideNotFound(ride_id))?;

        transitions::validate(entry.status, update.status)?;

        let now = Utc::now();
        entry.status = update.status;
        match update.status {
            RideStatus::PickedUp => entry.picked_up_at = Some(now),
            RideStatus::Completed => {
                entry.ended_at = Some(now);
                entry.rating = update.rating;
                entry.feedback = update.feedback.clone();
                let started = entry.picked_up_at.or(entry.assigned_at);
                entry.duration_seconds = update
                    .duration_seconds
                    .or_else(|| started.map(|t| (now - t).num_seconds()));
            }
            RideStatus::Cancelled => {
                entry.ended_at = Some(now);
                entry.cancelled_by = Some(caller.role);
                entry.cancel_reason = update.reason.clone();
            }
            _ => {}
        }
        entry.clone()
    };

    if ride.status.is_terminal() {
        if let Some(driver_id) = ride.driver_id {
            state.claims.remove_if(&driver_id, |_, held| *held == ride.id);
        }
        state.metrics.active_rides.dec();
    }

    let status_label = match ride.status {
        RideStatus::PickedUp => "picked_up",
        RideStatus::InProgress => "in_progress",
        RideStatus::Completed => "completed",
        RideStatus::Cancelled => "cancelled",
        RideStatus::Waiting => "waiting",
        RideStatus::Assigned => "assigned",
    };
    state
        .metrics
        .ride_transitions_total
        .with_label_values(&[status_label])
        .inc();
    info!(ride_id = %ride.id, status = status_label, "ride status committed");

    // Both parties hear about it, minus whoever triggered it.
    let mut targets = vec![Target::Party {
        role: Role::Passenger,
        id: ride.requester_id,
    }];
    if let Some(driver_id) = ride.driver_id {
        if let Some(user_id) = driver_user_id(state, driver_id) {
            targets.push(Target::Party {
                role: Role::Driver,
                id: user_id,
            });
        }
    }
    targets.retain(|t| !matches!(t, Target::Party { id, .. } if *id == caller.user_id));

    if !targets.is_empty() {
        let event = NotificationEvent::new(EventKind::RideStatusUpdate, targets, Some(ride.id))
            .with_payload(json!({
                "ride_id": ride.id,
                "status": ride.status,
                "cancelled_by": ride.cancelled_by,
                "reason": ride.cancel_reason,
            }));
        state.fan_out.notify(&event).await;
    }

    Ok(ride)
}

pub async fn cancel_ride(
    state: &AppState,
    caller: &Caller,
    ride_id: Uuid,
    reason: Option<String>,
) -> Result<Ride, AppError> {
    update_status(
        state,
        caller,
        ride_id,
        StatusUpdate {
            status: RideStatus::Cancelled,
            rating: None,
            feedback: None,
            duration_seconds: None,
            reason,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct DriverRegistration {
    pub user_id: Uuid,
    pub vehicle_type: Option<String>,
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub verified: bool,
}

/// Onboarding shim for the external account system; admin only.
pub async fn register_driver(
    state: &AppState,
    caller: &Caller,
    registration: DriverRegistration,
) -> Result<Driver, AppError> {
    if caller.role != Role::Admin {
        return Err(AppError::Unauthorized(
            "driver onboarding is admin-only".to_string(),
        ));
    }

    if let Some(route_id) = registration.route_id {
        if !state.routes.exists(route_id).await {
            return Err(AppError::RouteNotFound(route_id));
        }
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        user_id: registration.user_id,
        status: DriverStatus::Active,
        location: None,
        location_updated_at: None,
        route_id: registration.route_id,
        vehicle_type: registration.vehicle_type,
        verified: registration.verified,
    };
    state.drivers.insert(driver.id, driver.clone());

    info!(driver_id = %driver.id, user_id = %driver.user_id, "driver registered");
    Ok(driver)
}

fn ensure_own_driver(caller: &Caller, driver: &Driver) -> Result<(), AppError> {
    if caller.role == Role::Admin || driver.user_id == caller.user_id {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "drivers may only update their own record".to_string(),
        ))
    }
}

pub async fn update_driver_status(
    state: &AppState,
    caller: &Caller,
    driver_id: Uuid,
    status: DriverStatus,
) -> Result<Driver, AppError> {
    authorize(caller, Operation::UpdateDriver)?;

    let driver = {
        let mut entry = state
            .drivers
            .get_mut(&driver_id)
            .ok_or(AppError::DriverNotFound(driver_id))?;
        ensure_own_driver(caller, &entry)?;
        entry.status = status;
        entry.clone()
    };

    Ok(driver)
}

pub async fn update_driver_location(
    state: &AppState,
    caller: &Caller,
    driver_id: Uuid,
    location: GeoPoint,
    ride_id: Option<Uuid>,
) -> Result<Driver, AppError> {
    authorize(caller, Operation::UpdateDriver)?;

    if !location.is_valid() {
        return Err(AppError::InvalidLocation);
    }

    let driver = {
        let mut entry = state
            .drivers
            .get_mut(&driver_id)
            .ok_or(AppError::DriverNotFound(driver_id))?;
        ensure_own_driver(caller, &entry)?;
        entry.location = Some(location);
        entry.location_updated_at = Some(Utc::now());
        entry.clone()
    };

    // Forward to the ride's requester only, never broadcast.
    if let Some(ride_id) = ride_id {
        let ride = state
            .rides
            .get(&ride_id)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::RideNotFound(ride_id))?;

        if ride.driver_id != Some(driver_id) {
            return Err(AppError::BadRequest(
                "driver is not assigned to this ride".to_string(),
            ));
        }

        let event = NotificationEvent::new(
            EventKind::DriverLocationUpdate,
            vec![Target::Party {
                role: Role::Passenger,
                id: ride.requester_id,
            }],
            Some(ride.id),
        )
        .with_payload(json!({
            "ride_id": ride.id,
            "driver_id": driver_id,
            "location": location,
        }));
        state.fan_out.notify(&event).await;
    }

    Ok(driver)
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyDriver {
    #[serde(flatten)]
    pub driver: Driver,
    pub distance_m: f64,
}

pub async fn find_nearby_drivers(
    state: &AppState,
    origin: GeoPoint,
    vehicle_type: Option<&str>,
    radius_m: f64,
) -> Result<Vec<NearbyDriver>, AppError> {
    if !origin.is_valid() {
        return Err(AppError::InvalidLocation);
    }
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(AppError::BadRequest("radius must be positive".to_string()));
    }

    let candidates: Vec<Driver> = state
        .drivers
        .iter()
        .filter_map(|entry| {
            let driver = entry.value();
            let eligible = driver.status == DriverStatus::Active
                && vehicle_type.is_none_or(|wanted| {
                    driver.vehicle_type.as_deref() == Some(wanted)
                });
            eligible.then(|| driver.clone())
        })
        .collect();

    let ranked = geo::nearby(candidates, &origin, radius_m, |d| d.location, |d| d.id);

    Ok(ranked
        .into_iter()
        .map(|n| NearbyDriver {
            driver: n.entity,
            distance_m: n.distance_m,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub struct BroadcastMessage {
    pub message: String,
    pub target: Option<Target>,
}

/// Admin fan-out entry point. Any in-process producer may call
/// `FanOut::notify` directly; this wraps it with the policy check and a
/// correlation id.
pub async fn admin_broadcast(
    state: &AppState,
    caller: &Caller,
    broadcast: BroadcastMessage,
) -> Result<DeliveryReport, AppError> {
    authorize(caller, Operation::Broadcast)?;

    let targets = vec![broadcast.target.unwrap_or(Target::Broadcast)];
    let event = NotificationEvent::new(EventKind::AdminBroadcast, targets, None)
        .with_payload(json!({ "message": broadcast.message }))
        .with_correlation_id();

    Ok(state.fan_out.notify(&event).await)
}
