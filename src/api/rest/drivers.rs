use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::dispatch::coordinator::{self, Caller, DriverRegistration, NearbyDriver};
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver))
        .route("/drivers/nearby", get(find_nearby))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/status", patch(update_status))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<DriverRegistration>,
) -> Result<Json<Driver>, AppError> {
    let driver = coordinator::register_driver(&state, &caller, payload).await?;
    Ok(Json(driver))
}

#[derive(Deserialize)]
struct NearbyQuery {
    lat: f64,
    lng: f64,
    radius_m: f64,
    vehicle_type: Option<String>,
}

async fn find_nearby(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyDriver>>, AppError> {
    let origin = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    let nearby = coordinator::find_nearby_drivers(
        &state,
        origin,
        query.vehicle_type.as_deref(),
        query.radius_m,
    )
    .await?;
    Ok(Json(nearby))
}

#[derive(Deserialize)]
struct UpdateLocationRequest {
    location: GeoPoint,
    ride_id: Option<Uuid>,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = coordinator::update_driver_location(
        &state,
        &caller,
        id,
        payload.location,
        payload.ride_id,
    )
    .await?;
    Ok(Json(driver))
}

#[derive(Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    // Parsed by hand so an unknown status surfaces as InvalidStatus rather
    // than a deserialization rejection.
    let status = match payload.status.as_str() {
        "active" => DriverStatus::Active,
        "offline" => DriverStatus::Offline,
        "inactive" => DriverStatus::Inactive,
        other => return Err(AppError::InvalidStatus(other.to_string())),
    };

    let driver = coordinator::update_driver_status(&state, &caller, id, status).await?;
    Ok(Json(driver))
}
