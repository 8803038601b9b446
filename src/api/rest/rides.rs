use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::dispatch::coordinator::{self, Caller, RideRequest, StatusUpdate};
use crate::error::AppError;
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(request_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/assign", post(assign_driver))
        .route("/rides/:id/status", patch(update_status))
        .route("/rides/:id/cancel", post(cancel_ride))
}

async fn request_ride(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<RideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = coordinator::request_ride(&state, &caller, payload).await?;
    Ok(Json(ride))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = coordinator::get_ride(&state, &caller, id).await?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
struct AssignRequest {
    driver_id: Uuid,
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = coordinator::assign_driver(&state, &caller, id, payload.driver_id).await?;
    Ok(Json(ride))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Ride>, AppError> {
    let ride = coordinator::update_status(&state, &caller, id, payload).await?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
struct CancelRequest {
    reason: Option<String>,
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = coordinator::cancel_ride(&state, &caller, id, payload.reason).await?;
    Ok(Json(ride))
}
