use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::dispatch::coordinator::{self, BroadcastMessage, Caller};
use crate::error::AppError;
use crate::models::event::NotificationRecord;
use crate::notify::DeliveryReport;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_read))
        .route("/broadcast", post(broadcast))
}

/// The caller's persisted channel-2 records, the recovery path for anything
/// the live channel missed.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Json<Vec<NotificationRecord>> {
    Json(state.notifications.list_for(caller.user_id).await)
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.notifications.mark_read(caller.user_id, id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotificationNotFound(id))
    }
}

async fn broadcast(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<BroadcastMessage>,
) -> Result<Json<DeliveryReport>, AppError> {
    let report = coordinator::admin_broadcast(&state, &caller, payload).await?;
    Ok(Json(report))
}
