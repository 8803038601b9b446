use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::ride::RideStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("ride {0} not found")]
    RideNotFound(uuid::Uuid),

    #[error("driver {0} not found")]
    DriverNotFound(uuid::Uuid),

    #[error("route {0} not found")]
    RouteNotFound(uuid::Uuid),

    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: RideStatus,
        to: RideStatus,
        allowed: Vec<RideStatus>,
    },

    #[error("ride no longer available")]
    RideNotAvailable,

    #[error("driver {0} already holds an active ride")]
    DriverUnavailable(uuid::Uuid),

    #[error("notification {0} not found")]
    NotificationNotFound(uuid::Uuid),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid location")]
    InvalidLocation,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::RideNotFound(_)
            | AppError::DriverNotFound(_)
            | AppError::RouteNotFound(_)
            | AppError::NotificationNotFound(_) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            AppError::InvalidTransition { from, to, allowed } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "invalid transition",
                    "from": from,
                    "attempted": to,
                    "allowed": allowed,
                }),
            ),
            AppError::RideNotAvailable | AppError::DriverUnavailable(_) => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            AppError::Unauthorized(_) => {
                (StatusCode::FORBIDDEN, json!({ "error": self.to_string() }))
            }
            AppError::InvalidStatus(_) | AppError::InvalidLocation | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
