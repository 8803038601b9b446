use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::dispatch::coordinator::Caller;
use crate::error::AppError;
use crate::models::ride::Role;

/// The auth middleware in front of this service attaches the caller's
/// identity and role as headers; this extractor picks them up.
const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| AppError::Unauthorized("missing or invalid caller id".to_string()))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_role)
            .ok_or_else(|| AppError::Unauthorized("missing or unknown caller role".to_string()))?;

        Ok(Caller { user_id, role })
    }
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw {
        "passenger" => Some(Role::Passenger),
        "driver" => Some(Role::Driver),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}
