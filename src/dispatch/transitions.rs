use crate::error::AppError;
use crate::models::ride::RideStatus;

/// The single forward successor of each state. Cancellation is handled
/// separately because it cuts across the forward chain.
pub fn successor(status: RideStatus) -> Option<RideStatus> {
    match status {
        RideStatus::Waiting => Some(RideStatus::Assigned),
        RideStatus::Assigned => Some(RideStatus::PickedUp),
        RideStatus::PickedUp => Some(RideStatus::InProgress),
        RideStatus::InProgress => Some(RideStatus::Completed),
        RideStatus::Completed | RideStatus::Cancelled => None,
    }
}

/// Cancellation is reachable from waiting, assigned, or picked_up only.
pub fn cancellable(status: RideStatus) -> bool {
    matches!(
        status,
        RideStatus::Waiting | RideStatus::Assigned | RideStatus::PickedUp
    )
}

pub fn allowed_from(status: RideStatus) -> Vec<RideStatus> {
    let mut allowed = Vec::new();
    if let Some(next) = successor(status) {
        allowed.push(next);
    }
    if cancellable(status) {
        allowed.push(RideStatus::Cancelled);
    }
    allowed
}

/// Rejects anything that is not the table successor or a legal cancellation.
pub fn validate(from: RideStatus, to: RideStatus) -> Result<(), AppError> {
    let legal = match to {
        RideStatus::Cancelled => cancellable(from),
        _ => successor(from) == Some(to),
    };

    if legal {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from,
            to,
            allowed: allowed_from(from),
        })
    }
}
