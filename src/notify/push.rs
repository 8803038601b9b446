use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::notify::DeliveryError;

/// Out-of-band mobile-push collaborator. Only broadcast-class events go
/// through this channel; it keeps its own token registry.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn push_to(&self, user_id: Uuid, payload: &str) -> Result<(), DeliveryError>;

    async fn push_broadcast(&self, payload: &str) -> Result<(), DeliveryError>;
}

/// Stand-in for the external push provider: resolves tokens locally and
/// logs the dispatch instead of calling out.
#[derive(Default)]
pub struct LoggingPushGateway {
    tokens: DashMap<Uuid, String>,
}

impl LoggingPushGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_token(&self, user_id: Uuid, token: String) {
        self.tokens.insert(user_id, token);
    }
}

#[async_trait]
impl PushGateway for LoggingPushGateway {
    async fn push_to(&self, user_id: Uuid, payload: &str) -> Result<(), DeliveryError> {
        let token = self
            .tokens
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or(DeliveryError::NoConnection)?;

        debug!(%user_id, token = %token, size = payload.len(), "mobile push dispatched");
        Ok(())
    }

    async fn push_broadcast(&self, payload: &str) -> Result<(), DeliveryError> {
        debug!(
            recipients = self.tokens.len(),
            size = payload.len(),
            "mobile push broadcast dispatched"
        );
        Ok(())
    }
}
