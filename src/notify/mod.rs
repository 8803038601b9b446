pub mod live;
pub mod push;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::models::event::{EventKind, NotificationEvent, NotificationRecord, Target};
use crate::notify::live::LiveChannelRegistry;
use crate::notify::push::PushGateway;
use crate::notify::store::NotificationStore;
use crate::observability::metrics::Metrics;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no open connection")]
    NoConnection,

    #[error("channel error: {0}")]
    Channel(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Live,
    Persisted,
    Push,
}

impl Channel {
    fn label(&self) -> &'static str {
        match self {
            Channel::Live => "live",
            Channel::Persisted => "persisted",
            Channel::Push => "push",
        }
    }
}

/// Per-channel outcome. `Skipped` covers targets the channel does not apply
/// to (no open connection, broadcast target on the persisted channel).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum DeliveryResult {
    Delivered,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub channel: Channel,
    pub target: Target,
    pub result: DeliveryResult,
}

/// Aggregate of every attempt for one event. Carries no error type on
/// purpose: delivery failure never propagates to the mutation that produced
/// the event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.result == DeliveryResult::Delivered)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryAttempt> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.result, DeliveryResult::Failed(_)))
    }
}

/// Multi-channel event delivery. Channels are attempted in fixed order per
/// target, each independently, each bounded by `delivery_timeout`.
pub struct FanOut {
    live: Arc<dyn LiveChannelRegistry>,
    store: Arc<dyn NotificationStore>,
    push: Arc<dyn PushGateway>,
    delivery_timeout: Duration,
    metrics: Metrics,
}

impl FanOut {
    pub fn new(
        live: Arc<dyn LiveChannelRegistry>,
        store: Arc<dyn NotificationStore>,
        push: Arc<dyn PushGateway>,
        delivery_timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            live,
            store,
            push,
            delivery_timeout,
            metrics,
        }
    }

    /// Delivers `event` to each target across the applicable channels.
    /// Infallible by construction; inspect the report for outcomes.
    pub async fn notify(&self, event: &NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(kind = ?event.kind, error = %err, "event serialization failed");
                for target in &event.targets {
                    report.attempts.push(DeliveryAttempt {
                        channel: Channel::Live,
                        target: *target,
                        result: DeliveryResult::Failed(err.to_string()),
                    });
                }
                return report;
            }
        };

        for target in &event.targets {
            let live = self
                .attempt(Channel::Live, *target, self.deliver_live(target, &payload))
                .await;
            report.attempts.push(live);

            let persisted = self
                .attempt(
                    Channel::Persisted,
                    *target,
                    self.deliver_persisted(event, target),
                )
                .await;
            report.attempts.push(persisted);

            let push = self
                .attempt(Channel::Push, *target, self.deliver_push(event, target, &payload))
                .await;
            report.attempts.push(push);
        }

        for failure in report.failures() {
            warn!(
                channel = failure.channel.label(),
                target = ?failure.target,
                kind = ?event.kind,
                result = ?failure.result,
                "notification delivery failed"
            );
        }

        report
    }

    async fn attempt(
        &self,
        channel: Channel,
        target: Target,
        fut: impl std::future::Future<Output = Option<Result<(), DeliveryError>>>,
    ) -> DeliveryAttempt {
        let start = std::time::Instant::now();

        let result = match timeout(self.delivery_timeout, fut).await {
            Ok(None) => DeliveryResult::Skipped,
            Ok(Some(Ok(()))) => DeliveryResult::Delivered,
            Ok(Some(Err(DeliveryError::NoConnection))) => DeliveryResult::Skipped,
            Ok(Some(Err(err))) => DeliveryResult::Failed(err.to_string()),
            Err(_) => DeliveryResult::Failed("delivery timed out".to_string()),
        };

        let outcome = match &result {
            DeliveryResult::Delivered => "delivered",
            DeliveryResult::Skipped => "skipped",
            DeliveryResult::Failed(_) => "failed",
        };
        self.metrics
            .notifications_total
            .with_label_values(&[channel.label(), outcome])
            .inc();
        self.metrics
            .delivery_latency_seconds
            .with_label_values(&[channel.label()])
            .observe(start.elapsed().as_secs_f64());

        DeliveryAttempt {
            channel,
            target,
            result,
        }
    }

    async fn deliver_live(
        &self,
        target: &Target,
        payload: &str,
    ) -> Option<Result<(), DeliveryError>> {
        match target {
            Target::Broadcast => Some(self.live.broadcast(payload.to_string()).await),
            Target::Party { id, .. } => Some(self.live.push_to(*id, payload.to_string()).await),
        }
    }

    async fn deliver_persisted(
        &self,
        event: &NotificationEvent,
        target: &Target,
    ) -> Option<Result<(), DeliveryError>> {
        // Broadcasts have no per-user record; location pings are ephemeral.
        let target_id = match target {
            Target::Broadcast => return None,
            Target::Party { id, .. } => *id,
        };
        if event.kind == EventKind::DriverLocationUpdate {
            return None;
        }

        let record = NotificationRecord {
            id: Uuid::new_v4(),
            target_id,
            kind: event.kind,
            ride_id: event.ride_id,
            payload: event.payload.clone(),
            correlation_id: event.correlation_id,
            read: false,
            created_at: Utc::now(),
        };

        Some(self.store.create(record).await)
    }

    async fn deliver_push(
        &self,
        event: &NotificationEvent,
        target: &Target,
        payload: &str,
    ) -> Option<Result<(), DeliveryError>> {
        if event.kind != EventKind::AdminBroadcast {
            return None;
        }

        match target {
            Target::Broadcast => Some(self.push.push_broadcast(payload).await),
            Target::Party { id, .. } => Some(self.push.push_to(*id, payload).await),
        }
    }
}
