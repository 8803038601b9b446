use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::event::NotificationRecord;
use crate::notify::DeliveryError;

/// Persisted-notification collaborator: the durability backstop for anything
/// the live channel misses. Create / list / mark-read, per target.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, record: NotificationRecord) -> Result<(), DeliveryError>;

    async fn list_for(&self, target_id: Uuid) -> Vec<NotificationRecord>;

    async fn mark_read(&self, target_id: Uuid, notification_id: Uuid) -> bool;
}

/// In-memory stand-in for the external notification store.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    by_target: DashMap<Uuid, Vec<NotificationRecord>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, record: NotificationRecord) -> Result<(), DeliveryError> {
        self.by_target
            .entry(record.target_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_for(&self, target_id: Uuid) -> Vec<NotificationRecord> {
        self.by_target
            .get(&target_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    async fn mark_read(&self, target_id: Uuid, notification_id: Uuid) -> bool {
        let Some(mut records) = self.by_target.get_mut(&target_id) else {
            return false;
        };

        match records.iter_mut().find(|r| r.id == notification_id) {
            Some(record) => {
                record.read = true;
                true
            }
            None => false,
        }
    }
}
