//! Outgoing notifications
//!
//! Notifications are only enqueued here; a separate mail worker drains the
//! queue and handles delivery.

use async_trait::async_trait;
use common::queue::RedisQueue;
use tracing::{error, info};

use crate::error::{AccessError, AccessResult};
use crate::models::Notification;

/// Fire-and-forget notification sink
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> AccessResult<()>;
}

/// Pushes JSON-encoded notifications onto a Redis list
#[derive(Clone)]
pub struct RedisNotificationSink {
    queue: RedisQueue,
    queue_name: String,
}

impl RedisNotificationSink {
    pub fn new(queue: RedisQueue, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for RedisNotificationSink {
    async fn notify(&self, notification: Notification) -> AccessResult<()> {
        let payload = serde_json::to_string(&notification).map_err(|e| {
            AccessError::Notification(format!("failed to encode notification: {}", e))
        })?;

        let pending = self.queue.push(&self.queue_name, &payload).await.map_err(|e| {
            error!(queue = %self.queue_name, "Failed to enqueue notification: {}", e);
            AccessError::Notification(e.to_string())
        })?;

        info!(
            queue = %self.queue_name,
            recipient = %notification.recipient,
            pending,
            "Enqueued notification"
        );
        Ok(())
    }
}
