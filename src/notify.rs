//! Notification sinks.
//!
//! Notifications are best effort: services hand them to a
//! [`NotificationSink`] after the state change has been committed and only
//! log a failure. Delivery channels (push, email) live outside this service
//! and read from the sink's storage.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Notification, UserId};
use crate::error::LedgerError;

/// Destination for user notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    /// Stores or forwards one notification.
    async fn notify(&self, notification: Notification) -> Result<(), LedgerError>;
}

/// Delivers a notification, logging instead of propagating a failure.
pub async fn deliver(sink: &dyn NotificationSink, notification: Notification) {
    let user_id = notification.user_id;
    let kind = notification.kind;
    if let Err(error) = sink.notify(notification).await {
        tracing::warn!(%user_id, %kind, %error, "notification delivery failed");
    }
}

/// Delivers the same notification to several users.
pub async fn deliver_all(sink: &dyn NotificationSink, recipients: &[UserId], template: &Notification) {
    for user_id in recipients {
        let mut notification = Notification::new(
            *user_id,
            template.kind,
            template.title.clone(),
            template.message.clone(),
            template.link.clone(),
        );
        notification.created_at = template.created_at;
        deliver(sink, notification).await;
    }
}

/// Sink that only writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), LedgerError> {
        tracing::info!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

/// Sink that keeps notifications in memory, newest last.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    inbox: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification delivered so far.
    pub async fn all(&self) -> Vec<Notification> {
        self.inbox.lock().await.clone()
    }

    /// Returns the notifications addressed to `user_id`.
    pub async fn for_user(&self, user_id: UserId) -> Vec<Notification> {
        self.inbox
            .lock()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), LedgerError> {
        self.inbox.lock().await.push(notification);
        Ok(())
    }
}
