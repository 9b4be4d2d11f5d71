use std::sync::Arc;

use tracing::info;

use crate::error::CoreError;
use crate::models::{Account, ChannelStatus, Notification};
use crate::outlets::OutletRegistry;
use crate::store::{AccountRepo, ChannelRepo, NotificationRepo};

/// A stored notification plus its source's current icon, resolved for
/// display. The icon is `None` when the source never set one (callers
/// substitute the platform default) or the source account is gone.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub notification: Notification,
    pub source_icon: Option<String>,
}

/// Read side of the relay: bounded newest-first history, replay of a stored
/// notification by its public hash, and owner-checked deletion.
#[derive(Clone)]
pub struct HistoryService {
    notifications: Arc<dyn NotificationRepo>,
    channels: Arc<dyn ChannelRepo>,
    accounts: Arc<dyn AccountRepo>,
    registry: Arc<OutletRegistry>,
}

impl HistoryService {
    pub fn new(
        notifications: Arc<dyn NotificationRepo>,
        channels: Arc<dyn ChannelRepo>,
        accounts: Arc<dyn AccountRepo>,
        registry: Arc<OutletRegistry>,
    ) -> Self {
        Self {
            notifications,
            channels,
            accounts,
            registry,
        }
    }

    pub async fn history_for(
        &self,
        target: &Account,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let notifications = self
            .notifications
            .history_by_target(&target.id, limit)
            .await?;
        let mut entries = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let source_icon = self
                .accounts
                .by_id(&notification.source_id)
                .await?
                .and_then(|source| source.source_icon);
            entries.push(HistoryEntry {
                notification,
                source_icon,
            });
        }
        Ok(entries)
    }

    /// Re-delivers a stored notification through its channel's current
    /// outlet. Only the channel's target may replay, and only while the
    /// channel is enabled; everything else answers "not found" so existence
    /// never leaks. Replay is not a new notification: the channel counter
    /// stays untouched and the delivered content is the stored content.
    pub async fn replay(&self, hash: &str, requester: &Account) -> Result<String, CoreError> {
        let notification = self
            .notifications
            .by_hash(hash)
            .await?
            .ok_or(CoreError::NotFound("notification"))?;
        let channel = self
            .channels
            .by_id(&notification.channel_id)
            .await?
            .ok_or(CoreError::NotFound("notification"))?;
        if channel.status != ChannelStatus::Enabled || channel.target_id != requester.id {
            return Err(CoreError::NotFound("notification"));
        }
        info!(notification = %hash, channel = %channel.id, "replaying notification");
        Ok(self
            .registry
            .deliver_to(channel.outlet.as_deref(), &notification)
            .await)
    }

    pub async fn delete(&self, hash: &str, requester: &Account) -> Result<(), CoreError> {
        let notification = self
            .notifications
            .by_hash(hash)
            .await?
            .ok_or(CoreError::NotFound("notification"))?;
        if notification.target_id != requester.id {
            return Err(CoreError::Forbidden);
        }
        self.notifications.delete(hash).await?;
        Ok(())
    }
}
