use std::sync::Arc;

use tracing::info;

use crate::error::CoreError;
use crate::models::{Account, ApprovalNotice, Channel, ChannelStatus};
use crate::outlets::OutletRegistry;
use crate::store::{ChannelRepo, OutletRepo};

/// Owns the lifecycle of source→target channels: lazy creation on first
/// notify, status transitions, outlet routing and deletion.
#[derive(Clone)]
pub struct ChannelManager {
    channels: Arc<dyn ChannelRepo>,
    outlets: Arc<dyn OutletRepo>,
    registry: Arc<OutletRegistry>,
}

impl ChannelManager {
    pub fn new(
        channels: Arc<dyn ChannelRepo>,
        outlets: Arc<dyn OutletRepo>,
        registry: Arc<OutletRegistry>,
    ) -> Self {
        Self {
            channels,
            outlets,
            registry,
        }
    }

    /// Returns the unique channel for this pair, creating it in `pending`
    /// when absent. A freshly created channel is routed to the target's
    /// current default outlet and comes with an approval notice for the
    /// external approval flow; an existing channel comes with `None`.
    ///
    /// Creation is an atomic create-if-absent: concurrent first notifies
    /// race, exactly one wins, and the losers reuse the winner's channel.
    pub async fn find_or_create(
        &self,
        source: &Account,
        target: &Account,
    ) -> Result<(Channel, Option<ApprovalNotice>), CoreError> {
        if let Some(existing) = self.channels.by_pair(&source.id, &target.id).await? {
            return Ok((existing, None));
        }

        let outlet = self.registry.default_for(target).await?.map(|o| o.hash);
        let candidate = Channel::new(&source.id, &target.id, outlet);
        let (channel, created) = self.channels.create_if_absent(candidate).await?;
        if created {
            info!(
                source = %source.hash,
                target = %target.hash,
                channel = %channel.id,
                "channel created, pending approval"
            );
            let notice = ApprovalNotice::for_channel(source, target);
            return Ok((channel, Some(notice)));
        }
        Ok((channel, None))
    }

    pub async fn by_pair(
        &self,
        source: &Account,
        target: &Account,
    ) -> Result<Option<Channel>, CoreError> {
        Ok(self.channels.by_pair(&source.id, &target.id).await?)
    }

    pub async fn list_for_target(&self, target: &Account) -> Result<Vec<Channel>, CoreError> {
        Ok(self.channels.list_by_target(&target.id).await?)
    }

    /// Any status may move to any other; re-enabling a disabled channel is
    /// deliberate.
    pub async fn set_status(
        &self,
        channel: &Channel,
        status: ChannelStatus,
    ) -> Result<(), CoreError> {
        if !self.channels.set_status(&channel.id, status).await? {
            return Err(CoreError::NotFound("channel"));
        }
        info!(channel = %channel.id, status = %status, "channel status changed");
        Ok(())
    }

    /// Reroutes the channel to one of the target's own outlets. The outlet
    /// must belong to the channel's target; routing someone else's outlet is
    /// refused.
    pub async fn route_outlet(&self, channel: &Channel, outlet_hash: &str) -> Result<(), CoreError> {
        let outlet = self
            .outlets
            .by_hash(outlet_hash)
            .await?
            .ok_or(CoreError::NotFound("outlet"))?;
        if outlet.target_id != channel.target_id {
            return Err(CoreError::Forbidden);
        }
        if !self.channels.set_outlet(&channel.id, Some(outlet_hash)).await? {
            return Err(CoreError::NotFound("channel"));
        }
        Ok(())
    }

    /// Removes the channel. Notifications recorded against it are left in
    /// place, orphaned.
    pub async fn delete(&self, channel: &Channel) -> Result<(), CoreError> {
        if !self.channels.delete(&channel.id).await? {
            return Err(CoreError::NotFound("channel"));
        }
        info!(channel = %channel.id, "channel deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::Outlet;
    use crate::store::Store;

    async fn setup() -> (Store, ChannelManager, Account, Account) {
        let store = Store::in_memory();
        let registry = Arc::new(OutletRegistry::new(store.outlets.clone()));
        let manager = ChannelManager::new(store.channels.clone(), store.outlets.clone(), registry);

        let source = Account::new();
        let target = Account::new();
        store.accounts.insert(&source).await.unwrap();
        store.accounts.insert(&target).await.unwrap();
        (store, manager, source, target)
    }

    #[tokio::test]
    async fn first_create_is_pending_with_notice() {
        let (_store, manager, source, target) = setup().await;

        let (channel, notice) = manager.find_or_create(&source, &target).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Pending);
        assert_eq!(channel.count, 0);
        let notice = notice.unwrap();
        assert_eq!(notice.source_hash, source.hash);
        assert_eq!(notice.target_hash, target.hash);

        let (again, notice) = manager.find_or_create(&source, &target).await.unwrap();
        assert_eq!(again.id, channel.id);
        assert!(notice.is_none());
    }

    #[tokio::test]
    async fn new_channel_takes_the_targets_default_outlet() {
        let (store, manager, source, mut target) = setup().await;

        let outlet = Outlet::new(&target.id, "webhook", "Hook", json!({"url": "http://x"}));
        store.outlets.insert(&outlet).await.unwrap();
        target.default_outlet = Some(outlet.hash.clone());
        store.accounts.update(&target).await.unwrap();

        let (channel, _) = manager.find_or_create(&source, &target).await.unwrap();
        assert_eq!(channel.outlet.as_deref(), Some(outlet.hash.as_str()));
    }

    #[tokio::test]
    async fn any_status_can_move_to_any_other() {
        let (_store, manager, source, target) = setup().await;
        let (channel, _) = manager.find_or_create(&source, &target).await.unwrap();

        manager
            .set_status(&channel, ChannelStatus::Enabled)
            .await
            .unwrap();
        manager
            .set_status(&channel, ChannelStatus::Disabled)
            .await
            .unwrap();
        manager
            .set_status(&channel, ChannelStatus::Enabled)
            .await
            .unwrap();

        let (reread, _) = manager.find_or_create(&source, &target).await.unwrap();
        assert_eq!(reread.status, ChannelStatus::Enabled);
    }

    #[tokio::test]
    async fn routing_rejects_an_outlet_owned_by_someone_else() {
        let (store, manager, source, target) = setup().await;
        let (channel, _) = manager.find_or_create(&source, &target).await.unwrap();

        let intruder = Account::new();
        let foreign = Outlet::new(&intruder.id, "webhook", "Theirs", json!({}));
        store.outlets.insert(&foreign).await.unwrap();

        assert!(matches!(
            manager.route_outlet(&channel, &foreign.hash).await,
            Err(CoreError::Forbidden)
        ));

        let owned = Outlet::new(&target.id, "webhook", "Mine", json!({}));
        store.outlets.insert(&owned).await.unwrap();
        manager.route_outlet(&channel, &owned.hash).await.unwrap();

        let (reread, _) = manager.find_or_create(&source, &target).await.unwrap();
        assert_eq!(reread.outlet.as_deref(), Some(owned.hash.as_str()));
    }

    #[tokio::test]
    async fn routing_an_unknown_outlet_is_not_found() {
        let (_store, manager, source, target) = setup().await;
        let (channel, _) = manager.find_or_create(&source, &target).await.unwrap();

        assert!(matches!(
            manager.route_outlet(&channel, "missing").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_allows_the_pair_to_form_again() {
        let (_store, manager, source, target) = setup().await;
        let (channel, _) = manager.find_or_create(&source, &target).await.unwrap();

        manager.delete(&channel).await.unwrap();

        let (fresh, notice) = manager.find_or_create(&source, &target).await.unwrap();
        assert_ne!(fresh.id, channel.id);
        assert!(notice.is_some());
    }
}
