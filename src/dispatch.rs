use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::error::CoreError;
use crate::models::{
    Account, ApprovalNotice, Channel, ChannelStatus, Notification, generate_notification_hash,
};
use crate::outlets::OutletRegistry;
use crate::sanitize::{clean_optional, strip_tags};
use crate::store::{ChannelRepo, NotificationRepo};

/// Raw inbound fields, before sanitation. Everything is optional on the
/// wire; a missing `text` still produces a notification with empty text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNotification {
    pub text: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub sticky: Option<String>,
    pub tags: Option<String>,
}

/// Handed back on the first notify of a brand-new channel so the sender can
/// drive the target's approval flow.
#[derive(Debug, Clone)]
pub struct ApprovalHandshake {
    pub outlet_hash: Option<String>,
    pub notice: ApprovalNotice,
}

#[derive(Debug)]
pub enum DeliveryResult {
    /// Channel enabled; payload is the outlet adapter's result text,
    /// success or error, verbatim.
    Delivered(String),
    /// Accepted, waiting on target approval. Carries the handshake only on
    /// the notify that created the channel.
    Pending(Option<ApprovalHandshake>),
    /// Accepted and recorded, but the target has switched this source off.
    Disabled,
}

/// Builds, records and routes notifications. The notification is persisted
/// and the channel counter bumped before any outlet is invoked, so a
/// delivery failure never loses the record.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationRepo>,
    channels: Arc<dyn ChannelRepo>,
    registry: Arc<OutletRegistry>,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepo>,
        channels: Arc<dyn ChannelRepo>,
        registry: Arc<OutletRegistry>,
    ) -> Self {
        Self {
            notifications,
            channels,
            registry,
        }
    }

    pub async fn dispatch(
        &self,
        channel: &Channel,
        source: &Account,
        raw: RawNotification,
        approval: Option<ApprovalNotice>,
    ) -> Result<DeliveryResult, CoreError> {
        let notification = build_notification(channel, source, raw);
        self.notifications.insert(&notification).await?;
        let count = self.channels.increment_count(&channel.id).await?;
        debug!(
            channel = %channel.id,
            notification = %notification.hash,
            count,
            status = %channel.status,
            "notification recorded"
        );

        // Status and outlet were read when the channel was resolved; no
        // store lock is held across the outlet call.
        match channel.status {
            ChannelStatus::Enabled => {
                let outcome = self
                    .registry
                    .deliver_to(channel.outlet.as_deref(), &notification)
                    .await;
                Ok(DeliveryResult::Delivered(outcome))
            }
            ChannelStatus::Pending => Ok(DeliveryResult::Pending(approval.map(|notice| {
                ApprovalHandshake {
                    outlet_hash: channel.outlet.clone(),
                    notice,
                }
            }))),
            ChannelStatus::Disabled => Ok(DeliveryResult::Disabled),
        }
    }
}

fn build_notification(channel: &Channel, source: &Account, raw: RawNotification) -> Notification {
    Notification {
        hash: generate_notification_hash(),
        channel_id: channel.id.clone(),
        source_id: channel.source_id.clone(),
        target_id: channel.target_id.clone(),
        text: strip_tags(&raw.text.unwrap_or_default()),
        title: clean_optional(raw.title),
        link: clean_optional(raw.link),
        icon: clean_optional(raw.icon).or_else(|| source.source_icon.clone()),
        sticky: clean_optional(raw.sticky),
        tags: clean_optional(raw.tags),
        created: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::channels::ChannelManager;
    use crate::models::Outlet;
    use crate::outlets::test_support::SpyAdapter;
    use crate::store::Store;

    struct Fixture {
        store: Store,
        manager: ChannelManager,
        dispatcher: NotificationDispatcher,
        spy: Arc<SpyAdapter>,
        source: Account,
        target: Account,
    }

    async fn setup() -> Fixture {
        let store = Store::in_memory();
        let spy = SpyAdapter::new();
        let registry = Arc::new(OutletRegistry::new(store.outlets.clone()).register(spy.clone()));
        let manager =
            ChannelManager::new(store.channels.clone(), store.outlets.clone(), registry.clone());
        let dispatcher =
            NotificationDispatcher::new(store.notifications.clone(), store.channels.clone(), registry);

        let mut source = Account::new();
        source.source_enabled = true;
        source.source_icon = Some("http://icons/source.png".to_string());
        let mut target = Account::new();

        let outlet = Outlet::new(&target.id, "spy", "Spy", json!({}));
        store.outlets.insert(&outlet).await.unwrap();
        target.default_outlet = Some(outlet.hash.clone());

        store.accounts.insert(&source).await.unwrap();
        store.accounts.insert(&target).await.unwrap();

        Fixture {
            store,
            manager,
            dispatcher,
            spy,
            source,
            target,
        }
    }

    fn text(value: &str) -> RawNotification {
        RawNotification {
            text: Some(value.to_string()),
            ..Default::default()
        }
    }

    async fn enabled_channel(fx: &Fixture) -> Channel {
        let (channel, _) = fx
            .manager
            .find_or_create(&fx.source, &fx.target)
            .await
            .unwrap();
        fx.manager
            .set_status(&channel, ChannelStatus::Enabled)
            .await
            .unwrap();
        fx.manager
            .by_pair(&fx.source, &fx.target)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn strips_markup_from_every_text_field() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;

        let raw = RawNotification {
            text: Some("<b>hi</b> <script>x</script>".to_string()),
            title: Some("<i>build</i> done".to_string()),
            tags: Some("<hr>".to_string()),
            ..Default::default()
        };
        fx.dispatcher
            .dispatch(&channel, &fx.source, raw, None)
            .await
            .unwrap();

        let history = fx
            .store
            .notifications
            .history_by_target(&fx.target.id, 10)
            .await
            .unwrap();
        let stored = &history[0];
        assert_eq!(stored.text, "hi x");
        assert_eq!(stored.title.as_deref(), Some("build done"));
        // Nothing left after stripping, so the field is not stored at all.
        assert_eq!(stored.tags, None);
    }

    #[tokio::test]
    async fn icon_falls_back_to_the_source_profile() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;

        fx.dispatcher
            .dispatch(&channel, &fx.source, text("a"), None)
            .await
            .unwrap();
        let raw = RawNotification {
            text: Some("b".to_string()),
            icon: Some("http://icons/override.png".to_string()),
            ..Default::default()
        };
        fx.dispatcher
            .dispatch(&channel, &fx.source, raw, None)
            .await
            .unwrap();

        let stored = fx
            .store
            .notifications
            .history_by_target(&fx.target.id, 10)
            .await
            .unwrap();
        let defaulted = stored.iter().find(|n| n.text == "a").unwrap();
        let overridden = stored.iter().find(|n| n.text == "b").unwrap();
        assert_eq!(defaulted.icon.as_deref(), Some("http://icons/source.png"));
        assert_eq!(overridden.icon.as_deref(), Some("http://icons/override.png"));
    }

    #[tokio::test]
    async fn missing_text_still_produces_a_notification() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;

        let result = fx
            .dispatcher
            .dispatch(&channel, &fx.source, RawNotification::default(), None)
            .await
            .unwrap();
        assert!(matches!(result, DeliveryResult::Delivered(_)));

        let history = fx
            .store
            .notifications
            .history_by_target(&fx.target.id, 10)
            .await
            .unwrap();
        assert_eq!(history[0].text, "");
    }

    #[tokio::test]
    async fn enabled_channel_delivers_through_the_outlet() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;

        let result = fx
            .dispatcher
            .dispatch(&channel, &fx.source, text("hello"), None)
            .await
            .unwrap();
        match result {
            DeliveryResult::Delivered(outcome) => assert_eq!(outcome, "spy delivered: hello"),
            other => panic!("expected Delivered, got {other:?}"),
        }
        assert_eq!(fx.spy.call_count(), 1);
    }

    #[tokio::test]
    async fn first_pending_dispatch_carries_the_handshake() {
        let fx = setup().await;
        let (channel, notice) = fx
            .manager
            .find_or_create(&fx.source, &fx.target)
            .await
            .unwrap();

        let result = fx
            .dispatcher
            .dispatch(&channel, &fx.source, text("hello"), notice)
            .await
            .unwrap();
        match result {
            DeliveryResult::Pending(Some(handshake)) => {
                assert_eq!(handshake.outlet_hash, channel.outlet);
                assert_eq!(handshake.notice.source_hash, fx.source.hash);
            }
            other => panic!("expected first-time pending, got {other:?}"),
        }

        // Same still-pending channel, second notify: no handshake.
        let (channel, notice) = fx
            .manager
            .find_or_create(&fx.source, &fx.target)
            .await
            .unwrap();
        assert!(notice.is_none());
        let result = fx
            .dispatcher
            .dispatch(&channel, &fx.source, text("again"), notice)
            .await
            .unwrap();
        assert!(matches!(result, DeliveryResult::Pending(None)));

        // Pending dispatches are recorded and counted but never delivered.
        assert_eq!(fx.spy.call_count(), 0);
        let reread = fx
            .manager
            .by_pair(&fx.source, &fx.target)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread.count, 2);
    }

    #[tokio::test]
    async fn disabled_channel_records_but_never_delivers() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;
        fx.manager
            .set_status(&channel, ChannelStatus::Disabled)
            .await
            .unwrap();
        let channel = fx
            .manager
            .by_pair(&fx.source, &fx.target)
            .await
            .unwrap()
            .unwrap();

        let result = fx
            .dispatcher
            .dispatch(&channel, &fx.source, text("quiet"), None)
            .await
            .unwrap();
        assert!(matches!(result, DeliveryResult::Disabled));
        assert_eq!(fx.spy.call_count(), 0);

        let history = fx
            .store
            .notifications
            .history_by_target(&fx.target.id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        let reread = fx
            .manager
            .by_pair(&fx.source, &fx.target)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread.count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn n_concurrent_dispatches_count_exactly_n() {
        let fx = setup().await;
        let channel = enabled_channel(&fx).await;

        let mut handles = Vec::new();
        for i in 0..32 {
            let dispatcher = fx.dispatcher.clone();
            let channel = channel.clone();
            let source = fx.source.clone();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .dispatch(&channel, &source, text(&format!("n{i}")), None)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reread = fx
            .manager
            .by_pair(&fx.source, &fx.target)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread.count, 32);
        assert_eq!(fx.spy.call_count(), 32);
    }
}
