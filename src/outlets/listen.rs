use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{OutletAdapter, OutletError, notification_payload};
use crate::models::{Notification, Outlet};

/// Oldest entries are dropped once a listener's queue is full.
const MAX_QUEUED: usize = 100;

/// In-process listen-stream outlet. Deliveries are queued per outlet hash
/// and handed out when the listener polls its capability URL.
pub struct ListenAdapter {
    queues: DashMap<String, VecDeque<serde_json::Value>>,
}

impl ListenAdapter {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Removes and returns everything queued for `outlet_hash`.
    pub fn drain(&self, outlet_hash: &str) -> Vec<serde_json::Value> {
        match self.queues.remove(outlet_hash) {
            Some((_, queue)) => queue.into_iter().collect(),
            None => Vec::new(),
        }
    }
}

impl Default for ListenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutletAdapter for ListenAdapter {
    fn type_name(&self) -> &'static str {
        "listen"
    }

    async fn deliver(
        &self,
        outlet: &Outlet,
        notification: &Notification,
    ) -> Result<String, OutletError> {
        let mut queue = self.queues.entry(outlet.hash.clone()).or_default();
        if queue.len() >= MAX_QUEUED {
            queue.pop_front();
        }
        queue.push_back(notification_payload(notification));
        Ok(format!("queued for listener ({} waiting)", queue.len()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn notification(text: &str) -> Notification {
        Notification {
            hash: format!("hash-{text}"),
            channel_id: "c".to_string(),
            source_id: "s".to_string(),
            target_id: "t".to_string(),
            text: text.to_string(),
            title: None,
            link: None,
            icon: None,
            sticky: None,
            tags: None,
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn queues_until_drained() {
        let adapter = ListenAdapter::new();
        let outlet = Outlet::new("tgt", "listen", "Desktop", json!({}));

        adapter.deliver(&outlet, &notification("one")).await.unwrap();
        adapter.deliver(&outlet, &notification("two")).await.unwrap();

        let drained = adapter.drain(&outlet.hash);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0]["text"], "one");
        assert_eq!(drained[1]["text"], "two");

        assert!(adapter.drain(&outlet.hash).is_empty());
    }

    #[tokio::test]
    async fn bounded_queue_drops_oldest() {
        let adapter = ListenAdapter::new();
        let outlet = Outlet::new("tgt", "listen", "Desktop", json!({}));

        for i in 0..(MAX_QUEUED + 5) {
            adapter
                .deliver(&outlet, &notification(&format!("n{i}")))
                .await
                .unwrap();
        }

        let drained = adapter.drain(&outlet.hash);
        assert_eq!(drained.len(), MAX_QUEUED);
        assert_eq!(drained[0]["text"], "n5");
    }
}
