use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::models::{Account, Notification, Outlet};
use crate::store::{OutletRepo, StoreError};

pub mod listen;
pub mod webhook;

#[derive(Error, Debug)]
pub enum OutletError {
    #[error("no adapter registered for outlet type '{0}'")]
    Unsupported(String),
    #[error("invalid outlet parameters: {0}")]
    InvalidParams(String),
    #[error("delivery failed: {0}")]
    SendFailed(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One delivery mechanism. Adapters own their timeout policy and must come
/// back with a bounded-time success or error rather than hang.
#[async_trait]
pub trait OutletAdapter: Send + Sync {
    fn type_name(&self) -> &'static str;
    async fn deliver(
        &self,
        outlet: &Outlet,
        notification: &Notification,
    ) -> Result<String, OutletError>;
}

/// The JSON shape adapters hand to the outside world.
pub fn notification_payload(notification: &Notification) -> serde_json::Value {
    json!({
        "hash": notification.hash,
        "text": notification.text,
        "title": notification.title,
        "link": notification.link,
        "icon": notification.icon,
        "sticky": notification.sticky,
        "tags": notification.tags,
        "created": notification.created.timestamp(),
    })
}

/// Adapter lookup table, built once at startup. Delivery is best effort:
/// every failure mode comes back as result text so the caller can show it,
/// and the already-persisted notification is never rolled back.
pub struct OutletRegistry {
    adapters: HashMap<&'static str, Arc<dyn OutletAdapter>>,
    outlets: Arc<dyn OutletRepo>,
}

impl OutletRegistry {
    pub fn new(outlets: Arc<dyn OutletRepo>) -> Self {
        Self {
            adapters: HashMap::new(),
            outlets,
        }
    }

    pub fn register(mut self, adapter: Arc<dyn OutletAdapter>) -> Self {
        self.adapters.insert(adapter.type_name(), adapter);
        self
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// The account's configured default outlet. Unconfigured or dangling
    /// references both come back as `None`; "no outlet" is a valid state.
    pub async fn default_for(&self, account: &Account) -> Result<Option<Outlet>, StoreError> {
        match &account.default_outlet {
            Some(hash) => self.outlets.by_hash(hash).await,
            None => Ok(None),
        }
    }

    pub async fn deliver(&self, outlet: &Outlet, notification: &Notification) -> String {
        match self.adapters.get(outlet.type_name.as_str()) {
            Some(adapter) => match adapter.deliver(outlet, notification).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        outlet = %outlet.hash,
                        outlet_type = %outlet.type_name,
                        error = %e,
                        "outlet delivery failed"
                    );
                    e.to_string()
                }
            },
            None => {
                let e = OutletError::Unsupported(outlet.type_name.clone());
                warn!(outlet = %outlet.hash, error = %e, "outlet delivery failed");
                e.to_string()
            }
        }
    }

    /// Resolves a channel's outlet reference and delivers through it.
    pub async fn deliver_to(
        &self,
        outlet_hash: Option<&str>,
        notification: &Notification,
    ) -> String {
        let Some(hash) = outlet_hash else {
            return "no outlet configured".to_string();
        };
        match self.outlets.by_hash(hash).await {
            Ok(Some(outlet)) => self.deliver(&outlet, notification).await,
            Ok(None) => "no outlet configured".to_string(),
            Err(e) => {
                warn!(outlet = %hash, error = %e, "outlet lookup failed");
                "no outlet configured".to_string()
            }
        }
    }
}
