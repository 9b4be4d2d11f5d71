use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Account, Channel, ChannelStatus, Notification, Outlet};

pub mod memory;
pub mod postgres;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

/// Lookup and mutation of accounts. `by_hash` resolves the primary hash or
/// any secondary hash.
#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;
    async fn by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;
    async fn by_api_key(&self, api_key: &str) -> Result<Option<Account>, StoreError>;
    async fn by_hash(&self, hash: &str) -> Result<Option<Account>, StoreError>;
    async fn update(&self, account: &Account) -> Result<(), StoreError>;
}

/// Channel persistence. `create_if_absent` is the single atomic operation
/// that enforces at most one channel per (source, target) pair: concurrent
/// callers race to create and the losers get the winner's row back.
#[async_trait]
pub trait ChannelRepo: Send + Sync {
    /// Returns the persisted channel and whether this call created it.
    async fn create_if_absent(&self, channel: Channel) -> Result<(Channel, bool), StoreError>;
    async fn by_id(&self, id: &str) -> Result<Option<Channel>, StoreError>;
    async fn by_pair(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<Channel>, StoreError>;
    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Channel>, StoreError>;
    async fn set_status(&self, id: &str, status: ChannelStatus) -> Result<bool, StoreError>;
    async fn set_outlet(&self, id: &str, outlet: Option<&str>) -> Result<bool, StoreError>;
    /// Atomic increment; concurrent callers must not lose updates.
    async fn increment_count(&self, id: &str) -> Result<i64, StoreError>;
    /// Clears the outlet reference on every channel routed to `outlet_hash`.
    async fn detach_outlet(&self, outlet_hash: &str) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError>;
    async fn by_hash(&self, hash: &str) -> Result<Option<Notification>, StoreError>;
    /// Newest-first, bounded by `limit`. Each call re-queries.
    async fn history_by_target(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;
    async fn delete(&self, hash: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OutletRepo: Send + Sync {
    async fn insert(&self, outlet: &Outlet) -> Result<(), StoreError>;
    async fn by_hash(&self, hash: &str) -> Result<Option<Outlet>, StoreError>;
    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Outlet>, StoreError>;
    async fn rename(&self, hash: &str, name: &str) -> Result<bool, StoreError>;
    async fn delete(&self, hash: &str) -> Result<bool, StoreError>;
}

/// The four repositories every service is constructed from. Cloning is
/// cheap; all handles point at the same backing store.
#[derive(Clone)]
pub struct Store {
    pub accounts: Arc<dyn AccountRepo>,
    pub channels: Arc<dyn ChannelRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub outlets: Arc<dyn OutletRepo>,
}

impl Store {
    pub fn in_memory() -> Self {
        let backend = Arc::new(memory::MemoryStore::new());
        Self {
            accounts: backend.clone(),
            channels: backend.clone(),
            notifications: backend.clone(),
            outlets: backend,
        }
    }

    pub async fn postgres(url: &str) -> Result<Self, StoreError> {
        let backend = Arc::new(postgres::PgStore::connect(url).await?);
        Ok(Self {
            accounts: backend.clone(),
            channels: backend.clone(),
            notifications: backend.clone(),
            outlets: backend,
        })
    }
}
