use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{AccountRepo, ChannelRepo, NotificationRepo, OutletRepo, StoreError};
use crate::models::{Account, Channel, ChannelStatus, Notification, Outlet};

/// In-memory store used for tests and single-node deployments without a
/// database. Per-entry locking in the maps gives the same atomicity the
/// Postgres store gets from single-row statements.
pub struct MemoryStore {
    accounts: DashMap<String, Account>,
    api_keys: DashMap<String, String>,
    hashes: DashMap<String, String>,
    channels: DashMap<String, Channel>,
    channel_pairs: DashMap<(String, String), String>,
    notifications: DashMap<String, Notification>,
    outlets: DashMap<String, Outlet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            api_keys: DashMap::new(),
            hashes: DashMap::new(),
            channels: DashMap::new(),
            channel_pairs: DashMap::new(),
            notifications: DashMap::new(),
            outlets: DashMap::new(),
        }
    }

    fn index_account(&self, account: &Account) {
        self.api_keys
            .insert(account.api_key.clone(), account.id.clone());
        self.hashes.insert(account.hash.clone(), account.id.clone());
        for hash in &account.hashes {
            self.hashes.insert(hash.clone(), account.id.clone());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepo for MemoryStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        if self.api_keys.contains_key(&account.api_key) {
            return Err(StoreError::Duplicate(account.api_key.clone()));
        }
        if self.hashes.contains_key(&account.hash) {
            return Err(StoreError::Duplicate(account.hash.clone()));
        }
        self.accounts.insert(account.id.clone(), account.clone());
        self.index_account(account);
        Ok(())
    }

    async fn by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|a| a.clone()))
    }

    async fn by_api_key(&self, api_key: &str) -> Result<Option<Account>, StoreError> {
        let Some(id) = self.api_keys.get(api_key).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Account>, StoreError> {
        let Some(id) = self.hashes.get(hash).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        self.accounts.insert(account.id.clone(), account.clone());
        self.index_account(account);
        Ok(())
    }
}

#[async_trait]
impl ChannelRepo for MemoryStore {
    async fn create_if_absent(&self, channel: Channel) -> Result<(Channel, bool), StoreError> {
        let key = (channel.source_id.clone(), channel.target_id.clone());
        loop {
            match self.channel_pairs.entry(key.clone()) {
                Entry::Occupied(existing) => {
                    let id = existing.get().clone();
                    drop(existing);
                    // A concurrent delete can remove the winner between the
                    // index read and the row read; start over in that case.
                    match self.channels.get(&id) {
                        Some(found) => return Ok((found.clone(), false)),
                        None => continue,
                    }
                }
                Entry::Vacant(slot) => {
                    self.channels.insert(channel.id.clone(), channel.clone());
                    slot.insert(channel.id.clone());
                    return Ok((channel, true));
                }
            }
        }
    }

    async fn by_id(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self.channels.get(id).map(|c| c.clone()))
    }

    async fn by_pair(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<Channel>, StoreError> {
        let key = (source_id.to_string(), target_id.to_string());
        let Some(id) = self.channel_pairs.get(&key).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.channels.get(&id).map(|c| c.clone()))
    }

    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Channel>, StoreError> {
        let mut found: Vec<Channel> = self
            .channels
            .iter()
            .filter(|c| c.target_id == target_id)
            .map(|c| c.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn set_status(&self, id: &str, status: ChannelStatus) -> Result<bool, StoreError> {
        match self.channels.get_mut(id) {
            Some(mut channel) => {
                channel.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_outlet(&self, id: &str, outlet: Option<&str>) -> Result<bool, StoreError> {
        match self.channels.get_mut(id) {
            Some(mut channel) => {
                channel.outlet = outlet.map(|o| o.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_count(&self, id: &str) -> Result<i64, StoreError> {
        match self.channels.get_mut(id) {
            Some(mut channel) => {
                channel.count += 1;
                Ok(channel.count)
            }
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn detach_outlet(&self, outlet_hash: &str) -> Result<(), StoreError> {
        for mut channel in self.channels.iter_mut() {
            if channel.outlet.as_deref() == Some(outlet_hash) {
                channel.outlet = None;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(channel) = self.channels.get(id).map(|c| c.clone()) else {
            return Ok(false);
        };
        self.channel_pairs
            .remove(&(channel.source_id, channel.target_id));
        Ok(self.channels.remove(id).is_some())
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        self.notifications
            .insert(notification.hash.clone(), notification.clone());
        Ok(())
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications.get(hash).map(|n| n.clone()))
    }

    async fn history_by_target(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.target_id == target_id)
            .map(|n| n.clone())
            .collect();
        found.sort_by(|a, b| b.created.cmp(&a.created).then(b.hash.cmp(&a.hash)));
        found.truncate(limit);
        Ok(found)
    }

    async fn delete(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.notifications.remove(hash).is_some())
    }
}

#[async_trait]
impl OutletRepo for MemoryStore {
    async fn insert(&self, outlet: &Outlet) -> Result<(), StoreError> {
        if self.outlets.contains_key(&outlet.hash) {
            return Err(StoreError::Duplicate(outlet.hash.clone()));
        }
        self.outlets.insert(outlet.hash.clone(), outlet.clone());
        Ok(())
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Outlet>, StoreError> {
        Ok(self.outlets.get(hash).map(|o| o.clone()))
    }

    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Outlet>, StoreError> {
        let mut found: Vec<Outlet> = self
            .outlets
            .iter()
            .filter(|o| o.target_id == target_id)
            .map(|o| o.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn rename(&self, hash: &str, name: &str) -> Result<bool, StoreError> {
        match self.outlets.get_mut(hash) {
            Some(mut outlet) => {
                outlet.name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.outlets.remove(hash).is_some())
    }
}
