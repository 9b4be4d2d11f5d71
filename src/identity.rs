use std::sync::Arc;

use crate::error::CoreError;
use crate::models::Account;
use crate::store::{AccountRepo, StoreError};

/// Lookup-only resolution of credentials and public identifiers to
/// accounts. Account creation and settings mutation live at the API edge.
#[derive(Clone)]
pub struct IdentityStore {
    accounts: Arc<dyn AccountRepo>,
}

impl IdentityStore {
    pub fn new(accounts: Arc<dyn AccountRepo>) -> Self {
        Self { accounts }
    }

    pub async fn by_api_key(&self, api_key: &str) -> Result<Option<Account>, StoreError> {
        self.accounts.by_api_key(api_key).await
    }

    /// Resolves a primary or secondary public hash.
    pub async fn by_hash(&self, hash: &str) -> Result<Option<Account>, StoreError> {
        self.accounts.by_hash(hash).await
    }

    pub async fn require_api_key(&self, api_key: &str) -> Result<Account, CoreError> {
        self.accounts
            .by_api_key(api_key)
            .await?
            .ok_or(CoreError::NotFound("account"))
    }

    pub async fn require_hash(&self, hash: &str) -> Result<Account, CoreError> {
        self.accounts
            .by_hash(hash)
            .await?
            .ok_or(CoreError::NotFound("account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn resolves_keys_and_hashes() {
        let store = Store::in_memory();
        let identity = IdentityStore::new(store.accounts.clone());

        let mut account = Account::new();
        account.hashes.push("alias00001".to_string());
        store.accounts.insert(&account).await.unwrap();

        let found = identity.require_api_key(&account.api_key).await.unwrap();
        assert_eq!(found.id, account.id);

        let by_primary = identity.require_hash(&account.hash).await.unwrap();
        assert_eq!(by_primary.id, account.id);
        let by_alias = identity.require_hash("alias00001").await.unwrap();
        assert_eq!(by_alias.id, account.id);
    }

    #[tokio::test]
    async fn unknown_credentials_are_not_found() {
        let store = Store::in_memory();
        let identity = IdentityStore::new(store.accounts.clone());

        assert!(matches!(
            identity.require_api_key("nope").await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            identity.require_hash("nope").await,
            Err(CoreError::NotFound(_))
        ));
    }
}
