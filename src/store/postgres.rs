use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::{AccountRepo, ChannelRepo, NotificationRepo, OutletRepo, StoreError};
use crate::models::{Account, Channel, ChannelStatus, Notification, Outlet};

/// Postgres-backed store. Uniqueness of the (source, target) channel pair
/// and the counter increment are pushed down to single statements so
/// concurrent requests never race in application code.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        api_key TEXT NOT NULL UNIQUE,
        hash TEXT NOT NULL UNIQUE,
        hashes TEXT[] NOT NULL DEFAULT '{}',
        source_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        source_name TEXT,
        source_url TEXT,
        source_icon TEXT,
        default_outlet TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS channels (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        status TEXT NOT NULL,
        outlet TEXT,
        count BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (source_id, target_id)
    )",
    "CREATE TABLE IF NOT EXISTS notifications (
        hash TEXT PRIMARY KEY,
        channel_id TEXT NOT NULL,
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        text TEXT NOT NULL,
        title TEXT,
        link TEXT,
        icon TEXT,
        sticky TEXT,
        tags TEXT,
        created TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS notifications_target_created
        ON notifications (target_id, created DESC)",
    "CREATE TABLE IF NOT EXISTS outlets (
        hash TEXT PRIMARY KEY,
        target_id TEXT NOT NULL,
        type_name TEXT NOT NULL,
        name TEXT NOT NULL,
        params JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
];

#[derive(FromRow)]
struct AccountRow {
    id: String,
    api_key: String,
    hash: String,
    hashes: Vec<String>,
    source_enabled: bool,
    source_name: Option<String>,
    source_url: Option<String>,
    source_icon: Option<String>,
    default_outlet: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            api_key: row.api_key,
            hash: row.hash,
            hashes: row.hashes,
            source_enabled: row.source_enabled,
            source_name: row.source_name,
            source_url: row.source_url,
            source_icon: row.source_icon,
            default_outlet: row.default_outlet,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ChannelRow {
    id: String,
    source_id: String,
    target_id: String,
    status: String,
    outlet: Option<String>,
    count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = StoreError;

    fn try_from(row: ChannelRow) -> Result<Self, StoreError> {
        let status: ChannelStatus = row
            .status
            .parse()
            .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Channel {
            id: row.id,
            source_id: row.source_id,
            target_id: row.target_id,
            status,
            outlet: row.outlet,
            count: row.count,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    hash: String,
    channel_id: String,
    source_id: String,
    target_id: String,
    text: String,
    title: Option<String>,
    link: Option<String>,
    icon: Option<String>,
    sticky: Option<String>,
    tags: Option<String>,
    created: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            hash: row.hash,
            channel_id: row.channel_id,
            source_id: row.source_id,
            target_id: row.target_id,
            text: row.text,
            title: row.title,
            link: row.link,
            icon: row.icon,
            sticky: row.sticky,
            tags: row.tags,
            created: row.created,
        }
    }
}

#[derive(FromRow)]
struct OutletRow {
    hash: String,
    target_id: String,
    type_name: String,
    name: String,
    params: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<OutletRow> for Outlet {
    fn from(row: OutletRow) -> Self {
        Outlet {
            hash: row.hash,
            target_id: row.target_id,
            type_name: row.type_name,
            name: row.name,
            params: row.params,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AccountRepo for PgStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts
                (id, api_key, hash, hashes, source_enabled, source_name,
                 source_url, source_icon, default_outlet, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&account.id)
        .bind(&account.api_key)
        .bind(&account.hash)
        .bind(&account.hashes)
        .bind(account.source_enabled)
        .bind(&account.source_name)
        .bind(&account.source_url)
        .bind(&account.source_icon)
        .bind(&account.default_outlet)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn by_api_key(&self, api_key: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE hash = $1 OR $1 = ANY(hashes)",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE accounts SET
                hashes = $2, source_enabled = $3, source_name = $4,
                source_url = $5, source_icon = $6, default_outlet = $7
             WHERE id = $1",
        )
        .bind(&account.id)
        .bind(&account.hashes)
        .bind(account.source_enabled)
        .bind(&account.source_name)
        .bind(&account.source_url)
        .bind(&account.source_icon)
        .bind(&account.default_outlet)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelRepo for PgStore {
    async fn create_if_absent(&self, channel: Channel) -> Result<(Channel, bool), StoreError> {
        loop {
            let inserted = sqlx::query(
                "INSERT INTO channels
                    (id, source_id, target_id, status, outlet, count, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (source_id, target_id) DO NOTHING",
            )
            .bind(&channel.id)
            .bind(&channel.source_id)
            .bind(&channel.target_id)
            .bind(channel.status.as_str())
            .bind(&channel.outlet)
            .bind(channel.count)
            .bind(channel.created_at)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted == 1 {
                return Ok((channel, true));
            }
            // Lost the race: reuse the winner's row. It can disappear again
            // if deleted in between, in which case we retry the insert.
            match self.by_pair(&channel.source_id, &channel.target_id).await? {
                Some(existing) => return Ok((existing, false)),
                None => continue,
            }
        }
    }

    async fn by_id(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Channel::try_from).transpose()
    }

    async fn by_pair(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT * FROM channels WHERE source_id = $1 AND target_id = $2",
        )
        .bind(source_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Channel::try_from).transpose()
    }

    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Channel>, StoreError> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT * FROM channels WHERE target_id = $1 ORDER BY created_at",
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Channel::try_from).collect()
    }

    async fn set_status(&self, id: &str, status: ChannelStatus) -> Result<bool, StoreError> {
        let affected = sqlx::query("UPDATE channels SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn set_outlet(&self, id: &str, outlet: Option<&str>) -> Result<bool, StoreError> {
        let affected = sqlx::query("UPDATE channels SET outlet = $2 WHERE id = $1")
            .bind(id)
            .bind(outlet)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn increment_count(&self, id: &str) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("UPDATE channels SET count = count + 1 WHERE id = $1 RETURNING count")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn detach_outlet(&self, outlet_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE channels SET outlet = NULL WHERE outlet = $1")
            .bind(outlet_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notifications
                (hash, channel_id, source_id, target_id, text, title, link,
                 icon, sticky, tags, created)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&notification.hash)
        .bind(&notification.channel_id)
        .bind(&notification.source_id)
        .bind(&notification.target_id)
        .bind(&notification.text)
        .bind(&notification.title)
        .bind(&notification.link)
        .bind(&notification.icon)
        .bind(&notification.sticky)
        .bind(&notification.tags)
        .bind(notification.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Notification::from))
    }

    async fn history_by_target(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE target_id = $1
             ORDER BY created DESC, hash DESC LIMIT $2",
        )
        .bind(target_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn delete(&self, hash: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM notifications WHERE hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl OutletRepo for PgStore {
    async fn insert(&self, outlet: &Outlet) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO outlets (hash, target_id, type_name, name, params, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&outlet.hash)
        .bind(&outlet.target_id)
        .bind(&outlet.type_name)
        .bind(&outlet.name)
        .bind(&outlet.params)
        .bind(outlet.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Outlet>, StoreError> {
        let row = sqlx::query_as::<_, OutletRow>("SELECT * FROM outlets WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Outlet::from))
    }

    async fn list_by_target(&self, target_id: &str) -> Result<Vec<Outlet>, StoreError> {
        let rows = sqlx::query_as::<_, OutletRow>(
            "SELECT * FROM outlets WHERE target_id = $1 ORDER BY created_at",
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Outlet::from).collect())
    }

    async fn rename(&self, hash: &str, name: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("UPDATE outlets SET name = $2 WHERE hash = $1")
            .bind(hash)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn delete(&self, hash: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM outlets WHERE hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}
