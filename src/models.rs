use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity on the relay. Every account can receive notifications; an
/// account with `source_enabled` set may also send them.
///
/// The `api_key` is a secret bearer credential and must never appear in
/// history or replay output. `hash` and `hashes` are public identifiers and
/// safe to share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub api_key: String,
    pub hash: String,
    /// Secondary public identifiers, e.g. one per verified address.
    pub hashes: Vec<String>,
    pub source_enabled: bool,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub source_icon: Option<String>,
    /// Hash of the outlet new channels are routed to.
    pub default_outlet: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            api_key: generate_api_key(),
            hash: generate_public_hash(),
            hashes: Vec::new(),
            source_enabled: false,
            source_name: None,
            source_url: None,
            source_icon: None,
            default_outlet: None,
            created_at: Utc::now(),
        }
    }

    /// True if `hash` is this account's primary or any secondary identifier.
    pub fn answers_to(&self, hash: &str) -> bool {
        self.hash == hash || self.hashes.iter().any(|h| h == hash)
    }

    pub fn source_label(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.hash)
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Pending,
    Enabled,
    Disabled,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Pending => "pending",
            ChannelStatus::Enabled => "enabled",
            ChannelStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for ChannelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChannelStatus::Pending),
            "enabled" => Ok(ChannelStatus::Enabled),
            "disabled" => Ok(ChannelStatus::Disabled),
            other => Err(format!("unknown channel status: {other}")),
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The directed relationship between one source and one target. At most one
/// exists per (source, target) pair; the store enforces this on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub status: ChannelStatus,
    /// Outlet hash this channel delivers through. Absent is a first-class
    /// state meaning "no outlet configured".
    pub outlet: Option<String>,
    /// Number of notifications ever sent through this channel.
    pub count: i64,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(source_id: &str, target_id: &str, outlet: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            status: ChannelStatus::Pending,
            outlet,
            count: 0,
            created_at: Utc::now(),
        }
    }
}

/// One immutable message instance. Content fields never change after
/// persistence so a replay reproduces the original payload exactly.
///
/// `source_id` and `target_id` are carried here as well as on the channel so
/// history and icon resolution keep working after the channel is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub hash: String,
    pub channel_id: String,
    pub source_id: String,
    pub target_id: String,
    pub text: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub sticky: Option<String>,
    pub tags: Option<String>,
    pub created: DateTime<Utc>,
}

/// A configured delivery mechanism owned by a target account. Only valid for
/// delivery while its `type_name` resolves to a registered adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outlet {
    pub hash: String,
    pub target_id: String,
    pub type_name: String,
    pub name: String,
    pub params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Outlet {
    pub fn new(target_id: &str, type_name: &str, name: &str, params: serde_json::Value) -> Self {
        Self {
            hash: generate_public_hash(),
            target_id: target_id.to_string(),
            type_name: type_name.to_string(),
            name: name.to_string(),
            params,
            created_at: Utc::now(),
        }
    }
}

/// Serializable description of a newly created pending channel, handed back
/// to the sender so an external approval flow can prompt the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalNotice {
    pub text: String,
    pub source_hash: String,
    pub source_name: Option<String>,
    pub source_icon: Option<String>,
    pub target_hash: String,
    pub created: DateTime<Utc>,
}

impl ApprovalNotice {
    pub fn for_channel(source: &Account, target: &Account) -> Self {
        Self {
            text: format!("{} would like to send you notifications", source.source_label()),
            source_hash: source.hash.clone(),
            source_name: source.source_name.clone(),
            source_icon: source.source_icon.clone(),
            target_hash: target.hash.clone(),
            created: Utc::now(),
        }
    }
}

/// 32 hex chars from 16 random bytes.
pub fn generate_api_key() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Short public identifier, lowercase alphanumeric.
pub fn generate_public_hash() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Unique, content-independent identifier for a notification. Stable once
/// persisted; replay looks notifications up by this value.
pub fn generate_notification_hash() -> String {
    Uuid::new_v4().simple().to_string()
}
