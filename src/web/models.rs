use serde::{Deserialize, Serialize};

use crate::dispatch::RawNotification;
use crate::history::HistoryEntry;
use crate::models::{Account, Channel, ChannelStatus, Outlet};

/// Account resolved by the Basic-auth middleware, available to handlers as
/// a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Account);

#[derive(Debug, Deserialize)]
pub struct NotifyForm {
    pub api_key: String,
    pub text: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub sticky: Option<String>,
    pub tags: Option<String>,
}

impl NotifyForm {
    pub fn into_raw(self) -> RawNotification {
        RawNotification {
            text: self.text,
            title: self.title,
            link: self.link,
            icon: self.icon,
            sticky: self.sticky,
            tags: self.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplayForm {
    pub api_key: String,
}

/// The only response that ever carries the api_key.
#[derive(Debug, Serialize)]
pub struct AccountCreated {
    pub api_key: String,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceSettings {
    pub source_enabled: bool,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub source_icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ChannelStatus,
}

#[derive(Debug, Deserialize)]
pub struct OutletRoute {
    pub outlet: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOutlet {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RenameOutlet {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelView {
    pub source: String,
    pub status: ChannelStatus,
    pub outlet: Option<String>,
    pub count: i64,
}

impl ChannelView {
    pub fn render(channel: &Channel, source_hash: String) -> Self {
        Self {
            source: source_hash,
            status: channel.status,
            outlet: channel.outlet.clone(),
            count: channel.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutletView {
    pub hash: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub params: serde_json::Value,
}

impl From<Outlet> for OutletView {
    fn from(outlet: Outlet) -> Self {
        Self {
            hash: outlet.hash,
            type_name: outlet.type_name,
            name: outlet.name,
            params: outlet.params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub hash: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub created: String,
    pub source_icon: String,
}

impl HistoryItem {
    pub fn render(entry: HistoryEntry, default_icon: &str) -> Self {
        let n = entry.notification;
        Self {
            hash: n.hash,
            text: n.text,
            title: n.title,
            link: n.link,
            icon: n.icon,
            sticky: n.sticky,
            tags: n.tags,
            created: n.created.format("%a %b %d %H:%M:%S +0000 %Y").to_string(),
            source_icon: entry
                .source_icon
                .unwrap_or_else(|| default_icon.to_string()),
        }
    }
}
