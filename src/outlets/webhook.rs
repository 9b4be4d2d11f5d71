use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{OutletAdapter, OutletError, notification_payload};
use crate::models::{Notification, Outlet};

const DELIVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Pushes the notification as a JSON POST to the URL in the outlet params.
pub struct WebhookAdapter {
    client: Client,
}

impl WebhookAdapter {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(DELIVER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for WebhookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutletAdapter for WebhookAdapter {
    fn type_name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(
        &self,
        outlet: &Outlet,
        notification: &Notification,
    ) -> Result<String, OutletError> {
        let url = outlet
            .params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OutletError::InvalidParams("missing 'url'".to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&notification_payload(notification))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(OutletError::SendFailed(format!(
                "webhook returned {status}"
            )));
        }
        Ok(format!("webhook delivered ({status})"))
    }
}
