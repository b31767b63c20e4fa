// libs/notification-cell/src/services/gateway.rs
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Client for the mobile push gateway. A single request fans out to
/// every device token listed in `registration_ids`.
#[derive(Debug)]
pub struct PushGatewayClient {
    client: Client,
    base_url: String,
    server_key: String,
}

impl PushGatewayClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_push_configured() {
            return Err(NotificationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.push_gateway_url.clone(),
            server_key: config.push_gateway_key.clone(),
        })
    }

    pub async fn send(
        &self,
        title: &str,
        body: &str,
        registration_ids: &[String],
    ) -> Result<(), NotificationError> {
        debug!(
            "Sending push notification to {} device(s)",
            registration_ids.len()
        );

        let payload = json!({
            "title": title,
            "body": body,
            "registration_ids": registration_ids,
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await?;
            error!(
                "Push gateway rejected notification: HTTP {}: {}",
                status, response_text
            );
            return Err(NotificationError::GatewayError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        Ok(())
    }
}

/// Client for the browser push relay. The relay holds the VAPID keys
/// and delivers to one stored subscription per request.
pub struct WebPushGatewayClient {
    client: Client,
    base_url: String,
}

impl WebPushGatewayClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_webpush_configured() {
            return Err(NotificationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.webpush_gateway_url.clone(),
        })
    }

    pub async fn send(
        &self,
        subscription: &Value,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        debug!("Sending web push notification");

        let payload = json!({
            "subscription": subscription,
            "title": title,
            "body": body,
        });

        let response = self.client.post(&self.base_url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await?;
            error!(
                "Web push gateway rejected notification: HTTP {}: {}",
                status, response_text
            );
            return Err(NotificationError::GatewayError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        Ok(())
    }
}
