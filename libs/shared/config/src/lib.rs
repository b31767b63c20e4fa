use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_store_url: String,
    pub data_store_service_key: String,
    pub push_gateway_url: String,
    pub push_gateway_key: String,
    pub webpush_gateway_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_store_url: env::var("DATA_STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("DATA_STORE_URL not set, using empty value");
                    String::new()
                }),
            data_store_service_key: env::var("DATA_STORE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("DATA_STORE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            push_gateway_url: env::var("PUSH_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("PUSH_GATEWAY_URL not set, using default");
                    "https://fcm.googleapis.com/fcm/send".to_string()
                }),
            push_gateway_key: env::var("PUSH_GATEWAY_KEY")
                .unwrap_or_else(|_| {
                    warn!("PUSH_GATEWAY_KEY not set, using empty value");
                    String::new()
                }),
            webpush_gateway_url: env::var("WEBPUSH_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("WEBPUSH_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.data_store_url.is_empty()
            && !self.data_store_service_key.is_empty()
    }

    pub fn is_push_configured(&self) -> bool {
        !self.push_gateway_url.is_empty()
            && !self.push_gateway_key.is_empty()
    }

    pub fn is_webpush_configured(&self) -> bool {
        !self.webpush_gateway_url.is_empty()
    }
}
