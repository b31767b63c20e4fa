// libs/notification-cell/src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// RECIPIENT MODELS
// ==============================================================================

/// Mobile push recipient for an appointment, read from the
/// `appointment_push_recipients` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRecipient {
    pub appointment_id: Uuid,
    pub device_token: String,
    #[serde(default)]
    pub locale: Option<String>,
}

/// Browser push recipient for an appointment, read from the
/// `appointment_webpush_recipients` view. The subscription is stored
/// as the opaque JSON object the browser handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPushRecipient {
    pub appointment_id: Uuid,
    pub subscription: Value,
    #[serde(default)]
    pub locale: Option<String>,
}

// ==============================================================================
// NOTIFICATION CONTENT
// ==============================================================================

/// Everything the dispatcher needs to word a cancellation notice.
/// Built by the caller from the appointment being cancelled.
#[derive(Debug, Clone)]
pub struct CancellationNotice {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub patient_record_id: String,
    pub slot_time: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification gateway not configured")]
    NotConfigured,

    #[error("Push gateway error: {message}")]
    GatewayError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },
}

impl From<anyhow::Error> for NotificationError {
    fn from(err: anyhow::Error) -> Self {
        NotificationError::DatabaseError {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::GatewayError {
            message: err.to_string(),
        }
    }
}
