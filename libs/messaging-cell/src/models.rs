// libs/messaging-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One direct message between two staff users about a patient's case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub patient_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub patient_id: Uuid,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}
