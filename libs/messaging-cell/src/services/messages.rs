// libs/messaging-cell/src/services/messages.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{Message, MessagingError, SendMessageRequest};

/// Persisted staff-to-staff messaging. No read tracking and no pagination;
/// a conversation is simply every row exchanged between two users.
pub struct MessagingService {
    store: Arc<StoreClient>,
}

impl MessagingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(StoreClient::new(config)),
        }
    }

    pub fn with_store(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<Message, MessagingError> {
        debug!("Sending message from {} to {}", request.from_user, request.to_user);

        let message_data = json!({
            "from_user": request.from_user,
            "to_user": request.to_user,
            "patient_id": request.patient_id,
            "message": request.message,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/messages",
            Some(message_data),
            headers,
        ).await.map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(MessagingError::DatabaseError("Failed to create message".to_string()));
        }

        let message: Message = serde_json::from_value(result[0].clone())
            .map_err(|e| MessagingError::DatabaseError(format!("Failed to parse message: {}", e)))?;

        info!("Message {} sent from {} to {}", message.id, message.from_user, message.to_user);
        Ok(message)
    }

    /// Every message exchanged between two users in either direction,
    /// optionally narrowed to one patient's case, newest first.
    pub async fn list_messages(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<Message>, MessagingError> {
        debug!("Listing messages between {} and {}", user_a, user_b);

        let mut path = format!(
            "/rest/v1/messages?from_user=in.({},{})&to_user=in.({},{})&order=created_at.desc",
            user_a, user_b, user_a, user_b,
        );
        if let Some(patient_id) = patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Message>, _>>()
            .map_err(|e| MessagingError::DatabaseError(format!("Failed to parse messages: {}", e)))
    }
}
