// libs/notification-cell/src/services/dispatch.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::*;
use crate::services::gateway::{PushGatewayClient, WebPushGatewayClient};

/// Delivers cancellation notices to every device registered for an
/// appointment. Delivery is best effort: a dead gateway must not undo
/// a cancellation that is already committed, so failures are logged
/// and swallowed here.
pub struct CancellationNotifier {
    store: Arc<StoreClient>,
    push: Option<PushGatewayClient>,
    webpush: Option<WebPushGatewayClient>,
}

impl CancellationNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(config, Arc::new(StoreClient::new(config)))
    }

    pub fn with_store(config: &AppConfig, store: Arc<StoreClient>) -> Self {
        Self {
            store,
            push: PushGatewayClient::new(config).ok(),
            webpush: WebPushGatewayClient::new(config).ok(),
        }
    }

    /// Fans one cancellation notice out over both push channels. The
    /// channels run concurrently and fail independently.
    pub async fn notify_cancellation(&self, notice: &CancellationNotice) {
        let (push, webpush) = tokio::join!(
            self.send_mobile_push(notice),
            self.send_browser_push(notice),
        );

        if let Err(e) = push {
            warn!(
                "Push notice for appointment {} was not delivered: {}",
                notice.appointment_id, e
            );
        }
        if let Err(e) = webpush {
            warn!(
                "Web push notice for appointment {} was not delivered: {}",
                notice.appointment_id, e
            );
        }
    }

    async fn send_mobile_push(&self, notice: &CancellationNotice) -> Result<(), NotificationError> {
        let Some(push) = &self.push else {
            warn!("Push gateway not configured, skipping cancellation push");
            return Ok(());
        };

        let recipients = self.get_push_recipients(notice.appointment_id).await?;
        if recipients.is_empty() {
            debug!("No push recipients for appointment {}", notice.appointment_id);
            return Ok(());
        }

        for recipient in &recipients {
            let locale = recipient.locale.as_deref();
            push.send(
                &cancellation_title(locale, notice),
                cancellation_body(locale),
                &[recipient.device_token.clone()],
            )
            .await?;
        }

        debug!(
            "Delivered cancellation push for appointment {} to {} device(s)",
            notice.appointment_id,
            recipients.len()
        );
        Ok(())
    }

    async fn send_browser_push(&self, notice: &CancellationNotice) -> Result<(), NotificationError> {
        let Some(webpush) = &self.webpush else {
            warn!("Web push gateway not configured, skipping cancellation push");
            return Ok(());
        };

        let recipients = self.get_webpush_recipients(notice.appointment_id).await?;
        if recipients.is_empty() {
            debug!("No web push recipients for appointment {}", notice.appointment_id);
            return Ok(());
        }

        for recipient in &recipients {
            let locale = recipient.locale.as_deref();
            // Browser notices carry the patient record id in the body so
            // reception can pull the chart straight away.
            webpush
                .send(
                    &recipient.subscription,
                    &cancellation_title(locale, notice),
                    &notice.patient_record_id,
                )
                .await?;
        }

        debug!(
            "Delivered cancellation web push for appointment {} to {} subscription(s)",
            notice.appointment_id,
            recipients.len()
        );
        Ok(())
    }

    async fn get_push_recipients(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<PushRecipient>, NotificationError> {
        let result: Vec<serde_json::Value> = self
            .store
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/appointment_push_recipients?appointment_id=eq.{}",
                    appointment_id
                ),
                None,
            )
            .await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| NotificationError::DatabaseError {
                message: e.to_string(),
            })
    }

    async fn get_webpush_recipients(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<WebPushRecipient>, NotificationError> {
        let result: Vec<serde_json::Value> = self
            .store
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/appointment_webpush_recipients?appointment_id=eq.{}",
                    appointment_id
                ),
                None,
            )
            .await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| NotificationError::DatabaseError {
                message: e.to_string(),
            })
    }
}

/// Title of a cancellation notice in the recipient's locale.
pub fn cancellation_title(locale: Option<&str>, notice: &CancellationNotice) -> String {
    match locale {
        Some("ru") => format!(
            "Приём пациента {} ({}) отменён.",
            notice.patient_name, notice.slot_time
        ),
        _ => format!(
            "Appointment for {} ({}) has been cancelled.",
            notice.patient_name, notice.slot_time
        ),
    }
}

/// Body of a mobile cancellation notice in the recipient's locale.
pub fn cancellation_body(locale: Option<&str>) -> &'static str {
    match locale {
        Some("ru") => "Причина: изменение графика врача.",
        _ => "Reason: the doctor's schedule has changed.",
    }
}
