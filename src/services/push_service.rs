use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::repositories::Event;

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// プッシュ通知の送信口。テストでは記録用のフェイクに差し替える
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_event_reminder(&self, device_token: &str, event: &Event) -> Result<()>;
}

pub struct FcmPushService {
    client: Client,
    server_key: String,
}

impl FcmPushService {
    pub fn new(server_key: String) -> Self {
        Self {
            client: Client::new(),
            server_key,
        }
    }
}

#[async_trait]
impl PushSender for FcmPushService {
    async fn send_event_reminder(&self, device_token: &str, event: &Event) -> Result<()> {
        if self.server_key.is_empty() {
            return Err(AppError::ConfigError("FCM_SERVER_KEY is not set".to_string()));
        }

        let payload = json!({
            "to": device_token,
            "notification": {
                "title": format!("Upcoming Event: {}", event.title),
                "body": format!(
                    "Your event is coming up on {}",
                    event.date.format("%Y-%m-%d %H:%M UTC")
                ),
            },
            "data": {
                "url": format!("/events/{}", event.id),
                "eventId": event.id,
                "type": "event_reminder",
            },
        });

        let response = self
            .client
            .post(FCM_ENDPOINT)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to send push: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalServiceError(format!(
                "FCM error: status={}, body={}",
                status, error_text
            )));
        }

        Ok(())
    }
}
