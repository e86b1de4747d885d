//! Low-stock notification delivery
//!
//! Every triggered alert is logged. When a webhook is configured the payload
//! is also POSTed as JSON, signed with `X-BBMS-Signature`
//! (base64 HMAC-SHA256 of the body). Delivery is best-effort: failures are
//! logged and never reach the caller of the stock mutation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared::AlertPayload;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "X-BBMS-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Notification service; a missing webhook means log-only
#[derive(Clone, Default)]
pub struct NotificationService {
    webhook: Option<WebhookClient>,
}

/// Alert webhook client
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    secret: Option<String>,
    http_client: reqwest::Client,
}

/// Base64 HMAC-SHA256 of `body`
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

impl WebhookClient {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            url,
            secret,
            http_client: reqwest::Client::new(),
        }
    }

    /// Send one alert
    pub async fn send(&self, alert: &AlertPayload) -> AppResult<()> {
        let body = serde_json::to_vec(alert)
            .map_err(|e| AppError::Internal(format!("Alert serialization error: {}", e)))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::NotificationError(format!("Failed to reach webhook: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::NotificationError(format!(
                "Webhook responded with {}",
                response.status()
            )))
        }
    }
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let webhook = match (&config.webhook_url, config.enabled) {
            (Some(url), true) => Some(WebhookClient::new(url.clone(), config.webhook_secret.clone())),
            _ => None,
        };

        Self { webhook }
    }

    pub fn is_webhook_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    /// Log every alert and hand them to the webhook in the background
    pub fn dispatch(&self, alerts: &[AlertPayload]) {
        for alert in alerts {
            tracing::warn!(
                blood_type = %alert.blood_type,
                preparation = %alert.preparation_name,
                current_qty = alert.current_qty,
                threshold = alert.threshold,
                prbc_qty = ?alert.prbc_qty,
                other_qty = ?alert.other_qty,
                "Low stock alert"
            );
        }

        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        if alerts.is_empty() {
            return;
        }

        let alerts = alerts.to_vec();
        tokio::spawn(async move {
            for alert in &alerts {
                if let Err(e) = webhook.send(alert).await {
                    tracing::warn!(
                        blood_type = %alert.blood_type,
                        preparation = %alert.preparation_name,
                        "Alert notification not delivered: {}",
                        e
                    );
                }
            }
        });
    }
}
