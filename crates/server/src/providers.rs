//! HTTP-backed implementations of the geocoding and notification ports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use leadline_core::config::{GeocodingConfig, NotificationsConfig};
use leadline_core::domain::vendor::Coordinates;
use leadline_core::errors::ApplicationError;
use leadline_core::notify::{NotificationChannel, NotificationMessage, NotificationSender};
use leadline_core::ports::Geocoder;

pub fn http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()
}

/// Geocoder for a service answering `GET {base_url}?address=..&key=..` with
/// `{"results": [{"geometry": {"location": {"lat": .., "lng": ..}}}]}`.
pub struct HttpGeocoder {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

impl HttpGeocoder {
    pub fn from_config(config: &GeocodingConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key: config.api_key().map(str::to_string),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, ApplicationError> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(ApplicationError::Configuration(
                "geocoding.base_url is not configured".to_string(),
            ));
        };

        let mut request = self.client.get(base_url).query(&[("address", address)]);
        if let Some(key) = self.api_key.as_deref() {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ApplicationError::Integration(format!("geocoding request failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ApplicationError::Integration(format!(
                "geocoding service returned {}",
                response.status()
            )));
        }

        let payload: GeocodeResponse = response.json().await.map_err(|error| {
            ApplicationError::Integration(format!("failed to decode geocoding response: {error}"))
        })?;
        Ok(payload
            .results
            .into_iter()
            .next()
            .map(|result| Coordinates::new(result.geometry.location.lat, result.geometry.location.lng)))
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'static str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    body: &'a str,
}

/// Posts each notification as JSON to a per-channel webhook. A sender with no
/// URL is disabled and reports every delivery as failed.
pub struct WebhookSender {
    channel: NotificationChannel,
    client: Client,
    url: Option<String>,
    api_token: Option<String>,
}

impl WebhookSender {
    pub fn new(
        channel: NotificationChannel,
        client: Client,
        url: Option<String>,
        api_token: Option<String>,
    ) -> Self {
        Self { channel, client, url, api_token }
    }

    /// One sender per channel, all sharing `client`.
    pub fn all_from_config(config: &NotificationsConfig, client: &Client) -> Vec<Self> {
        let token = config.api_token().map(str::to_string);
        [
            (NotificationChannel::Email, &config.email_webhook_url),
            (NotificationChannel::Sms, &config.sms_webhook_url),
            (NotificationChannel::Push, &config.push_webhook_url),
        ]
        .into_iter()
        .map(|(channel, url)| Self::new(channel, client.clone(), url.clone(), token.clone()))
        .collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn send(&self, target: &str, message: &NotificationMessage) -> bool {
        let Some(url) = self.url.as_deref() else {
            debug!(
                event_name = "notify.sender.disabled",
                channel = self.channel.as_str(),
                "no webhook configured for channel; skipping delivery"
            );
            return false;
        };

        let payload = WebhookPayload {
            channel: self.channel.as_str(),
            target,
            subject: message.subject.as_deref(),
            body: &message.body,
        };
        let mut request = self.client.post(url).json(&payload);
        if let Some(token) = self.api_token.as_deref() {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    event_name = "notify.webhook.rejected",
                    channel = self.channel.as_str(),
                    status = %response.status(),
                    "notification webhook rejected delivery"
                );
                false
            }
            Err(error) => {
                warn!(
                    event_name = "notify.webhook.failed",
                    channel = self.channel.as_str(),
                    error = %error,
                    "notification webhook request failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use leadline_core::config::{GeocodingConfig, NotificationsConfig};
    use leadline_core::errors::ApplicationError;
    use leadline_core::notify::{NotificationChannel, NotificationMessage, NotificationSender};
    use leadline_core::ports::Geocoder;

    use super::{http_client, HttpGeocoder, WebhookSender};

    #[tokio::test]
    async fn disabled_sender_reports_failed_delivery() {
        let config = NotificationsConfig {
            email_webhook_url: None,
            sms_webhook_url: None,
            push_webhook_url: None,
            api_token: None,
            timeout_secs: 5,
        };
        let senders = WebhookSender::all_from_config(&config, &http_client(5).expect("client"));

        assert_eq!(
            senders.iter().map(|sender| sender.channel()).collect::<Vec<_>>(),
            vec![NotificationChannel::Email, NotificationChannel::Sms, NotificationChannel::Push]
        );
        assert!(senders.iter().all(|sender| !sender.is_enabled()));

        let message = NotificationMessage { subject: None, body: "hello".to_string() };
        assert!(!senders[0].send("someone@example.com", &message).await);
    }

    #[tokio::test]
    async fn geocoder_without_base_url_is_a_configuration_error() {
        let geocoder = HttpGeocoder::from_config(&GeocodingConfig {
            base_url: None,
            api_key: None,
            timeout_secs: 5,
        })
        .expect("geocoder");

        let result = geocoder.geocode("12 Elm St, Boston").await;
        assert!(matches!(result, Err(ApplicationError::Configuration(_))));
    }
}
