//! Delivery to the companion app.
//!
//! The companion listens on loopback (default `127.0.0.1:34567`):
//!
//! - `POST /api/stream` with `{"action":"add_stream","data":{url,type,title,source,timestamp}}`
//! - `GET /api/health`
//!
//! A failed delivery is reported to the caller and never touches the
//! session store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::StreamType;
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::record::{now_millis, DetectedStream};

/// What the companion app receives for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub url: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    /// Hosting page title.
    pub title: String,
    /// Hosting page URL.
    pub source: String,
    /// Send time, Unix epoch milliseconds.
    pub timestamp: i64,
}

impl From<&DetectedStream> for DeliveryPayload {
    fn from(stream: &DetectedStream) -> Self {
        Self {
            url: stream.url.clone(),
            stream_type: stream.stream_type,
            title: stream.page_title.clone(),
            source: stream.page_url.clone(),
            timestamp: now_millis(),
        }
    }
}

#[derive(Serialize)]
struct AddStreamRequest<'a> {
    action: &'static str,
    data: &'a DeliveryPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanionReply {
    success: bool,
    error: Option<String>,
}

/// Outbound sink for stored records.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Hand one payload to the consumer.
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<()>;
}

/// HTTP client for the companion app.
#[derive(Debug, Clone)]
pub struct CompanionClient {
    client: Client,
    address: String,
}

impl CompanionClient {
    /// Create a client for `address` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("streamscout/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            address: address.into(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ScoutConfig) -> Result<Self> {
        Self::new(config.app_address.clone(), config.delivery_timeout())
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    fn endpoint(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    /// Post one stream to `/api/stream`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or a
    /// reply with `success: false`.
    pub async fn send_stream(&self, payload: &DeliveryPayload) -> Result<()> {
        let body = AddStreamRequest {
            action: "add_stream",
            data: payload,
        };

        let resp = self
            .client
            .post(self.endpoint("/api/stream"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ScoutError::Delivery(format!("companion app returned {}", resp.status())));
        }

        let text = resp.text().await?;
        let reply: CompanionReply = if text.trim().is_empty() {
            CompanionReply {
                success: true,
                error: None,
            }
        } else {
            serde_json::from_str(&text)?
        };

        if !reply.success {
            return Err(ScoutError::Delivery(
                reply.error.unwrap_or_else(|| "rejected by companion app".to_string()),
            ));
        }

        info!("Sent {} stream to companion app", payload.stream_type);
        Ok(())
    }

    /// Probe `/api/health`. Any transport error counts as disconnected.
    pub async fn check_health(&self) -> bool {
        match self.client.get(self.endpoint("/api/health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Companion app unreachable at {}: {}", self.address, e);
                false
            }
        }
    }
}

#[async_trait]
impl Delivery for CompanionClient {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<()> {
        self.send_stream(payload).await
    }
}
