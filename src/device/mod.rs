//! Device protocol client.
//!
//! Issues the three dispenser operations over HTTP:
//! - `GET /health` (no credential)
//! - `POST /dispense` (credential required)
//! - `GET /dispense/{tx_id}` (credential required)
//!
//! Each call is a single request/response exchange. The client never retries
//! or polls; that policy lives in the dispense tracker and health monitor.
//! Every call returns an [`OperationOutcome`], success or not, carrying the
//! status code and the latency measured up to the end of the body read.

mod error;
mod types;

pub use error::DeviceError;
pub use types::{
    ActiveTransaction, DispenseMetrics, DispenseReply, DispenseRequest, GpioInfo,
    HealthSnapshot, OperationOutcome, SignalLine, WifiInfo, WireState,
};

use crate::config::DeviceConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use types::BusyResponse;

/// Credential header understood by the firmware.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Longest response excerpt kept in protocol error messages.
const MAX_ERROR_BODY: usize = 200;

/// The operations the console performs against a dispenser.
///
/// Implementations must be safe to call concurrently; the orchestration loop
/// dispatches each call as its own task.
#[async_trait]
pub trait DeviceApi: Send + Sync + 'static {
    /// `GET /health`
    async fn query_health(&self) -> OperationOutcome<HealthSnapshot>;

    /// `POST /dispense`
    async fn start_dispense(&self, tx_id: &str, quantity: u32) -> OperationOutcome<DispenseReply>;

    /// `GET /dispense/{tx_id}`
    async fn query_dispense_status(&self, tx_id: &str) -> OperationOutcome<DispenseReply>;
}

/// HTTP implementation of [`DeviceApi`].
pub struct DispenserClient {
    /// Normalised base URL (e.g., "http://192.168.4.20")
    base_url: String,
    api_key: String,
    timeout: Duration,
    /// Shared HTTP client for connection pooling
    client: Client,
}

/// Raw exchange before per-operation status mapping.
struct Exchange {
    status: u16,
    body: Result<String, DeviceError>,
    latency: Duration,
}

impl DispenserClient {
    /// Create a client for the configured device.
    pub fn new(config: &DeviceConfig) -> Self {
        let timeout = config.timeout();
        // The per-request timeout below still applies if the builder fails
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(config, client)
    }

    /// Create a client with a custom HTTP client (for testing).
    pub fn with_client(config: &DeviceConfig, client: Client) -> Self {
        Self {
            base_url: normalize_base_url(&config.endpoint),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn exchange(&self, path: &str, request: RequestBuilder) -> Exchange {
        let start = Instant::now();
        let timeout_ms = self.timeout.as_millis() as u64;

        let exchange = match request.timeout(self.timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.map_err(|e| {
                    if e.is_timeout() {
                        DeviceError::from_transport(e, timeout_ms)
                    } else {
                        DeviceError::Protocol {
                            status,
                            message: format!("failed to read response body: {}", e),
                        }
                    }
                });
                Exchange {
                    status,
                    body,
                    latency: start.elapsed(),
                }
            }
            Err(e) => Exchange {
                status: 0,
                body: Err(DeviceError::from_transport(e, timeout_ms)),
                latency: start.elapsed(),
            },
        };

        tracing::debug!(
            path = path,
            status = exchange.status,
            latency_ms = exchange.latency.as_millis() as u64,
            "Device call completed"
        );

        exchange
    }
}

#[async_trait]
impl DeviceApi for DispenserClient {
    async fn query_health(&self) -> OperationOutcome<HealthSnapshot> {
        let url = format!("{}/health", self.base_url);
        let Exchange {
            status,
            body,
            latency,
        } = self.exchange("/health", self.client.get(&url)).await;

        let body = match body {
            Ok(body) => body,
            Err(error) => return OperationOutcome::failure(error, status, latency),
        };

        if status != 200 {
            return OperationOutcome::failure(
                unexpected_status("health", status, &body),
                status,
                latency,
            );
        }

        match parse_payload(status, &body) {
            Ok(health) => OperationOutcome::success(health, status, latency),
            Err(error) => OperationOutcome::failure(error, status, latency),
        }
    }

    async fn start_dispense(&self, tx_id: &str, quantity: u32) -> OperationOutcome<DispenseReply> {
        let url = format!("{}/dispense", self.base_url);
        let payload = DispenseRequest {
            tx_id: tx_id.to_string(),
            quantity,
        };
        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload);

        let Exchange {
            status,
            body,
            latency,
        } = self.exchange("/dispense", request).await;

        // A 409 without a readable body is still a conflict
        if status == 409 {
            let active_tx_id = body
                .ok()
                .and_then(|b| serde_json::from_str::<BusyResponse>(&b).ok())
                .and_then(|b| b.active_tx_id);
            return OperationOutcome::failure(
                DeviceError::Conflict { active_tx_id },
                status,
                latency,
            );
        }
        if status == 401 {
            return OperationOutcome::failure(DeviceError::Unauthorized, status, latency);
        }

        let body = match body {
            Ok(body) => body,
            Err(error) => return OperationOutcome::failure(error, status, latency),
        };

        if status != 200 {
            return OperationOutcome::failure(
                unexpected_status("dispense", status, &body),
                status,
                latency,
            );
        }

        match parse_payload(status, &body) {
            Ok(reply) => OperationOutcome::success(reply, status, latency),
            Err(error) => OperationOutcome::failure(error, status, latency),
        }
    }

    async fn query_dispense_status(&self, tx_id: &str) -> OperationOutcome<DispenseReply> {
        let path = format!("/dispense/{}", tx_id);
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(&url).header(API_KEY_HEADER, &self.api_key);

        let Exchange {
            status,
            body,
            latency,
        } = self.exchange(&path, request).await;

        if status == 404 {
            return OperationOutcome::failure(
                DeviceError::NotFound(tx_id.to_string()),
                status,
                latency,
            );
        }

        let body = match body {
            Ok(body) => body,
            Err(error) => return OperationOutcome::failure(error, status, latency),
        };

        if status != 200 {
            return OperationOutcome::failure(
                unexpected_status("status", status, &body),
                status,
                latency,
            );
        }

        match parse_payload(status, &body) {
            Ok(reply) => OperationOutcome::success(reply, status, latency),
            Err(error) => OperationOutcome::failure(error, status, latency),
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(status: u16, body: &str) -> Result<T, DeviceError> {
    serde_json::from_str(body).map_err(|e| DeviceError::Protocol {
        status,
        message: format!("invalid payload: {}", e),
    })
}

fn unexpected_status(operation: &str, status: u16, body: &str) -> DeviceError {
    let mut excerpt = body.trim().to_string();
    if excerpt.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !excerpt.is_char_boundary(end) {
            end -= 1;
        }
        excerpt.truncate(end);
    }
    DeviceError::Protocol {
        status,
        message: format!("{} returned {}: {}", operation, status, excerpt),
    }
}

/// Normalise a device address: trim trailing slashes, default to `http://`.
pub fn normalize_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Generate a short transaction id (the firmware accepts up to 16 chars).
pub fn generate_tx_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
