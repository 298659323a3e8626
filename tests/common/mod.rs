//! Shared test utilities for dispenser integration tests.
//!
//! Provides a mock device built on wiremock and a harness that runs the
//! orchestration loop against it.

#![allow(dead_code)]

use dispenser::config::DispenserConfig;
use dispenser::console::{run, Console, ConsoleSnapshot, Input};
use dispenser::device::{DeviceApi, DispenserClient};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-key";

/// Regex matching a status poll for any generated transaction id.
pub const STATUS_PATH: &str = r"^/dispense/[0-9a-f]{8}$";

/// Upper bound for any single wait in the integration tests.
pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Payloads
// =============================================================================

pub fn health_body(dispenser: &str) -> Value {
    json!({
        "status": "ok",
        "uptime": 3600,
        "firmware": "1.2.0",
        "dispenser": dispenser,
        "hopper_low": false,
        "wifi": {"rssi": -58, "ip": "192.168.4.20", "ssid": "tokens"},
        "metrics": {
            "total_dispenses": 10,
            "successful": 9,
            "jams": 1,
            "partial": 0,
            "failures": 0,
            "last_error": "",
            "last_error_type": ""
        }
    })
}

pub fn reply_body(state: &str, quantity: u32, dispensed: u32) -> Value {
    json!({
        "tx_id": "ignored0",
        "state": state,
        "quantity": quantity,
        "dispensed": dispensed
    })
}

// =============================================================================
// Mock device
// =============================================================================

/// Mount a healthy `GET /health`.
pub async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body("idle")))
        .mount(server)
        .await;
}

/// Mount a `POST /dispense` that accepts and reports `dispensing`.
pub async fn mount_start(server: &MockServer, quantity: u32) {
    Mock::given(method("POST"))
        .and(path("/dispense"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("dispensing", quantity, 0)))
        .mount(server)
        .await;
}

/// Mount status polls that report progress `in_progress` times, then `final_state`.
pub async fn mount_status(server: &MockServer, quantity: u32, in_progress: u64, final_state: &str) {
    if in_progress > 0 {
        Mock::given(method("GET"))
            .and(path_regex(STATUS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply_body("dispensing", quantity, 1)),
            )
            .up_to_n_times(in_progress)
            .with_priority(1)
            .mount(server)
            .await;
    }

    let dispensed = if final_state == "done" { quantity } else { 1 };
    Mock::given(method("GET"))
        .and(path_regex(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(reply_body(final_state, quantity, dispensed)),
        )
        .with_priority(2)
        .mount(server)
        .await;
}

// =============================================================================
// Loop harness
// =============================================================================

/// Fast cadence suitable for tests against a local mock.
pub fn test_config(endpoint: &str) -> DispenserConfig {
    let mut config = DispenserConfig::default();
    config.device.endpoint = endpoint.to_string();
    config.device.api_key = API_KEY.to_string();
    config.device.timeout_ms = 1000;
    config.console.tick_ms = 50;
    config.dispense.poll_interval_ms = 20;
    config
}

/// A running orchestration loop.
pub struct Harness {
    pub inputs: mpsc::Sender<Input>,
    pub snapshots: watch::Receiver<ConsoleSnapshot>,
    pub cancel: CancellationToken,
    handle: JoinHandle<Console>,
}

impl Harness {
    pub fn start(config: DispenserConfig) -> Self {
        let device: Arc<dyn DeviceApi> = Arc::new(DispenserClient::new(&config.device));
        let (inputs, input_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshots) = watch::channel(ConsoleSnapshot::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            Console::new(&config),
            device,
            input_rx,
            snapshot_tx,
            cancel.clone(),
        ));

        Self {
            inputs,
            snapshots,
            cancel,
            handle,
        }
    }

    pub async fn send(&self, input: Input) {
        self.inputs.send(input).await.unwrap();
    }

    /// Wait until a published snapshot satisfies `pred`.
    pub async fn wait_for(
        &mut self,
        pred: impl FnMut(&ConsoleSnapshot) -> bool,
    ) -> ConsoleSnapshot {
        tokio::time::timeout(WAIT, self.snapshots.wait_for(pred))
            .await
            .expect("timed out waiting for console state")
            .expect("console loop exited")
            .clone()
    }

    /// Quit and return the final console state.
    pub async fn quit(self) -> Console {
        self.inputs.send(Input::Quit).await.unwrap();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("console loop did not stop")
            .unwrap()
    }
}
