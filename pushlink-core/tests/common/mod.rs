// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Recording handlers, envelope fixtures, and log setup shared across
//! test files.

#![allow(dead_code)]

pub mod strategies;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pushlink_core::*;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_credentials() -> Credentials {
    Credentials::new(1234567890, "test-api-key")
}

/// Config with inline handlers so dispatch completes before `deliver` returns.
pub fn inline_config() -> ClientConfig {
    ClientConfig::default().with_inline_handlers()
}

/// Backoff short enough for tests, without jitter.
pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: 0.0,
        ..Default::default()
    }
}

/// Upstream handler that records messages and can be told to fail.
#[derive(Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<UpstreamMessage>>,
    fail: AtomicBool,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let handler = Self::default();
        handler.fail.store(true, Ordering::SeqCst);
        Arc::new(handler)
    }

    pub fn received(&self) -> Vec<UpstreamMessage> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

impl UpstreamHandler for RecordingHandler {
    fn handle(&self, message: &UpstreamMessage) -> Result<(), HandlerError> {
        self.received.lock().push(message.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(HandlerError::new("handler failed on purpose"));
        }
        Ok(())
    }
}

/// Receipt handler that records acks and nacks.
#[derive(Default)]
pub struct RecordingReceipts {
    receipts: Mutex<Vec<Receipt>>,
}

impl RecordingReceipts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts.lock().clone()
    }
}

impl ReceiptHandler for RecordingReceipts {
    fn on_ack(&self, receipt: &Receipt) {
        self.receipts.lock().push(receipt.clone());
    }

    fn on_nack(&self, receipt: &Receipt) {
        self.receipts.lock().push(receipt.clone());
    }
}

/// Event handler that keeps every event.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<ClientEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn count_matching(&self, predicate: impl Fn(&ClientEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn contains(&self, predicate: impl Fn(&ClientEvent) -> bool) -> bool {
        self.count_matching(predicate) > 0
    }
}

impl EventHandler for EventLog {
    fn on_event(&self, event: ClientEvent) {
        self.events.lock().push(event);
    }
}

/// Event dispatcher feeding a fresh [`EventLog`].
pub fn recording_dispatcher() -> (Arc<EventDispatcher>, Arc<EventLog>) {
    let log = EventLog::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(log.clone());
    (Arc::new(dispatcher), log)
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

// ============================================================
// Envelope fixtures
// ============================================================

pub fn upstream_json(from: &str, message_id: &str) -> String {
    format!(
        r#"{{"category":"com.example.app","data":{{"MESSAGE":"hello"}},"message_id":"{}","from":"{}"}}"#,
        message_id, from
    )
}

pub fn ack_json(message_id: &str) -> String {
    format!(
        r#"{{"message_type":"ack","from":"device-1","message_id":"{}"}}"#,
        message_id
    )
}

pub fn nack_json(message_id: &str, error: &str) -> String {
    format!(
        r#"{{"message_type":"nack","from":"device-1","message_id":"{}","error":"{}","error_description":"rejected"}}"#,
        message_id, error
    )
}

pub const DRAINING_JSON: &str =
    r#"{"message_type":"control","control_type":"CONNECTION_DRAINING"}"#;

pub fn downstream(to: &str) -> DownstreamMessage {
    DownstreamMessage::builder(to, pushlink_core::envelope::next_message_id())
        .data("MESSAGE", "hi")
        .build()
        .unwrap()
}

/// Acks among the envelopes a mock transport has sent.
pub fn sent_acks(transport: &MockTransport) -> Vec<Envelope> {
    transport
        .sent_envelopes()
        .into_iter()
        .filter(|e| e.message_type() == MessageType::Ack)
        .collect()
}
