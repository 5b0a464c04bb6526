// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client configuration
//!
//! Everything here is supplied by the embedder at construction; the crate
//! reads no configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::network::{TransportConfig, DEFAULT_HOST};

/// Default cap on concurrently running upstream handler threads.
pub const DEFAULT_MAX_SPAWNED_HANDLERS: usize = 64;

/// How upstream handlers are run relative to the delivery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandlerExecution {
    /// Each upstream message is handled (and acked) on its own thread.
    #[default]
    Spawned,
    /// Handlers run on the transport's delivery path, one at a time.
    Inline,
}

/// When upstream messages are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Ack once the handler returns, whatever its outcome.
    #[default]
    Always,
    /// Skip the ack when the handler fails so the relay redelivers.
    OnSuccess,
}

/// Reconnect backoff settings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_delay: Duration,
    /// Growth factor between attempts.
    pub multiplier: u32,
    /// Random spread applied to each delay, as a fraction (0.0 to 1.0).
    pub jitter: f64,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Open the replacement session as soon as draining starts instead of
    /// waiting for the drained connection to close.
    pub preconnect_on_drain: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(300), // 5 minutes
            multiplier: 2,
            jitter: 0.1,
            max_attempts: None,
            preconnect_on_drain: false,
        }
    }
}

/// Configuration for [`crate::PushClient`] and the sessions it creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay endpoint.
    pub transport: TransportConfig,
    /// Realm appended to the sender id in the login address.
    pub realm: String,
    /// Reconnect backoff settings.
    pub reconnect: ReconnectConfig,
    /// Where upstream handlers run.
    pub handler_execution: HandlerExecution,
    /// When upstream messages are acknowledged.
    pub ack_policy: AckPolicy,
    /// Cap on spawned handler threads per session. Past it, handlers run on
    /// the delivery path until a thread finishes.
    pub max_spawned_handlers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            transport: TransportConfig::default(),
            realm: DEFAULT_HOST.to_string(),
            reconnect: ReconnectConfig::default(),
            handler_execution: HandlerExecution::default(),
            ack_policy: AckPolicy::default(),
            max_spawned_handlers: DEFAULT_MAX_SPAWNED_HANDLERS,
        }
    }
}

impl ClientConfig {
    /// Use a custom endpoint.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Use a custom login realm.
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = realm.to_string();
        self
    }

    /// Use custom reconnect settings.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Run upstream handlers on the delivery path.
    pub fn with_inline_handlers(mut self) -> Self {
        self.handler_execution = HandlerExecution::Inline;
        self
    }

    /// Cap the spawned handler threads per session.
    pub fn with_max_spawned_handlers(mut self, limit: usize) -> Self {
        self.max_spawned_handlers = limit;
        self
    }

    /// Set the ack policy.
    pub fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }
}
