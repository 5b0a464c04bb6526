// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Application handlers
//!
//! Hooks the embedder supplies for upstream messages and delivery receipts.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::envelope::{Receipt, UpstreamMessage};

/// Failure reported by an upstream handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

/// Processes upstream data messages.
///
/// May be called from several threads at once when handlers are spawned.
/// Errors and panics are caught by the dispatcher; with the default ack
/// policy the message is acknowledged either way.
pub trait UpstreamHandler: Send + Sync {
    fn handle(&self, message: &UpstreamMessage) -> Result<(), HandlerError>;
}

/// Closure-backed upstream handler.
pub struct UpstreamCallback<F>
where
    F: Fn(&UpstreamMessage) -> Result<(), HandlerError> + Send + Sync,
{
    callback: F,
}

impl<F> UpstreamCallback<F>
where
    F: Fn(&UpstreamMessage) -> Result<(), HandlerError> + Send + Sync,
{
    /// Creates a new callback handler.
    pub fn new(callback: F) -> Self {
        UpstreamCallback { callback }
    }
}

impl<F> UpstreamHandler for UpstreamCallback<F>
where
    F: Fn(&UpstreamMessage) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &UpstreamMessage) -> Result<(), HandlerError> {
        (self.callback)(message)
    }
}

/// Default upstream handler: logs the well-known payload keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingUpstreamHandler;

impl UpstreamHandler for LoggingUpstreamHandler {
    fn handle(&self, message: &UpstreamMessage) -> Result<(), HandlerError> {
        let category = message.category.as_deref().unwrap_or("unknown");
        if let Some(text) = message.data.get("MESSAGE") {
            info!(from = %message.from, category, text = %text, "Upstream message");
        }
        if let Some(control) = message.data.get("CONTROL_MESSAGE") {
            info!(from = %message.from, category, control = %control, "Upstream control message");
        }
        Ok(())
    }
}

/// Receives delivery receipts for downstream messages.
///
/// The default methods only log. Nacked messages are not retried; that is
/// up to the implementation.
pub trait ReceiptHandler: Send + Sync {
    fn on_ack(&self, receipt: &Receipt) {
        debug!(message_id = %receipt.message_id, from = ?receipt.from, "Ack received");
    }

    fn on_nack(&self, receipt: &Receipt) {
        warn!(
            message_id = %receipt.message_id,
            from = ?receipt.from,
            error = ?receipt.error,
            description = ?receipt.error_description,
            "Nack received"
        );
    }
}

/// Receipt handler using the default logging behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReceiptHandler;

impl ReceiptHandler for LoggingReceiptHandler {}

/// The handler set a session dispatches to.
#[derive(Clone)]
pub struct Handlers {
    pub upstream: Arc<dyn UpstreamHandler>,
    pub receipts: Arc<dyn ReceiptHandler>,
}

impl Handlers {
    /// Uses `upstream` for data messages and logs receipts.
    pub fn new(upstream: Arc<dyn UpstreamHandler>) -> Self {
        Handlers {
            upstream,
            receipts: Arc::new(LoggingReceiptHandler),
        }
    }

    /// Replaces the receipt handler.
    pub fn with_receipts(mut self, receipts: Arc<dyn ReceiptHandler>) -> Self {
        self.receipts = receipts;
        self
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Handlers::new(Arc::new(LoggingUpstreamHandler))
    }
}
