// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dispatcher
//!
//! Routes each decoded envelope on its `message_type` and drives the ack
//! protocol for upstream messages.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, warn};

use super::error::SessionError;
use super::handler::{HandlerError, Handlers, ReceiptHandler, UpstreamHandler};
use crate::config::{AckPolicy, HandlerExecution, DEFAULT_MAX_SPAWNED_HANDLERS};
use crate::envelope::{
    AckMessage, Envelope, MessageId, MessageType, Receipt, UpstreamMessage, CONNECTION_DRAINING,
};

/// What the dispatcher needs from the session it serves.
pub trait ProtocolSink: Send + Sync {
    /// Sends an ack through the session.
    fn send_ack(&self, ack: &AckMessage) -> Result<(), SessionError>;

    /// Enters draining, or defers the request while the handshake is still
    /// running. Returns false if a drain was already under way or the
    /// session is closed.
    fn begin_draining(&self) -> bool;

    /// Generation of the session, for logging.
    fn generation(&self) -> u64;
}

/// Result of dispatching one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Upstream message handed to the application handler. With spawned
    /// execution the handler and ack may still be running.
    Upstream { message_id: MessageId },
    /// Ack receipt passed to the receipt handler.
    Ack { message_id: MessageId },
    /// Nack receipt passed to the receipt handler.
    Nack { message_id: MessageId },
    /// The session entered draining.
    DrainingStarted,
    /// A repeated drain signal, or one that arrived when the session could
    /// no longer drain.
    DrainIgnored,
    /// A control type this client does not know.
    UnknownControl { control_type: Option<String> },
    /// A message type this client does not know.
    Unrecognized { message_type: String },
    /// The envelope lacked fields needed to process it.
    Dropped { reason: String },
}

/// Routes envelopes to the handlers.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Handlers,
    execution: HandlerExecution,
    ack_policy: AckPolicy,
    handler_limit: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(handlers: Handlers, execution: HandlerExecution, ack_policy: AckPolicy) -> Self {
        Dispatcher {
            handlers,
            execution,
            ack_policy,
            handler_limit: DEFAULT_MAX_SPAWNED_HANDLERS,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Caps the handler threads running at once. Upstream messages arriving
    /// while the cap is reached are handled on the delivery path.
    pub fn with_handler_limit(mut self, limit: usize) -> Self {
        self.handler_limit = limit;
        self
    }

    /// Spawned handlers that have not finished yet.
    pub fn handlers_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Dispatches one envelope.
    ///
    /// Never fails: every problem is logged and reported in the outcome.
    pub fn dispatch(
        &self,
        envelope: &Envelope,
        sink: &Arc<dyn ProtocolSink>,
    ) -> DispatchOutcome {
        match envelope.message_type() {
            MessageType::Upstream => self.dispatch_upstream(envelope, sink),
            MessageType::Ack => match envelope.receipt() {
                Some(receipt) => {
                    self.notify_receipt(&receipt, sink.generation(), |handler, r| {
                        handler.on_ack(r)
                    });
                    DispatchOutcome::Ack {
                        message_id: receipt.message_id,
                    }
                }
                None => dropped("ack without message_id"),
            },
            MessageType::Nack => match envelope.receipt() {
                Some(receipt) => {
                    self.notify_receipt(&receipt, sink.generation(), |handler, r| {
                        handler.on_nack(r)
                    });
                    DispatchOutcome::Nack {
                        message_id: receipt.message_id,
                    }
                }
                None => dropped("nack without message_id"),
            },
            MessageType::Control => dispatch_control(envelope, sink.as_ref()),
            MessageType::Other(message_type) => {
                warn!(
                    generation = sink.generation(),
                    message_type = %message_type,
                    "Unrecognized message type, dropping envelope"
                );
                DispatchOutcome::Unrecognized { message_type }
            }
        }
    }

    fn dispatch_upstream(
        &self,
        envelope: &Envelope,
        sink: &Arc<dyn ProtocolSink>,
    ) -> DispatchOutcome {
        let Some(message) = envelope.upstream() else {
            return dropped("upstream message without from or message_id");
        };
        let message_id = message.message_id.clone();

        match self.execution {
            HandlerExecution::Inline => {
                self.process_inline(&message, sink.as_ref());
            }
            HandlerExecution::Spawned => {
                let Some(slot) = self.reserve_handler_slot() else {
                    debug!(
                        generation = sink.generation(),
                        limit = self.handler_limit,
                        message_id = %message_id,
                        "Handler thread limit reached, handling inline"
                    );
                    self.process_inline(&message, sink.as_ref());
                    return DispatchOutcome::Upstream { message_id };
                };

                let handler = Arc::clone(&self.handlers.upstream);
                let job_sink = Arc::clone(sink);
                let job_message = message.clone();
                let ack_policy = self.ack_policy;

                let spawned = thread::Builder::new()
                    .name("upstream-handler".into())
                    .spawn(move || {
                        let _slot = slot;
                        process_upstream(
                            handler.as_ref(),
                            ack_policy,
                            &job_message,
                            job_sink.as_ref(),
                        );
                    });

                if let Err(e) = spawned {
                    warn!(error = %e, "Could not spawn handler thread, handling inline");
                    self.process_inline(&message, sink.as_ref());
                }
            }
        }

        DispatchOutcome::Upstream { message_id }
    }

    fn process_inline(&self, message: &UpstreamMessage, sink: &dyn ProtocolSink) {
        process_upstream(self.handlers.upstream.as_ref(), self.ack_policy, message, sink);
    }

    fn reserve_handler_slot(&self) -> Option<HandlerSlot> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.handler_limit).then_some(n + 1)
            })
            .ok()
            .map(|_| HandlerSlot {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    fn notify_receipt(
        &self,
        receipt: &Receipt,
        generation: u64,
        notify: impl FnOnce(&dyn ReceiptHandler, &Receipt),
    ) {
        let handler = self.handlers.receipts.as_ref();
        if !guard_callback("receipt handler", || notify(handler, receipt)) {
            warn!(
                generation,
                message_id = %receipt.message_id,
                "Receipt handler panicked, receipt dropped"
            );
        }
    }
}

/// One running handler thread. Released on drop, even if the thread unwinds.
struct HandlerSlot {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for HandlerSlot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs an embedder callback and logs a panic instead of unwinding into
/// the caller. Returns false if the callback panicked.
pub(crate) fn guard_callback(callback: &str, f: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                callback,
                panic = panic_message(payload.as_ref()),
                "Callback panicked"
            );
            false
        }
    }
}

/// Runs the handler, then acks according to the policy.
fn process_upstream(
    handler: &dyn UpstreamHandler,
    ack_policy: AckPolicy,
    message: &UpstreamMessage,
    sink: &dyn ProtocolSink,
) {
    let outcome = run_handler(handler, message);
    if let Err(e) = &outcome {
        error!(
            generation = sink.generation(),
            message_id = %message.message_id,
            from = %message.from,
            error = %e,
            "Upstream handler failed"
        );
        if ack_policy == AckPolicy::OnSuccess {
            info!(message_id = %message.message_id, "Skipping ack so the relay redelivers");
            return;
        }
    }

    let ack = AckMessage::new(message.from.clone(), message.message_id.clone());
    match sink.send_ack(&ack) {
        Ok(()) => debug!(message_id = %message.message_id, to = %message.from, "Ack sent"),
        Err(e) => warn!(
            message_id = %message.message_id,
            error = %e,
            "Could not send ack, relay will redeliver"
        ),
    }
}

fn run_handler(
    handler: &dyn UpstreamHandler,
    message: &UpstreamMessage,
) -> Result<(), HandlerError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::new(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn dispatch_control(envelope: &Envelope, sink: &dyn ProtocolSink) -> DispatchOutcome {
    match envelope.control_type() {
        Some(CONNECTION_DRAINING) => {
            if sink.begin_draining() {
                DispatchOutcome::DrainingStarted
            } else {
                debug!(generation = sink.generation(), "Drain signal ignored");
                DispatchOutcome::DrainIgnored
            }
        }
        other => {
            info!(
                generation = sink.generation(),
                control_type = ?other,
                "Unrecognized control type. This can happen when the relay adds protocol features"
            );
            DispatchOutcome::UnknownControl {
                control_type: other.map(str::to_string),
            }
        }
    }
}

fn dropped(reason: &str) -> DispatchOutcome {
    warn!(reason, "Dropping envelope");
    DispatchOutcome::Dropped {
        reason: reason.to_string(),
    }
}
