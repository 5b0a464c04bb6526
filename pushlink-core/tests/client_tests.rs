// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the push client: session replacement and reconnect backoff

mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use parking_lot::Mutex;
use pushlink_core::*;

struct Harness {
    client: Arc<PushClient<MockTransport>>,
    transports: Arc<Mutex<Vec<MockTransport>>>,
    open_errors: Arc<Mutex<VecDeque<NetworkError>>>,
    handler: Arc<RecordingHandler>,
    log: Arc<EventLog>,
}

impl Harness {
    fn new(config: ClientConfig) -> Self {
        init_tracing();
        let transports = Arc::new(Mutex::new(Vec::<MockTransport>::new()));
        let open_errors = Arc::new(Mutex::new(VecDeque::<NetworkError>::new()));
        let handler = RecordingHandler::new();
        let log = EventLog::new();

        let created = transports.clone();
        let errors = open_errors.clone();
        let client = PushClient::builder(test_credentials(), move || {
            let transport = MockTransport::new();
            if let Some(error) = errors.lock().pop_front() {
                transport.inject_error(error);
            }
            created.lock().push(transport.clone());
            transport
        })
        .config(config)
        .upstream_handler(handler.clone())
        .event_handler(log.clone())
        .build();

        Harness {
            client: Arc::new(client),
            transports,
            open_errors,
            handler,
            log,
        }
    }

    fn connected(config: ClientConfig) -> Self {
        let harness = Self::new(config);
        harness.client.connect().unwrap();
        harness
    }

    fn transport(&self, index: usize) -> MockTransport {
        self.transports.lock()[index].clone()
    }

    fn transport_count(&self) -> usize {
        self.transports.lock().len()
    }

    fn fail_next_opens(&self, errors: impl IntoIterator<Item = NetworkError>) {
        self.open_errors.lock().extend(errors);
    }
}

fn test_config() -> ClientConfig {
    inline_config().with_reconnect(fast_reconnect())
}

// ============================================================
// Connect and send
// ============================================================

#[test]
fn test_state_before_connect() {
    let h = Harness::new(test_config());

    assert_eq!(h.client.state(), SessionState::Disconnected);
    assert_eq!(h.client.current_generation(), None);
    assert!(h.client.session().is_none());
}

#[test]
fn test_send_before_connect_not_connected() {
    let h = Harness::new(test_config());

    let result = h.client.send_downstream(&downstream("t"));

    assert_eq!(result, Err(ClientError::Session(SessionError::NotConnected)));
    assert!(result.unwrap_err().is_retryable());
}

#[test]
fn test_connect_and_send() {
    let h = Harness::connected(test_config());

    h.client.send_downstream(&downstream("device-token")).unwrap();

    assert_eq!(h.client.state(), SessionState::Connected);
    assert_eq!(h.client.current_generation(), Some(1));
    assert_eq!(h.transport(0).sent_envelopes()[0].to(), Some("device-token"));
}

#[test]
fn test_connect_is_idempotent_while_live() {
    let h = Harness::connected(test_config());

    h.client.connect().unwrap();

    assert_eq!(h.transport_count(), 1);
    assert_eq!(h.client.current_generation(), Some(1));
}

#[test]
fn test_connect_authentication_failure_reported() {
    let h = Harness::new(test_config());
    h.fail_next_opens([NetworkError::AuthenticationFailed("denied".into())]);

    let result = h.client.connect();

    assert!(result.unwrap_err().is_authentication());
    assert!(h
        .log
        .contains(|e| matches!(e, ClientEvent::AuthenticationFailed { .. })));
    assert_eq!(h.client.current_generation(), None);
}

#[test]
fn test_failed_connect_queues_nothing() {
    let h = Harness::new(test_config());
    h.fail_next_opens([NetworkError::ConnectionFailed("refused".into())]);

    assert!(h.client.connect().is_err());
    assert_eq!(h.client.process_pending().unwrap(), 0);
    assert_eq!(h.transport_count(), 1);
}

#[test]
fn test_upstream_reaches_handler_through_client() {
    let h = Harness::connected(test_config());

    h.transport(0).deliver(&upstream_json("device-1", "m-1"));

    assert_eq!(h.handler.count(), 1);
    assert_eq!(sent_acks(&h.transport(0)).len(), 1);
}

// ============================================================
// Draining
// ============================================================

#[test]
fn test_send_while_draining_rejected() {
    let h = Harness::connected(test_config());
    h.transport(0).deliver(DRAINING_JSON);

    let result = h.client.send_downstream(&downstream("t"));

    assert_eq!(
        result,
        Err(ClientError::Session(SessionError::RejectedDraining))
    );
    assert!(h.transport(0).sent_messages().is_empty());
}

#[test]
fn test_concurrent_connects_share_one_session() {
    init_tracing();
    let built = Arc::new(AtomicUsize::new(0));
    let built_clone = built.clone();
    let client = Arc::new(
        PushClient::builder(test_credentials(), move || {
            built_clone.fetch_add(1, Ordering::SeqCst);
            // Widen the window between the liveness check and the install.
            thread::sleep(Duration::from_millis(50));
            MockTransport::new()
        })
        .config(test_config())
        .build(),
    );
    let start = Arc::new(Barrier::new(4));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                client.connect()
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap().unwrap();
    }

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(client.current_generation(), Some(1));
    assert_eq!(client.state(), SessionState::Connected);
}

#[test]
fn test_drain_during_first_handshake_leads_to_replacement() {
    init_tracing();
    let transports = Arc::new(Mutex::new(Vec::<MockTransport>::new()));
    let created = transports.clone();
    let client = PushClient::builder(test_credentials(), move || {
        let transport = MockTransport::new();
        let mut created = created.lock();
        if created.is_empty() {
            transport.deliver_on_open(DRAINING_JSON);
        }
        created.push(transport.clone());
        transport
    })
    .config(test_config())
    .build();

    client.connect().unwrap();
    assert_eq!(client.state(), SessionState::Draining);
    assert_eq!(
        client.send_downstream(&downstream("t")),
        Err(ClientError::Session(SessionError::RejectedDraining))
    );

    let first = transports.lock()[0].clone();
    first.emit(LifecycleEvent::Closed);
    client.process_pending().unwrap();

    assert_eq!(transports.lock().len(), 2);
    assert_eq!(client.current_generation(), Some(2));
    assert_eq!(client.state(), SessionState::Connected);
    assert!(first.sent_messages().is_empty());
}

#[test]
fn test_drained_session_replaced_with_fresh_transport() {
    let h = Harness::connected(test_config());
    h.transport(0).deliver(DRAINING_JSON);
    h.transport(0).emit(LifecycleEvent::Closed);

    assert_eq!(h.client.process_pending().unwrap(), 1);

    assert_eq!(h.transport_count(), 2);
    assert_eq!(h.transport(0).open_count(), 1);
    assert_eq!(h.transport(1).open_count(), 1);
    assert_eq!(h.client.current_generation(), Some(2));
    assert_eq!(h.client.state(), SessionState::Connected);
    assert!(h.log.contains(|e| *e
        == ClientEvent::SessionReplaced {
            old_generation: 1,
            new_generation: 2
        }));

    h.client.send_downstream(&downstream("t")).unwrap();
    assert_eq!(h.transport(1).sent_messages().len(), 1);
    assert!(h.transport(0).sent_messages().is_empty());
}

#[test]
fn test_preconnect_on_drain_swaps_before_old_session_closes() {
    let mut config = test_config();
    config.reconnect.preconnect_on_drain = true;
    let h = Harness::connected(config);

    h.transport(0).deliver(DRAINING_JSON);
    h.client.process_pending().unwrap();

    assert_eq!(h.transport_count(), 2);
    assert_eq!(h.client.current_generation(), Some(2));
    assert_eq!(h.client.state(), SessionState::Connected);
    h.client.send_downstream(&downstream("t")).unwrap();
    assert_eq!(h.transport(1).sent_messages().len(), 1);

    // The drained session still acks what it receives.
    h.transport(0).deliver(&upstream_json("device-1", "m-late"));
    assert_eq!(sent_acks(&h.transport(0)).len(), 1);

    // Its closure no longer triggers anything.
    h.transport(0).emit(LifecycleEvent::Closed);
    h.client.process_pending().unwrap();
    assert_eq!(h.transport_count(), 2);
    assert_eq!(h.client.current_generation(), Some(2));
}

// ============================================================
// Backoff
// ============================================================

#[test]
fn test_unexpected_closure_reconnects_with_backoff() {
    let h = Harness::connected(test_config());

    h.transport(0).close_with_error("connection reset");
    h.client.process_pending().unwrap();

    assert_eq!(h.transport_count(), 2);
    assert_eq!(h.client.state(), SessionState::Connected);
    assert!(h.log.contains(|e| *e
        == ClientEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(5)
        }));
    assert!(h.log.contains(|e| *e
        == ClientEvent::Reconnected {
            generation: 2,
            attempts: 1
        }));
    assert!(!h
        .log
        .contains(|e| matches!(e, ClientEvent::SessionReplaced { .. })));
}

#[test]
fn test_backoff_delays_grow_to_cap() {
    let h = Harness::connected(test_config());
    h.fail_next_opens([
        NetworkError::ConnectionFailed("refused".into()),
        NetworkError::Timeout,
    ]);

    h.transport(0).close_with_error("reset");
    h.client.process_pending().unwrap();

    let delays: Vec<_> = h
        .log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::ReconnectScheduled { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(20)
        ]
    );
    assert_eq!(
        h.log
            .count_matching(|e| matches!(e, ClientEvent::ReconnectFailed { .. })),
        2
    );
    assert!(h.log.contains(|e| matches!(
        e,
        ClientEvent::Reconnected { attempts: 3, .. }
    )));
    assert_eq!(h.client.state(), SessionState::Connected);
}

#[test]
fn test_authentication_failure_stops_reconnecting() {
    let h = Harness::connected(test_config());
    h.fail_next_opens([NetworkError::AuthenticationFailed("revoked".into())]);

    h.transport(0).close_with_error("reset");
    let result = h.client.process_pending();

    assert_eq!(
        result,
        Err(ClientError::Session(SessionError::Authentication(
            "revoked".into()
        )))
    );
    assert_eq!(h.transport_count(), 2);
    assert!(h
        .log
        .contains(|e| matches!(e, ClientEvent::AuthenticationFailed { .. })));
    assert_eq!(h.client.state(), SessionState::Closed);
}

#[test]
fn test_max_attempts_exhausted() {
    let mut config = test_config();
    config.reconnect.max_attempts = Some(2);
    let h = Harness::connected(config);
    h.fail_next_opens([NetworkError::Timeout, NetworkError::Timeout]);

    h.transport(0).close_with_error("reset");
    let result = h.client.process_pending();

    assert_eq!(result, Err(ClientError::ReconnectExhausted { attempts: 2 }));
    assert_eq!(h.transport_count(), 3);
}

#[test]
fn test_deliberate_session_close_does_not_reconnect() {
    let h = Harness::connected(test_config());

    h.client.session().unwrap().close().unwrap();

    assert_eq!(h.client.process_pending().unwrap(), 0);
    assert_eq!(h.transport_count(), 1);
}

// ============================================================
// Supervisor thread and shutdown
// ============================================================

#[test]
fn test_supervisor_thread_replaces_drained_session() {
    let h = Harness::connected(test_config());
    let supervisor = h.client.spawn_supervisor().unwrap();

    h.transport(0).deliver(DRAINING_JSON);
    h.transport(0).emit(LifecycleEvent::Closed);

    let client = h.client.clone();
    assert!(wait_until(Duration::from_secs(2), || {
        client.current_generation() == Some(2) && client.state() == SessionState::Connected
    }));

    h.client.shutdown();
    assert_eq!(supervisor.join().unwrap(), Ok(()));
}

#[test]
fn test_shutdown_interrupts_backoff_sleep() {
    let mut config = test_config();
    config.reconnect.initial_delay = Duration::from_secs(30);
    config.reconnect.max_delay = Duration::from_secs(60);
    let h = Harness::connected(config);
    let supervisor = h.client.spawn_supervisor().unwrap();

    h.transport(0).close_with_error("reset");
    let log = h.log.clone();
    assert!(wait_until(Duration::from_secs(2), || {
        log.contains(|e| matches!(e, ClientEvent::ReconnectScheduled { .. }))
    }));

    let started = Instant::now();
    h.client.shutdown();
    assert_eq!(supervisor.join().unwrap(), Ok(()));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.transport_count(), 1);
}

#[test]
fn test_operations_after_shutdown() {
    let h = Harness::connected(test_config());

    h.client.shutdown();

    assert!(h.client.is_shut_down());
    assert!(!h.transport(0).is_open());
    assert_eq!(h.client.state(), SessionState::Closed);
    assert_eq!(
        h.client.send_downstream(&downstream("t")),
        Err(ClientError::ShutDown)
    );
    assert_eq!(h.client.connect(), Err(ClientError::ShutDown));
    assert_eq!(h.client.run(), Ok(()));
}

#[test]
fn test_closure_after_shutdown_ignored() {
    let h = Harness::connected(test_config());
    let transport = h.transport(0);

    h.client.shutdown();
    transport.close_with_error("late");

    assert_eq!(h.client.process_pending().unwrap(), 0);
    assert_eq!(h.transport_count(), 1);
}
