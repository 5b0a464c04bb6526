// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Push Client
//!
//! Owns the live session and replaces it when the relay drains or drops
//! the connection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::error::ClientError;
use super::policy::{ReconnectDecision, ReconnectPolicy};
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::envelope::{DownstreamMessage, MessageId};
use crate::events::{CallbackHandler, ClientEvent, EventDispatcher, EventHandler};
use crate::network::Transport;
use crate::session::{
    Handlers, ReceiptHandler, Session, SessionError, SessionState, UpstreamHandler,
};

type TransportFactory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Work queued for the supervisor by session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Closed {
        generation: u64,
        prior_state: SessionState,
    },
    Drained {
        generation: u64,
    },
}

#[derive(Default)]
struct SupervisorQueue {
    tasks: VecDeque<Task>,
    shutting_down: bool,
}

#[derive(Default)]
struct Supervisor {
    queue: Mutex<SupervisorQueue>,
    wake: Condvar,
}

impl Supervisor {
    fn push(&self, task: Task) {
        let mut queue = self.queue.lock();
        if queue.shutting_down {
            return;
        }
        queue.tasks.push_back(task);
        self.wake.notify_all();
    }

    fn is_shutting_down(&self) -> bool {
        self.queue.lock().shutting_down
    }
}

/// Turns session events into supervisor tasks.
///
/// Runs on whatever thread the transport reports from, so it only queues.
struct SupervisorForwarder {
    supervisor: Weak<Supervisor>,
    preconnect_on_drain: bool,
}

impl EventHandler for SupervisorForwarder {
    fn on_event(&self, event: ClientEvent) {
        let Some(supervisor) = self.supervisor.upgrade() else {
            return;
        };
        match event {
            ClientEvent::SessionClosed {
                generation,
                prior_state,
                ..
            } => supervisor.push(Task::Closed {
                generation,
                prior_state,
            }),
            ClientEvent::DrainingStarted { generation } if self.preconnect_on_drain => {
                supervisor.push(Task::Drained { generation })
            }
            _ => {}
        }
    }
}

/// Embedder-facing client.
///
/// Keeps one live [`Session`] and applies the reconnection policy:
/// - A session closed after draining is replaced by a new one built from
///   a fresh transport
/// - A session that drops unexpectedly is reconnected with backoff
/// - Authentication failures stop reconnecting
///
/// Closures are queued; call [`PushClient::run`] (or
/// [`PushClient::spawn_supervisor`]) to act on them, or
/// [`PushClient::process_pending`] to handle them from your own loop.
///
/// # Example
///
/// ```ignore
/// use pushlink_core::{Credentials, MockTransport, PushClient};
///
/// let client = Arc::new(
///     PushClient::builder(Credentials::new(1234, "api-key"), MockTransport::new)
///         .upstream_handler(Arc::new(MyHandler))
///         .build(),
/// );
/// client.connect()?;
/// let supervisor = client.spawn_supervisor()?;
///
/// let msg = DownstreamMessage::builder("device-token", client.next_message_id())
///     .data("MESSAGE", "hello")
///     .build()?;
/// client.send_downstream(&msg)?;
///
/// client.shutdown();
/// supervisor.join();
/// ```
pub struct PushClient<T: Transport + 'static> {
    config: ClientConfig,
    credentials: Credentials,
    handlers: Handlers,
    factory: TransportFactory<T>,
    events: Arc<EventDispatcher>,
    policy: ReconnectPolicy,
    current: RwLock<Option<Session<T>>>,
    // Drained sessions that were replaced before their transport closed.
    retired: Mutex<Vec<Session<T>>>,
    // Serializes session creation against closure decisions.
    connect_lock: Mutex<()>,
    next_generation: AtomicU64,
    supervisor: Arc<Supervisor>,
}

impl<T: Transport + 'static> PushClient<T> {
    /// Starts building a client. `factory` is called once per session.
    pub fn builder<F>(credentials: Credentials, factory: F) -> PushClientBuilder<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        PushClientBuilder {
            credentials,
            factory: Box::new(factory),
            config: ClientConfig::default(),
            handlers: Handlers::default(),
            events: EventDispatcher::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the live session, if any.
    pub fn session(&self) -> Option<Session<T>> {
        self.current.read().clone()
    }

    /// State of the live session. `Disconnected` before the first connect.
    pub fn state(&self) -> SessionState {
        self.session()
            .map(|session| session.state())
            .unwrap_or(SessionState::Disconnected)
    }

    /// Generation of the live session, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|session| session.generation())
    }

    pub fn is_shut_down(&self) -> bool {
        self.supervisor.is_shutting_down()
    }

    /// Connects the first session.
    ///
    /// Does nothing if a session is already live. Concurrent callers share
    /// one session: the check and the connect run under the same lock.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.ensure_running()?;
        let _guard = self.connect_lock.lock();
        if self
            .session()
            .is_some_and(|session| !session.state().is_closed())
        {
            return Ok(());
        }

        match self.open_session_locked() {
            Ok(generation) => {
                debug!(generation, "Client connected");
                Ok(())
            }
            Err(error) => {
                self.report_authentication(&error);
                Err(error)
            }
        }
    }

    /// Sends a downstream message on the live session.
    pub fn send_downstream(&self, message: &DownstreamMessage) -> Result<(), ClientError> {
        self.ensure_running()?;
        let session = self.session().ok_or(SessionError::NotConnected)?;
        session.send_downstream(message)?;
        Ok(())
    }

    /// Returns a fresh message identifier.
    pub fn next_message_id(&self) -> MessageId {
        crate::envelope::next_message_id()
    }

    /// Handles every queued task without waiting for new ones.
    ///
    /// Reconnect backoff still sleeps. Returns the number of tasks handled.
    pub fn process_pending(&self) -> Result<usize, ClientError> {
        let mut handled = 0;
        loop {
            let task = self.supervisor.queue.lock().tasks.pop_front();
            let Some(task) = task else {
                return Ok(handled);
            };
            match self.handle(task) {
                Ok(()) => handled += 1,
                Err(ClientError::ShutDown) => return Ok(handled + 1),
                Err(error) => return Err(error),
            }
        }
    }

    /// Supervises until [`PushClient::shutdown`] is called.
    ///
    /// Returns an error when reconnecting is given up: on an
    /// authentication failure or once `max_attempts` is used up.
    pub fn run(&self) -> Result<(), ClientError> {
        info!("Supervisor started");
        loop {
            let task = {
                let mut queue = self.supervisor.queue.lock();
                loop {
                    if queue.shutting_down {
                        info!("Supervisor stopped");
                        return Ok(());
                    }
                    if let Some(task) = queue.tasks.pop_front() {
                        break task;
                    }
                    self.supervisor.wake.wait(&mut queue);
                }
            };

            match self.handle(task) {
                Ok(()) | Err(ClientError::ShutDown) => {}
                Err(error) => {
                    error!(error = %error, "Supervisor giving up");
                    return Err(error);
                }
            }
        }
    }

    /// Runs [`PushClient::run`] on a dedicated thread.
    pub fn spawn_supervisor(
        self: &Arc<Self>,
    ) -> std::io::Result<JoinHandle<Result<(), ClientError>>> {
        let client = Arc::clone(self);
        thread::Builder::new()
            .name("pushlink-supervisor".into())
            .spawn(move || client.run())
    }

    /// Stops the supervisor, interrupts backoff sleeps and closes all
    /// sessions.
    pub fn shutdown(&self) {
        {
            let mut queue = self.supervisor.queue.lock();
            if queue.shutting_down {
                return;
            }
            queue.shutting_down = true;
            queue.tasks.clear();
            self.supervisor.wake.notify_all();
        }
        info!("Shutting down client");

        let retired: Vec<_> = self.retired.lock().drain(..).collect();
        for session in self.session().into_iter().chain(retired) {
            if let Err(error) = session.close() {
                warn!(generation = session.generation(), error = %error, "Failed to close session");
            }
        }
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_shut_down() {
            return Err(ClientError::ShutDown);
        }
        Ok(())
    }

    fn emit(&self, event: ClientEvent) {
        self.events.dispatch(event);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == Some(generation)
    }

    fn report_authentication(&self, error: &ClientError) {
        if error.is_authentication() {
            error!(error = %error, "Relay rejected the credentials");
            self.emit(ClientEvent::AuthenticationFailed {
                reason: error.to_string(),
            });
        }
    }

    /// Builds, connects and installs a new session. Returns its generation.
    fn open_session(&self) -> Result<u64, ClientError> {
        let _guard = self.connect_lock.lock();
        self.open_session_locked()
    }

    /// [`PushClient::open_session`] for callers already holding `connect_lock`.
    fn open_session_locked(&self) -> Result<u64, ClientError> {
        self.ensure_running()?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session::with_generation(
            (self.factory)(),
            self.config.clone(),
            self.handlers.clone(),
            Arc::clone(&self.events),
            generation,
        );
        session.connect(&self.credentials)?;

        if self.is_shut_down() {
            // Shutdown raced with the connect; the new session was never visible.
            let _ = session.close();
            return Err(ClientError::ShutDown);
        }

        let previous = self.current.write().replace(session);
        if let Some(previous) = previous {
            if !previous.state().is_closed() {
                self.retired.lock().push(previous);
            }
        }
        Ok(generation)
    }

    fn handle(&self, task: Task) -> Result<(), ClientError> {
        match task {
            Task::Closed {
                generation,
                prior_state,
            } => {
                let decision = {
                    let _guard = self.connect_lock.lock();
                    self.retired
                        .lock()
                        .retain(|session| session.generation() != generation);
                    self.policy.on_closed(
                        prior_state,
                        self.is_current(generation),
                        self.is_shut_down(),
                    )
                };

                match decision {
                    ReconnectDecision::Replace => {
                        info!(generation, "Drained connection closed, opening a new session");
                        self.reconnect(true, Some(generation))
                    }
                    ReconnectDecision::Backoff => {
                        warn!(generation, %prior_state, "Connection lost, reconnecting");
                        self.reconnect(false, None)
                    }
                    ReconnectDecision::Ignore => {
                        debug!(generation, %prior_state, "Ignoring closure");
                        Ok(())
                    }
                }
            }
            Task::Drained { generation } => {
                let preconnect = {
                    let _guard = self.connect_lock.lock();
                    self.policy
                        .preconnect_on_drain(self.is_current(generation), self.is_shut_down())
                };
                if !preconnect {
                    return Ok(());
                }

                info!(generation, "Opening replacement session while draining");
                match self.open_session() {
                    Ok(new_generation) => {
                        self.emit(ClientEvent::Reconnected {
                            generation: new_generation,
                            attempts: 1,
                        });
                        self.emit(ClientEvent::SessionReplaced {
                            old_generation: generation,
                            new_generation,
                        });
                        Ok(())
                    }
                    Err(ClientError::ShutDown) => Err(ClientError::ShutDown),
                    Err(error) => {
                        // The draining session stays live; its closure is
                        // handled like any drained closure.
                        warn!(generation, error = %error, "Replacement session failed");
                        self.report_authentication(&error);
                        self.emit(ClientEvent::ReconnectFailed {
                            attempt: 1,
                            error: error.to_string(),
                        });
                        Ok(())
                    }
                }
            }
        }
    }

    /// Opens sessions until one connects.
    ///
    /// With `immediate`, the first attempt runs without waiting.
    fn reconnect(&self, immediate: bool, replacing: Option<u64>) -> Result<(), ClientError> {
        let mut backoff = self.policy.backoff();
        let mut attempts = 0;

        if immediate {
            attempts += 1;
            if let Some(generation) = self.attempt(attempts)? {
                self.finish_reconnect(generation, attempts, replacing);
                return Ok(());
            }
        }

        loop {
            let Some(delay) = backoff.next_delay() else {
                error!(attempts, "Reconnect attempts exhausted");
                return Err(ClientError::ReconnectExhausted { attempts });
            };
            attempts += 1;
            info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
            self.emit(ClientEvent::ReconnectScheduled {
                attempt: attempts,
                delay,
            });
            self.sleep(delay)?;

            if let Some(generation) = self.attempt(attempts)? {
                self.finish_reconnect(generation, attempts, replacing);
                return Ok(());
            }
        }
    }

    /// One connect attempt. `Ok(None)` means retry.
    fn attempt(&self, attempt: u32) -> Result<Option<u64>, ClientError> {
        match self.open_session() {
            Ok(generation) => Ok(Some(generation)),
            Err(ClientError::Session(error)) if self.policy.should_retry(&error) => {
                warn!(attempt, error = %error, "Reconnect attempt failed");
                self.emit(ClientEvent::ReconnectFailed {
                    attempt,
                    error: error.to_string(),
                });
                Ok(None)
            }
            Err(error) => {
                self.report_authentication(&error);
                Err(error)
            }
        }
    }

    fn finish_reconnect(&self, generation: u64, attempts: u32, replacing: Option<u64>) {
        info!(generation, attempts, "Reconnected");
        self.emit(ClientEvent::Reconnected {
            generation,
            attempts,
        });
        if let Some(old_generation) = replacing {
            self.emit(ClientEvent::SessionReplaced {
                old_generation,
                new_generation: generation,
            });
        }
    }

    /// Sleeps for `delay` unless shutdown interrupts it.
    fn sleep(&self, delay: Duration) -> Result<(), ClientError> {
        let deadline = Instant::now() + delay;
        let mut queue = self.supervisor.queue.lock();
        while !queue.shutting_down {
            if self
                .supervisor
                .wake
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                return Ok(());
            }
        }
        Err(ClientError::ShutDown)
    }
}

/// Builder for [`PushClient`].
pub struct PushClientBuilder<T: Transport + 'static> {
    credentials: Credentials,
    factory: TransportFactory<T>,
    config: ClientConfig,
    handlers: Handlers,
    events: EventDispatcher,
}

impl<T: Transport + 'static> PushClientBuilder<T> {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the handler for upstream data messages.
    pub fn upstream_handler(mut self, handler: Arc<dyn UpstreamHandler>) -> Self {
        self.handlers.upstream = handler;
        self
    }

    /// Sets the handler for ack and nack receipts.
    pub fn receipt_handler(mut self, handler: Arc<dyn ReceiptHandler>) -> Self {
        self.handlers.receipts = handler;
        self
    }

    /// Adds an event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events.add_handler(handler);
        self
    }

    /// Adds a closure as an event handler.
    pub fn on_event<F>(self, callback: F) -> Self
    where
        F: Fn(ClientEvent) + Send + Sync + 'static,
    {
        self.event_handler(Arc::new(CallbackHandler::new(callback)))
    }

    pub fn build(self) -> PushClient<T> {
        let supervisor = Arc::new(Supervisor::default());
        let mut events = self.events;
        events.add_handler(Arc::new(SupervisorForwarder {
            supervisor: Arc::downgrade(&supervisor),
            preconnect_on_drain: self.config.reconnect.preconnect_on_drain,
        }));

        PushClient {
            policy: ReconnectPolicy::new(self.config.reconnect.clone()),
            config: self.config,
            credentials: self.credentials,
            handlers: self.handlers,
            factory: self.factory,
            events: Arc::new(events),
            current: RwLock::new(None),
            retired: Mutex::new(Vec::new()),
            connect_lock: Mutex::new(()),
            next_generation: AtomicU64::new(0),
            supervisor,
        }
    }
}
