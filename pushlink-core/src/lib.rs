//! Pushlink Core Library
//!
//! Client for a push-messaging relay that speaks JSON envelopes over a
//! persistent authenticated connection. Upstream messages are dispatched to
//! the embedder and acknowledged; downstream messages are validated,
//! encoded and sent; draining and dropped connections are handled by
//! replacing the session.

pub mod config;
pub mod credentials;
pub mod envelope;
pub mod events;
pub mod network;
pub mod reconnect;
pub mod session;

pub use config::{
    AckPolicy, ClientConfig, HandlerExecution, ReconnectConfig, DEFAULT_MAX_SPAWNED_HANDLERS,
};
pub use credentials::{Credentials, Login};
pub use envelope::{
    AckMessage, CodecError, DownstreamMessage, DownstreamMessageBuilder, Envelope, MessageId,
    MessageType, Receipt, ReceiptKind, UpstreamMessage,
};
pub use events::{CallbackHandler, ClientEvent, EventDispatcher, EventHandler};
pub use network::{
    LifecycleEvent, MockTransport, NetworkError, Transport, TransportConfig, TransportListener,
};
pub use reconnect::{Backoff, ClientError, PushClient, PushClientBuilder, ReconnectPolicy};
pub use session::{
    DispatchOutcome, HandlerError, Handlers, ReceiptHandler, Session, SessionError, SessionState,
    UpstreamCallback, UpstreamHandler,
};
