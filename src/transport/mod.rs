//! # Transport boundary.
//!
//! The router never talks to the store directly. It consumes two capabilities:
//!
//! - [`ClientFactory`] opens a [`Connection`] (called twice per router);
//! - [`Transport`] issues commands on an open connection.
//!
//! Inbound signals (readiness, faults, pattern messages) arrive on the
//! connection's event channel rather than through callbacks.
//!
//! ## Architecture
//! ```text
//!   ClientFactory::connect() ──► Connection { client, events }
//!                                     │          │
//!        select/auth/psubscribe/ ◄────┘          └──► mpsc::UnboundedReceiver<ConnectionEvent>
//!        punsubscribe/publish/quit/terminate              ├─ Ready
//!                                                         ├─ Error(TransportError)
//!                                                         └─ PatternMessage(Notification)
//! ```
//!
//! ## Rules
//! - **Fire-and-forget commands**: `Transport` methods never block and never fail
//!   synchronously; failures are reported as [`ConnectionEvent::Error`].
//! - **One-shot readiness**: the router counts only the first `Ready` per connection.
//! - **No reconnect**: retry is the transport's business, not the router's.
//!
//! Two factories ship with the crate: [`memory::MemoryBroker`], an in-process
//! loopback, and `redis::RedisFactory` behind the `redis` feature.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::TransportError;

/// Which of the router's two connections something refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Receives pattern-matched notifications.
    Notification,
    /// Issues publishes and other commands.
    Command,
}

impl Role {
    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Notification => "notification",
            Role::Command => "command",
        }
    }
}

/// Inbound pattern message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Subscribed pattern that matched.
    pub pattern: String,
    /// Concrete channel that fired.
    pub channel: String,
    /// Message payload.
    pub payload: String,
}

impl Notification {
    pub fn new(
        pattern: impl Into<String>,
        channel: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Signal delivered by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection finished its handshake and accepts commands.
    Ready,
    /// The connection faulted.
    Error(TransportError),
    /// A message arrived for one of the connection's pattern subscriptions.
    PatternMessage(Notification),
}

/// Command surface of one store connection.
pub trait Transport: Send + Sync + 'static {
    /// Selects the logical database.
    fn select(&self, db: u32);

    /// Authenticates the connection.
    fn auth(&self, credentials: &str);

    /// Starts a pattern subscription.
    fn psubscribe(&self, pattern: &str);

    /// Ends a pattern subscription.
    fn punsubscribe(&self, pattern: &str);

    /// Publishes `payload` on `channel`.
    fn publish(&self, channel: &str, payload: &str);

    /// Graceful close: pending commands complete first.
    fn quit(&self);

    /// Hard close: pending commands are dropped.
    fn terminate(&self);
}

/// Address and options used to open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Transport-specific options, passed through untouched.
    pub options: BTreeMap<String, String>,
}

/// An opened connection: its command handle plus its event stream.
pub struct Connection {
    pub client: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens connections to the store.
pub trait ClientFactory: Send + Sync + 'static {
    /// Opens a new connection. Connection failures are reported on the
    /// returned event channel, not here.
    fn connect(&self, options: &ConnectOptions) -> Connection;
}
