//! # In-process loopback store.
//!
//! [`MemoryBroker`] implements [`ClientFactory`] without a network. Every
//! connection it opens shares one pub/sub space: a publish on any connection is
//! delivered as a [`ConnectionEvent::PatternMessage`] to every open connection
//! holding a matching pattern subscription, once per matching pattern, using the
//! store's glob rules.
//!
//! Besides routing, the broker records every command it receives, so callers
//! can assert exactly what went over the wire, and it can script the
//! connection lifecycle (deferred readiness, injected faults).
//!
//! ## Example
//! ```rust
//! use keyspace_router::memory::{Command, MemoryBroker};
//! use keyspace_router::{ClientFactory, ConnectOptions, ConnectionEvent};
//!
//! let broker = MemoryBroker::new();
//! let opts = ConnectOptions { host: "local".into(), port: 0, options: Default::default() };
//! let mut conn = broker.connect(&opts);
//! assert_eq!(conn.events.try_recv().ok(), Some(ConnectionEvent::Ready));
//!
//! conn.client.psubscribe("__keyevent@0__:*");
//! broker.publish("__keyevent@0__:expired", "session:1");
//! assert!(matches!(conn.events.try_recv(), Ok(ConnectionEvent::PatternMessage(_))));
//! assert!(matches!(broker.commands()[0], Command::PSubscribe { .. }));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::routing::{Glob, Namespace};
use crate::transport::{
    ClientFactory, ConnectOptions, Connection, ConnectionEvent, Notification, Transport,
};

/// Identifier of a connection opened by a [`MemoryBroker`], in open order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// A command received by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select { conn: ConnectionId, db: u32 },
    Auth { conn: ConnectionId, credentials: String },
    PSubscribe { conn: ConnectionId, pattern: String },
    PUnsubscribe { conn: ConnectionId, pattern: String },
    Publish { conn: ConnectionId, channel: String, payload: String },
    Quit { conn: ConnectionId },
    Terminate { conn: ConnectionId },
}

struct Slot {
    id: ConnectionId,
    tx: Option<mpsc::UnboundedSender<ConnectionEvent>>,
    patterns: Vec<Glob>,
    options: ConnectOptions,
    db: u32,
}

#[derive(Default)]
struct State {
    slots: Vec<Slot>,
    log: Vec<Command>,
}

struct Inner {
    state: Mutex<State>,
    auto_ready: bool,
    password: Option<String>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loopback store shared by every connection it opens. Cheap to clone.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Broker whose connections report ready as soon as they are opened.
    pub fn new() -> Self {
        Self::build(true, None)
    }

    /// Broker whose connections stay pending until [`signal_ready`](Self::signal_ready).
    pub fn manual() -> Self {
        Self::build(false, None)
    }

    /// Broker that rejects `AUTH` with anything but `password`.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self::build(true, Some(password.into()))
    }

    fn build(auto_ready: bool, password: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                auto_ready,
                password,
            }),
        }
    }

    /// Ids of all connections opened so far, in open order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.inner.lock().slots.iter().map(|s| s.id).collect()
    }

    /// Options a connection was opened with.
    pub fn options_of(&self, conn: ConnectionId) -> Option<ConnectOptions> {
        let state = self.inner.lock();
        state
            .slots
            .iter()
            .find(|s| s.id == conn)
            .map(|s| s.options.clone())
    }

    /// Database last selected on a connection.
    pub fn db_of(&self, conn: ConnectionId) -> Option<u32> {
        let state = self.inner.lock();
        state.slots.iter().find(|s| s.id == conn).map(|s| s.db)
    }

    /// Patterns a connection is currently subscribed to, in subscription order.
    pub fn patterns_of(&self, conn: ConnectionId) -> Vec<String> {
        let state = self.inner.lock();
        state
            .slots
            .iter()
            .find(|s| s.id == conn)
            .map(|s| s.patterns.iter().map(|g| g.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` while the connection has not been quit or terminated.
    pub fn is_open(&self, conn: ConnectionId) -> bool {
        let state = self.inner.lock();
        state
            .slots
            .iter()
            .any(|s| s.id == conn && s.tx.is_some())
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<Command> {
        self.inner.lock().log.clone()
    }

    /// Sends `Ready` on a connection.
    pub fn signal_ready(&self, conn: ConnectionId) {
        self.send_to(conn, ConnectionEvent::Ready);
    }

    /// Sends a fault on a connection.
    pub fn fail(&self, conn: ConnectionId, message: impl Into<String>) {
        self.send_to(conn, ConnectionEvent::Error(TransportError::new(message)));
    }

    /// Publishes as an outside client would. Returns the number of deliveries.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let state = self.inner.lock();
        deliver(&state, channel, payload)
    }

    /// Emits the pair of notifications the store produces when `event`
    /// happens to `key` in database `db`:
    /// `__keyspace@<db>__:<key>` carrying `event`, and
    /// `__keyevent@<db>__:<event>` carrying `key`.
    pub fn notify_keyspace(&self, db: u32, key: &str, event: &str) -> usize {
        let state = self.inner.lock();
        deliver(&state, &Namespace::Keyspace.key(db, key), event)
            + deliver(&state, &Namespace::Keyevent.key(db, event), key)
    }

    fn send_to(&self, conn: ConnectionId, ev: ConnectionEvent) {
        let state = self.inner.lock();
        if let Some(tx) = state
            .slots
            .iter()
            .find(|s| s.id == conn)
            .and_then(|s| s.tx.as_ref())
        {
            let _ = tx.send(ev);
        }
    }
}

fn deliver(state: &State, channel: &str, payload: &str) -> usize {
    let mut delivered = 0;
    for slot in &state.slots {
        let Some(tx) = slot.tx.as_ref() else { continue };
        for glob in slot.patterns.iter().filter(|g| g.matches(channel)) {
            let msg = Notification::new(glob.as_str(), channel, payload);
            if tx.send(ConnectionEvent::PatternMessage(msg)).is_ok() {
                delivered += 1;
            }
        }
    }
    delivered
}

impl ClientFactory for MemoryBroker {
    fn connect(&self, options: &ConnectOptions) -> Connection {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.inner.auto_ready {
            let _ = tx.send(ConnectionEvent::Ready);
        }

        let mut state = self.inner.lock();
        let id = ConnectionId(state.slots.len() as u64);
        state.slots.push(Slot {
            id,
            tx: Some(tx),
            patterns: Vec::new(),
            options: options.clone(),
            db: 0,
        });

        Connection {
            client: Arc::new(MemoryClient {
                id,
                inner: Arc::clone(&self.inner),
            }),
            events: rx,
        }
    }
}

/// Command handle of one broker connection.
struct MemoryClient {
    id: ConnectionId,
    inner: Arc<Inner>,
}

impl MemoryClient {
    /// Logs the command and runs `f` on this connection's slot if it is still open.
    fn apply(&self, cmd: Command, f: impl FnOnce(&mut State, usize)) {
        let mut state = self.inner.lock();
        state.log.push(cmd);
        if let Some(idx) = state
            .slots
            .iter()
            .position(|s| s.id == self.id && s.tx.is_some())
        {
            f(&mut state, idx);
        }
    }
}

impl Transport for MemoryClient {
    fn select(&self, db: u32) {
        let conn = self.id;
        self.apply(Command::Select { conn, db }, |state, idx| {
            state.slots[idx].db = db;
        });
    }

    fn auth(&self, credentials: &str) {
        let conn = self.id;
        let expected = self.inner.password.clone();
        let cmd = Command::Auth {
            conn,
            credentials: credentials.to_string(),
        };
        self.apply(cmd, |state, idx| {
            if expected.as_deref().is_some_and(|p| p != credentials) {
                if let Some(tx) = state.slots[idx].tx.as_ref() {
                    let err = TransportError::new("WRONGPASS invalid username-password pair");
                    let _ = tx.send(ConnectionEvent::Error(err));
                }
            }
        });
    }

    fn psubscribe(&self, pattern: &str) {
        let conn = self.id;
        let cmd = Command::PSubscribe {
            conn,
            pattern: pattern.to_string(),
        };
        self.apply(cmd, |state, idx| {
            let patterns = &mut state.slots[idx].patterns;
            if !patterns.iter().any(|g| g.as_str() == pattern) {
                patterns.push(Glob::new(pattern));
            }
        });
    }

    fn punsubscribe(&self, pattern: &str) {
        let conn = self.id;
        let cmd = Command::PUnsubscribe {
            conn,
            pattern: pattern.to_string(),
        };
        self.apply(cmd, |state, idx| {
            state.slots[idx].patterns.retain(|g| g.as_str() != pattern);
        });
    }

    fn publish(&self, channel: &str, payload: &str) {
        let cmd = Command::Publish {
            conn: self.id,
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        self.apply(cmd, |state, _| {
            deliver(state, channel, payload);
        });
    }

    fn quit(&self) {
        self.apply(Command::Quit { conn: self.id }, |state, idx| {
            let slot = &mut state.slots[idx];
            slot.patterns.clear();
            slot.tx = None;
        });
    }

    fn terminate(&self) {
        self.apply(Command::Terminate { conn: self.id }, |state, idx| {
            let slot = &mut state.slots[idx];
            slot.patterns.clear();
            slot.tx = None;
        });
    }
}
