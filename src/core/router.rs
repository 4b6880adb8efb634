//! # Router: registry, dispatch and the two store connections.
//!
//! The [`Router`] owns the subscription registry, the notification and command
//! connections, and the event bus. It is built by
//! [`RouterBuilder`](crate::RouterBuilder) and shared as `Arc<Router>`.
//!
//! ## High-level architecture
//! ```text
//! Caller:
//!   on(channels, selector, handler) ──► Registry.insert ──► new key? ──► notification.psubscribe(key)
//!   off(channels, selector, done)   ──► Registry.remove ──► existed? ──► notification.punsubscribe(key), done(names, key)
//!   send(channel, message)          ──► Publisher ──► command.publish("__keyevent@<db>__:<channel>", payload)
//!
//! Listener task (one per router):
//!   notification events ──┐
//!                         ├──► Ready          ──► ReadinessGate ──► (second) EventKind::Ready
//!   command events      ──┘    Error          ──► EventKind::ConnectionError
//!                              PatternMessage ──► queued command events applied first
//!                                             ──► gate open? ──► Dispatcher::dispatch
//!                                                      └─ no ──► EventKind::NotificationIgnored
//!
//! Fan-out task:
//!   Bus ──► SubscriberSet::emit(&Event) ──► injected subscribers (LogWriter, ...)
//! ```
//!
//! ## Rules
//! - `on`/`off`/`send` are synchronous and never wait on the store.
//! - Subscribe/unsubscribe commands are issued inside the registry critical
//!   section, so the store sees them in registry order.
//! - Handlers and removal callbacks run with the registry unlocked; both may
//!   call back into the router.
//! - `close()`/`end()` act on both connections and stop the listener.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::builder::RouterBuilder;
use super::config::Config;
use super::dispatch::Dispatcher;
use super::gate::{GateState, ReadinessGate, Transition};
use super::lock;
use super::publisher::{IntoPayload, Publisher};
use super::registry::Registry;
use crate::error::RouterError;
use crate::events::{Bus, Event, EventKind};
use crate::routing::{split_channels, HandlerRef, Selector};
use crate::transport::{ConnectionEvent, Role, Transport};

/// Pattern-routed handlers over the store's keyspace notifications.
pub struct Router {
    cfg: Config,
    bus: Bus,
    registry: Arc<Mutex<Registry>>,
    publisher: Publisher,
    gate: Arc<ReadinessGate>,
    notification: Arc<dyn Transport>,
    command: Arc<dyn Transport>,
    token: CancellationToken,
}

/// Parts assembled by the builder.
pub(crate) struct RouterParts {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) registry: Arc<Mutex<Registry>>,
    pub(crate) publisher: Publisher,
    pub(crate) gate: Arc<ReadinessGate>,
    pub(crate) notification: Arc<dyn Transport>,
    pub(crate) command: Arc<dyn Transport>,
    pub(crate) token: CancellationToken,
}

impl Router {
    /// Starts building a router for `cfg`.
    pub fn builder(cfg: Config) -> RouterBuilder {
        RouterBuilder::new(cfg)
    }

    pub(crate) fn from_parts(parts: RouterParts) -> Self {
        Self {
            cfg: parts.cfg,
            bus: parts.bus,
            registry: parts.registry,
            publisher: parts.publisher,
            gate: parts.gate,
            notification: parts.notification,
            command: parts.command,
            token: parts.token,
        }
    }

    /// Registers `handler` for every whitespace-separated pattern in `channels`.
    ///
    /// Each new subscription key triggers exactly one pattern-subscribe on the
    /// notification connection. The same handler registered twice fires twice.
    ///
    /// # Errors
    /// [`RouterError::InvalidArgument`] if `channels` holds no pattern or an
    /// event name is empty or contains whitespace. Nothing is registered then.
    pub fn on(
        &self,
        channels: &str,
        selector: Selector,
        handler: HandlerRef,
    ) -> Result<&Self, RouterError> {
        let channels = split_channels(channels)?;
        selector.validate()?;
        let ns = selector.namespace();

        let mut created = Vec::new();
        {
            let mut registry = lock(&self.registry);
            for channel in channels {
                let key = ns.key(self.cfg.db, channel);
                if registry.insert(&key, &selector, &handler) {
                    self.notification.psubscribe(&key);
                    created.push(key);
                }
            }
        }

        for key in created {
            self.bus.publish(
                Event::new(EventKind::Subscribed)
                    .with_role(Role::Notification)
                    .with_key(key),
            );
        }
        Ok(self)
    }

    /// Removes every handler under each pattern in `channels`.
    ///
    /// The key is derived exactly as in [`Router::on`], so `selector` must be of
    /// the same mode (filtered or not) as the registration. For each key that
    /// existed, the pattern is unsubscribed and `on_removed(event_names, key)` is
    /// called once. Unknown keys are ignored.
    ///
    /// # Errors
    /// [`RouterError::InvalidArgument`] under the same conditions as [`Router::on`].
    pub fn off<F>(
        &self,
        channels: &str,
        selector: Selector,
        mut on_removed: F,
    ) -> Result<&Self, RouterError>
    where
        F: FnMut(&[String], &str),
    {
        let channels = split_channels(channels)?;
        selector.validate()?;
        let ns = selector.namespace();

        let mut removed = Vec::new();
        {
            let mut registry = lock(&self.registry);
            for channel in channels {
                let key = ns.key(self.cfg.db, channel);
                if let Some(count) = registry.remove(&key) {
                    self.notification.punsubscribe(&key);
                    removed.push((key, count));
                }
            }
        }

        for (key, count) in removed {
            self.bus.publish(
                Event::new(EventKind::Unsubscribed)
                    .with_role(Role::Notification)
                    .with_key(key.as_str())
                    .with_handlers(count),
            );
            on_removed(selector.names(), &key);
        }
        Ok(self)
    }

    /// Publishes `message` on `"__keyevent@<db>__:<channel>"` via the command connection.
    ///
    /// # Errors
    /// [`RouterError::Serialization`] if a structured message cannot be
    /// serialized. The router stays usable.
    pub fn send(&self, channel: &str, message: impl IntoPayload) -> Result<&Self, RouterError> {
        self.publisher.send(channel, message)?;
        Ok(self)
    }

    /// Alias of [`Router::send`].
    pub fn publish(&self, channel: &str, message: impl IntoPayload) -> Result<&Self, RouterError> {
        self.send(channel, message)
    }

    /// Graceful shutdown: `quit` on both connections, then stop the listener.
    pub fn close(&self) {
        self.bus.publish(Event::new(EventKind::CloseRequested));
        self.notification.quit();
        self.command.quit();
        self.token.cancel();
    }

    /// Hard shutdown: `terminate` on both connections, then stop the listener.
    pub fn end(&self) {
        self.bus.publish(Event::new(EventKind::EndRequested));
        self.notification.terminate();
        self.command.terminate();
        self.token.cancel();
    }

    /// Raw command connection, for commands the router does not wrap.
    pub fn command(&self) -> &Arc<dyn Transport> {
        &self.command
    }

    /// New receiver of router events (readiness, faults, subscription changes).
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Current readiness of the two connections.
    pub fn readiness(&self) -> GateState {
        self.gate.state()
    }

    /// Returns `true` once both connections have reported ready.
    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// Waits until both connections have reported ready.
    ///
    /// Returns immediately if they already have. Never resolves if a connection
    /// never reports ready; wrap in `tokio::time::timeout` where that matters.
    pub async fn wait_ready(&self) {
        let mut rx = self.gate.watch();
        let _ = rx.wait_for(|s| *s == GateState::Ready).await;
    }

    /// Sorted list of active subscription keys.
    pub fn patterns(&self) -> Vec<String> {
        lock(&self.registry).keys()
    }

    /// Handler entries registered under a full subscription key.
    pub fn handler_count(&self, key: &str) -> usize {
        lock(&self.registry).handler_count(key)
    }

    /// Database index used in every key.
    pub fn db(&self) -> u32 {
        self.cfg.db
    }

    /// Configuration this router was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("db", &self.cfg.db)
            .field("readiness", &self.gate.state())
            .field("patterns", &lock(&self.registry).len())
            .finish()
    }
}

/// State owned by the listener task.
pub(crate) struct Listener {
    pub(crate) gate: Arc<ReadinessGate>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) bus: Bus,
    pub(crate) token: CancellationToken,
}

impl Listener {
    /// Spawns the task draining both connections' event streams.
    ///
    /// Runs until the router is closed/dropped or both streams end.
    pub(crate) fn spawn(
        self,
        mut notification: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut command: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        tokio::spawn(async move {
            let mut notification_open = true;
            let mut command_open = true;

            while notification_open || command_open {
                tokio::select! {
                    _ = self.token.cancelled() => break,
                    ev = notification.recv(), if notification_open => match ev {
                        Some(ev @ ConnectionEvent::PatternMessage(_)) => {
                            self.catch_up(Role::Command, &mut command);
                            self.handle(Role::Notification, ev);
                        }
                        Some(ev) => self.handle(Role::Notification, ev),
                        None => {
                            notification_open = false;
                            self.closed(Role::Notification);
                        }
                    },
                    ev = command.recv(), if command_open => match ev {
                        Some(ev) => self.handle(Role::Command, ev),
                        None => {
                            command_open = false;
                            self.closed(Role::Command);
                        }
                    },
                }
            }
        });
    }

    /// Applies whatever `rx` already has queued while the gate is still closed,
    /// so a ready signal that raced a notification is seen before it.
    fn catch_up(&self, role: Role, rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) {
        while !self.gate.is_open() {
            match rx.try_recv() {
                Ok(ev) => self.handle(role, ev),
                Err(_) => break,
            }
        }
    }

    fn handle(&self, role: Role, ev: ConnectionEvent) {
        match ev {
            ConnectionEvent::Ready => match self.gate.on_ready(role) {
                Transition::Counted => {
                    self.bus
                        .publish(Event::new(EventKind::ConnectionReady).with_role(role));
                }
                Transition::Opened => {
                    self.bus
                        .publish(Event::new(EventKind::ConnectionReady).with_role(role));
                    self.bus.publish(Event::new(EventKind::Ready));
                }
                Transition::Ignored => {}
            },
            ConnectionEvent::Error(err) => {
                self.bus.publish(
                    Event::new(EventKind::ConnectionError)
                        .with_role(role)
                        .with_reason(err.with_role(role).as_message()),
                );
            }
            ConnectionEvent::PatternMessage(n) => {
                if role == Role::Notification && self.gate.is_open() {
                    self.dispatcher.dispatch(&n);
                } else {
                    self.bus.publish(
                        Event::new(EventKind::NotificationIgnored)
                            .with_role(role)
                            .with_key(n.pattern)
                            .with_channel(n.channel),
                    );
                }
            }
        }
    }

    fn closed(&self, role: Role) {
        self.bus
            .publish(Event::new(EventKind::ConnectionClosed).with_role(role));
    }
}
