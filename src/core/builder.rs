use std::sync::{Arc, Mutex};

use regex::Regex;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::dispatch::Dispatcher;
use super::gate::ReadinessGate;
use super::publisher::Publisher;
use super::registry::Registry;
use super::router::{Listener, Router, RouterParts};
use crate::error::RouterError;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::transport::ClientFactory;

/// Builder for constructing a [`Router`].
pub struct RouterBuilder {
    cfg: Config,
    factory: Option<Arc<dyn ClientFactory>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RouterBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            factory: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the factory both connections are opened with.
    ///
    /// Without one, `build` uses the redis factory when the `redis` feature is
    /// enabled and fails otherwise.
    pub fn with_factory(mut self, factory: impl ClientFactory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive router events (readiness, faults, subscription
    /// changes) through dedicated workers with bounded queues. Without
    /// subscribers, events are only visible through
    /// [`Router::subscribe_events`].
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the router: opens both connections, authenticates and selects
    /// the database on each, and starts the listener.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// [`RouterError::InvalidConfig`] if no factory is available or
    /// `channel_id_pattern` is not a valid regular expression.
    pub fn build(self) -> Result<Arc<Router>, RouterError> {
        let factory = match self.factory {
            Some(factory) => factory,
            None => default_factory()?,
        };
        let channel_id_pattern = self
            .cfg
            .channel_id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| RouterError::invalid_config(format!("channel_id_pattern: {e}")))?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        spawn_fan_out(
            SubscriberSet::new(self.subscribers, bus.clone()),
            &bus,
            token.clone(),
        );

        let opts = self.cfg.connect_options();
        let notification = factory.connect(&opts);
        let command = factory.connect(&opts);
        for conn in [&notification, &command] {
            if let Some(auth) = self.cfg.auth.as_deref() {
                conn.client.auth(auth);
            }
            conn.client.select(self.cfg.db);
        }

        let registry = Arc::new(Mutex::new(Registry::new()));
        let gate = Arc::new(ReadinessGate::new());

        Listener {
            gate: Arc::clone(&gate),
            dispatcher: Dispatcher::new(Arc::clone(&registry), channel_id_pattern, bus.clone()),
            bus: bus.clone(),
            token: token.clone(),
        }
        .spawn(notification.events, command.events);

        let publisher = Publisher::new(Arc::clone(&command.client), self.cfg.db, bus.clone());
        Ok(Arc::new(Router::from_parts(RouterParts {
            cfg: self.cfg,
            bus,
            registry,
            publisher,
            gate,
            notification: notification.client,
            command: command.client,
            token,
        })))
    }
}

#[cfg(feature = "redis")]
fn default_factory() -> Result<Arc<dyn ClientFactory>, RouterError> {
    Ok(Arc::new(crate::transport::redis::RedisFactory::new()))
}

#[cfg(not(feature = "redis"))]
fn default_factory() -> Result<Arc<dyn ClientFactory>, RouterError> {
    Err(RouterError::invalid_config(
        "no client factory configured; call with_factory or enable the `redis` feature",
    ))
}

/// Forwards bus events to the subscriber set until the router stops.
///
/// Events already queued on the bus when the router stops are still delivered.
fn spawn_fan_out(set: SubscriberSet, bus: &Bus, token: CancellationToken) {
    if set.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
        set.shutdown().await;
    });
}
