//! # LogWriter: event renderer over `tracing`
//!
//! A subscriber that turns router [`Event`]s into `tracing` records under the
//! `keyspace_router` target. Faults and panics are `warn`/`error`, lifecycle is
//! `info`, per-message traffic is `debug`/`trace`. Install any `tracing`
//! subscriber in the application to see the output.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO  keyspace_router: connection ready connection="notification"
//! INFO  keyspace_router: connection ready connection="command"
//! INFO  keyspace_router: router ready
//! DEBUG keyspace_router: pattern subscribed key="__keyevent@0__:user.*"
//! WARN  keyspace_router: connection error connection="command" reason="connection refused"
//! ERROR keyspace_router: handler panicked handler="audit" key="__keyevent@0__:user.*" reason="boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let role = e.role.map(|r| r.as_str()).unwrap_or("-");
        let key = e.key.as_deref().unwrap_or("-");
        let channel = e.channel.as_deref().unwrap_or("-");
        let handler = e.handler.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ConnectionReady => {
                tracing::info!(target: "keyspace_router", connection = role, "connection ready");
            }
            EventKind::Ready => {
                tracing::info!(target: "keyspace_router", "router ready");
            }
            EventKind::ConnectionError => {
                tracing::warn!(target: "keyspace_router", connection = role, reason, "connection error");
            }
            EventKind::ConnectionClosed => {
                tracing::info!(target: "keyspace_router", connection = role, "connection closed");
            }
            EventKind::CloseRequested => {
                tracing::info!(target: "keyspace_router", "close requested");
            }
            EventKind::EndRequested => {
                tracing::info!(target: "keyspace_router", "end requested");
            }
            EventKind::Subscribed => {
                tracing::debug!(target: "keyspace_router", key, "pattern subscribed");
            }
            EventKind::Unsubscribed => {
                tracing::debug!(
                    target: "keyspace_router",
                    key,
                    handlers = e.handlers.unwrap_or(0),
                    "pattern unsubscribed"
                );
            }
            EventKind::Published => {
                tracing::trace!(target: "keyspace_router", key, "published");
            }
            EventKind::NotificationIgnored => {
                tracing::debug!(target: "keyspace_router", key, channel, "notification before ready, ignored");
            }
            EventKind::NotificationUnmatched => {
                tracing::trace!(target: "keyspace_router", key, channel, "notification without handlers");
            }
            EventKind::HandlerPanicked => {
                tracing::error!(target: "keyspace_router", handler, key, channel, reason, "handler panicked");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "keyspace_router", subscriber = handler, reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "keyspace_router", subscriber = handler, reason, "subscriber overflow");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
