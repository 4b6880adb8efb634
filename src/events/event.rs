//! # Runtime events emitted by the router.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: connection readiness, faults, shutdown
//! - **Registry events**: pattern subscribed/unsubscribed, message published
//! - **Diagnostic events**: dropped notifications, panicking handlers/subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! connection involved, the subscription key and a reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use keyspace_router::{Event, EventKind, Role};
//!
//! let ev = Event::new(EventKind::ConnectionError)
//!     .with_role(Role::Command)
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ConnectionError);
//! assert_eq!(ev.role, Some(Role::Command));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::transport::Role;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// One connection reported ready (first time only).
    ///
    /// Sets:
    /// - `role`: the connection
    ConnectionReady,

    /// Both connections are ready; dispatch is armed. Emitted exactly once.
    Ready,

    /// A connection faulted. Not retried by the router.
    ///
    /// Sets:
    /// - `role`: the connection
    /// - `reason`: transport error message
    ConnectionError,

    /// A connection's event stream ended.
    ///
    /// Sets:
    /// - `role`: the connection
    ConnectionClosed,

    /// Graceful shutdown requested via `close()`.
    CloseRequested,

    /// Hard shutdown requested via `end()`.
    EndRequested,

    // === Registry events ===
    /// A new subscription key was created and pattern-subscribed.
    ///
    /// Sets:
    /// - `key`: subscription key
    Subscribed,

    /// A subscription key was removed and pattern-unsubscribed.
    ///
    /// Sets:
    /// - `key`: subscription key
    /// - `handlers`: number of handler entries dropped with it
    Unsubscribed,

    /// A message was handed to the command connection.
    ///
    /// Sets:
    /// - `key`: publish key
    Published,

    // === Diagnostic events ===
    /// A notification arrived before both connections were ready and was dropped.
    ///
    /// Sets:
    /// - `key`: pattern of the notification
    /// - `channel`: concrete channel
    NotificationIgnored,

    /// A notification arrived for a pattern with no registry entry.
    ///
    /// Sets:
    /// - `key`: pattern of the notification
    /// - `channel`: concrete channel
    NotificationUnmatched,

    /// A handler panicked; later handlers of the same dispatch still ran.
    ///
    /// Sets:
    /// - `key`: matched pattern
    /// - `channel`: concrete channel
    /// - `handler`: handler name
    /// - `reason`: panic message
    HandlerPanicked,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `handler`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `handler`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Connection involved, if any.
    pub role: Option<Role>,
    /// Subscription or publish key.
    pub key: Option<Arc<str>>,
    /// Concrete channel of a notification.
    pub channel: Option<Arc<str>>,
    /// Handler or subscriber name.
    pub handler: Option<Arc<str>>,
    /// Number of handler entries affected.
    pub handlers: Option<usize>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            role: None,
            key: None,
            channel: None,
            handler: None,
            handlers: None,
            reason: None,
        }
    }

    /// Attaches the connection involved.
    #[inline]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Attaches a subscription/publish key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a concrete channel.
    #[inline]
    pub fn with_channel(mut self, channel: impl Into<Arc<str>>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attaches a handler or subscriber name.
    #[inline]
    pub fn with_handler(mut self, name: impl Into<Arc<str>>) -> Self {
        self.handler = Some(name.into());
        self
    }

    /// Attaches a handler count.
    #[inline]
    pub fn with_handlers(mut self, n: usize) -> Self {
        self.handlers = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_handler(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_handler(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::Subscribed);
        let b = Event::new(EventKind::Unsubscribed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn panic_messages() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
