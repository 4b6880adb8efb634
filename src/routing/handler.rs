//! # Notification handlers.
//!
//! [`Handler`] is the callback contract invoked by the dispatch engine.
//! [`HandlerFn`] wraps a closure, the usual way to register one.
//!
//! Handlers run synchronously on the router's listener task, one notification
//! at a time. Long-running work should be handed off (e.g. `tokio::spawn`)
//! from inside the handler.
//!
//! ## Example
//! ```rust
//! use keyspace_router::{Delivery, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("print", |d: &Delivery<'_>| {
//!     println!("{} on {}", d.payload, d.channel_id);
//! });
//! assert_eq!(h.name(), "print");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

/// One notification as seen by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery<'a> {
    /// Message payload; for keyspace notifications this is the event name (`"set"`, `"expired"`, ...).
    pub payload: &'a str,
    /// Identifier derived from the concrete channel (see the dispatch rules).
    pub channel_id: &'a str,
    /// Subscription key that matched.
    pub pattern: &'a str,
    /// Concrete channel the notification was published on.
    pub channel: &'a str,
}

/// Callback invoked for matching notifications.
pub trait Handler: Send + Sync + 'static {
    /// Handle a single delivery. Panics are caught and reported by the router.
    fn handle(&self, delivery: &Delivery<'_>);

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a handler, as stored in the registry.
pub type HandlerRef = Arc<dyn Handler>;

/// Closure-backed handler.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F>
where
    F: Fn(&Delivery<'_>) + Send + Sync + 'static,
{
    /// Creates a new closure-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Delivery<'_>) + Send + Sync + 'static,
{
    fn handle(&self, delivery: &Delivery<'_>) {
        (self.f)(delivery)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").field("name", &self.name).finish()
    }
}
