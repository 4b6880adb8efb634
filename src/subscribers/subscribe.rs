//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing the router: readiness,
//! connection faults, subscription changes and dispatch diagnostics. Each
//! subscriber is driven by a dedicated worker loop fed by a bounded queue that
//! is owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! This is also how the router logs: it never touches a global logger, it
//! publishes events, and whatever subscribers were injected at build time
//! decide what to do with them. No subscribers means no output.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) – they do **not** block
//!   the router nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped**.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
