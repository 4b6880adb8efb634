//! # Dispatch engine.
//!
//! Turns one inbound [`Notification`] into handler calls:
//!
//! ```text
//! Notification { pattern, channel, payload }
//!     │
//!     ├─► registry.resolve(pattern, payload)   (under lock, cloned snapshot)
//!     │       └─ no entry ─► NotificationUnmatched, return
//!     ├─► channel_id(glob, channel)            (glob compiled once per key)
//!     │       1. configured regex: group 1, else whole match
//!     │       2. wildcard pattern: text of the first wildcard
//!     │       3. tail after the final ':'
//!     └─► for handler in snapshot (lock released):
//!             catch_unwind(handler.handle(&delivery))
//!                 └─ panic ─► HandlerPanicked, continue
//! ```
//!
//! ## Rules
//! - Handlers run synchronously, in registration order.
//! - A panicking handler never stops the ones after it.
//! - Handlers may call `on`/`off` on the router; the snapshot they run from is
//!   unaffected, the next notification sees the change.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use regex::Regex;

use super::lock;
use super::registry::{Registry, Resolved};
use crate::events::{panic_message, Bus, Event, EventKind};
use crate::routing::{Delivery, Glob};
use crate::transport::Notification;

pub(crate) struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
    channel_id_pattern: Option<Regex>,
    bus: Bus,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<Mutex<Registry>>,
        channel_id_pattern: Option<Regex>,
        bus: Bus,
    ) -> Self {
        Self {
            registry,
            channel_id_pattern,
            bus,
        }
    }

    /// Runs every handler the notification resolves to. Returns how many ran.
    pub(crate) fn dispatch(&self, n: &Notification) -> usize {
        let resolved = lock(&self.registry).resolve(&n.pattern, &n.payload);
        let Some(Resolved { handlers, glob }) = resolved else {
            self.bus.publish(
                Event::new(EventKind::NotificationUnmatched)
                    .with_key(n.pattern.as_str())
                    .with_channel(n.channel.as_str()),
            );
            return 0;
        };

        let delivery = Delivery {
            payload: &n.payload,
            channel_id: self.channel_id(&glob, &n.channel),
            pattern: &n.pattern,
            channel: &n.channel,
        };

        for handler in &handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.handle(&delivery))) {
                self.bus.publish(
                    Event::new(EventKind::HandlerPanicked)
                        .with_key(n.pattern.as_str())
                        .with_channel(n.channel.as_str())
                        .with_handler(handler.name())
                        .with_reason(panic_message(&*panic)),
                );
            }
        }
        handlers.len()
    }

    fn channel_id<'c>(&self, glob: &Glob, channel: &'c str) -> &'c str {
        if let Some(re) = &self.channel_id_pattern {
            if let Some(caps) = re.captures(channel) {
                if let Some(m) = caps.get(1).or_else(|| caps.get(0)) {
                    return m.as_str();
                }
            }
        }
        derive_channel_id(glob, channel)
    }
}

/// Channel id from the compiled subscription pattern alone: the first
/// wildcard capture, or the tail after the final `:`.
pub(crate) fn derive_channel_id<'c>(glob: &Glob, channel: &'c str) -> &'c str {
    if !glob.is_literal() {
        if let Some(first) = glob.captures(channel).and_then(|caps| caps.first().copied()) {
            return first;
        }
    }
    channel.rsplit_once(':').map_or(channel, |(_, tail)| tail)
}
