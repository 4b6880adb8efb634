//! Router core: registry, dispatch, readiness and publishing.
//!
//! The public API from this module is [`Router`], its [`RouterBuilder`] and
//! [`Config`], plus the [`IntoPayload`]/[`Json`] publish helpers and the
//! observable [`GateState`].
//!
//! Internal modules:
//! - [`registry`]: key → handler structure, register/deregister/resolve;
//! - [`dispatch`]: resolves one notification and runs its handlers;
//! - [`gate`]: two-connection readiness state machine;
//! - [`publisher`]: payload serialization and publish keys;
//! - [`router`]: the caller-facing struct and the connection listener task;
//! - [`builder`]: wiring of connections, tasks and subscribers.

mod builder;
mod config;
mod dispatch;
mod gate;
mod publisher;
mod registry;
mod router;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use builder::RouterBuilder;
pub use config::Config;
pub use gate::GateState;
pub use publisher::{IntoPayload, Json};
pub use router::Router;

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// Handlers never run under the registry lock, so a poisoned lock can only
/// come from a panic inside the registry code itself.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
