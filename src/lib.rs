//! # keyspace-router
//!
//! **keyspace-router** routes a key-value store's keyspace/keyevent
//! notifications to in-process handlers by pattern, and publishes messages
//! through the same notification namespace.
//!
//! A [`Router`] owns two connections to the store: a *notification*
//! connection that holds pattern subscriptions and a *command* connection that
//! publishes. Handlers are registered per channel pattern, optionally filtered
//! by event name, and are only invoked once both connections are ready.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   on("user.*", Selector::events(["created"]), h)        send("user.42", "created")
//!        │                                                     │
//!        ▼                                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Router                                                           │
//! │  - Registry   (key → handlers, filtered or not)                   │
//! │  - Publisher  (payload serialization, "__keyevent@<db>__:" keys)  │
//! │  - ReadinessGate (both connections ready?)                        │
//! │  - Bus        (broadcast of router events)                        │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ psubscribe / punsubscribe                         │ publish
//!        ▼                                                   ▼
//!  ┌──────────────────────┐                        ┌──────────────────────┐
//!  │ notification conn.   │                        │ command conn.        │
//!  │ (Transport + events) │                        │ (Transport + events) │
//!  └──────────┬───────────┘                        └──────────┬───────────┘
//!             │ Ready / Error / PatternMessage                │ Ready / Error
//!             └──────────────────────┬────────────────────────┘
//!                                    ▼
//!                         ┌────────────────────────┐
//!                         │     listener task      │
//!                         └───┬────────────────┬───┘
//!                             ▼                ▼
//!                       ReadinessGate      Dispatcher ──► handlers (in order)
//!
//!   Bus ──► fan-out task ──► SubscriberSet ──► LogWriter / custom subscribers
//! ```
//!
//! ### Key format
//! ```text
//! filtered registration, publish:   __keyevent@<db>__:<channel>
//! unfiltered registration:          __keyspace@<db>__:<channel>
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                       |
//! |-------------------|---------------------------------------------------------------|------------------------------------------|
//! | **Routing**       | Register/deregister handlers by pattern and event filter.     | [`Router`], [`Selector`], [`Handler`]    |
//! | **Publishing**    | Plain or structured payloads on the keyevent namespace.       | [`IntoPayload`], [`Json`]                |
//! | **Transport**     | Pluggable store client; in-memory loopback and redis included.| [`ClientFactory`], [`Transport`], [`memory`] |
//! | **Subscriber API**| Observe readiness, faults and registry changes.               | [`Subscribe`], [`Event`]                 |
//! | **Errors**        | Typed errors for caller mistakes and transport faults.        | [`RouterError`], [`TransportError`]      |
//! | **Configuration** | Connection target, database, auth, channel-id extraction.     | [`Config`]                               |
//!
//! ## Optional features
//! - `logging` _(default)_: exports the built-in [`LogWriter`] subscriber, which
//!   writes router events through `tracing`.
//! - `redis`: exports `RedisFactory`, a client factory over the `redis` crate.
//!   [`RouterBuilder::build`] uses it when no factory was set.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use keyspace_router::memory::MemoryBroker;
//! use keyspace_router::{Config, Delivery, HandlerFn, Router, Selector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = MemoryBroker::new();
//!     let router = Router::builder(Config::default())
//!         .with_factory(broker.clone())
//!         .build()?;
//!     router.wait_ready().await;
//!
//!     let seen = Arc::new(Mutex::new(Vec::new()));
//!     let sink = Arc::clone(&seen);
//!     router.on(
//!         "user.*",
//!         Selector::events(["created"]),
//!         HandlerFn::arc("users", move |d: &Delivery<'_>| {
//!             sink.lock().unwrap().push(d.channel_id.to_string());
//!         }),
//!     )?;
//!
//!     router.send("user.42", "created")?;
//!     tokio::task::yield_now().await;
//!
//!     router.close();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod routing;
mod subscribers;
mod transport;

// ---- Public re-exports ----

pub use core::{Config, GateState, IntoPayload, Json, Router, RouterBuilder};
pub use error::{RouterError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use routing::{
    has_wildcards, Delivery, Glob, Handler, HandlerFn, HandlerRef, Namespace, Selector, CATCH_ALL,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use transport::{
    memory, ClientFactory, ConnectOptions, Connection, ConnectionEvent, Notification, Role,
    Transport,
};

// Built-in tracing subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

// Default client factory.
#[cfg(feature = "redis")]
pub use transport::redis::RedisFactory;
