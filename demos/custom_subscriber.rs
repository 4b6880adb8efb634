//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for readiness, faults and registry changes.
//! - Wire the subscriber into [`RouterBuilder::with_subscribers`].
//!
//! ## Flow
//! ```text
//! MemoryBroker::manual() ──► Router::build()
//!     ├─► broker.signal_ready(conn 0) ──► ConnectionReady
//!     ├─► broker.signal_ready(conn 1) ──► ConnectionReady, Ready
//!     ├─► on(...) / off(...)          ──► Subscribed / Unsubscribed
//!     ├─► handler panics              ──► HandlerPanicked
//!     ├─► broker.fail(conn 1)         ──► ConnectionError
//!     └─► end()                       ──► EndRequested
//!           └─► fan-out task ──► SubscriberSet.emit() ──► ConsoleSubscriber.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::{sync::Arc, time::Duration};

use keyspace_router::memory::{ConnectionId, MemoryBroker};
use keyspace_router::{
    Config, Delivery, Event, EventKind, HandlerFn, Router, Selector, Subscribe,
};

/// A simple console subscriber that prints selected events.
/// In real life, you could export metrics, ship logs, or trigger alerts.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let role = ev.role.map(|r| r.as_str()).unwrap_or("<none>");
        match ev.kind {
            // === Lifecycle ===
            EventKind::ConnectionReady => println!("[sub] ready:      conn={role}"),
            EventKind::Ready => println!("[sub] router armed"),
            EventKind::ConnectionError => {
                println!(
                    "[sub] error:      conn={role} reason={}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::ConnectionClosed => println!("[sub] closed:     conn={role}"),
            EventKind::CloseRequested | EventKind::EndRequested => {
                println!("[sub] shutdown:   {:?}", ev.kind);
            }

            // === Registry ===
            EventKind::Subscribed => {
                println!("[sub] subscribed: key={}", ev.key.as_deref().unwrap_or("<unknown>"));
            }
            EventKind::Unsubscribed => {
                println!(
                    "[sub] removed:    key={} handlers={}",
                    ev.key.as_deref().unwrap_or("<unknown>"),
                    ev.handlers.unwrap_or(0)
                );
            }

            // === Diagnostics ===
            EventKind::HandlerPanicked => {
                println!(
                    "[sub] panic:      handler={} reason={}",
                    ev.handler.as_deref().unwrap_or("<unknown>"),
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }

            // === Ignored ===
            EventKind::Published
            | EventKind::NotificationIgnored
            | EventKind::NotificationUnmatched
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn queue_capacity(&self) -> usize {
        1024
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let broker = MemoryBroker::manual();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let router = Router::builder(Config::default())
        .with_factory(broker.clone())
        .with_subscribers(subs)
        .build()?;

    broker.signal_ready(ConnectionId(1));
    broker.signal_ready(ConnectionId(0));
    tokio::time::timeout(Duration::from_secs(1), router.wait_ready()).await?;

    router.on(
        "jobs",
        Selector::events(["failed"]),
        HandlerFn::arc("flaky", |d: &Delivery<'_>| {
            panic!("cannot handle {}", d.payload);
        }),
    )?;
    router.send("jobs", "failed")?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    router.off("jobs", Selector::events(["failed"]), |_, _| {})?;
    broker.fail(ConnectionId(1), "connection reset by peer");
    tokio::time::sleep(Duration::from_millis(50)).await;

    router.end();
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
