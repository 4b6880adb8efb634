//! # Example: watch_expired
//!
//! Watches session expirations and user signups through one router.
//!
//! Shows how to:
//! - Build a [`Router`] over the in-memory loopback store.
//! - Attach the built-in [`LogWriter`] and a `tracing` subscriber.
//! - Register filtered (keyevent) and unfiltered (keyspace) handlers.
//! - Publish plain and structured messages, then deregister.
//!
//! ## Flow
//! ```text
//! Router::builder(cfg).with_factory(broker).build()
//!     ├─► notification conn: select(db)   ──► Ready ─┐
//!     ├─► command conn:      select(db)   ──► Ready ─┴─► EventKind::Ready
//!     ├─► on("session:*")                  ──► psubscribe("__keyspace@0__:session:*")
//!     ├─► on("user.*", ["created"])        ──► psubscribe("__keyevent@0__:user.*")
//!     ├─► broker.notify_keyspace(...)      ──► handler("expired", "9", ...)
//!     └─► send("user.42", Json(..))        ──► handler(payload, "42", ...)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=keyspace_router=debug cargo run --example watch_expired
//! ```

use std::sync::Arc;
use std::time::Duration;

use keyspace_router::memory::MemoryBroker;
use keyspace_router::{
    Config, Delivery, HandlerFn, HandlerRef, Json, LogWriter, Router, Selector, Subscribe,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Signup {
    user: u64,
    plan: &'static str,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("keyspace_router=info".parse()?),
        )
        .init();

    let broker = MemoryBroker::new();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let router = Router::builder(Config::default())
        .with_factory(broker.clone())
        .with_subscribers(subs)
        .build()?;

    tokio::time::timeout(Duration::from_secs(1), router.wait_ready()).await?;

    let sessions: HandlerRef = HandlerFn::arc("sessions", |d: &Delivery<'_>| {
        println!("[sessions] {} happened to session {}", d.payload, d.channel_id);
    });
    let signups: HandlerRef = HandlerFn::arc("signups", |d: &Delivery<'_>| {
        println!("[signups] user {} signed up: {}", d.channel_id, d.payload);
    });

    router
        .on("session:*", Selector::all(), sessions)?
        .on("user.*", Selector::events(["created"]), Arc::clone(&signups))?;

    broker.notify_keyspace(0, "session:9", "expired");
    router.send("user.42", "created")?;
    // not "created": filtered out
    router.send("user.43", Json(Signup { user: 43, plan: "pro" }))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    router.off("session:*", Selector::all(), |_names, key| {
        println!("[main] stopped watching {key}");
    })?;
    broker.notify_keyspace(0, "session:10", "expired");
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("[main] active patterns: {:?}", router.patterns());
    router.close();
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
