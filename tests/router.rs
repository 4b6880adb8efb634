use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyspace_router::memory::{Command, ConnectionId, MemoryBroker};
use keyspace_router::{
    Config, Delivery, EventKind, GateState, HandlerFn, HandlerRef, Json, Role, Router,
    RouterError, Selector,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

const NOTIFICATION: ConnectionId = ConnectionId(0);
const COMMAND: ConnectionId = ConnectionId(1);

/// (payload, channel_id, pattern) as seen by a handler.
type Call = (String, String, String);

fn recorder(name: &'static str) -> (HandlerRef, mpsc::UnboundedReceiver<Call>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let h: HandlerRef = HandlerFn::arc(name, move |d: &Delivery<'_>| {
        let _ = tx.send((
            d.payload.to_string(),
            d.channel_id.to_string(),
            d.pattern.to_string(),
        ));
    });
    (h, rx)
}

async fn ready_router(broker: &MemoryBroker, cfg: Config) -> Arc<Router> {
    let router = Router::builder(cfg)
        .with_factory(broker.clone())
        .build()
        .expect("router builds");
    timeout(Duration::from_secs(1), router.wait_ready())
        .await
        .expect("router ready");
    router
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Call>) -> Call {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("handler fired")
        .expect("handler alive")
}

/// Lets the listener drain whatever is queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn call(payload: &str, id: &str, pattern: &str) -> Call {
    (payload.into(), id.into(), pattern.into())
}

async fn next_kind(
    rx: &mut broadcast::Receiver<keyspace_router::Event>,
    kind: EventKind,
) -> keyspace_router::Event {
    timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("event arrived")
}

#[tokio::test]
async fn filtered_registration_fires_with_derived_channel_id() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, mut rx) = recorder("users");

    router.on("user.*", Selector::events(["created"]), h).unwrap();
    assert_eq!(router.patterns(), vec!["__keyevent@0__:user.*"]);

    router.send("user.42", "created").unwrap();
    assert_eq!(
        next(&mut rx).await,
        call("created", "42", "__keyevent@0__:user.*")
    );

    router.send("user.42", "deleted").unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn handlers_fire_in_registration_order_without_dedup() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mk = |tag: &'static str| -> HandlerRef {
        let order = Arc::clone(&order);
        let h: HandlerRef =
            HandlerFn::arc(tag, move |_d: &Delivery<'_>| order.lock().unwrap().push(tag));
        h
    };
    let a = mk("a");
    let b = mk("b");

    router
        .on("cart:*", Selector::all(), a.clone())
        .unwrap()
        .on("cart:*", Selector::all(), b)
        .unwrap()
        .on("cart:*", Selector::all(), a)
        .unwrap();
    assert_eq!(router.handler_count("__keyspace@0__:cart:*"), 3);

    broker.notify_keyspace(0, "cart:9", "set");
    settle().await;
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "a"]);
}

#[tokio::test]
async fn one_pattern_subscribe_per_key() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, _rx) = recorder("h");

    router
        .on("a b a", Selector::events(["set"]), h.clone())
        .unwrap()
        .on("a", Selector::events(["del"]), h.clone())
        .unwrap()
        .on("a", Selector::all(), h)
        .unwrap();

    let subs: Vec<_> = broker
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::PSubscribe { conn, pattern } => Some((conn, pattern)),
            _ => None,
        })
        .collect();
    assert_eq!(
        subs,
        vec![
            (NOTIFICATION, "__keyevent@0__:a".to_string()),
            (NOTIFICATION, "__keyevent@0__:b".to_string()),
            (NOTIFICATION, "__keyspace@0__:a".to_string()),
        ]
    );
    assert_eq!(router.handler_count("__keyevent@0__:a"), 3);
}

#[tokio::test]
async fn unfiltered_off_removes_everything_and_reports_key() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, mut rx) = recorder("users");

    router.on("user.*", Selector::all(), h).unwrap();
    broker.notify_keyspace(0, "user.7", "set");
    assert_eq!(next(&mut rx).await, call("set", "7", "__keyspace@0__:user.*"));

    let mut removed = Vec::new();
    router
        .off("user.*", Selector::all(), |names, key| {
            removed.push((names.to_vec(), key.to_string()));
        })
        .unwrap();
    assert_eq!(
        removed,
        vec![(Vec::<String>::new(), "__keyspace@0__:user.*".to_string())]
    );
    assert!(router.patterns().is_empty());
    assert!(broker.patterns_of(NOTIFICATION).is_empty());
    assert!(broker.commands().contains(&Command::PUnsubscribe {
        conn: NOTIFICATION,
        pattern: "__keyspace@0__:user.*".into()
    }));

    broker.notify_keyspace(0, "user.7", "set");
    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn off_unknown_key_is_a_no_op() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;

    let mut calls = 0;
    router
        .off("never", Selector::events(["x"]), |_, _| calls += 1)
        .unwrap();
    assert_eq!(calls, 0);
    assert!(!broker
        .commands()
        .iter()
        .any(|c| matches!(c, Command::PUnsubscribe { .. })));
}

#[tokio::test]
async fn off_with_other_mode_does_not_touch_key() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, _rx) = recorder("h");

    router.on("jobs", Selector::events(["done"]), h).unwrap();
    let mut calls = 0;
    router.off("jobs", Selector::all(), |_, _| calls += 1).unwrap();
    assert_eq!(calls, 0);
    assert_eq!(router.patterns(), vec!["__keyevent@0__:jobs"]);
}

#[tokio::test]
async fn catch_all_filter_fires_only_for_unnamed_events() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (named, mut named_rx) = recorder("named");
    let (rest, mut rest_rx) = recorder("rest");

    router
        .on("orders", Selector::events(["paid"]), named)
        .unwrap()
        .on("orders", Selector::events(["*"]), rest)
        .unwrap();

    router.send("orders", "paid").unwrap();
    router.send("orders", "refunded").unwrap();

    assert_eq!(next(&mut named_rx).await.0, "paid");
    assert_eq!(next(&mut rest_rx).await.0, "refunded");
    settle().await;
    assert!(named_rx.try_recv().is_err());
    assert!(rest_rx.try_recv().is_err());
}

#[tokio::test]
async fn handler_can_deregister_itself() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let fired = Arc::new(Mutex::new(0));

    let weak = Arc::downgrade(&router);
    let count = Arc::clone(&fired);
    let once: HandlerRef = HandlerFn::arc("once", move |_d: &Delivery<'_>| {
        *count.lock().unwrap() += 1;
        if let Some(router) = weak.upgrade() {
            router
                .off("tick", Selector::events(["t"]), |_, _| {})
                .unwrap();
        }
    });
    router.on("tick", Selector::events(["t"]), once).unwrap();

    router.send("tick", "t").unwrap();
    settle().await;
    router.send("tick", "t").unwrap();
    settle().await;

    assert_eq!(*fired.lock().unwrap(), 1);
    assert!(router.patterns().is_empty());
}

#[tokio::test]
async fn panicking_handler_is_reported_and_isolated() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let mut events = router.subscribe_events();
    let (after, mut rx) = recorder("after");

    router
        .on(
            "x",
            Selector::events(["go"]),
            HandlerFn::arc("boom", |_d: &Delivery<'_>| panic!("nope")),
        )
        .unwrap()
        .on("x", Selector::events(["go"]), after)
        .unwrap();

    router.send("x", "go").unwrap();
    assert_eq!(next(&mut rx).await.0, "go");
    next_kind(&mut events, EventKind::HandlerPanicked).await;
}

#[tokio::test]
async fn send_serializes_structured_payloads() {
    #[derive(Serialize)]
    struct Signup {
        user: u32,
        plan: &'static str,
    }

    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config { db: 3, ..Config::default() }).await;

    router
        .send("foo", serde_json::json!({"a": 1}))
        .unwrap()
        .send("foo", "bar")
        .unwrap()
        .publish("foo", Json(Signup { user: 1, plan: "pro" }))
        .unwrap();

    let published: Vec<_> = broker
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::Publish { conn, channel, payload } => Some((conn, channel, payload)),
            _ => None,
        })
        .collect();
    assert_eq!(
        published,
        vec![
            (COMMAND, "__keyevent@3__:foo".into(), r#"{"a":1}"#.into()),
            (COMMAND, "__keyevent@3__:foo".into(), "bar".into()),
            (
                COMMAND,
                "__keyevent@3__:foo".into(),
                r#"{"user":1,"plan":"pro"}"#.into()
            ),
        ]
    );
}

#[tokio::test]
async fn serialization_error_leaves_router_usable() {
    struct Broken;
    impl Serialize for Broken {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("broken"))
        }
    }

    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, mut rx) = recorder("h");
    router.on("foo", Selector::events(["ok"]), h).unwrap();

    let err = router.send("foo", Json(Broken)).unwrap_err();
    assert_eq!(err.as_label(), "router_serialization");

    router.send("foo", "ok").unwrap();
    assert_eq!(next(&mut rx).await.0, "ok");
}

#[tokio::test]
async fn invalid_arguments_register_nothing() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, _rx) = recorder("h");

    assert!(matches!(
        router.on("   ", Selector::all(), h.clone()),
        Err(RouterError::InvalidArgument { .. })
    ));
    assert!(matches!(
        router.on("a", Selector::events(["bad name"]), h.clone()),
        Err(RouterError::InvalidArgument { .. })
    ));
    assert!(matches!(
        router.off("", Selector::all(), |_, _| {}),
        Err(RouterError::InvalidArgument { .. })
    ));
    assert!(router.patterns().is_empty());
}

#[tokio::test]
async fn ready_is_emitted_once_in_either_order() {
    for order in [[COMMAND, NOTIFICATION], [NOTIFICATION, COMMAND]] {
        let broker = MemoryBroker::manual();
        let router = Router::builder(Config::default())
            .with_factory(broker.clone())
            .build()
            .unwrap();
        let mut events = router.subscribe_events();
        assert_eq!(router.readiness(), GateState::WaitingBoth);

        broker.signal_ready(order[0]);
        broker.signal_ready(order[0]);
        next_kind(&mut events, EventKind::ConnectionReady).await;
        settle().await;
        assert!(!router.is_ready());

        broker.signal_ready(order[1]);
        timeout(Duration::from_secs(1), router.wait_ready())
            .await
            .unwrap();
        broker.signal_ready(order[1]);
        settle().await;

        let mut ready = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::Ready {
                ready += 1;
            }
        }
        assert_eq!(ready, 1);
        assert_eq!(router.readiness(), GateState::Ready);
    }
}

#[tokio::test]
async fn notifications_before_ready_are_dropped() {
    let broker = MemoryBroker::manual();
    let router = Router::builder(Config::default())
        .with_factory(broker.clone())
        .build()
        .unwrap();
    let mut events = router.subscribe_events();
    let (h, mut rx) = recorder("early");
    router.on("early", Selector::events(["x"]), h).unwrap();

    broker.signal_ready(NOTIFICATION);
    broker.publish("__keyevent@0__:early", "x");
    next_kind(&mut events, EventKind::NotificationIgnored).await;
    assert!(rx.try_recv().is_err());

    broker.signal_ready(COMMAND);
    timeout(Duration::from_secs(1), router.wait_ready())
        .await
        .unwrap();
    broker.publish("__keyevent@0__:early", "x");
    assert_eq!(next(&mut rx).await.0, "x");
}

#[tokio::test]
async fn queued_ready_is_applied_before_a_racing_notification() {
    for _ in 0..100 {
        let broker = MemoryBroker::manual();
        let router = Router::builder(Config::default())
            .with_factory(broker.clone())
            .build()
            .unwrap();
        let (h, mut rx) = recorder("racer");
        router.on("k", Selector::events(["x"]), h).unwrap();

        broker.signal_ready(COMMAND);
        broker.signal_ready(NOTIFICATION);
        broker.publish("__keyevent@0__:k", "x");
        tokio::task::yield_now().await;

        assert_eq!(next(&mut rx).await, call("x", "k", "__keyevent@0__:k"));
        assert!(router.is_ready());
    }
}

#[tokio::test]
async fn both_connections_authenticate_then_select() {
    let broker = MemoryBroker::with_password("hunter2");
    let cfg = Config {
        host: "cache.internal".into(),
        port: 6380,
        db: 2,
        auth: Some("hunter2".into()),
        ..Config::default()
    };
    let router = ready_router(&broker, cfg).await;

    let commands = broker.commands();
    for conn in [NOTIFICATION, COMMAND] {
        let mine: Vec<_> = commands
            .iter()
            .filter(|cmd| match cmd {
                Command::Auth { conn: c, .. } | Command::Select { conn: c, .. } => *c == conn,
                _ => false,
            })
            .cloned()
            .collect();
        assert_eq!(
            mine,
            vec![
                Command::Auth {
                    conn,
                    credentials: "hunter2".into()
                },
                Command::Select { conn, db: 2 },
            ]
        );
        assert_eq!(broker.db_of(conn), Some(2));
        let opts = broker.options_of(conn).unwrap();
        assert_eq!((opts.host.as_str(), opts.port), ("cache.internal", 6380));
    }
    assert_eq!(router.db(), 2);
    assert_eq!(router.config().host, "cache.internal");
    assert_eq!(router.config().auth.as_deref(), Some("hunter2"));
}

#[tokio::test]
async fn raw_commands_go_through_the_command_connection() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let (h, mut rx) = recorder("raw");
    router.on("jobs", Selector::all(), h).unwrap();

    router.command().publish("__keyspace@0__:jobs", "expired");
    assert!(broker.commands().contains(&Command::Publish {
        conn: COMMAND,
        channel: "__keyspace@0__:jobs".into(),
        payload: "expired".into(),
    }));
    assert_eq!(
        next(&mut rx).await,
        call("expired", "jobs", "__keyspace@0__:jobs")
    );
}

#[tokio::test]
async fn transport_faults_surface_as_events() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    let mut events = router.subscribe_events();

    broker.fail(COMMAND, "connection reset");
    let ev = next_kind(&mut events, EventKind::ConnectionError).await;
    assert_eq!(ev.role, Some(Role::Command));
    assert_eq!(
        ev.reason.as_deref(),
        Some("connection=command error=connection reset")
    );

    broker.fail(NOTIFICATION, "broken pipe");
    let ev = next_kind(&mut events, EventKind::ConnectionError).await;
    assert_eq!(ev.role, Some(Role::Notification));
    assert_eq!(
        ev.reason.as_deref(),
        Some("connection=notification error=broken pipe")
    );
}

#[tokio::test]
async fn close_quits_and_end_terminates_both_connections() {
    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    router.close();
    for conn in [NOTIFICATION, COMMAND] {
        assert!(broker.commands().contains(&Command::Quit { conn }));
        assert!(!broker.is_open(conn));
    }

    let broker = MemoryBroker::new();
    let router = ready_router(&broker, Config::default()).await;
    router.end();
    for conn in [NOTIFICATION, COMMAND] {
        assert!(broker.commands().contains(&Command::Terminate { conn }));
        assert!(!broker.is_open(conn));
    }
}

#[tokio::test]
async fn configured_channel_id_pattern_is_used() {
    let broker = MemoryBroker::new();
    let cfg = Config {
        channel_id_pattern: Some(r"order-(\d+)".into()),
        ..Config::default()
    };
    let router = ready_router(&broker, cfg).await;
    let (h, mut rx) = recorder("orders");

    router.on("*", Selector::events(["shipped"]), h).unwrap();
    router.send("shop:order-77:status", "shipped").unwrap();
    assert_eq!(next(&mut rx).await.1, "77");
}

#[tokio::test]
async fn build_rejects_bad_configuration() {
    #[cfg(not(feature = "redis"))]
    {
        let err = Router::builder(Config::default()).build().unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig { .. }));
    }

    let err = Router::builder(Config {
        channel_id_pattern: Some("(".into()),
        ..Config::default()
    })
    .with_factory(MemoryBroker::new())
    .build()
    .unwrap_err();
    assert!(matches!(err, RouterError::InvalidConfig { .. }));
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn build_without_factory_uses_redis_connections() {
    // nothing listens on port 1: both connections report the refusal
    let router = Router::builder(Config {
        port: 1,
        ..Config::default()
    })
    .build()
    .expect("redis factory is the default");
    let mut events = router.subscribe_events();

    let mut faulted = Vec::new();
    while faulted.len() < 2 {
        let ev = next_kind(&mut events, EventKind::ConnectionError).await;
        faulted.push(ev.role);
    }
    faulted.sort_by_key(|r| r.map(Role::as_str));
    assert_eq!(faulted, vec![Some(Role::Command), Some(Role::Notification)]);
    assert!(!router.is_ready());
}
