//! # Redis client factory.
//!
//! [`RedisFactory`] opens real store connections with the `redis` crate. It is
//! what [`RouterBuilder::build`](crate::RouterBuilder::build) falls back to when
//! no factory is set.
//!
//! Each [`Connection`] is backed by one actor task:
//!
//! ```text
//! RedisClient (Transport) ──► mpsc<Op> ──► actor task
//!                                            ├─ multiplexed connection: SELECT, AUTH, PUBLISH, QUIT
//!                                            ├─ pub/sub connection (opened on first psubscribe):
//!                                            │      PSUBSCRIBE / PUNSUBSCRIBE, pmessage stream
//!                                            └─► mpsc<ConnectionEvent>: Ready / Error / PatternMessage
//! ```
//!
//! ## Rules
//! - `Ready` is sent once the multiplexed connection is established.
//! - A failed connect sends one `Error` and closes the event stream.
//! - A failed command sends an `Error`; the connection stays up.
//! - The pub/sub connection reuses the credentials and database last sent
//!   through `auth`/`select`.
//! - `Config::options["username"]`, when present, is sent with `AUTH`.
//! - Dropping the [`Transport`] handle, `quit` or `terminate` ends the actor.

use std::sync::Arc;

use ::redis::aio::{MultiplexedConnection, PubSub};
use ::redis::{Client, Cmd, ConnectionAddr, ConnectionInfo, Msg, RedisConnectionInfo, RedisResult};
use futures::StreamExt;
use tokio::sync::mpsc;

use super::{ClientFactory, ConnectOptions, Connection, ConnectionEvent, Notification, Transport};
use crate::error::TransportError;

/// [`ClientFactory`] backed by the `redis` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisFactory;

impl RedisFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ClientFactory for RedisFactory {
    fn connect(&self, options: &ConnectOptions) -> Connection {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(connection_info(options), ops_rx, events_tx));
        Connection {
            client: Arc::new(RedisClient { ops: ops_tx }),
            events: events_rx,
        }
    }
}

/// Maps router connect options onto the `redis` crate's connection info.
pub(crate) fn connection_info(options: &ConnectOptions) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(options.host.clone(), options.port),
        redis: RedisConnectionInfo {
            username: options.options.get("username").cloned(),
            ..Default::default()
        },
    }
}

#[derive(Debug)]
enum Op {
    Select(u32),
    Auth(String),
    PSubscribe(String),
    PUnsubscribe(String),
    Publish { channel: String, payload: String },
    Quit,
    Terminate,
}

/// Command handle of one redis connection.
struct RedisClient {
    ops: mpsc::UnboundedSender<Op>,
}

impl RedisClient {
    fn send(&self, op: Op) {
        // the actor is gone once the connection closed; commands are dropped
        let _ = self.ops.send(op);
    }
}

impl Transport for RedisClient {
    fn select(&self, db: u32) {
        self.send(Op::Select(db));
    }

    fn auth(&self, credentials: &str) {
        self.send(Op::Auth(credentials.to_string()));
    }

    fn psubscribe(&self, pattern: &str) {
        self.send(Op::PSubscribe(pattern.to_string()));
    }

    fn punsubscribe(&self, pattern: &str) {
        self.send(Op::PUnsubscribe(pattern.to_string()));
    }

    fn publish(&self, channel: &str, payload: &str) {
        self.send(Op::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
    }

    fn quit(&self) {
        self.send(Op::Quit);
    }

    fn terminate(&self) {
        self.send(Op::Terminate);
    }
}

enum Step {
    Op(Option<Op>),
    Message(Msg),
    StreamEnded,
}

async fn run(
    mut info: ConnectionInfo,
    mut ops: mpsc::UnboundedReceiver<Op>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let mut conn = match open(&info).await {
        Ok(conn) => conn,
        Err(e) => {
            fault(&events, &e);
            return;
        }
    };
    let _ = events.send(ConnectionEvent::Ready);

    let mut pubsub: Option<PubSub> = None;
    loop {
        let step = match pubsub.as_mut() {
            Some(ps) => {
                let mut messages = std::pin::pin!(ps.on_message());
                tokio::select! {
                    op = ops.recv() => Step::Op(op),
                    msg = messages.next() => match msg {
                        Some(msg) => Step::Message(msg),
                        None => Step::StreamEnded,
                    },
                }
            }
            None => Step::Op(ops.recv().await),
        };

        match step {
            Step::Op(None) | Step::Op(Some(Op::Terminate)) => break,
            Step::Op(Some(Op::Quit)) => {
                let _ = exec(&::redis::cmd("QUIT"), &mut conn).await;
                break;
            }
            Step::Op(Some(op)) => {
                if let Err(e) = apply(op, &mut info, &mut conn, &mut pubsub).await {
                    fault(&events, &e);
                }
            }
            Step::Message(msg) => {
                if let Some(n) = notification(&msg) {
                    let _ = events.send(ConnectionEvent::PatternMessage(n));
                }
            }
            Step::StreamEnded => {
                let _ = events.send(ConnectionEvent::Error(TransportError::new(
                    "subscription stream ended",
                )));
                break;
            }
        }
    }
}

async fn open(info: &ConnectionInfo) -> RedisResult<MultiplexedConnection> {
    Client::open(info.clone())?
        .get_multiplexed_async_connection()
        .await
}

async fn apply(
    op: Op,
    info: &mut ConnectionInfo,
    conn: &mut MultiplexedConnection,
    pubsub: &mut Option<PubSub>,
) -> RedisResult<()> {
    match op {
        Op::Select(db) => {
            info.redis.db = i64::from(db);
            exec(::redis::cmd("SELECT").arg(db), conn).await
        }
        Op::Auth(credentials) => {
            let mut cmd = ::redis::cmd("AUTH");
            if let Some(user) = &info.redis.username {
                cmd.arg(user);
            }
            cmd.arg(&credentials);
            info.redis.password = Some(credentials);
            exec(&cmd, conn).await
        }
        Op::Publish { channel, payload } => {
            exec(::redis::cmd("PUBLISH").arg(channel).arg(payload), conn).await
        }
        Op::PSubscribe(pattern) => {
            if pubsub.is_none() {
                *pubsub = Some(Client::open(info.clone())?.get_async_pubsub().await?);
            }
            match pubsub.as_mut() {
                Some(ps) => ps.psubscribe(pattern).await,
                None => Ok(()),
            }
        }
        Op::PUnsubscribe(pattern) => match pubsub.as_mut() {
            Some(ps) => ps.punsubscribe(pattern).await,
            None => Ok(()),
        },
        Op::Quit | Op::Terminate => Ok(()),
    }
}

async fn exec(cmd: &Cmd, conn: &mut MultiplexedConnection) -> RedisResult<()> {
    let _: ::redis::Value = cmd.query_async(conn).await?;
    Ok(())
}

fn notification(msg: &Msg) -> Option<Notification> {
    let pattern: String = msg.get_pattern().ok()?;
    Some(Notification::new(
        pattern,
        msg.get_channel_name(),
        String::from_utf8_lossy(msg.get_payload_bytes()),
    ))
}

fn fault(events: &mpsc::UnboundedSender<ConnectionEvent>, err: &::redis::RedisError) {
    let _ = events.send(ConnectionEvent::Error(TransportError::new(err.to_string())));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    fn options(port: u16) -> ConnectOptions {
        ConnectOptions {
            host: "127.0.0.1".into(),
            port,
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn connect_options_map_to_connection_info() {
        let mut opts = options(6380);
        opts.options.insert("username".into(), "app".into());

        let info = connection_info(&opts);
        assert_eq!(info.addr, ConnectionAddr::Tcp("127.0.0.1".into(), 6380));
        assert_eq!(info.redis.username.as_deref(), Some("app"));
        assert_eq!(info.redis.password, None);
        assert_eq!(info.redis.db, 0);
    }

    #[tokio::test]
    async fn unreachable_store_reports_an_error_then_closes() {
        // nothing listens on port 1
        let mut conn = RedisFactory::new().connect(&options(1));
        conn.client.select(0);

        let first = tokio::time::timeout(Duration::from_secs(5), conn.events.recv())
            .await
            .unwrap();
        assert!(matches!(first, Some(ConnectionEvent::Error(_))));
        let rest = tokio::time::timeout(Duration::from_secs(5), conn.events.recv())
            .await
            .unwrap();
        assert_eq!(rest, None);

        // commands after the actor is gone are dropped silently
        conn.client.publish("k", "v");
        conn.client.terminate();
    }
}
