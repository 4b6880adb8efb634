//! # Publisher.
//!
//! Serializes outbound messages and issues them on the command connection under
//! `"__keyevent@" <db> "__:" <channel>`.
//!
//! What counts as "plain" and what gets serialized is decided by
//! [`IntoPayload`]:
//!
//! | Message                                   | Payload on the wire          |
//! |-------------------------------------------|------------------------------|
//! | `&str`, `String`                          | unchanged                    |
//! | integers, floats, `bool`, `char`          | `to_string()`                |
//! | `serde_json::Value::String(s)`            | `s` unchanged                |
//! | other `serde_json::Value`                 | compact JSON                 |
//! | [`Json<T>`] with `T: Serialize`           | compact JSON, fields in declaration/insertion order |
//!
//! A serialization failure is returned to the caller and leaves the router untouched.

use std::sync::Arc;

use serde::Serialize;

use crate::error::RouterError;
use crate::events::{Bus, Event, EventKind};
use crate::routing::Namespace;
use crate::transport::{Role, Transport};

/// Conversion of an outbound message into its wire payload.
pub trait IntoPayload {
    fn into_payload(self) -> Result<String, serde_json::Error>;
}

/// Marks a value as structured: it is serialized to JSON before publishing.
///
/// ```rust
/// use keyspace_router::{IntoPayload, Json};
///
/// #[derive(serde::Serialize)]
/// struct Login { user: u32, ok: bool }
///
/// let payload = Json(Login { user: 7, ok: true }).into_payload().unwrap();
/// assert_eq!(payload, r#"{"user":7,"ok":true}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoPayload for Json<T> {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

impl IntoPayload for &str {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        Ok(self.to_string())
    }
}

impl IntoPayload for String {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        Ok(self)
    }
}

impl IntoPayload for &String {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        Ok(self.clone())
    }
}

impl IntoPayload for serde_json::Value {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        match self {
            serde_json::Value::String(s) => Ok(s),
            other => serde_json::to_string(&other),
        }
    }
}

impl IntoPayload for &serde_json::Value {
    fn into_payload(self) -> Result<String, serde_json::Error> {
        match self {
            serde_json::Value::String(s) => Ok(s.clone()),
            other => serde_json::to_string(other),
        }
    }
}

macro_rules! plain_payload {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoPayload for $t {
                fn into_payload(self) -> Result<String, serde_json::Error> {
                    Ok(self.to_string())
                }
            }
        )*
    };
}

plain_payload!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);

pub(crate) struct Publisher {
    command: Arc<dyn Transport>,
    db: u32,
    bus: Bus,
}

impl Publisher {
    pub(crate) fn new(command: Arc<dyn Transport>, db: u32, bus: Bus) -> Self {
        Self { command, db, bus }
    }

    /// Serializes `message` and publishes it on `channel`. Returns the publish key.
    pub(crate) fn send(&self, channel: &str, message: impl IntoPayload) -> Result<String, RouterError> {
        let payload = message
            .into_payload()
            .map_err(|e| RouterError::Serialization {
                channel: channel.to_string(),
                error: e.to_string(),
            })?;

        let key = Namespace::Keyevent.key(self.db, channel);
        self.command.publish(&key, &payload);
        self.bus.publish(
            Event::new(EventKind::Published)
                .with_role(Role::Command)
                .with_key(key.as_str()),
        );
        Ok(key)
    }
}
