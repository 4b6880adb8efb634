//! # Router configuration.
//!
//! Provides [`Config`], centralized settings for one router instance: where the
//! store lives, which database to address, credentials, pass-through transport
//! options and a few router knobs.
//!
//! `Config` derives `serde::Deserialize` with `#[serde(default)]`, so it can be
//! read from any serde format; every missing field takes its default.
//!
//! ## Sentinel values
//! - `auth = None` → no `AUTH` command is sent
//! - `channel_id_pattern = None` → channel ids come from the subscription glob
//! - `bus_capacity = 0` → clamped to 1

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::transport::ConnectOptions;

/// Configuration for a [`Router`](crate::Router).
///
/// ## Field semantics
/// - `host`, `port`: store address handed to the client factory
/// - `db`: logical database; part of every subscription and publish key
/// - `auth`: credentials sent on both connections before `SELECT`
/// - `options`: transport-specific options, passed through untouched
/// - `channel_id_pattern`: regular expression extracting the channel id
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store host.
    pub host: String,

    /// Store port.
    pub port: u16,

    /// Logical database index.
    pub db: u32,

    /// Credentials for `AUTH`, if the store requires them.
    pub auth: Option<String>,

    /// Transport-specific options.
    pub options: BTreeMap<String, String>,

    /// Regular expression applied to the concrete channel of every notification.
    ///
    /// When set and matching, capture group 1 (or the whole match if the
    /// expression has no groups) becomes [`Delivery::channel_id`](crate::Delivery::channel_id).
    pub channel_id_pattern: Option<String>,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Options handed to the client factory for both connections.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            options: self.options.clone(),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `host = "127.0.0.1"`, `port = 6379`, `db = 0`
    /// - `auth = None`, `options` empty, `channel_id_pattern = None`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            auth: None,
            options: BTreeMap::new(),
            channel_id_pattern: None,
            bus_capacity: 1024,
        }
    }
}
