//! Error types used by the router and its transports.
//!
//! This module defines two error types:
//!
//! - [`RouterError`]: errors returned synchronously to the caller of a router
//!   operation (bad arguments, bad configuration, unserializable payloads).
//! - [`TransportError`]: connection-level faults reported asynchronously by a
//!   [`Transport`](crate::Transport) and surfaced as
//!   [`EventKind::ConnectionError`](crate::EventKind::ConnectionError).
//!
//! Both types provide `as_message` for logging; `RouterError` also has a stable `as_label`.

use thiserror::Error;

use crate::transport::Role;

/// # Errors returned by router operations.
///
/// Only argument, configuration and serialization problems are reported this way.
/// Connection faults never surface here; observe them through the event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A registration or deregistration call was malformed.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the call.
        reason: String,
    },

    /// The router could not be built from the supplied configuration.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A structured message could not be serialized for publishing.
    #[error("publish to {channel:?} failed: {error}")]
    Serialization {
        /// Destination channel (without namespace prefix).
        channel: String,
        /// The serializer's error message.
        error: String,
    },
}

impl RouterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use keyspace_router::RouterError;
    ///
    /// let err = RouterError::InvalidArgument { reason: "no channel".into() };
    /// assert_eq!(err.as_label(), "router_invalid_argument");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RouterError::InvalidArgument { .. } => "router_invalid_argument",
            RouterError::InvalidConfig { .. } => "router_invalid_config",
            RouterError::Serialization { .. } => "router_serialization",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RouterError::InvalidArgument { reason } => format!("invalid argument: {reason}"),
            RouterError::InvalidConfig { reason } => format!("invalid config: {reason}"),
            RouterError::Serialization { channel, error } => {
                format!("serialization failed; channel={channel} error={error}")
            }
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        RouterError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        RouterError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// # Connection fault reported by a transport.
///
/// Produced by transport implementations and delivered through
/// [`ConnectionEvent::Error`](crate::ConnectionEvent::Error). The router never
/// retries; it only forwards the fault to observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Which of the two connections failed, once known to the router.
    pub role: Option<Role>,
    /// The underlying error message.
    pub message: String,
}

impl TransportError {
    /// Creates an error not yet attributed to a connection.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            role: None,
            message: message.into(),
        }
    }

    /// Attributes the error to one of the router's connections.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self.role {
            Some(role) => format!("connection={} error={}", role.as_str(), self.message),
            None => format!("error={}", self.message),
        }
    }
}
