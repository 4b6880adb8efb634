//! # Registration selectors.
//!
//! A [`Selector`] states, at the type level, whether a registration narrows a
//! pattern to specific event names or takes every notification the pattern
//! delivers. It also fixes the key namespace (see [`Namespace`]).
//!
//! The reserved event name [`CATCH_ALL`] (`"*"`) names the catch-all bucket of
//! a filtered key: it fires for payloads that no other filter of that key names.

use crate::error::RouterError;
use crate::routing::Namespace;

/// Reserved filter name for the catch-all bucket of a filtered key.
pub const CATCH_ALL: &str = "*";

/// Filter part of an `on`/`off` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// No filter: every notification on the pattern (keyspace namespace).
    #[default]
    All,
    /// Only notifications whose payload equals one of the names (keyevent namespace).
    Events(Vec<String>),
}

impl Selector {
    /// Selector without filters.
    pub fn all() -> Self {
        Selector::All
    }

    /// Selector for the given event names.
    ///
    /// An empty list yields [`Selector::All`].
    ///
    /// ```rust
    /// use keyspace_router::Selector;
    ///
    /// assert_eq!(Selector::events(Vec::<String>::new()), Selector::All);
    /// assert!(Selector::events(["expired", "del"]).is_filtered());
    /// ```
    pub fn events<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            Selector::All
        } else {
            Selector::Events(names)
        }
    }

    /// Returns `true` if at least one event name is present.
    pub fn is_filtered(&self) -> bool {
        matches!(self, Selector::Events(names) if !names.is_empty())
    }

    /// The event names, empty for [`Selector::All`].
    pub fn names(&self) -> &[String] {
        match self {
            Selector::All => &[],
            Selector::Events(names) => names,
        }
    }

    /// Namespace implied by this selector.
    pub fn namespace(&self) -> Namespace {
        if self.is_filtered() {
            Namespace::Keyevent
        } else {
            Namespace::Keyspace
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RouterError> {
        for name in self.names() {
            if name.is_empty() {
                return Err(RouterError::invalid_argument("event name must not be empty"));
            }
            if name.chars().any(char::is_whitespace) {
                return Err(RouterError::invalid_argument(format!(
                    "event name {name:?} contains whitespace"
                )));
            }
        }
        Ok(())
    }
}

/// Splits a whitespace-separated channel list, rejecting an empty one.
pub(crate) fn split_channels(channels: &str) -> Result<Vec<&str>, RouterError> {
    let list: Vec<&str> = channels.split_whitespace().collect();
    if list.is_empty() {
        return Err(RouterError::invalid_argument(
            "at least one channel pattern is required",
        ));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_follows_filters() {
        assert_eq!(Selector::all().namespace(), Namespace::Keyspace);
        assert_eq!(Selector::events(["set"]).namespace(), Namespace::Keyevent);
        assert_eq!(Selector::Events(vec![]).namespace(), Namespace::Keyspace);
    }

    #[test]
    fn validation_rejects_bad_names() {
        assert!(Selector::events(["expired", CATCH_ALL]).validate().is_ok());
        assert!(matches!(
            Selector::events([""]).validate(),
            Err(RouterError::InvalidArgument { .. })
        ));
        assert!(Selector::events(["two words"]).validate().is_err());
    }

    #[test]
    fn channel_lists_split_on_any_whitespace() {
        assert_eq!(
            split_channels(" user.*\torder.*  cart ").unwrap(),
            vec!["user.*", "order.*", "cart"]
        );
        assert!(split_channels("   ").is_err());
    }
}
