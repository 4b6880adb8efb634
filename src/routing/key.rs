//! # Subscription keys.
//!
//! Every pattern subscription is addressed by a key of the form
//! `"__keyevent@" <db> "__:" <channel>` or `"__keyspace@" <db> "__:" <channel>`.
//! The namespace is chosen by the registration's [`Selector`](crate::Selector):
//! any event-name filter selects the keyevent feed, no filter selects the
//! keyspace feed. Registration, deregistration and publishing all derive keys
//! through [`Namespace::key`] so the three always agree.

/// Which of the store's two notification feeds a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `__keyspace@<db>__:`: notifications named after the key that changed.
    Keyspace,
    /// `__keyevent@<db>__:`: notifications named after the event that happened.
    Keyevent,
}

impl Namespace {
    /// Wire prefix up to (and including) the `@`.
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Keyspace => "__keyspace@",
            Namespace::Keyevent => "__keyevent@",
        }
    }

    /// Builds the full key for `channel` in database `db`.
    ///
    /// ```rust
    /// use keyspace_router::Namespace;
    ///
    /// assert_eq!(Namespace::Keyevent.key(0, "user.*"), "__keyevent@0__:user.*");
    /// assert_eq!(Namespace::Keyspace.key(3, "session"), "__keyspace@3__:session");
    /// ```
    pub fn key(self, db: u32, channel: &str) -> String {
        format!("{}{}__:{}", self.prefix(), db, channel)
    }
}
