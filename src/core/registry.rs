//! # Subscription registry.
//!
//! Maps subscription keys to their handler structure:
//!
//! ```text
//! "__keyevent@0__:user.*" ─► Filtered { "created" ─► [h1, h2], "deleted" ─► [h3], "*" ─► [h4] }
//! "__keyspace@0__:cart:*" ─► All [h5, h5, h6]
//! ```
//!
//! ## Rules
//! - A key's mode is fixed by its first registration (the key prefix already
//!   encodes it). A registration of the other mode is merged: unfiltered into
//!   the catch-all bucket of a filtered key, filtered into the list of an
//!   unfiltered key.
//! - Handlers are appended; nothing is deduplicated.
//! - Removal is per key and takes every handler with it.
//! - The registry is a plain value; the router guards it with a mutex and never
//!   calls a handler while holding it. [`Registry::resolve`] hands out a cloned
//!   snapshot for that purpose.

use std::collections::HashMap;

use crate::routing::{Glob, HandlerRef, Selector, CATCH_ALL};

/// Handler structure of one key.
enum Bucket {
    Filtered(HashMap<String, Vec<HandlerRef>>),
    All(Vec<HandlerRef>),
}

impl Bucket {
    fn for_selector(selector: &Selector) -> Self {
        if selector.is_filtered() {
            Bucket::Filtered(HashMap::new())
        } else {
            Bucket::All(Vec::new())
        }
    }

    fn insert(&mut self, selector: &Selector, handler: &HandlerRef) {
        match self {
            Bucket::Filtered(filters) if selector.is_filtered() => {
                for name in selector.names() {
                    filters
                        .entry(name.clone())
                        .or_default()
                        .push(handler.clone());
                }
            }
            Bucket::Filtered(filters) => {
                filters
                    .entry(CATCH_ALL.to_string())
                    .or_default()
                    .push(handler.clone());
            }
            Bucket::All(list) => list.push(handler.clone()),
        }
    }

    fn resolve(&self, payload: &str) -> Vec<HandlerRef> {
        match self {
            Bucket::Filtered(filters) => filters
                .get(payload)
                .or_else(|| filters.get(CATCH_ALL))
                .cloned()
                .unwrap_or_default(),
            Bucket::All(list) => list.clone(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Bucket::Filtered(filters) => filters.values().map(Vec::len).sum(),
            Bucket::All(list) => list.len(),
        }
    }
}

/// One registered key: its compiled pattern and its handlers.
struct Entry {
    glob: Glob,
    bucket: Bucket,
}

/// What a notification resolves to: the handlers to run, in order, and the
/// compiled subscription pattern for channel-id extraction.
pub(crate) struct Resolved {
    pub(crate) handlers: Vec<HandlerRef>,
    pub(crate) glob: Glob,
}

/// Key → handler structure.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under `key`. Returns `true` if the key was created by this call.
    pub(crate) fn insert(&mut self, key: &str, selector: &Selector, handler: &HandlerRef) -> bool {
        let mut created = false;
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            created = true;
            Entry {
                glob: Glob::new(key),
                bucket: Bucket::for_selector(selector),
            }
        });
        entry.bucket.insert(selector, handler);
        created
    }

    /// Drops `key` with all its handlers. Returns how many entries went with it.
    pub(crate) fn remove(&mut self, key: &str) -> Option<usize> {
        self.entries.remove(key).map(|entry| entry.bucket.len())
    }

    /// Snapshot of the handlers a notification on `pattern` with `payload` fires.
    ///
    /// `None` if `pattern` has no entry; no handlers if it has one but no
    /// filter accepts the payload.
    pub(crate) fn resolve(&self, pattern: &str, payload: &str) -> Option<Resolved> {
        self.entries.get(pattern).map(|entry| Resolved {
            handlers: entry.bucket.resolve(payload),
            glob: entry.glob.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Handler entries registered under `key` (0 for unknown keys).
    pub(crate) fn handler_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.bucket.len())
    }

    /// Sorted list of registered keys.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
