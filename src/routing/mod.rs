//! Addressing model: keys, selectors, handlers and glob matching.
//!
//! ## Contents
//! - [`Namespace`] builds and parses subscription keys
//! - [`Selector`] filter part of a registration, and [`CATCH_ALL`]
//! - [`Handler`], [`HandlerFn`], [`Delivery`] the callback contract
//! - [`Glob`] the store's pattern rules, with capture spans

mod glob;
mod handler;
mod key;
mod selector;

pub use glob::{has_wildcards, Glob};
pub use handler::{Delivery, Handler, HandlerFn, HandlerRef};
pub use key::Namespace;
pub use selector::{Selector, CATCH_ALL};

pub(crate) use selector::split_channels;
