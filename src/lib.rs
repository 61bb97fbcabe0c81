//! Get, set or remove build caches, artifacts and logs in a remote store, or
//! in a cache on the local disk.
//!
//! Every invocation turns an action, store type, scope and key into exactly
//! one backend call. See [`dispatch::Dispatcher`] for the entry point.

pub mod address;
pub mod archive;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod key;
pub mod models;
pub mod policy;
pub mod store;
