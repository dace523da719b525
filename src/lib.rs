//! offcache-daemon library
//!
//! An offline-first caching agent: pre-caches a deploy-time manifest into
//! a named cache generation, prunes stale generations at activation, and
//! answers forwarded application requests cache-first with network
//! fallback and opportunistic populate.

pub mod intercept;
pub mod ipc;
pub mod lifecycle;
pub mod manifest;
pub mod net;
pub mod store;
