//! Request interception: cache-first with network fallback

pub mod policy;

pub use policy::{InterceptPolicy, Outcome, Source};
