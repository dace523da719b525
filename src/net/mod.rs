//! Network access for cache misses and manifest pre-caching

pub mod client;
pub mod errors;

pub use client::NetworkClient;
pub use errors::FetchError;
