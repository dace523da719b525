//! Install and activate transitions for cache generations

pub mod manager;

pub use manager::{LifecycleManager, LifecycleSignal, LifecycleState};
