//! Unix socket boundary between controlled applications and the agent

pub mod protocol;
pub mod server;

pub use server::IpcServer;
