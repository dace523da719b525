//! IPC Server - Unix socket server for controlled applications
//!
//! Accepts connections from controlled application contexts and
//! dispatches each forwarded request to the interception policy. One
//! spawned task per connection; many interceptions may be in flight at
//! once, each one logically sequential internally.

use anyhow::{Context, Result};
use base64::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::intercept::{InterceptPolicy, Outcome};
use crate::ipc::protocol::{
    parse_command, serialize_response, Command, Response, PROTOCOL_VERSION, SOCKET_PATH,
};
use crate::lifecycle::LifecycleManager;
use crate::store::CacheStore;

/// IPC server that answers forwarded requests from controlled contexts
pub struct IpcServer {
    /// Interception policy deciding each forwarded request
    policy: Arc<InterceptPolicy>,
    /// Lifecycle manager, for the status surface
    lifecycle: Arc<LifecycleManager>,
    /// Storage handle, for cache counters on the status surface
    store: Arc<dyn CacheStore>,
    /// Socket listener
    listener: Option<UnixListener>,
    /// Active connections counter
    connection_count: Arc<RwLock<u32>>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(
        policy: Arc<InterceptPolicy>,
        lifecycle: Arc<LifecycleManager>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            policy,
            lifecycle,
            store,
            listener: None,
            connection_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Start the IPC server
    pub async fn start(&mut self) -> Result<()> {
        // Clean up any existing socket file
        let socket_path = PathBuf::from(SOCKET_PATH);
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context("Failed to remove existing socket file")?;
        }

        let listener = UnixListener::bind(SOCKET_PATH).context("Failed to bind Unix socket")?;

        info!(socket_path = %SOCKET_PATH, "IPC server started");

        self.listener = Some(listener);
        Ok(())
    }

    /// Run the server loop, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("Server not started")?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let policy = Arc::clone(&self.policy);
                    let lifecycle = Arc::clone(&self.lifecycle);
                    let store = Arc::clone(&self.store);
                    let connection_count = Arc::clone(&self.connection_count);

                    // One task per connection
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, policy, lifecycle, store, connection_count)
                                .await
                        {
                            error!(error = %e, "Connection handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Stop the IPC server and clean up
    pub async fn stop(&self) -> Result<()> {
        let socket_path = PathBuf::from(SOCKET_PATH);
        if socket_path.exists() {
            std::fs::remove_file(&socket_path).context("Failed to remove socket file")?;
        }
        info!("IPC server stopped");
        Ok(())
    }

    /// Get the number of active connections
    pub async fn connection_count(&self) -> u32 {
        *self.connection_count.read().await
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: UnixStream,
    policy: Arc<InterceptPolicy>,
    lifecycle: Arc<LifecycleManager>,
    store: Arc<dyn CacheStore>,
    connection_count: Arc<RwLock<u32>>,
) -> Result<()> {
    {
        let mut count = connection_count.write().await;
        *count += 1;
        debug!(count = *count, "New connection");
    }

    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    // Read commands line by line (newline-delimited JSON)
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("Connection closed by client");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed.as_bytes()) {
                    Ok(command) => {
                        let response = process_command(command, &policy, &lifecycle, &store).await;

                        match serialize_response(&response) {
                            Ok(json) => {
                                if let Err(e) = writer.write_all(&json).await {
                                    error!(error = %e, "Failed to write response");
                                    break;
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to serialize response");
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, command = %trimmed, "Failed to parse command");
                        let error_response = Response::Error {
                            error: format!("Invalid command: {}", e),
                        };
                        if let Ok(json) = serialize_response(&error_response) {
                            let _ = writer.write_all(&json).await;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to read from socket");
                break;
            }
        }
    }

    {
        let mut count = connection_count.write().await;
        *count = count.saturating_sub(1);
        debug!(count = *count, "Connection ended");
    }

    Ok(())
}

/// Process a command and return a response
async fn process_command(
    command: Command,
    policy: &InterceptPolicy,
    lifecycle: &LifecycleManager,
    store: &Arc<dyn CacheStore>,
) -> Response {
    match command {
        Command::Fetch {
            method,
            url,
            headers,
        } => {
            debug!(method = %method, url = %url, "Processing fetch command");

            match policy.handle(&method, &url, &headers).await {
                Outcome::Response { snapshot, source } => Response::Fetched {
                    status: snapshot.status,
                    headers: snapshot.headers,
                    body: base64::engine::general_purpose::STANDARD.encode(&snapshot.body),
                    source: source.as_str().to_string(),
                },
                Outcome::Passthrough => Response::Passthrough,
                Outcome::Failed(e) => Response::Error {
                    error: format!("Fetch failed: {}", e),
                },
            }
        }

        Command::GetStatus => {
            debug!("Processing getStatus command");

            let stats = store.stats();
            Response::Status {
                version: PROTOCOL_VERSION,
                state: lifecycle.state().as_str().to_string(),
                generation: lifecycle.generation().to_string(),
                cache_hits: stats.hits,
                cache_misses: stats.misses,
            }
        }
    }
}
