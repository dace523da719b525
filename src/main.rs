//! offcache-daemon - offline-first caching agent
//!
//! Pre-caches a deploy-time manifest, prunes stale cache generations, and
//! serves forwarded application requests cache-first over a Unix socket.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use offcache_daemon::intercept::{InterceptPolicy, Outcome};
use offcache_daemon::ipc::IpcServer;
use offcache_daemon::lifecycle::LifecycleManager;
use offcache_daemon::manifest::Manifest;
use offcache_daemon::net::NetworkClient;
use offcache_daemon::store::{CacheStore, DiskStore};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Run the agent: install, activate, then serve IPC (default)
    Serve {
        manifest: PathBuf,
        cache_dir: Option<PathBuf>,
    },
    /// One-shot fetch through the interception policy (CLI mode)
    Fetch {
        manifest: PathBuf,
        cache_dir: Option<PathBuf>,
        url: String,
    },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"offcache-daemon - Offline-first caching agent

USAGE:
    offcache-daemon [serve] --manifest <path> [--cache-dir <path>]
    offcache-daemon fetch <url> --manifest <path> [--cache-dir <path>]
    offcache-daemon help

COMMANDS:
    serve   Install the manifest, activate the current generation, and
            answer forwarded requests over the Unix socket (default)
    fetch   Run one request through the cache-first policy (CLI mode)
    help    Show this help message

OPTIONS:
    --manifest <path>    Manifest JSON file (generation, precache list)
    --cache-dir <path>   Cache store root (default: platform cache dir)

EXAMPLES:
    # Run the agent
    offcache-daemon serve --manifest ./manifest.json

    # One-shot fetch (CLI mode for testing)
    offcache-daemon fetch https://example.com/app.js --manifest ./manifest.json

ENVIRONMENT:
    OFFCACHE_MANIFEST    Manifest path (alternative to --manifest)
    OFFCACHE_CACHE_DIR   Cache root (alternative to --cache-dir)
    RUST_LOG             Log level (trace, debug, info, warn, error)
"#
    );
}

/// Pull `--flag value` out of an argument list
fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    if pos + 1 >= args.len() {
        return None;
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

fn parse_args() -> Result<Command> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let manifest = take_flag(&mut args, "--manifest")
        .or_else(|| env::var("OFFCACHE_MANIFEST").ok())
        .map(PathBuf::from);
    let cache_dir = take_flag(&mut args, "--cache-dir")
        .or_else(|| env::var("OFFCACHE_CACHE_DIR").ok())
        .map(PathBuf::from);

    let require_manifest = |manifest: Option<PathBuf>| {
        manifest.ok_or_else(|| anyhow!("Missing --manifest <path> (or OFFCACHE_MANIFEST)"))
    };

    match args.first().map(String::as_str) {
        None | Some("serve") => Ok(Command::Serve {
            manifest: require_manifest(manifest)?,
            cache_dir,
        }),
        Some("fetch") => {
            let url = args
                .get(1)
                .cloned()
                .ok_or_else(|| anyhow!("Usage: offcache-daemon fetch <url> --manifest <path>"))?;
            Ok(Command::Fetch {
                manifest: require_manifest(manifest)?,
                cache_dir,
                url,
            })
        }
        Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            Ok(Command::Help)
        }
    }
}

/// Build the shared store, network client, and manifest
fn build_components(
    manifest_path: &PathBuf,
    cache_dir: Option<PathBuf>,
) -> Result<(Arc<dyn CacheStore>, NetworkClient, Manifest)> {
    let manifest = Manifest::load(manifest_path)?;

    let store: Arc<dyn CacheStore> = match cache_dir {
        Some(root) => Arc::new(DiskStore::with_root(root)?),
        None => Arc::new(DiskStore::new()?),
    };

    let net = NetworkClient::new().context("Failed to create HTTP client")?;

    Ok((store, net, manifest))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::Serve {
            manifest,
            cache_dir,
        } => {
            let (store, net, manifest) = build_components(&manifest, cache_dir)?;
            info!(generation = %manifest.generation, "Starting offcache daemon");

            // Surface lifecycle signals to the host log
            let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                while let Some(signal) = signal_rx.recv().await {
                    info!(signal = ?signal, "Lifecycle signal");
                }
            });

            let lifecycle = Arc::new(LifecycleManager::new(
                Arc::clone(&store),
                net.clone(),
                manifest.clone(),
                signal_tx,
            ));

            // Fail-open: a failed install leaves the cache empty and the
            // agent serving network-only
            if let Err(e) = lifecycle.install().await {
                error!(error = %e, "Install failed, continuing with empty cache");
            }
            lifecycle.activate().await?;

            let policy = Arc::new(InterceptPolicy::new(
                Arc::clone(&store),
                net,
                manifest.generation.clone(),
                manifest.offline_fallback.clone(),
            ));

            let mut ipc_server = IpcServer::new(policy, Arc::clone(&lifecycle), store);
            if let Err(e) = ipc_server.start().await {
                error!(error = %e, "Failed to start IPC server");
                return Err(e);
            }
            let ipc_server = Arc::new(ipc_server);

            info!("Agent ready. Waiting for forwarded requests...");

            let server = Arc::clone(&ipc_server);
            tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!(error = %e, "IPC server error");
                }
            });

            // Wait for Ctrl+C
            tokio::signal::ctrl_c().await?;

            info!("Received shutdown signal, stopping...");
            ipc_server.stop().await?;

            info!("Shutdown complete.");
        }
        Command::Fetch {
            manifest,
            cache_dir,
            url,
        } => {
            let (store, net, manifest) = build_components(&manifest, cache_dir)?;
            let policy = InterceptPolicy::new(
                store,
                net,
                manifest.generation.clone(),
                manifest.offline_fallback.clone(),
            );

            match policy.handle("GET", &url, &[]).await {
                Outcome::Response { snapshot, source } => {
                    eprintln!(
                        "{} {} ({} bytes, from {})",
                        snapshot.status,
                        url,
                        snapshot.body.len(),
                        source.as_str()
                    );
                    std::io::stdout().write_all(&snapshot.body)?;
                }
                Outcome::Passthrough => {
                    eprintln!("Request not eligible for interception: {}", url);
                }
                Outcome::Failed(e) => {
                    error!(url = %url, error = %e, "Fetch failed");
                    std::process::exit(1);
                }
            }
        }
        Command::Help => {
            print_help();
        }
    }

    Ok(())
}
