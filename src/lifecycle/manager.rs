//! Lifecycle Manager
//!
//! Owns the install and activate transitions for one deployed generation.
//! Install pre-caches the manifest with an all-or-nothing commit; activate
//! prunes every generation outside the whitelist. Each transition emits
//! one control-plane signal to the host.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::manifest::Manifest;
use crate::net::NetworkClient;
use crate::store::{CacheStore, RequestKey, ResponseSnapshot};

/// Lifecycle states, in order. A new deployment creates a new instance
/// that repeats the cycle; the old instance's generation becomes subject
/// to pruning by the new instance's activate transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Installed,
    Activating,
    Activated,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
        }
    }
}

/// Control-plane signals emitted to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Post-install: leave the waiting state immediately instead of
    /// awaiting natural handoff
    SkipWaiting,
    /// Post-activate: claim all open application contexts immediately
    /// instead of waiting for their next navigation
    ClaimClients,
}

/// Runs install and activate for the current generation
pub struct LifecycleManager {
    store: Arc<dyn CacheStore>,
    net: NetworkClient,
    manifest: Manifest,
    state: RwLock<LifecycleState>,
    signals: UnboundedSender<LifecycleSignal>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn CacheStore>,
        net: NetworkClient,
        manifest: Manifest,
        signals: UnboundedSender<LifecycleSignal>,
    ) -> Self {
        Self {
            store,
            net,
            manifest,
            state: RwLock::new(LifecycleState::Installing),
            signals,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap()
    }

    /// Current generation identifier (the activation whitelist)
    pub fn generation(&self) -> &str {
        &self.manifest.generation
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap() = state;
    }

    fn emit(&self, signal: LifecycleSignal) {
        if self.signals.send(signal).is_err() {
            warn!(signal = ?signal, "No lifecycle signal receiver attached");
        }
    }

    /// Install transition: pre-cache the manifest into the current
    /// generation.
    ///
    /// All-or-nothing: every manifest URL is fetched first, and only a
    /// complete batch is committed. A single fetch rejection abandons the
    /// whole batch. Non-success statuses on manifest fetches are stored
    /// anyway (manifest URLs target same-origin static resources).
    ///
    /// On failure the error is surfaced to the caller but the instance
    /// still becomes installed; subsequent lookups degrade to
    /// network-only behavior. No retry is attempted.
    pub async fn install(&self) -> Result<()> {
        let generation = self.manifest.generation.clone();
        let urls = self.manifest.install_urls();

        info!(
            generation = %generation,
            resources = urls.len(),
            "Installing: pre-caching manifest"
        );

        let result = self.precache(&generation, &urls).await;

        // Fail-open: installed either way, possibly with an empty cache
        self.set_state(LifecycleState::Installed);

        match result {
            Ok(()) => {
                info!(generation = %generation, "Manifest pre-cached, skipping waiting state");
                self.emit(LifecycleSignal::SkipWaiting);
                Ok(())
            }
            Err(e) => {
                error!(generation = %generation, error = %e, "Manifest pre-cache failed, cache left empty");
                Err(e)
            }
        }
    }

    async fn precache(&self, generation: &str, urls: &[String]) -> Result<()> {
        self.store
            .open_generation(generation)
            .context("Failed to open cache generation")?;

        // Fetch everything before committing anything
        let mut entries: Vec<(RequestKey, ResponseSnapshot)> = Vec::with_capacity(urls.len());
        for url in urls {
            let key = RequestKey::get(url);
            let snapshot = self
                .net
                .fetch(&key, &[])
                .await
                .with_context(|| format!("Manifest fetch rejected: {}", url))?;
            entries.push((key, snapshot));
        }

        self.store
            .commit_batch(generation, &entries)
            .context("Failed to commit manifest batch")?;

        Ok(())
    }

    /// Activate transition: prune every persisted generation whose name
    /// is not the current one.
    ///
    /// Deletion failures are isolated per generation: a stale generation
    /// that cannot be deleted is logged and left behind, and never stops
    /// the rest of the pass.
    pub async fn activate(&self) -> Result<()> {
        self.set_state(LifecycleState::Activating);

        let whitelist = self.manifest.generation.as_str();
        let generations = self
            .store
            .list_generations()
            .context("Failed to enumerate cache generations")?;

        for name in generations {
            if name == whitelist {
                continue;
            }
            match self.store.delete_generation(&name) {
                Ok(()) => info!(generation = %name, "Pruned stale cache generation"),
                Err(e) => {
                    warn!(generation = %name, error = %e, "Failed to prune stale generation")
                }
            }
        }

        self.set_state(LifecycleState::Activated);
        info!(generation = %whitelist, "Activated, claiming open contexts");
        self.emit(LifecycleSignal::ClaimClients);

        Ok(())
    }
}
