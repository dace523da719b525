//! Deploy-time Manifest
//!
//! The manifest names the current cache generation and lists the
//! resources guaranteed to be pre-cached for offline use. It is supplied
//! at deploy time and immutable at runtime; the deployer bumps the
//! generation string whenever the pre-cache list changes, which forces
//! clients to repopulate (there is no content-hash invalidation).

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Manifest file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Current cache generation identifier (e.g. "app-cache-v3")
    pub generation: String,
    /// Ordered URLs required for baseline offline operation; must
    /// include at minimum the application's root document
    pub precache: Vec<String>,
    /// Optional URL served in place of a failed network fetch; also
    /// pre-cached at install when set
    #[serde(default)]
    pub offline_fallback: Option<String>,
}

impl Manifest {
    /// Load and validate a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let manifest: Manifest = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid manifest JSON: {}", path.display()))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject manifests that cannot produce a usable cache
    pub fn validate(&self) -> Result<()> {
        if self.generation.trim().is_empty() {
            return Err(anyhow!("Manifest generation identifier must not be empty"));
        }
        if self.precache.is_empty() {
            return Err(anyhow!(
                "Manifest precache list must include at least the root document"
            ));
        }
        if let Some(url) = self.precache.iter().find(|u| !u.starts_with("http")) {
            return Err(anyhow!("Manifest precache URL is not absolute: {}", url));
        }
        Ok(())
    }

    /// URLs to fetch at install time: the pre-cache list plus the
    /// offline fallback when configured and not already listed
    pub fn install_urls(&self) -> Vec<String> {
        let mut urls = self.precache.clone();
        if let Some(fallback) = &self.offline_fallback {
            if !urls.contains(fallback) {
                urls.push(fallback.clone());
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = parse(
            r#"{"generation":"app-cache-v1","precache":["https://example.com/"]}"#,
        );
        assert_eq!(manifest.generation, "app-cache-v1");
        assert_eq!(manifest.precache.len(), 1);
        assert!(manifest.offline_fallback.is_none());
        manifest.validate().unwrap();
    }

    #[test]
    fn test_parse_with_fallback() {
        let manifest = parse(
            r#"{"generation":"v2","precache":["https://example.com/"],"offlineFallback":"https://example.com/offline.html"}"#,
        );
        assert_eq!(
            manifest.offline_fallback.as_deref(),
            Some("https://example.com/offline.html")
        );
    }

    #[test]
    fn test_install_urls_appends_fallback_once() {
        let manifest = parse(
            r#"{"generation":"v1","precache":["https://example.com/","https://example.com/offline.html"],"offlineFallback":"https://example.com/offline.html"}"#,
        );
        assert_eq!(manifest.install_urls().len(), 2);
    }

    #[test]
    fn test_validate_rejects_empty_generation() {
        let manifest = parse(r#"{"generation":" ","precache":["https://example.com/"]}"#);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_precache() {
        let manifest = parse(r#"{"generation":"v1","precache":[]}"#);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_urls() {
        let manifest = parse(r#"{"generation":"v1","precache":["./index.html"]}"#);
        assert!(manifest.validate().is_err());
    }
}
