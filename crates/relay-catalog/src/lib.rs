//! Relay Catalog
//!
//! Supplies the relay constellation's element sets for a simulation run:
//! the public Iridium NEXT catalog when reachable, otherwise a synthesized
//! Iridium-like Walker star constellation at the requested epoch.
//!
//! # Usage
//!
//! ```rust,ignore
//! let catalog = RelayCatalog::new(RelayCatalogConfig::from_env())?;
//! let relays = catalog.fetch_relay_element_sets(Utc::now()).await;
//! ```

use beacon_sim::RelaySource;
use chrono::{DateTime, Utc};
use orbital_mechanics::walker::WalkerConstellation;
use orbital_mechanics::{ElementSet, OrbitalError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub mod tle;

pub use tle::{load_tle_file, parse_tle_text, ParsedCatalog};

pub const DEFAULT_CATALOG_URL: &str =
    "https://celestrak.org/NORAD/elements/gp.php?GROUP=iridium-NEXT&FORMAT=tle";
pub const DEFAULT_TIMEOUT_SEC: u64 = 10;

/// Name prefix and first catalog number of the built-in constellation
pub const BUILTIN_PREFIX: &str = "IRIDIUM";
pub const BUILTIN_FIRST_CATALOG_NUMBER: u32 = 80_001;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Catalog returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Orbit(#[from] OrbitalError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayCatalogConfig {
    pub url: String,
    pub timeout_sec: u64,
    /// Never touch the network; serve the built-in constellation
    pub offline: bool,
}

impl Default for RelayCatalogConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            timeout_sec: DEFAULT_TIMEOUT_SEC,
            offline: false,
        }
    }
}

impl RelayCatalogConfig {
    /// `RELAY_CATALOG_URL`, `RELAY_CATALOG_TIMEOUT_SEC`, `RELAY_CATALOG_OFFLINE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("RELAY_CATALOG_URL").unwrap_or(defaults.url),
            timeout_sec: std::env::var("RELAY_CATALOG_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_sec),
            offline: std::env::var("RELAY_CATALOG_OFFLINE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.offline),
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }
}

/// Built-in relay constellation at `epoch`
pub fn default_relays(epoch: DateTime<Utc>) -> Result<Vec<ElementSet>> {
    Ok(WalkerConstellation::iridium().element_sets(
        epoch,
        BUILTIN_PREFIX,
        BUILTIN_FIRST_CATALOG_NUMBER,
    )?)
}

pub struct RelayCatalog {
    config: RelayCatalogConfig,
    client: reqwest::Client,
}

impl RelayCatalog {
    pub fn new(config: RelayCatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RelayCatalogConfig {
        &self.config
    }

    /// Download and parse the remote catalog, without fallback
    pub async fn fetch_remote(&self) -> Result<Vec<ElementSet>> {
        info!("Fetching relay catalog from {}", self.config.url);

        let response = self.client.get(&self.config.url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status()));
        }

        let body = response.text().await?;
        let parsed = parse_tle_text(&body);
        if parsed.element_sets.is_empty() {
            return Err(CatalogError::Parse(format!(
                "no usable element sets in response ({} skipped)",
                parsed.skipped
            )));
        }

        info!(
            "📡 {} relay element sets from catalog ({} skipped)",
            parsed.element_sets.len(),
            parsed.skipped
        );
        Ok(parsed.element_sets)
    }

    fn builtin(&self, epoch: DateTime<Utc>) -> Vec<ElementSet> {
        match default_relays(epoch) {
            Ok(sets) => {
                info!("Using {} built-in relay element sets", sets.len());
                sets
            }
            Err(e) => {
                warn!("Built-in relay constellation unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

impl RelaySource for RelayCatalog {
    async fn fetch_relay_element_sets(&self, epoch: DateTime<Utc>) -> Vec<ElementSet> {
        if self.config.offline {
            return self.builtin(epoch);
        }

        match self.fetch_remote().await {
            Ok(sets) => sets,
            Err(e) => {
                warn!("Relay catalog unavailable ({}), falling back to built-in relays", e);
                self.builtin(epoch)
            }
        }
    }
}
