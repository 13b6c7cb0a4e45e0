//! Beacon Simulation Engine
//!
//! Simulates communication visibility between a user-configured LEO
//! "Beacon" and a relay constellation over a time window, producing
//! handshake and blackout statistics plus full tracks.
//!
//! ```text
//! SimulationConfig ──► synthesize Beacon ElementSet
//!                           │
//! RelaySource ──► relay ElementSets ──► Sgp4Orbit per body
//!                           │
//!                   Engine step loop ──► SimulationResult
//! ```

use chrono::{DateTime, Utc};
use orbital_mechanics::{synthesize_element_set, ElementSet, OrbitalError, Sgp4Orbit};
use thiserror::Error;
use tracing::info;

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod events;
pub mod result;
pub mod source;

pub use config::{LinkMode, SimulationConfig};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, NullSink, TracingSink};
pub use engine::{Engine, Timeline};
pub use events::{BlackoutPeriod, Handshake};
pub use result::{ActiveLinks, BlackoutStatistics, SimulationResult, TrackSample};
pub use source::RelaySource;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Orbit(#[from] OrbitalError),
    #[error("No usable relay element sets")]
    NoUsableRelayData,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Caller supplied something outside the accepted domain
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SimError::InvalidConfig(_)
                | SimError::Json(_)
                | SimError::Orbit(OrbitalError::InvalidOrbitParameters(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Run one simulation against the given relay element sets, logging
/// diagnostics through `tracing`. `start` defaults to now.
pub fn run(
    config: &SimulationConfig,
    relay_sets: &[ElementSet],
    start: Option<DateTime<Utc>>,
) -> Result<SimulationResult> {
    run_with_sink(config, relay_sets, start, TracingSink)
}

pub fn run_with_sink<S: DiagnosticSink>(
    config: &SimulationConfig,
    relay_sets: &[ElementSet],
    start: Option<DateTime<Utc>>,
    mut sink: S,
) -> Result<SimulationResult> {
    config.validate()?;
    let start = start.unwrap_or_else(Utc::now);

    let beacon_set = synthesize_element_set(&config.beacon_intent, start)?;
    let beacon = Sgp4Orbit::new(&beacon_set)
        .map_err(|e| OrbitalError::ElementSynthesis(e.to_string()))?;

    let relays = source::prepare_relays(relay_sets, &mut sink);
    if relays.is_empty() {
        return Err(SimError::NoUsableRelayData);
    }
    let rejected = relay_sets.len() - relays.len();

    info!(
        "Simulating {} relays over {} h at {} s steps ({:?})",
        relays.len(),
        config.duration_hours,
        config.time_step_seconds,
        config.link_mode
    );

    let mut result = Engine::new(config, &mut sink).simulate(&beacon, &relays, start);
    result.beacon_elements = Some(beacon_set);
    result.diagnostics.relays_rejected = rejected;

    info!(
        "✅ {} handshakes, {} blackouts ({:.0} s total), coverage {:.1}%",
        result.total_handshake_count,
        result.blackout_statistics.number_of_blackouts,
        result.blackout_statistics.total_blackout_duration_seconds,
        result.coverage_fraction * 100.0
    );

    Ok(result)
}

/// Fetch relays from `source` at the run's start epoch, then [`run`].
///
/// The step loop itself is synchronous; async callers that must stay
/// responsive should fetch first and hand [`run`] to a blocking pool.
pub async fn run_with_source<R: RelaySource>(
    config: &SimulationConfig,
    source: &R,
    start: Option<DateTime<Utc>>,
) -> Result<SimulationResult> {
    config.validate()?;
    let start = start.unwrap_or_else(Utc::now);
    let relay_sets = source.fetch_relay_element_sets(start).await;
    run(config, &relay_sets, Some(start))
}
