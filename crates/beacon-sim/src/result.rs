//! Simulation result model

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use orbital_mechanics::{ElementSet, GeodeticPosition, InertialState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::events::{BlackoutPeriod, Handshake};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSample {
    pub timestamp: DateTime<Utc>,
    pub position_eci: Vector3<f64>,
    pub velocity_eci: Vector3<f64>,
    pub geodetic: GeodeticPosition,
}

impl TrackSample {
    pub fn new(state: &InertialState, geodetic: GeodeticPosition) -> Self {
        Self {
            timestamp: state.timestamp,
            position_eci: state.position_eci,
            velocity_eci: state.velocity_eci,
            geodetic,
        }
    }
}

/// Relays connected at one processed Beacon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLinks {
    /// Index into the full timeline (skipped steps leave gaps)
    pub step_index: usize,
    pub timestamp: DateTime<Utc>,
    pub relay_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutStatistics {
    pub number_of_blackouts: usize,
    pub total_blackout_duration_seconds: f64,
    pub average_blackout_duration_seconds: f64,
    pub longest_blackout_seconds: f64,
}

impl BlackoutStatistics {
    pub fn from_periods(periods: &[BlackoutPeriod]) -> Self {
        let number_of_blackouts = periods.len();
        let total: f64 = periods.iter().map(|p| p.duration_seconds).sum();
        let longest = periods
            .iter()
            .map(|p| p.duration_seconds)
            .fold(0.0, f64::max);

        Self {
            number_of_blackouts,
            total_blackout_duration_seconds: total,
            average_blackout_duration_seconds: if number_of_blackouts == 0 {
                0.0
            } else {
                total / number_of_blackouts as f64
            },
            longest_blackout_seconds: longest,
        }
    }
}

/// Counts of recoverable failures seen during the run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSummary {
    pub beacon_steps_skipped: usize,
    pub relay_samples_skipped: usize,
    pub relays_rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps_simulated: usize,
    pub steps_skipped: usize,
    pub relay_count: usize,
    pub total_handshake_count: usize,
    pub handshakes: Vec<Handshake>,
    pub active_links: Vec<ActiveLinks>,
    pub blackout_periods: Vec<BlackoutPeriod>,
    pub blackout_statistics: BlackoutStatistics,
    /// Processed steps with at least one link / processed steps
    pub coverage_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beacon_elements: Option<ElementSet>,
    pub beacon_track: Vec<TrackSample>,
    pub relay_tracks: BTreeMap<String, Vec<TrackSample>>,
    pub diagnostics: DiagnosticSummary,
}

impl SimulationResult {
    pub fn connected_steps(&self) -> usize {
        self.active_links
            .iter()
            .filter(|links| !links.relay_ids.is_empty())
            .count()
    }
}
