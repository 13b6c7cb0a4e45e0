//! Handshake and blackout transitions
//!
//! Modeled as AOS/LOS edges over the per-step set of connected relays:
//! a relay entering the set is a handshake, the set becoming empty opens a
//! blackout, and the set becoming non-empty again closes it.

use chrono::{DateTime, Utc};
use orbital_mechanics::GeodeticPosition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Relays illuminating the Beacon at one processed step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    relays: BTreeSet<String>,
}

impl ConnectionState {
    pub fn new(relays: BTreeSet<String>) -> Self {
        Self { relays }
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    pub fn relay_ids(&self) -> &BTreeSet<String> {
        &self.relays
    }

    /// Relays present here but absent from `previous` (rising edges)
    pub fn newly_connected(&self, previous: &ConnectionState) -> Vec<&str> {
        self.relays
            .iter()
            .filter(|id| !previous.relays.contains(*id))
            .map(String::as_str)
            .collect()
    }
}

impl FromIterator<String> for ConnectionState {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub timestamp: DateTime<Utc>,
    pub relay_satellite_id: String,
    pub beacon_geodetic_position: GeodeticPosition,
    pub relay_geodetic_position: GeodeticPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutPeriod {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl BlackoutPeriod {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        let duration_seconds =
            end_time.signed_duration_since(start_time).num_milliseconds() as f64 / 1000.0;
        Self {
            start_time,
            end_time,
            duration_seconds,
        }
    }
}

/// What the tracker did with one observation
#[derive(Debug, Clone, PartialEq)]
pub enum BlackoutTransition {
    Opened(DateTime<Utc>),
    Closed(BlackoutPeriod),
}

/// Open/close state machine for blackout intervals
#[derive(Debug, Clone, Default)]
pub struct BlackoutTracker {
    open_since: Option<DateTime<Utc>>,
}

impl BlackoutTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open_since.is_some()
    }

    pub fn observe(&mut self, at: DateTime<Utc>, connected: bool) -> Option<BlackoutTransition> {
        match (self.open_since, connected) {
            (None, false) => {
                self.open_since = Some(at);
                Some(BlackoutTransition::Opened(at))
            }
            (Some(start), true) => {
                self.open_since = None;
                Some(BlackoutTransition::Closed(BlackoutPeriod::new(start, at)))
            }
            _ => None,
        }
    }

    /// Close a blackout still open when the timeline ends
    pub fn finish(&mut self, end: DateTime<Utc>) -> Option<BlackoutPeriod> {
        self.open_since
            .take()
            .map(|start| BlackoutPeriod::new(start, end.max(start)))
    }
}
