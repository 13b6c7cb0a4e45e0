//! Diagnostic channel
//!
//! The step loop never writes logs itself. Everything worth observing is
//! handed to a [`DiagnosticSink`] chosen by the caller.

use chrono::{DateTime, Utc};
use orbital_mechanics::PropagationFailure;
use tracing::{debug, warn};

use crate::events::BlackoutPeriod;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The whole step was dropped
    BeaconPropagationFailed {
        step_index: usize,
        failure: PropagationFailure,
    },
    /// Only this relay's sample was dropped
    RelayPropagationFailed {
        step_index: usize,
        failure: PropagationFailure,
    },
    /// Relay element set refused before the loop started
    RelayRejected { relay_id: String, reason: String },
    HandshakeDetected {
        step_index: usize,
        relay_id: String,
        timestamp: DateTime<Utc>,
    },
    BlackoutOpened {
        step_index: usize,
        timestamp: DateTime<Utc>,
    },
    BlackoutClosed { period: BlackoutPeriod },
}

impl Diagnostic {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Diagnostic::BeaconPropagationFailed { .. }
                | Diagnostic::RelayPropagationFailed { .. }
                | Diagnostic::RelayRejected { .. }
        )
    }
}

pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn record(&mut self, diagnostic: Diagnostic) {
        (**self).record(diagnostic)
    }
}

/// Forwards diagnostics to `tracing`: failures at warn, transitions at debug
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::BeaconPropagationFailed {
                step_index,
                failure,
            } => {
                warn!("Step {} skipped, Beacon propagation failed: {}", step_index, failure);
            }
            Diagnostic::RelayPropagationFailed {
                step_index,
                failure,
            } => {
                warn!("Step {}: relay sample skipped: {}", step_index, failure);
            }
            Diagnostic::RelayRejected { relay_id, reason } => {
                warn!("Relay {} rejected: {}", relay_id, reason);
            }
            Diagnostic::HandshakeDetected {
                step_index,
                relay_id,
                timestamp,
            } => {
                debug!("🤝 Handshake with {} at step {} ({})", relay_id, step_index, timestamp);
            }
            Diagnostic::BlackoutOpened {
                step_index,
                timestamp,
            } => {
                debug!("Blackout opened at step {} ({})", step_index, timestamp);
            }
            Diagnostic::BlackoutClosed { period } => {
                debug!(
                    "Blackout closed: {} → {} ({:.0}s)",
                    period.start_time, period.end_time, period.duration_seconds
                );
            }
        }
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_failure())
    }

    pub fn handshake_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::HandshakeDetected { .. }))
            .count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&mut self, _diagnostic: Diagnostic) {}
}
