//! Propagation Adapter
//!
//! Hides the SGP4/SDP4 propagator behind a small trait. A failed or
//! non-finite prediction is always reported as a typed
//! [`PropagationFailure`]; zero or stale values are never substituted.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use thiserror::Error;

use crate::{ElementSet, InertialState, OrbitalError, Result};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationFailureKind {
    #[error("propagator could not be initialized: {0}")]
    Initialization(String),
    #[error("propagator error: {0}")]
    Sgp4(String),
    #[error("non-finite state vector")]
    NonFinite,
}

/// One body failed to propagate at one instant
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{body} at {timestamp}: {kind}")]
pub struct PropagationFailure {
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PropagationFailureKind,
}

/// Something that can report a body's inertial state at an instant
pub trait Propagator {
    /// Stable identifier of the propagated body
    fn id(&self) -> &str;

    fn propagate(&self, at: DateTime<Utc>) -> std::result::Result<InertialState, PropagationFailure>;
}

/// An element set parsed and initialized once, reused for every step
pub struct Sgp4Orbit {
    id: String,
    epoch: DateTime<Utc>,
    constants: sgp4::Constants,
}

impl Sgp4Orbit {
    pub fn new(set: &ElementSet) -> Result<Self> {
        Self::with_id(set.name.clone(), set)
    }

    pub fn with_id(id: impl Into<String>, set: &ElementSet) -> Result<Self> {
        let elements = set.to_sgp4_elements()?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::UnusableElements(format!("{:?}", e)))?;

        Ok(Self {
            id: id.into(),
            epoch: DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc),
            constants,
        })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    fn failure(&self, at: DateTime<Utc>, kind: PropagationFailureKind) -> PropagationFailure {
        PropagationFailure {
            body: self.id.clone(),
            timestamp: at,
            kind,
        }
    }
}

impl Propagator for Sgp4Orbit {
    fn id(&self) -> &str {
        &self.id
    }

    fn propagate(&self, at: DateTime<Utc>) -> std::result::Result<InertialState, PropagationFailure> {
        let minutes_since_epoch =
            at.signed_duration_since(self.epoch).num_milliseconds() as f64 / 60_000.0;

        let prediction = self
            .constants
            .propagate(minutes_since_epoch)
            .map_err(|e| self.failure(at, PropagationFailureKind::Sgp4(format!("{:?}", e))))?;

        let state = InertialState {
            timestamp: at,
            position_eci: Vector3::from(prediction.position),
            velocity_eci: Vector3::from(prediction.velocity),
        };

        if !state.is_finite() {
            return Err(self.failure(at, PropagationFailureKind::NonFinite));
        }

        Ok(state)
    }
}

/// One-shot propagation of an element set
pub fn propagate(
    set: &ElementSet,
    at: DateTime<Utc>,
) -> std::result::Result<InertialState, PropagationFailure> {
    let orbit = Sgp4Orbit::new(set).map_err(|e| PropagationFailure {
        body: set.name.clone(),
        timestamp: at,
        kind: PropagationFailureKind::Initialization(e.to_string()),
    })?;
    orbit.propagate(at)
}
