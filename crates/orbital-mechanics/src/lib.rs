//! Orbital Mechanics Library
//!
//! Element-set synthesis, SGP4 propagation, coordinate transforms and
//! antenna-cone geometry for the Beacon / relay visibility simulator.
//!
//! - [`elements`]: orbit intent → classical elements → TLE record
//! - [`propagation`]: SGP4/SDP4 adapter with typed per-step failures
//! - [`transforms`]: ECI → geodetic (GMST rotation, WGS-84 ellipsoid)
//! - [`geometry`]: nadir vectors, communication cones, horizon antennas
//! - [`solar`]: low-order Sun ephemeris used for node placement
//! - [`walker`]: Walker constellation layout

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod elements;
pub mod geometry;
pub mod propagation;
pub mod solar;
pub mod transforms;
pub mod walker;

pub use elements::{synthesize_element_set, ElementSet, OrbitIntent};
pub use geometry::{is_point_in_cone, CommunicationCone};
pub use propagation::{
    propagate, PropagationFailure, PropagationFailureKind, Propagator, Sgp4Orbit,
};
pub use transforms::to_geodetic;

/// Earth equatorial radius (WGS-84), km
pub const EARTH_RADIUS_KM: f64 = 6378.137;
/// Earth gravitational parameter, km³/s²
pub const MU_EARTH: f64 = 398_600.4418;
/// Second zonal harmonic
pub const J2: f64 = 0.001_082_63;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid orbit parameters: {0}")]
    InvalidOrbitParameters(String),
    #[error("Element synthesis failed: {0}")]
    ElementSynthesis(String),
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Element set rejected by propagator: {0}")]
    UnusableElements(String),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Position and velocity in the inertial (TEME) frame at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InertialState {
    pub timestamp: DateTime<Utc>,
    /// km
    pub position_eci: Vector3<f64>,
    /// km/s
    pub velocity_eci: Vector3<f64>,
}

impl InertialState {
    pub fn is_finite(&self) -> bool {
        self.position_eci.iter().all(|c| c.is_finite())
            && self.velocity_eci.iter().all(|c| c.is_finite())
    }

    pub fn geodetic(&self) -> GeodeticPosition {
        to_geodetic(&self.position_eci, self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// Wrap an angle in degrees into [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
