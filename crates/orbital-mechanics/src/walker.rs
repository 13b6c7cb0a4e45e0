//! Walker constellation layout
//!
//! Notation T/P/F:
//! - T = total satellites
//! - P = number of orbital planes
//! - F = phasing factor (0 to P-1)
//!
//! A Walker *delta* spreads its planes over 360° of RAAN; a Walker *star*
//! (Iridium-style polar constellation) spreads them over 180° so that
//! adjacent ascending and descending sides don't overlap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::elements::{mean_motion_rev_per_day, OrbitGeometry, SYNTHESIZED_ECCENTRICITY};
use crate::{normalize_degrees, ElementSet, Result, EARTH_RADIUS_KM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkerPattern {
    Delta,
    Star,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConstellation {
    pub total_satellites: u32,
    pub planes: u32,
    pub phasing: u32,
    pub altitude_km: f64,
    pub inclination_deg: f64,
    pub pattern: WalkerPattern,
}

/// Position of one satellite in the pattern, angles in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkerSlot {
    pub plane: u32,
    pub slot: u32,
    pub raan_deg: f64,
    pub mean_anomaly_deg: f64,
}

impl WalkerConstellation {
    /// Iridium: 66 active satellites, 6 polar planes of 11, 780 km
    pub fn iridium() -> Self {
        WalkerConstellation {
            total_satellites: 66,
            planes: 6,
            phasing: 2,
            altitude_km: 780.0,
            inclination_deg: 86.4,
            pattern: WalkerPattern::Star,
        }
    }

    pub fn satellites_per_plane(&self) -> u32 {
        self.total_satellites / self.planes
    }

    pub fn plane_spacing_deg(&self) -> f64 {
        let spread = match self.pattern {
            WalkerPattern::Delta => 360.0,
            WalkerPattern::Star => 180.0,
        };
        spread / self.planes as f64
    }

    pub fn in_plane_spacing_deg(&self) -> f64 {
        360.0 / self.satellites_per_plane() as f64
    }

    /// Mean anomaly offset between adjacent planes: 360° · F / T
    pub fn phase_offset_deg(&self) -> f64 {
        360.0 * self.phasing as f64 / self.total_satellites as f64
    }

    pub fn slots(&self) -> Vec<WalkerSlot> {
        let per_plane = self.satellites_per_plane();
        (0..self.planes)
            .flat_map(|plane| {
                (0..per_plane).map(move |slot| WalkerSlot {
                    plane,
                    slot,
                    raan_deg: normalize_degrees(self.plane_spacing_deg() * plane as f64),
                    mean_anomaly_deg: normalize_degrees(
                        self.in_plane_spacing_deg() * slot as f64
                            + self.phase_offset_deg() * plane as f64,
                    ),
                })
            })
            .collect()
    }

    /// Element sets for every slot at `epoch`. Names are
    /// `<prefix>-P<plane>-S<slot>` (1-based), catalog numbers count up
    /// from `first_catalog_number`.
    pub fn element_sets(
        &self,
        epoch: DateTime<Utc>,
        prefix: &str,
        first_catalog_number: u32,
    ) -> Result<Vec<ElementSet>> {
        let mean_motion = mean_motion_rev_per_day(EARTH_RADIUS_KM + self.altitude_km);

        self.slots()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                ElementSet::encode(
                    &format!("{}-P{}-S{}", prefix, slot.plane + 1, slot.slot + 1),
                    first_catalog_number + index as u32,
                    epoch,
                    OrbitGeometry {
                        mean_motion,
                        eccentricity: SYNTHESIZED_ECCENTRICITY,
                        inclination_deg: self.inclination_deg,
                        raan_deg: slot.raan_deg,
                        arg_perigee_deg: 0.0,
                        mean_anomaly_deg: slot.mean_anomaly_deg,
                    },
                )
            })
            .collect()
    }
}
