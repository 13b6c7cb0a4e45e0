//! Orbit Element Synthesizer
//!
//! Turns a Beacon [`OrbitIntent`] (altitude plus either a sun-synchronous
//! local solar time or an explicit inclination/node) into a complete
//! [`ElementSet`] at a given epoch, encoded as a two-line element record the
//! SGP4 propagator accepts.
//!
//! # Orbital Mechanics Reference
//!
//! ## Mean motion
//! `n = sqrt(μ / a³)` rad/s, `a = R_e + h`, reported in rev/day.
//!
//! ## Sun-synchronous inclination
//! J2 secular nodal regression:
//!
//! ```text
//! dΩ/dt = -3/2 · n · J2 · (R_e/a)² · cos(i) / (1-e²)²
//! ```
//!
//! Setting `dΩ/dt` to the mean solar rate (360° per tropical year) and
//! solving for `cos(i)` gives a retrograde inclination (~98° in LEO).
//!
//! ## Node placement
//! The ascending node sits `15°/h` of hour angle away from the Sun's right
//! ascension, measured from the requested local time at the descending node
//! (the two nodes are 180° apart).

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::{normalize_degrees, solar, OrbitalError, Result, EARTH_RADIUS_KM, J2, MU_EARTH};

/// Near-circular eccentricity given to every synthesized orbit
pub const SYNTHESIZED_ECCENTRICITY: f64 = 1e-4;

/// Catalog number carried by the synthesized Beacon record
pub const BEACON_CATALOG_NUMBER: u32 = 90_001;
pub const BEACON_NAME: &str = "BEACON";

const TROPICAL_YEAR_DAYS: f64 = 365.242_19;

/// Mean solar nodal regression rate, rad/s
pub fn solar_regression_rate_rad_s() -> f64 {
    2.0 * PI / (TROPICAL_YEAR_DAYS * crate::SECONDS_PER_DAY)
}

/// User intent for the Beacon orbit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrbitIntent {
    /// Sun-synchronous, pinned by the local solar time at the descending node
    #[serde(rename_all = "camelCase")]
    SunSynchronous {
        altitude_km: f64,
        #[serde(alias = "localSolarTimeHoursAtDescendingNode")]
        local_solar_time_hours: f64,
    },
    /// Any other circular orbit with explicit geometry
    #[serde(rename_all = "camelCase")]
    NonPolar {
        altitude_km: f64,
        inclination_deg: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raan_deg: Option<f64>,
    },
}

impl OrbitIntent {
    pub fn altitude_km(&self) -> f64 {
        match *self {
            Self::SunSynchronous { altitude_km, .. } | Self::NonPolar { altitude_km, .. } => {
                altitude_km
            }
        }
    }

    /// Domain checks, run before any computation
    pub fn validate(&self) -> Result<()> {
        let altitude_km = self.altitude_km();
        if !altitude_km.is_finite() || altitude_km <= 0.0 {
            return Err(OrbitalError::InvalidOrbitParameters(format!(
                "altitude must be > 0 km, got {}",
                altitude_km
            )));
        }

        match *self {
            Self::SunSynchronous {
                local_solar_time_hours,
                ..
            } => {
                if !(0.0..24.0).contains(&local_solar_time_hours) {
                    return Err(OrbitalError::InvalidOrbitParameters(format!(
                        "local solar time must be in [0, 24) h, got {}",
                        local_solar_time_hours
                    )));
                }
            }
            Self::NonPolar {
                inclination_deg,
                raan_deg,
                ..
            } => {
                if !(0.0..=180.0).contains(&inclination_deg) {
                    return Err(OrbitalError::InvalidOrbitParameters(format!(
                        "inclination must be in [0, 180] deg, got {}",
                        inclination_deg
                    )));
                }
                if let Some(raan) = raan_deg {
                    if !(0.0..360.0).contains(&raan) {
                        return Err(OrbitalError::InvalidOrbitParameters(format!(
                            "RAAN must be in [0, 360) deg, got {}",
                            raan
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Classical elements for one body at one epoch, plus the TLE record they
/// encode. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSet {
    pub name: String,
    pub catalog_number: u32,
    pub epoch: DateTime<Utc>,
    /// rev/day
    pub mean_motion: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    /// First derivative of mean motion / 2, rev/day²
    pub mean_motion_dot: f64,
    /// B* drag term, 1/earth radii
    pub bstar: f64,
    pub line1: String,
    pub line2: String,
}

/// Orbit geometry to be encoded, all angles in degrees
#[derive(Debug, Clone, Copy)]
pub struct OrbitGeometry {
    pub mean_motion: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
}

impl ElementSet {
    /// Build from a TLE record; `name` is the optional title line.
    pub fn from_tle(name: Option<&str>, line1: &str, line2: &str) -> Result<Self> {
        let line1 = line1.trim_end();
        let line2 = line2.trim_end();
        let elements = parse_tle(line1, line2)?;

        let catalog_number = u32::try_from(elements.norad_id)
            .map_err(|_| OrbitalError::InvalidTle(format!("catalog number {}", elements.norad_id)))?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| catalog_number.to_string());

        Ok(Self {
            name,
            catalog_number,
            epoch: DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc),
            mean_motion: elements.mean_motion,
            eccentricity: elements.eccentricity,
            inclination_deg: elements.inclination,
            raan_deg: elements.right_ascension,
            arg_perigee_deg: elements.argument_of_perigee,
            mean_anomaly_deg: elements.mean_anomaly,
            mean_motion_dot: elements.mean_motion_dot,
            bstar: elements.drag_term,
            line1: line1.to_string(),
            line2: line2.to_string(),
        })
    }

    /// Encode a drag-free orbit as a TLE record and validate it round-trips
    /// through the propagator's parser.
    pub fn encode(
        name: &str,
        catalog_number: u32,
        epoch: DateTime<Utc>,
        orbit: OrbitGeometry,
    ) -> Result<Self> {
        let (line1, line2) = format_tle_lines(catalog_number, &orbit, epoch)?;

        // The parser is the authority on whether the record is well formed
        parse_tle(&line1, &line2).map_err(|e| {
            OrbitalError::ElementSynthesis(format!("generated record rejected: {}", e))
        })?;

        Ok(Self {
            name: name.to_string(),
            catalog_number,
            epoch,
            mean_motion: orbit.mean_motion,
            eccentricity: orbit.eccentricity,
            inclination_deg: orbit.inclination_deg,
            raan_deg: orbit.raan_deg,
            arg_perigee_deg: orbit.arg_perigee_deg,
            mean_anomaly_deg: orbit.mean_anomaly_deg,
            mean_motion_dot: 0.0,
            bstar: 0.0,
            line1,
            line2,
        })
    }

    pub fn to_sgp4_elements(&self) -> Result<sgp4::Elements> {
        parse_tle(&self.line1, &self.line2)
    }

    /// Semi-major axis from mean motion, km
    pub fn semi_major_axis_km(&self) -> f64 {
        let n_rad_s = self.mean_motion * 2.0 * PI / crate::SECONDS_PER_DAY;
        (MU_EARTH / (n_rad_s * n_rad_s)).cbrt()
    }
}

fn parse_tle(line1: &str, line2: &str) -> Result<sgp4::Elements> {
    sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))
}

/// Mean motion from semi-major axis: rad/s → rev/day
pub fn mean_motion_rev_per_day(semi_major_axis_km: f64) -> f64 {
    let n_rad_s = (MU_EARTH / semi_major_axis_km.powi(3)).sqrt();
    n_rad_s * crate::SECONDS_PER_DAY / (2.0 * PI)
}

/// T = 2π·sqrt(a³/μ), seconds
pub fn period_seconds(semi_major_axis_km: f64) -> f64 {
    2.0 * PI * (semi_major_axis_km.powi(3) / MU_EARTH).sqrt()
}

/// J2 secular drift of the ascending node, degrees per day
pub fn nodal_regression_deg_per_day(semi_major_axis_km: f64, eccentricity: f64, inclination_deg: f64) -> f64 {
    let n_rad_s = (MU_EARTH / semi_major_axis_km.powi(3)).sqrt();
    let drift_rad_s = -1.5 * n_rad_s * J2 * (EARTH_RADIUS_KM / semi_major_axis_km).powi(2)
        * inclination_deg.to_radians().cos()
        / (1.0 - eccentricity * eccentricity).powi(2);
    drift_rad_s.to_degrees() * crate::SECONDS_PER_DAY
}

/// Inclination whose nodal regression tracks the mean Sun.
///
/// Above roughly 6000 km no inclination is fast enough; `cos(i)` is then
/// clamped to -1 (retrograde equatorial) and a warning is logged.
pub fn sun_synchronous_inclination_deg(altitude_km: f64, eccentricity: f64) -> Result<f64> {
    let a = EARTH_RADIUS_KM + altitude_km;
    let n_rad_s = (MU_EARTH / a.powi(3)).sqrt();
    let per_cos_i =
        1.5 * n_rad_s * J2 * (EARTH_RADIUS_KM / a).powi(2) / (1.0 - eccentricity * eccentricity).powi(2);
    let cos_i = -solar_regression_rate_rad_s() / per_cos_i;

    if !cos_i.is_finite() {
        return Err(OrbitalError::ElementSynthesis(format!(
            "no sun-synchronous solution at {} km",
            altitude_km
        )));
    }
    if cos_i.abs() > 1.0 {
        warn!(
            altitude_km,
            cos_i, "sun-synchronous condition unreachable; clamping inclination to 180°"
        );
    }

    Ok(cos_i.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Ascending node for a given local solar time at the descending node
pub fn sun_synchronous_raan_deg(epoch: DateTime<Utc>, local_solar_time_hours: f64) -> f64 {
    let sun_ra = solar::sun_right_ascension_deg(epoch);
    // Descending node hour angle from the Sun, then across to the ascending node
    normalize_degrees(sun_ra + (local_solar_time_hours - 12.0) * 15.0 + 180.0)
}

/// Synthesize the Beacon element set for `intent` at `epoch`
pub fn synthesize_element_set(intent: &OrbitIntent, epoch: DateTime<Utc>) -> Result<ElementSet> {
    intent.validate()?;

    let semi_major_axis = EARTH_RADIUS_KM + intent.altitude_km();
    let mean_motion = mean_motion_rev_per_day(semi_major_axis);

    let (inclination_deg, raan_deg) = match *intent {
        OrbitIntent::SunSynchronous {
            altitude_km,
            local_solar_time_hours,
        } => (
            sun_synchronous_inclination_deg(altitude_km, SYNTHESIZED_ECCENTRICITY)?,
            sun_synchronous_raan_deg(epoch, local_solar_time_hours),
        ),
        OrbitIntent::NonPolar {
            inclination_deg,
            raan_deg,
            ..
        } => (inclination_deg, raan_deg.unwrap_or(0.0)),
    };

    debug!(
        mean_motion,
        inclination_deg, raan_deg, "synthesized Beacon orbit"
    );

    ElementSet::encode(
        BEACON_NAME,
        BEACON_CATALOG_NUMBER,
        epoch,
        OrbitGeometry {
            mean_motion,
            eccentricity: SYNTHESIZED_ECCENTRICITY,
            inclination_deg,
            raan_deg,
            arg_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
        },
    )
}

/// Fractional day of year (1-based) at UTC
fn fractional_day_of_year(epoch: DateTime<Utc>) -> f64 {
    let seconds_of_day = f64::from(epoch.num_seconds_from_midnight())
        + f64::from(epoch.nanosecond() % 1_000_000_000) * 1e-9;
    f64::from(epoch.ordinal()) + seconds_of_day / crate::SECONDS_PER_DAY
}

/// Generate TLE line 1 and line 2
fn format_tle_lines(
    catalog_number: u32,
    orbit: &OrbitGeometry,
    epoch: DateTime<Utc>,
) -> Result<(String, String)> {
    if catalog_number > 99_999 {
        return Err(OrbitalError::ElementSynthesis(format!(
            "catalog number {} does not fit five digits",
            catalog_number
        )));
    }
    if !(orbit.mean_motion > 0.0 && orbit.mean_motion < 100.0) {
        return Err(OrbitalError::ElementSynthesis(format!(
            "mean motion {:.4} rev/day is not representable",
            orbit.mean_motion
        )));
    }
    if !(0.0..1.0).contains(&orbit.eccentricity) {
        return Err(OrbitalError::ElementSynthesis(format!(
            "eccentricity {} is not representable",
            orbit.eccentricity
        )));
    }

    // Epoch: YYDDD.DDDDDDDD
    let year = epoch.year().rem_euclid(100);
    let day_of_year = fractional_day_of_year(epoch);

    let line1_base = format!(
        "1 {:05}U {:02}001A   {:02}{:012.8}  .00000000  00000-0  00000-0 0  999",
        catalog_number, year, year, day_of_year
    );
    let line1 = format!("{}{}", line1_base, checksum_digit(&line1_base));

    // Eccentricity carries an implied leading decimal point
    let ecc_str = format!("{:07}", (orbit.eccentricity * 10_000_000.0).round() as u32);

    let line2_base = format!(
        "2 {:05} {:8.4} {:8.4} {} {:8.4} {:8.4} {:11.8}{:05}",
        catalog_number,
        orbit.inclination_deg,
        normalize_degrees(orbit.raan_deg),
        ecc_str,
        normalize_degrees(orbit.arg_perigee_deg),
        normalize_degrees(orbit.mean_anomaly_deg),
        orbit.mean_motion,
        0 // revolution number at epoch
    );
    let line2 = format!("{}{}", line2_base, checksum_digit(&line2_base));

    if line1.len() != 69 || line2.len() != 69 {
        return Err(OrbitalError::ElementSynthesis(format!(
            "record lines have lengths {}/{}, expected 69",
            line1.len(),
            line2.len()
        )));
    }

    Ok((line1, line2))
}

/// TLE modulo-10 checksum: digits count their value, '-' counts 1
fn checksum_digit(line: &str) -> u32 {
    let sum: u32 = line
        .chars()
        .map(|c| match c {
            '0'..='9' => c.to_digit(10).unwrap_or(0),
            '-' => 1,
            _ => 0,
        })
        .sum();
    sum % 10
}
