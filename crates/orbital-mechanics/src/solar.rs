//! Low-order Sun ephemeris
//!
//! Mean longitude plus equation-of-center correction, projected from the
//! ecliptic onto the equator with the mean obliquity. Good to ~0.01° over a
//! few decades around J2000, which is plenty for placing an orbit node.

use chrono::{DateTime, Utc};

use crate::normalize_degrees;

const JD_UNIX_EPOCH: f64 = 2_440_587.5;
const JD_J2000: f64 = 2_451_545.0;

/// Julian date of a UTC instant
pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    seconds / crate::SECONDS_PER_DAY + JD_UNIX_EPOCH
}

/// Days since J2000.0
pub fn days_since_j2000(time: DateTime<Utc>) -> f64 {
    julian_date(time) - JD_J2000
}

/// Apparent ecliptic longitude of the Sun in degrees, [0, 360)
pub fn sun_ecliptic_longitude_deg(time: DateTime<Utc>) -> f64 {
    let n = days_since_j2000(time);
    let mean_longitude = normalize_degrees(280.460 + 0.985_647_4 * n);
    let mean_anomaly = normalize_degrees(357.528 + 0.985_600_3 * n).to_radians();

    normalize_degrees(
        mean_longitude + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin(),
    )
}

/// Mean obliquity of the ecliptic in degrees
pub fn mean_obliquity_deg(time: DateTime<Utc>) -> f64 {
    23.439 - 0.000_000_4 * days_since_j2000(time)
}

/// Right ascension of the Sun in degrees, [0, 360)
pub fn sun_right_ascension_deg(time: DateTime<Utc>) -> f64 {
    let lambda = sun_ecliptic_longitude_deg(time).to_radians();
    let epsilon = mean_obliquity_deg(time).to_radians();

    normalize_degrees((epsilon.cos() * lambda.sin()).atan2(lambda.cos()).to_degrees())
}
