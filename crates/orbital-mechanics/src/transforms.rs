//! Inertial → geodetic conversion for output records

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use std::f64::consts::PI;

use crate::{solar, GeodeticPosition, EARTH_RADIUS_KM};

const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;

/// Greenwich Mean Sidereal Time (IAU-82), radians in [0, 2π)
pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
    // Julian centuries from J2000.0
    let t = solar::days_since_j2000(time) / 36525.0;

    // GMST in seconds
    let gmst_sec = 67310.54841
        + (876600.0 * 3600.0 + 8640184.812866) * t
        + 0.093104 * t * t
        - 6.2e-6 * t * t * t;

    ((gmst_sec / 240.0) * (PI / 180.0)).rem_euclid(2.0 * PI)
}

/// Convert an inertial position (km) to geodetic latitude/longitude/altitude
/// on the WGS-84 ellipsoid. Longitude is wrapped to (-180°, 180°].
pub fn to_geodetic(position_eci: &Vector3<f64>, time: DateTime<Utc>) -> GeodeticPosition {
    let (x, y, z) = (position_eci.x, position_eci.y, position_eci.z);
    let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);

    let r = (x * x + y * y).sqrt();
    let longitude = wrap_pi(y.atan2(x) - gmst_rad(time));

    let mut latitude = z.atan2(r);
    let mut c = 1.0;
    for _ in 0..10 {
        let phi = latitude;
        c = 1.0 / (1.0 - e2 * phi.sin() * phi.sin()).sqrt();
        latitude = (z + EARTH_RADIUS_KM * c * e2 * phi.sin()).atan2(r);
        if (latitude - phi).abs() < 1e-12 {
            break;
        }
    }

    // Near the poles r/cos(lat) is ill-conditioned; use the z form instead
    let altitude_km = if latitude.cos().abs() > 1e-6 {
        r / latitude.cos() - EARTH_RADIUS_KM * c
    } else {
        z.abs() - EARTH_RADIUS_KM * (1.0 - EARTH_FLATTENING)
    };

    GeodeticPosition {
        latitude_deg: latitude.to_degrees(),
        longitude_deg: longitude.to_degrees(),
        altitude_km,
    }
}

/// Wrap to (-π, π]
fn wrap_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}
