//! Geometry Engine
//!
//! Vector helpers, nadir pointing and the cone-containment test that decides
//! whether a relay's antenna footprint covers the Beacon.
//!
//! Earth is taken to be centered on the inertial-frame origin.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f64>;

/// Below this magnitude a vector has no usable direction
pub const DIRECTION_EPSILON: f64 = 1e-12;

/// Horizontal speed below which the velocity gives no usable heading, km/s
pub const HORIZONTAL_SPEED_EPSILON: f64 = 1e-9;

pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a.dot(b)
}

pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    a.cross(b)
}

pub fn magnitude(v: &Vec3) -> f64 {
    v.norm()
}

pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    a + b
}

pub fn subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    a - b
}

pub fn scale(v: &Vec3, k: f64) -> Vec3 {
    v * k
}

/// Unit vector along `v`, or the zero vector when `v` has no direction.
///
/// Callers must treat a zero result as "undefined direction".
pub fn safe_normalize(v: &Vec3) -> Vec3 {
    let m = v.norm();
    if m < DIRECTION_EPSILON || !m.is_finite() {
        Vec3::zeros()
    } else {
        v / m
    }
}

/// Direction from a satellite at `position` toward Earth's center
pub fn nadir(position: &Vec3) -> Vec3 {
    safe_normalize(&-position)
}

/// Local zenith (radial outward) at `position`
pub fn zenith(position: &Vec3) -> Vec3 {
    safe_normalize(position)
}

/// Angular containment test. `axis` is expected to be a unit vector.
///
/// The cosine is clamped into [-1, 1] before `acos`; rounding can push a dot
/// product of unit vectors slightly outside and an unclamped `acos` would
/// return NaN.
pub fn is_point_in_cone(point: &Vec3, apex: &Vec3, axis: &Vec3, half_angle_rad: f64) -> bool {
    let to_point = safe_normalize(&(point - apex));
    if to_point == Vec3::zeros() || *axis == Vec3::zeros() {
        return false;
    }
    let cos_angle = axis.dot(&to_point).clamp(-1.0, 1.0);
    cos_angle.acos() <= half_angle_rad
}

/// An antenna footprint: apex at the antenna, opening along `axis`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationCone {
    pub apex: Vec3,
    pub axis: Vec3,
    pub half_angle_rad: f64,
    pub owner_id: String,
}

impl CommunicationCone {
    pub fn new(owner_id: impl Into<String>, apex: Vec3, axis: Vec3, fov_deg: f64) -> Self {
        Self {
            apex,
            axis: safe_normalize(&axis),
            half_angle_rad: (fov_deg / 2.0).to_radians(),
            owner_id: owner_id.into(),
        }
    }

    /// Nadir-pointing cone for a satellite at `position` with full-angle `fov_deg`
    pub fn nadir(owner_id: impl Into<String>, position: Vec3, fov_deg: f64) -> Self {
        Self::new(owner_id, position, nadir(&position), fov_deg)
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        is_point_in_cone(point, &self.apex, &self.axis, self.half_angle_rad)
    }
}

/// Horizontal heading for a body at `position` moving with `velocity`.
///
/// The velocity is projected onto the local horizontal plane. When that
/// projection vanishes (purely radial motion) an arbitrary horizontal
/// direction is built from the zenith and a global axis that is not
/// parallel to it.
pub fn horizontal_heading(position: &Vec3, velocity: &Vec3) -> Vec3 {
    let up = zenith(position);
    let horizontal = velocity - up * velocity.dot(&up);

    if horizontal.norm() >= HORIZONTAL_SPEED_EPSILON {
        return safe_normalize(&horizontal);
    }

    let reference = if up.z.abs() < 0.9 {
        Vec3::z()
    } else {
        Vec3::x()
    };
    safe_normalize(&up.cross(&reference))
}

/// The two opposite-facing, horizon-aligned antenna axes of the Beacon
pub fn horizon_antenna_axes(position: &Vec3, velocity: &Vec3) -> (Vec3, Vec3) {
    let forward = horizontal_heading(position, velocity);
    (forward, -forward)
}

/// Horizon-aligned antenna cones (forward, aft) for the Beacon
pub fn horizon_cones(
    owner_id: &str,
    position: Vec3,
    velocity: &Vec3,
    fov_deg: f64,
) -> [CommunicationCone; 2] {
    let (forward, aft) = horizon_antenna_axes(&position, velocity);
    [
        CommunicationCone::new(owner_id, position, forward, fov_deg),
        CommunicationCone::new(owner_id, position, aft, fov_deg),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_zero_vector() {
        let n = safe_normalize(&Vec3::zeros());
        assert_eq!(n, Vec3::zeros());
        assert!(n.iter().all(|c| c.is_finite()));

        let tiny = safe_normalize(&Vec3::new(1e-15, 0.0, 0.0));
        assert_eq!(tiny, Vec3::zeros());
    }

    #[test]
    fn test_vector_primitives() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-2.0, 0.5, 4.0);
        assert_eq!(dot(&a, &b), 11.0);
        assert_eq!(cross(&Vec3::x(), &Vec3::y()), Vec3::z());
        assert_eq!(magnitude(&Vec3::new(3.0, 4.0, 0.0)), 5.0);
        assert_eq!(add(&a, &b), Vec3::new(-1.0, 2.5, 7.0));
        assert_eq!(subtract(&a, &b), Vec3::new(3.0, 1.5, -1.0));
        assert_eq!(scale(&a, 2.0), Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_nadir_points_at_origin() {
        let n = nadir(&Vec3::new(7000.0, 0.0, 0.0));
        assert_eq!(n, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_point_below_relay_is_covered() {
        let relay = Vec3::new(7158.0, 0.0, 0.0);
        let cone = CommunicationCone::nadir("R1", relay, 10.0);
        assert!((cone.half_angle_rad - 5f64.to_radians()).abs() < 1e-15);

        // Straight below
        assert!(cone.contains(&Vec3::new(7078.0, 0.0, 0.0)));
        // 4° off nadir at 80 km below
        let off = 80.0 * 4f64.to_radians().tan();
        assert!(cone.contains(&Vec3::new(7078.0, off, 0.0)));
        // 6° off nadir
        let off = 80.0 * 6f64.to_radians().tan();
        assert!(!cone.contains(&Vec3::new(7078.0, off, 0.0)));
        // Above the relay
        assert!(!cone.contains(&Vec3::new(7300.0, 0.0, 0.0)));
    }

    #[test]
    fn test_clamped_cosine_never_nans() {
        // Parallel vectors whose normalized dot product can round above 1.0
        let apex = Vec3::new(0.1, 0.2, 0.3);
        let axis = safe_normalize(&Vec3::new(0.3, 0.7, 0.1));
        let point = apex + axis * 12345.678;
        assert!(is_point_in_cone(&point, &apex, &axis, 1e-6));
    }

    #[test]
    fn test_degenerate_inputs_are_not_contained() {
        let apex = Vec3::new(1.0, 1.0, 1.0);
        // Target at the apex itself
        assert!(!is_point_in_cone(&apex, &apex, &Vec3::x(), 1.0));
        // Undefined axis
        let cone = CommunicationCone::nadir("R0", Vec3::zeros(), 60.0);
        assert!(!cone.contains(&Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_horizon_axes_follow_velocity() {
        let pos = Vec3::new(7078.0, 0.0, 0.0);
        // Velocity with a radial component that must be removed
        let vel = Vec3::new(0.5, 7.5, 0.0);
        let (fwd, aft) = horizon_antenna_axes(&pos, &vel);
        assert!((fwd - Vec3::y()).norm() < 1e-12);
        assert!((aft + Vec3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_horizon_axes_radial_motion_fallback() {
        for pos in [
            Vec3::new(7078.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 7078.0),
            Vec3::new(0.0, 0.0, -7078.0),
        ] {
            let vel = zenith(&pos) * 7.5;
            let (fwd, aft) = horizon_antenna_axes(&pos, &vel);
            assert!((fwd.norm() - 1.0).abs() < 1e-12);
            assert!(fwd.dot(&zenith(&pos)).abs() < 1e-12);
            assert_eq!(aft, -fwd);
        }
    }

    #[test]
    fn test_horizon_cones_see_along_track_neighbor() {
        let pos = Vec3::new(7078.0, 0.0, 0.0);
        let vel = Vec3::new(0.0, 7.5, 0.0);
        let [fwd, aft] = horizon_cones("BEACON", pos, &vel, 120.0);
        let ahead = Vec3::new(7078.0, 500.0, 0.0);
        assert!(fwd.contains(&ahead));
        assert!(!aft.contains(&ahead));
    }

    fn direction() -> impl Strategy<Value = Vec3> {
        (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0)
            .prop_map(|(x, y, z)| Vec3::new(x, y, z))
            .prop_filter("non-degenerate", |v| v.norm() > 1e-3)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        #[test]
        fn fuzz_cone_scale_invariant(
            point in direction(),
            apex in direction(),
            axis in direction(),
            half_angle in 0.01f64..3.1,
            k in 0.01f64..1000.0,
        ) {
            let axis = safe_normalize(&axis);
            let base = is_point_in_cone(&(point * 10.0), &apex, &axis, half_angle);
            let scaled = is_point_in_cone(&(point * 10.0 * k), &(apex * k), &axis, half_angle);
            // Skip boundary cases where rounding can legitimately flip the result
            let v = safe_normalize(&(point * 10.0 - apex));
            let angle = axis.dot(&v).clamp(-1.0, 1.0).acos();
            prop_assume!((angle - half_angle).abs() > 1e-9);
            prop_assert_eq!(base, scaled);
        }

        #[test]
        fn fuzz_on_axis_point_always_inside(
            apex in direction(),
            axis in direction(),
            distance in 1e-3f64..1e6,
            half_angle in 1e-6f64..3.14,
        ) {
            let axis = safe_normalize(&axis);
            let point = apex + axis * distance;
            prop_assert!(is_point_in_cone(&point, &apex, &axis, half_angle));
        }

        #[test]
        fn fuzz_normalize_is_unit_or_zero(x in -1e6f64..1e6, y in -1e6f64..1e6, z in -1e6f64..1e6) {
            let n = safe_normalize(&Vec3::new(x, y, z));
            prop_assert!(n.iter().all(|c| c.is_finite()));
            prop_assert!(n == Vec3::zeros() || (n.norm() - 1.0).abs() < 1e-12);
        }
    }
}
