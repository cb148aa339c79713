//! Math utilities.
use std::f64::consts;

use nalgebra::{Rotation3, Unit, Vector3};

/// Double-precision 3-vector used for every position, velocity and basis
/// vector in the crate.
pub type Vector3d = Vector3<f64>;

/// Right axis of the reference (ecliptic) plane.
pub fn ecliptic_right() -> Vector3d {
    Vector3::new(1.0, 0.0, 0.0)
}

/// Up axis of the reference plane, used as the fallback axis for radial
/// trajectories.
pub fn ecliptic_up() -> Vector3d {
    Vector3::new(0.0, 1.0, 0.0)
}

/// Normal of the reference plane.
pub fn ecliptic_normal() -> Vector3d {
    Vector3::new(0.0, 0.0, 1.0)
}

/// A vector with every component set to `+∞`, used for the apoapsis of
/// open orbits.
pub fn infinite_vector() -> Vector3d {
    Vector3::repeat(f64::INFINITY)
}

pub trait Vector3dExt {
    /// Normalize, or return `None` if the norm is not above `min_norm`.
    fn checked_unit(&self, min_norm: f64) -> Option<Vector3d>;

    /// Normalize, or return the zero vector if the norm is (numerically)
    /// zero.
    fn unit_or_zero(&self) -> Vector3d;

    /// Rotate this vector about `axis` by `angle` radians (right-handed).
    /// A zero axis leaves the vector unchanged.
    fn rotate_around(&self, axis: &Vector3d, angle: f64) -> Vector3d;

    /// Unsigned angle to `other` in `[0, π]` radians.
    fn angle_to(&self, other: &Vector3d) -> f64;
}

impl Vector3dExt for Vector3d {
    fn checked_unit(&self, min_norm: f64) -> Option<Vector3d> {
        self.try_normalize(min_norm)
    }

    fn unit_or_zero(&self) -> Vector3d {
        self.try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    fn rotate_around(&self, axis: &Vector3d, angle: f64) -> Vector3d {
        match Unit::try_new(*axis, f64::MIN_POSITIVE) {
            Some(axis) => Rotation3::from_axis_angle(&axis, angle) * *self,
            None => *self,
        }
    }

    fn angle_to(&self, other: &Vector3d) -> f64 {
        libm::atan2(self.cross(other).norm(), self.dot(other))
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_two_pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(consts::TAU);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= consts::TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_pi(angle: f64) -> f64 {
    let wrapped = wrap_two_pi(angle);
    if wrapped > consts::PI {
        wrapped - consts::TAU
    } else {
        wrapped
    }
}

/// Normalize an angle in degrees into `(-180°, 180°]`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[test]
fn rotate_around_is_right_handed() {
    let v = ecliptic_right().rotate_around(&ecliptic_normal(), consts::FRAC_PI_2);
    assert!((v - ecliptic_up()).norm() < 1e-15);

    let unchanged = ecliptic_right().rotate_around(&Vector3::zeros(), 1.0);
    assert_eq!(unchanged, ecliptic_right());
}

#[test]
fn unit_or_zero_handles_zero() {
    assert_eq!(Vector3::zeros().unit_or_zero(), Vector3d::zeros());
    assert!((Vector3::new(3.0, 4.0, 0.0).unit_or_zero().norm() - 1.0).abs() < 1e-15);
    assert!(Vector3::new(1e-20, 0.0, 0.0).checked_unit(1e-12).is_none());
}

#[test]
fn angle_wrapping() {
    assert_eq!(normalize_degrees(180.0), 180.0);
    assert_eq!(normalize_degrees(-180.0), 180.0);
    assert_eq!(normalize_degrees(270.0), -90.0);
    assert_eq!(normalize_degrees(720.0 + 45.0), 45.0);
    assert!((wrap_two_pi(-consts::FRAC_PI_2) - 1.5 * consts::PI).abs() < 1e-15);
    assert!((wrap_pi(1.5 * consts::PI) + consts::FRAC_PI_2).abs() < 1e-15);
    assert_eq!(wrap_two_pi(-1e-30), 0.0);
    assert!(
        (ecliptic_right().angle_to(&Vector3::new(-1.0, 1e-9, 0.0)) - consts::PI).abs() < 1e-8
    );
}
