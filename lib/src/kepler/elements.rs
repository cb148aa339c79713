//! Classical orbital elements.

use serde::{Deserialize, Serialize};

use super::{
    anomaly::{self, Regime},
    orbits::OrbitData,
};
use crate::math::{ecliptic_normal, ecliptic_right, normalize_degrees, Vector3d, Vector3dExt};

/// Below this `|N × n|` the orbit is treated as equatorial and the ascending
/// node defaults to the reference right axis.
const EQUATORIAL_TOLERANCE: f64 = 1e-12;

/// A classical (Keplerian) element set.
///
/// Angles are in degrees. `semi_major_axis` is negative for hyperbolic orbits
/// (its sign is ignored on input, the eccentricity decides) and holds the
/// periapsis distance for parabolic ones.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    pub eccentricity: f64,
    pub semi_major_axis: f64,
    pub mean_anomaly: f64,
    pub inclination: f64,
    pub argument_of_periapsis: f64,
    pub longitude_of_ascending_node: f64,
}

impl Default for OrbitalElements {
    fn default() -> Self {
        Self {
            eccentricity: 0.0,
            semi_major_axis: 1.0,
            mean_anomaly: 0.0,
            inclination: 0.0,
            argument_of_periapsis: 0.0,
            longitude_of_ascending_node: 0.0,
        }
    }
}

impl OrbitData {
    /// Derive an orbit from classical elements.
    pub fn from_elements(
        elements: &OrbitalElements,
        attractor_mass: f64,
        gravitational_constant: f64,
    ) -> Self {
        let mut orbit = OrbitData {
            attractor_mass,
            gravitational_constant,
            ..OrbitData::default()
        };
        orbit.calculate_from_elements(elements);
        orbit
    }

    /// Recompute every derived field from `elements`, the attractor mass and
    /// the gravitational constant, ending with position and velocity at the
    /// given mean anomaly.
    pub fn calculate_from_elements(&mut self, elements: &OrbitalElements) {
        let inc = normalize_degrees(elements.inclination).to_radians();
        let argpe = normalize_degrees(elements.argument_of_periapsis).to_radians();
        let lan = normalize_degrees(elements.longitude_of_ascending_node).to_radians();

        let reference_normal = ecliptic_normal();
        let node = ecliptic_right().rotate_around(&reference_normal, lan);
        let normal = reference_normal.rotate_around(&node, inc);
        let pe_dir = node.rotate_around(&normal, argpe);

        self.mu = self.attractor_mass * self.gravitational_constant;
        self.eccentricity = elements.eccentricity.abs();
        self.orbit_normal = normal;
        self.orbit_normal_dot_ecliptic_normal = normal.dot(&reference_normal);
        self.semi_major_axis_basis = pe_dir;
        self.semi_minor_axis_basis = pe_dir.cross(&normal);
        self.derive_shape(elements.semi_major_axis.abs());

        let e = self.eccentricity;
        let ma = elements.mean_anomaly.to_radians();
        self.mean_anomaly = match self.regime() {
            Regime::Elliptic => crate::math::wrap_two_pi(ma),
            Regime::Parabolic | Regime::Hyperbolic => ma,
        };
        self.eccentric_anomaly = anomaly::mean_to_eccentric(self.mean_anomaly, e);
        self.true_anomaly = anomaly::eccentric_to_true(self.eccentric_anomaly, e);
        self.update_state_from_anomaly();
    }

    /// Inclination of the orbit plane to the reference plane (radians, in
    /// `[0, π]`).
    pub fn inclination(&self) -> f64 {
        libm::acos(self.orbit_normal_dot_ecliptic_normal.clamp(-1.0, 1.0))
    }

    /// Unit vector towards the ascending node.
    pub fn ascending_node(&self) -> Vector3d {
        ecliptic_normal()
            .cross(&self.orbit_normal)
            .checked_unit(EQUATORIAL_TOLERANCE)
            .unwrap_or_else(ecliptic_right)
    }

    /// Longitude of the ascending node (radians, in `(-π, π]`).
    pub fn longitude_of_ascending_node(&self) -> f64 {
        let node = self.ascending_node();
        let right = ecliptic_right();
        libm::atan2(right.cross(&node).dot(&ecliptic_normal()), right.dot(&node))
    }

    /// Argument of periapsis, measured from the ascending node in the
    /// direction of motion (radians, in `(-π, π]`).
    pub fn argument_of_periapsis(&self) -> f64 {
        let node = self.ascending_node();
        let pe_dir = self.semi_major_axis_basis;
        libm::atan2(node.cross(&pe_dir).dot(&self.orbit_normal), node.dot(&pe_dir))
    }

    /// The classical element set describing this orbit at its current
    /// anomaly.
    pub fn elements(&self) -> OrbitalElements {
        let (semi_major_axis, mean_anomaly) = match self.regime() {
            Regime::Elliptic => (
                self.semi_major_axis,
                normalize_degrees(self.mean_anomaly.to_degrees()),
            ),
            Regime::Hyperbolic => (self.semi_major_axis, self.mean_anomaly.to_degrees()),
            Regime::Parabolic => (self.periapsis_distance, self.mean_anomaly.to_degrees()),
        };
        OrbitalElements {
            eccentricity: self.eccentricity,
            semi_major_axis,
            mean_anomaly,
            inclination: self.inclination().to_degrees(),
            argument_of_periapsis: self.argument_of_periapsis().to_degrees(),
            longitude_of_ascending_node: self.longitude_of_ascending_node().to_degrees(),
        }
    }
}

#[cfg(test)]
fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} != {b} (tol {tol})");
}

#[test]
fn elements_are_recovered() {
    let elements = OrbitalElements {
        eccentricity: 0.25,
        semi_major_axis: 12_000.0,
        mean_anomaly: 40.0,
        inclination: 28.5,
        argument_of_periapsis: 75.0,
        longitude_of_ascending_node: -120.0,
    };
    let orbit = OrbitData::from_elements(&elements, 398_600.0, 1.0);
    assert!(orbit.is_valid());
    let back = orbit.elements();
    assert_close(back.eccentricity, 0.25, 1e-12);
    assert_close(back.semi_major_axis, 12_000.0, 1e-9);
    assert_close(back.mean_anomaly, 40.0, 1e-9);
    assert_close(back.inclination, 28.5, 1e-9);
    assert_close(back.argument_of_periapsis, 75.0, 1e-9);
    assert_close(back.longitude_of_ascending_node, -120.0, 1e-9);
}

#[test]
fn elements_and_vectors_agree() {
    let elements = OrbitalElements {
        eccentricity: 0.6,
        semi_major_axis: 20_000.0,
        mean_anomaly: 200.0,
        inclination: 63.4,
        argument_of_periapsis: 270.0,
        longitude_of_ascending_node: 15.0,
    };
    let from_elements = OrbitData::from_elements(&elements, 398_600.0, 1.0);
    let from_vectors = OrbitData::from_state_vectors(
        from_elements.position,
        from_elements.velocity,
        398_600.0,
        1.0,
    );
    assert_close(from_vectors.eccentricity, 0.6, 1e-9);
    assert_close(from_vectors.semi_major_axis, 20_000.0, 1e-6);
    assert_close(from_vectors.period, from_elements.period, 1e-6);
    assert!((from_vectors.semi_major_axis_basis - from_elements.semi_major_axis_basis).norm() < 1e-9);
    assert!((from_vectors.semi_minor_axis_basis - from_elements.semi_minor_axis_basis).norm() < 1e-9);
    assert_close(
        crate::math::wrap_pi(from_vectors.mean_anomaly - from_elements.mean_anomaly),
        0.0,
        1e-9,
    );
}

#[test]
fn equatorial_orbit_uses_reference_node() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(0.0, 8000.0, 0.0),
        Vector3d::new(-7.0, 0.0, 0.0),
        398_600.0,
        1.0,
    );
    assert!(orbit.inclination().abs() < 1e-12);
    assert_eq!(orbit.ascending_node(), ecliptic_right());
    assert_close(orbit.longitude_of_ascending_node(), 0.0, 1e-15);
}

#[test]
fn angles_are_normalized_before_use() {
    let base = OrbitalElements {
        eccentricity: 0.1,
        semi_major_axis: 9000.0,
        mean_anomaly: 10.0,
        inclination: 30.0,
        argument_of_periapsis: 45.0,
        longitude_of_ascending_node: 60.0,
    };
    let shifted = OrbitalElements {
        argument_of_periapsis: 45.0 + 720.0,
        longitude_of_ascending_node: 60.0 - 360.0,
        mean_anomaly: 10.0 + 360.0,
        ..base
    };
    let a = OrbitData::from_elements(&base, 398_600.0, 1.0);
    let b = OrbitData::from_elements(&shifted, 398_600.0, 1.0);
    assert!((a.position - b.position).norm() < 1e-6);
    assert!((a.velocity - b.velocity).norm() < 1e-9);
}

#[test]
fn hyperbolic_flyby_elements() {
    let elements = OrbitalElements {
        eccentricity: 1.5,
        semi_major_axis: -5000.0,
        mean_anomaly: -30.0,
        ..OrbitalElements::default()
    };
    let orbit = OrbitData::from_elements(&elements, 398_600.0, 1.0);
    assert_eq!(orbit.period, f64::INFINITY);
    assert_eq!(orbit.apoapsis_distance, f64::INFINITY);
    assert_close(orbit.periapsis_distance, 2500.0, 1e-9);
    assert_close(orbit.semi_major_axis, -5000.0, 1e-12);
    // inbound leg
    assert!(orbit.position.dot(&orbit.velocity) < 0.0);
    assert_close(orbit.elements().mean_anomaly, -30.0, 1e-9);
}

#[test]
fn parabolic_elements_use_periapsis_distance() {
    let elements = OrbitalElements {
        eccentricity: 1.0,
        semi_major_axis: 7000.0,
        mean_anomaly: 0.0,
        ..OrbitalElements::default()
    };
    let orbit = OrbitData::from_elements(&elements, 398_600.0, 1.0);
    assert_eq!(orbit.regime(), Regime::Parabolic);
    assert!((orbit.position - Vector3d::new(7000.0, 0.0, 0.0)).norm() < 1e-9);
    let escape = (2.0 * 398_600.0 / 7000.0_f64).sqrt();
    assert_close(orbit.velocity.norm(), escape, 1e-9);
    assert_close(orbit.elements().semi_major_axis, 7000.0, 1e-9);
}
