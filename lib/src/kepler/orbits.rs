//! Keplerian orbits.

use std::f64::consts;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::anomaly::{self, Regime};
use crate::math::{
    ecliptic_normal, ecliptic_right, ecliptic_up, infinite_vector, wrap_two_pi, Vector3d,
    Vector3dExt,
};

/// A state is treated as radial when `|r × v| <= RADIAL_TOLERANCE * |r| |v|`.
const RADIAL_TOLERANCE: f64 = 1e-12;

/// Open orbits are sampled no closer than this (radians) to the asymptote.
const ASYMPTOTE_MARGIN: f64 = 1e-6;

/// Full derived state of one body's Keplerian orbit around a single
/// attractor.
///
/// Distances, speeds and masses are in whatever consistent units the
/// gravitational constant is expressed in. Anomalies are in radians.
///
/// Basis conventions: [`semi_major_axis_basis`](Self::semi_major_axis_basis)
/// points from the focus towards periapsis,
/// [`semi_minor_axis_basis`](Self::semi_minor_axis_basis) is
/// `periapsis direction × orbit normal` (opposite to the direction of motion
/// at periapsis).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbitData {
    /// Standard gravitational parameter `μ = G M`.
    pub mu: f64,
    pub gravitational_constant: f64,
    pub semi_minor_axis: f64,
    /// Semi-major axis; negative for hyperbolic orbits and infinite for
    /// parabolic ones.
    pub semi_major_axis: f64,
    /// Semi-latus rectum `p = h² / μ`.
    pub focal_parameter: f64,
    pub eccentricity: f64,
    /// Orbital period (`+∞` for open orbits).
    pub period: f64,
    pub true_anomaly: f64,
    pub mean_anomaly: f64,
    pub eccentric_anomaly: f64,
    pub mean_motion: f64,
    pub periapsis: Vector3d,
    pub periapsis_distance: f64,
    /// Apoapsis point (every component `+∞` for open orbits).
    pub apoapsis: Vector3d,
    pub apoapsis_distance: f64,
    /// Center of the conic relative to the focus.
    pub center_point: Vector3d,
    /// `|1 - e²|`.
    pub orbit_compression_ratio: f64,
    pub orbit_normal: Vector3d,
    pub semi_minor_axis_basis: Vector3d,
    pub semi_major_axis_basis: Vector3d,
    pub orbit_normal_dot_ecliptic_normal: f64,
    /// Position relative to the attractor.
    pub position: Vector3d,
    /// Velocity relative to the attractor.
    pub velocity: Vector3d,
    pub attractor_mass: f64,
    pub attractor_distance: f64,
}

impl OrbitData {
    /// Derive an orbit from a state vector relative to the attractor.
    pub fn from_state_vectors(
        position: Vector3d,
        velocity: Vector3d,
        attractor_mass: f64,
        gravitational_constant: f64,
    ) -> Self {
        let mut orbit = OrbitData {
            position,
            velocity,
            attractor_mass,
            gravitational_constant,
            ..OrbitData::default()
        };
        orbit.calculate_from_vectors();
        orbit
    }

    pub fn regime(&self) -> Regime {
        Regime::of(self.eccentricity)
    }

    /// Whether the orbit can be propagated and sampled.
    pub fn is_valid(&self) -> bool {
        self.eccentricity >= 0.0 && self.period > 0.0 && self.attractor_mass > 0.0
    }

    /// Recompute every derived field from [`position`](Self::position),
    /// [`velocity`](Self::velocity), the attractor mass and the
    /// gravitational constant.
    pub fn calculate_from_vectors(&mut self) {
        self.mu = self.attractor_mass * self.gravitational_constant;
        self.attractor_distance = self.position.norm();

        if self.mu <= 0.0 || !self.mu.is_finite() || self.attractor_distance <= f64::EPSILON {
            debug!(
                "OrbitData::calculate_from_vectors: degenerate input (mu={}, r={})",
                self.mu, self.attractor_distance
            );
            self.invalidate();
            return;
        }

        let r = self.attractor_distance;
        let hv = self.position.cross(&self.velocity);
        let h = hv.norm();

        let ev = if h > RADIAL_TOLERANCE * r * self.velocity.norm() {
            self.orbit_normal = hv / h;
            self.velocity.cross(&hv) / self.mu - self.position / r
        } else {
            // radial trajectory: no orbital plane, pick one containing r
            self.orbit_normal = self
                .position
                .cross(&ecliptic_up())
                .checked_unit(RADIAL_TOLERANCE * r)
                .unwrap_or_else(|| self.position.cross(&ecliptic_right()).unit_or_zero());
            Vector3d::zeros()
        };

        self.orbit_normal_dot_ecliptic_normal = self.orbit_normal.dot(&ecliptic_normal());
        self.focal_parameter = h * h / self.mu;
        self.eccentricity = ev.norm();

        self.semi_minor_axis_basis = hv
            .cross(&-ev)
            .checked_unit(f64::MIN_POSITIVE)
            .unwrap_or_else(|| self.orbit_normal.cross(&self.position).unit_or_zero());
        self.semi_major_axis_basis = self
            .orbit_normal
            .cross(&self.semi_minor_axis_basis)
            .unit_or_zero();

        if self.regime() == Regime::Parabolic {
            self.derive_shape(self.focal_parameter / 2.0);
        } else {
            self.derive_shape(self.focal_parameter / (1.0 - self.eccentricity.powi(2)));
        }

        // the angle from periapsis, signed so that it grows along the motion
        let px = self.position.dot(&self.semi_major_axis_basis);
        let py = self
            .position
            .dot(&self.orbit_normal.cross(&self.semi_major_axis_basis));
        let ta = libm::atan2(py, px);
        self.true_anomaly = match self.regime() {
            Regime::Elliptic => wrap_two_pi(ta),
            Regime::Parabolic | Regime::Hyperbolic => ta,
        };
        self.eccentric_anomaly = anomaly::true_to_eccentric(self.true_anomaly, self.eccentricity);
        self.mean_anomaly = anomaly::eccentric_to_mean(self.eccentric_anomaly, self.eccentricity);
    }

    /// Fill the size-dependent fields (axes, center, period, mean motion,
    /// apsides) from the eccentricity, the basis and `size`.
    ///
    /// `size` is the semi-major axis for elliptic and hyperbolic orbits and
    /// the periapsis distance for parabolic ones.
    pub(crate) fn derive_shape(&mut self, size: f64) {
        let e = self.eccentricity;
        let pe_dir = self.semi_major_axis_basis;
        match self.regime() {
            Regime::Elliptic => {
                let a = size;
                self.orbit_compression_ratio = 1.0 - e * e;
                self.semi_major_axis = a;
                self.semi_minor_axis = a * self.orbit_compression_ratio.sqrt();
                self.focal_parameter = a * self.orbit_compression_ratio;
                self.center_point = -pe_dir * a * e;
                if a > 0.0 && self.mu > 0.0 {
                    self.period = consts::TAU * (a.powi(3) / self.mu).sqrt();
                    self.mean_motion = consts::TAU / self.period;
                } else {
                    self.period = 0.0;
                    self.mean_motion = 0.0;
                }
                self.periapsis = pe_dir * a * (1.0 - e);
                self.apoapsis = -pe_dir * a * (1.0 + e);
                self.periapsis_distance = a * (1.0 - e);
                self.apoapsis_distance = a * (1.0 + e);
            }
            Regime::Hyperbolic => {
                let a = -size.abs();
                self.orbit_compression_ratio = e * e - 1.0;
                self.semi_major_axis = a;
                self.semi_minor_axis = -a * self.orbit_compression_ratio.sqrt();
                self.focal_parameter = -a * self.orbit_compression_ratio;
                self.center_point = -pe_dir * a * e;
                self.period = f64::INFINITY;
                self.mean_motion = (self.mu / (-a).powi(3)).sqrt();
                self.periapsis = pe_dir * -a * (e - 1.0);
                self.apoapsis = infinite_vector();
                self.periapsis_distance = -a * (e - 1.0);
                self.apoapsis_distance = f64::INFINITY;
            }
            Regime::Parabolic => {
                let q = size;
                self.orbit_compression_ratio = 0.0;
                self.semi_major_axis = f64::INFINITY;
                self.semi_minor_axis = f64::INFINITY;
                self.focal_parameter = 2.0 * q;
                self.center_point = Vector3d::zeros();
                self.period = f64::INFINITY;
                self.mean_motion = (self.mu / self.focal_parameter.powi(3)).sqrt();
                self.periapsis = pe_dir * q;
                self.apoapsis = infinite_vector();
                self.periapsis_distance = q;
                self.apoapsis_distance = f64::INFINITY;
            }
        }
    }

    /// Mark the orbit invalid, keeping the raw inputs.
    fn invalidate(&mut self) {
        self.period = 0.0;
        self.mean_motion = 0.0;
        self.eccentricity = 0.0;
        self.focal_parameter = 0.0;
        self.semi_major_axis = 0.0;
        self.semi_minor_axis = 0.0;
    }

    /// Advance the orbit by `delta_t` seconds.
    ///
    /// Does nothing for invalid orbits.
    pub fn propagate(&mut self, delta_t: f64) {
        if !self.is_valid() {
            trace!("OrbitData::propagate: skipped invalid orbit");
            return;
        }
        let ma = self.mean_anomaly + self.mean_motion * delta_t;
        self.set_anomalies_from_mean(ma);
    }

    /// Override the mean anomaly and re-derive the other anomalies, position
    /// and velocity.
    ///
    /// Does nothing for invalid orbits.
    pub fn set_mean_anomaly(&mut self, ma: f64) {
        if !self.is_valid() {
            return;
        }
        self.set_anomalies_from_mean(ma);
    }

    fn set_anomalies_from_mean(&mut self, ma: f64) {
        let e = self.eccentricity;
        self.mean_anomaly = match self.regime() {
            Regime::Elliptic => wrap_two_pi(ma),
            Regime::Parabolic | Regime::Hyperbolic => ma,
        };
        self.eccentric_anomaly = anomaly::mean_to_eccentric(self.mean_anomaly, e);
        self.true_anomaly = anomaly::eccentric_to_true(self.eccentric_anomaly, e);
        self.update_state_from_anomaly();
    }

    /// Recompute position, velocity and attractor distance at the current
    /// anomaly.
    pub(crate) fn update_state_from_anomaly(&mut self) {
        self.position = self.position_at_eccentric_anomaly(self.eccentric_anomaly);
        self.velocity = self.velocity_at_true_anomaly(self.true_anomaly);
        self.attractor_distance = self.position.norm();
    }

    /// Direction of motion at periapsis.
    fn motion_basis(&self) -> Vector3d {
        -self.semi_minor_axis_basis
    }

    /// Position relative to the attractor at the given eccentric anomaly
    /// (the true anomaly for parabolic orbits).
    pub fn position_at_eccentric_anomaly(&self, ea: f64) -> Vector3d {
        let p = self.semi_major_axis_basis;
        let q = self.motion_basis();
        match self.regime() {
            Regime::Elliptic => {
                let a = self.semi_major_axis;
                p * a * (libm::cos(ea) - self.eccentricity)
                    + q * self.semi_minor_axis * libm::sin(ea)
            }
            Regime::Hyperbolic => {
                let a = -self.semi_major_axis;
                p * a * (self.eccentricity - libm::cosh(ea))
                    + q * self.semi_minor_axis * libm::sinh(ea)
            }
            Regime::Parabolic => self.position_at_true_anomaly(ea),
        }
    }

    /// Position relative to the attractor at the given true anomaly.
    pub fn position_at_true_anomaly(&self, ta: f64) -> Vector3d {
        let r = self.focal_parameter / (1.0 + self.eccentricity * libm::cos(ta));
        r * (libm::cos(ta) * self.semi_major_axis_basis + libm::sin(ta) * self.motion_basis())
    }

    /// Velocity relative to the attractor at the given true anomaly.
    pub fn velocity_at_true_anomaly(&self, ta: f64) -> Vector3d {
        if self.focal_parameter <= 0.0 || self.mu <= 0.0 {
            return Vector3d::zeros();
        }
        let k = (self.mu / self.focal_parameter).sqrt();
        k * (-libm::sin(ta) * self.semi_major_axis_basis
            + (self.eccentricity + libm::cos(ta)) * self.motion_basis())
    }

    /// Velocity relative to the attractor at the given eccentric anomaly.
    pub fn velocity_at_eccentric_anomaly(&self, ea: f64) -> Vector3d {
        self.velocity_at_true_anomaly(anomaly::eccentric_to_true(ea, self.eccentricity))
    }

    /// Time since periapsis passage (seconds).
    ///
    /// For closed orbits this is within `[0, period)`.
    pub fn current_orbit_time(&self) -> f64 {
        match self.regime() {
            Regime::Elliptic => {
                if self.period > 0.0 && self.period.is_finite() {
                    wrap_two_pi(self.mean_anomaly) / consts::TAU * self.period
                } else {
                    0.0
                }
            }
            Regime::Parabolic | Regime::Hyperbolic => {
                if self.mean_motion > 0.0 {
                    self.mean_anomaly / self.mean_motion
                } else {
                    0.0
                }
            }
        }
    }

    /// Mean anomaly consistent with the current [`position`](Self::position)
    /// and the existing basis and eccentricity.
    pub fn mean_anomaly_from_position(&self) -> f64 {
        let px = self.position.dot(&self.semi_major_axis_basis);
        let py = self.position.dot(&self.motion_basis());
        let ta = libm::atan2(py, px);
        anomaly::true_to_mean(ta, self.eccentricity)
    }

    /// Points along the orbit, offset by `origin`.
    ///
    /// Closed orbits are sampled uniformly in eccentric anomaly over a full
    /// revolution (first and last point coincide). Open orbits are sampled
    /// uniformly in true anomaly over the arc that stays within
    /// `max_distance` of the attractor (stopping just short of the
    /// asymptotes); if periapsis is already beyond `max_distance` nothing is
    /// returned.
    pub fn generate_orbit_points(
        &self,
        count: usize,
        origin: Vector3d,
        max_distance: f64,
    ) -> Vec<Vector3d> {
        if count < 2 || !self.is_valid() {
            return Vec::new();
        }
        let steps = (count - 1) as f64;
        match self.regime() {
            Regime::Elliptic => (0..count)
                .map(|i| {
                    let ea = i as f64 * consts::TAU / steps;
                    self.position_at_eccentric_anomaly(ea) + origin
                })
                .collect(),
            Regime::Parabolic | Regime::Hyperbolic => {
                if max_distance < self.periapsis_distance {
                    return Vec::new();
                }
                // the asymptote itself is at infinity
                let asymptote = libm::acos((-1.0 / self.eccentricity).clamp(-1.0, 1.0));
                let max_ta = anomaly::true_anomaly_for_distance(
                    max_distance,
                    self.eccentricity,
                    self.focal_parameter,
                )
                .min(asymptote - ASYMPTOTE_MARGIN);
                (0..count)
                    .map(|i| {
                        let ta = -max_ta + i as f64 * 2.0 * max_ta / steps;
                        self.position_at_true_anomaly(ta) + origin
                    })
                    .collect()
            }
        }
    }

    /// Add an impulsive velocity change and recompute the orbit.
    pub fn apply_velocity_delta(&mut self, delta_v: Vector3d) {
        self.velocity += delta_v;
        self.calculate_from_vectors();
    }

    /// Specific orbital energy `v²/2 - μ/r`.
    pub fn specific_energy(&self) -> f64 {
        self.velocity.norm_squared() / 2.0 - self.mu / self.position.norm()
    }

    /// Specific angular momentum vector `r × v`.
    pub fn specific_angular_momentum(&self) -> Vector3d {
        self.position.cross(&self.velocity)
    }
}

#[cfg(test)]
fn leo() -> OrbitData {
    OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 7.546, 0.0),
        398_600.0,
        1.0,
    )
}

#[test]
fn circular_leo() {
    let orbit = leo();
    assert!(orbit.is_valid());
    assert!(orbit.eccentricity < 1e-3, "e = {}", orbit.eccentricity);
    assert!((orbit.semi_major_axis - 7000.0).abs() < 5.0);
    assert!((orbit.period - 5828.0).abs() < 5.0, "T = {}", orbit.period);
    assert!((orbit.orbit_normal - ecliptic_normal()).norm() < 1e-12);
}

#[test]
fn basis_is_orthonormal() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(6500.0, 1200.0, -300.0),
        Vector3d::new(-1.5, 8.9, 2.1),
        398_600.0,
        1.0,
    );
    let p = orbit.semi_major_axis_basis;
    let q = orbit.semi_minor_axis_basis;
    let n = orbit.orbit_normal;
    for v in [p, q, n] {
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }
    assert!(p.dot(&q).abs() < 1e-12);
    assert!(p.dot(&n).abs() < 1e-12);
    assert!(q.dot(&n).abs() < 1e-12);
    assert!((p.cross(&n) - q).norm() < 1e-12);
}

#[test]
fn state_is_reproduced_at_current_anomaly() {
    for (r, v) in [
        (Vector3d::new(7000.0, 0.0, 0.0), Vector3d::new(0.0, 8.5, 1.0)),
        (Vector3d::new(-4000.0, 5000.0, 100.0), Vector3d::new(-6.0, -4.0, 0.5)),
        (Vector3d::new(7000.0, 0.0, 0.0), Vector3d::new(0.5, 12.0, 0.0)),
    ] {
        let mut orbit = OrbitData::from_state_vectors(r, v, 398_600.0, 1.0);
        orbit.update_state_from_anomaly();
        assert!((orbit.position - r).norm() / r.norm() < 1e-9, "{orbit:#?}");
        assert!((orbit.velocity - v).norm() / v.norm() < 1e-9, "{orbit:#?}");
    }
}

#[test]
fn hyperbolic_sentinels() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 13.0, 0.0),
        398_600.0,
        1.0,
    );
    assert_eq!(orbit.regime(), Regime::Hyperbolic);
    assert!(orbit.is_valid());
    assert_eq!(orbit.period, f64::INFINITY);
    assert_eq!(orbit.apoapsis_distance, f64::INFINITY);
    assert!(orbit.apoapsis.iter().all(|c| *c == f64::INFINITY));
    assert!(orbit.semi_major_axis < 0.0);
    assert!((orbit.periapsis_distance - 7000.0).abs() < 1e-6);
}

#[test]
fn radial_trajectory_does_not_produce_nan() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(3.0, 0.0, 0.0),
        398_600.0,
        1.0,
    );
    assert!(!orbit.is_valid());
    assert!((orbit.orbit_normal.norm() - 1.0).abs() < 1e-12);
    assert!(orbit.mean_anomaly.is_finite());
    assert!(orbit.mean_motion.is_finite());

    // radial along the fallback axis
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(0.0, 7000.0, 0.0),
        Vector3d::new(0.0, -1.0, 0.0),
        398_600.0,
        1.0,
    );
    assert!((orbit.orbit_normal.norm() - 1.0).abs() < 1e-12);
}

#[test]
fn invalid_orbits_are_not_mutated() {
    let mut orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 7.5, 0.0),
        0.0,
        1.0,
    );
    assert!(!orbit.is_valid());
    let before = orbit.clone();
    orbit.propagate(100.0);
    orbit.set_mean_anomaly(1.0);
    assert_eq!(orbit, before);
    assert!(orbit.generate_orbit_points(16, Vector3d::zeros(), 1e6).is_empty());

    let mut empty = OrbitData::default();
    assert!(!empty.is_valid());
    empty.propagate(1.0);
    assert_eq!(empty, OrbitData::default());
}

#[test]
fn propagation_is_idempotent_for_zero_step() {
    let mut orbit = leo();
    orbit.propagate(123.0);
    let before = orbit.clone();
    orbit.propagate(0.0);
    assert!((orbit.position - before.position).norm() < 1e-9);
    assert_eq!(orbit.mean_anomaly, before.mean_anomaly);
}

#[test]
fn orbit_time_of_ellipse() {
    let mut orbit = leo();
    orbit.set_mean_anomaly(consts::PI);
    assert!((orbit.current_orbit_time() - orbit.period / 2.0).abs() < 1e-9);
    orbit.set_mean_anomaly(-consts::FRAC_PI_2);
    assert!((orbit.current_orbit_time() - orbit.period * 0.75).abs() < 1e-9);
}

#[test]
fn orbit_time_of_hyperbola() {
    let mut orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 13.0, 0.0),
        398_600.0,
        1.0,
    );
    orbit.propagate(600.0);
    assert!((orbit.current_orbit_time() - 600.0).abs() < 1e-6);
    orbit.set_mean_anomaly(-2.0);
    assert!(orbit.mean_anomaly < 0.0);
    assert!(orbit.current_orbit_time() < 0.0);
}

#[test]
fn mean_anomaly_from_position_matches_state() {
    let mut orbit = OrbitData::from_state_vectors(
        Vector3d::new(-4000.0, 5000.0, 100.0),
        Vector3d::new(-6.0, -4.0, 0.5),
        398_600.0,
        1.0,
    );
    for _ in 0..20 {
        orbit.propagate(300.0);
        let ma = orbit.mean_anomaly_from_position();
        let diff = crate::math::wrap_pi(ma - orbit.mean_anomaly);
        assert!(diff.abs() < 1e-9, "{ma} vs {}", orbit.mean_anomaly);
    }
}

#[test]
fn elliptic_points_close_the_loop() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 8.5, 1.0),
        398_600.0,
        1.0,
    );
    let origin = Vector3d::new(1e5, 0.0, 0.0);
    let points = orbit.generate_orbit_points(64, origin, 0.0);
    assert_eq!(points.len(), 64);
    assert!((points[0] - points[63]).norm() < 1e-6);
    assert!((points[0] - origin - orbit.periapsis).norm() < 1e-6);
    for point in &points {
        let r = (point - origin).norm();
        assert!(r >= orbit.periapsis_distance - 1e-6);
        assert!(r <= orbit.apoapsis_distance + 1e-6);
    }
    assert!(orbit.generate_orbit_points(1, origin, 0.0).is_empty());
}

#[test]
fn hyperbolic_points_stay_within_range() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 13.0, 0.0),
        398_600.0,
        1.0,
    );
    let points = orbit.generate_orbit_points(33, Vector3d::zeros(), 100_000.0);
    assert_eq!(points.len(), 33);
    assert!((points[0].norm() - 100_000.0).abs() < 1e-3);
    assert!((points[32].norm() - 100_000.0).abs() < 1e-3);
    assert!((points[16] - orbit.periapsis).norm() < 1e-6);
    for point in &points {
        assert!(point.norm() <= 100_000.0 + 1e-3);
    }
    assert!(orbit.generate_orbit_points(33, Vector3d::zeros(), 1000.0).is_empty());
}

#[test]
fn velocity_delta_recomputes_orbit() {
    let mut orbit = leo();
    let before = orbit.semi_major_axis;
    let prograde = orbit.velocity.normalize();
    orbit.apply_velocity_delta(prograde * 0.5);
    assert!(orbit.semi_major_axis > before);
    assert!((orbit.position - Vector3d::new(7000.0, 0.0, 0.0)).norm() < 1e-9);
}

#[test]
fn unbounded_open_orbits_give_finite_points() {
    for speed in [(2.0 * 398_600.0f64 / 7000.0).sqrt(), 12.0] {
        let orbit = OrbitData::from_state_vectors(
            Vector3d::new(7000.0, 0.0, 0.0),
            Vector3d::new(0.0, speed, 0.0),
            398_600.0,
            1.0,
        );
        assert!(orbit.regime() != Regime::Elliptic);
        let points = orbit.generate_orbit_points(9, Vector3d::zeros(), f64::INFINITY);
        assert_eq!(points.len(), 9);
        assert!(points.iter().all(|p| p.iter().all(|x| x.is_finite())));
        assert!(points[0].norm() > 1e5 * orbit.periapsis_distance);
        assert!((points[4].norm() - orbit.periapsis_distance).abs() < 1e-6);
    }
}
