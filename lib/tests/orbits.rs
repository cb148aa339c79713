use rand::{rngs::StdRng, Rng, SeedableRng};
use soisim::{
    kepler::{
        anomaly::Regime,
        elements::OrbitalElements,
        orbits::OrbitData,
    },
    math::{wrap_pi, Vector3d, Vector3dExt},
};

const MU: f64 = 398_600.0;

fn random_unit(rng: &mut StdRng) -> Vector3d {
    loop {
        let v = Vector3d::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if let Some(unit) = v.checked_unit(0.1) {
            return unit;
        }
    }
}

/// A state on an orbit of eccentricity `e` and periapsis distance `q` in a
/// random plane, `time` seconds after periapsis.
fn sample_state(rng: &mut StdRng, e: f64, q: f64, time: f64) -> (Vector3d, Vector3d) {
    let pe_dir = random_unit(rng);
    let motion = pe_dir.cross(&random_unit(rng)).unit_or_zero();
    let speed = (MU * (1.0 + e) / q).sqrt();
    let mut orbit = OrbitData::from_state_vectors(pe_dir * q, motion * speed, MU, 1.0);
    orbit.propagate(time);
    (orbit.position, orbit.velocity)
}

fn relative_error(a: Vector3d, b: Vector3d) -> f64 {
    (a - b).norm() / b.norm()
}

#[test]
fn vectors_elements_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5015);
    for e in [0.0, 0.3, 0.8, 0.99, 1.0, 1.5] {
        for _ in 0..20 {
            let time = rng.gen_range(-3000.0..3000.0);
            let q = rng.gen_range(6500.0..40_000.0);
            let (position, velocity) = sample_state(&mut rng, e, q, time);

            let from_vectors = OrbitData::from_state_vectors(position, velocity, MU, 1.0);
            assert!(from_vectors.is_valid());
            let elements = from_vectors.elements();
            let from_elements = OrbitData::from_elements(&elements, MU, 1.0);

            assert!(
                relative_error(from_elements.position, position) < 1e-6,
                "e={e}: {elements:?}\n{} vs {position}",
                from_elements.position
            );
            assert!(
                relative_error(from_elements.velocity, velocity) < 1e-6,
                "e={e}: {elements:?}\n{} vs {velocity}",
                from_elements.velocity
            );
        }
    }
}

#[test]
fn regimes_of_sampled_states() {
    let mut rng = StdRng::seed_from_u64(7);
    for (e, regime) in [
        (0.3, Regime::Elliptic),
        (1.0, Regime::Parabolic),
        (1.5, Regime::Hyperbolic),
    ] {
        let (position, velocity) = sample_state(&mut rng, e, 7000.0, 0.0);
        let orbit = OrbitData::from_state_vectors(position, velocity, MU, 1.0);
        assert_eq!(orbit.regime(), regime);
        assert!((orbit.eccentricity - e).abs() < 1e-9);
        assert!((orbit.periapsis_distance - 7000.0).abs() < 1e-6);
    }
}

#[test]
fn propagation_conserves_energy_and_momentum() {
    let mut orbit = OrbitData::from_state_vectors(
        Vector3d::new(8000.0, -1500.0, 900.0),
        Vector3d::new(1.2, 7.9, -0.8),
        MU,
        1.0,
    );
    assert_eq!(orbit.regime(), Regime::Elliptic);
    let energy = orbit.specific_energy();
    let momentum = orbit.specific_angular_momentum().norm();
    for _ in 0..1000 {
        orbit.propagate(37.0);
        assert!((orbit.specific_energy() - energy).abs() < 1e-9 * energy.abs());
        assert!(
            (orbit.specific_angular_momentum().norm() - momentum).abs() < 1e-9 * momentum
        );
    }
}

#[test]
fn one_period_returns_to_start() {
    let mut orbit = OrbitData::from_state_vectors(
        Vector3d::new(-6000.0, 4000.0, 2000.0),
        Vector3d::new(-5.0, -6.0, 1.5),
        MU,
        1.0,
    );
    assert!(orbit.is_valid());
    let start = orbit.clone();
    orbit.propagate(orbit.period);
    assert!(wrap_pi(orbit.mean_anomaly - start.mean_anomaly).abs() < 1e-9);
    assert!((orbit.position - start.position).norm() < 1e-6);
    assert!((orbit.velocity - start.velocity).norm() < 1e-9);
}

#[test]
fn circular_orbit_scenario() {
    let orbit = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 7.546, 0.0),
        MU,
        1.0,
    );
    assert!(orbit.eccentricity < 1e-3);
    assert!((orbit.semi_major_axis - 7000.0).abs() < 1.0);
    assert!((orbit.period - 5828.0).abs() < 2.0);
    assert!((orbit.mean_motion * orbit.period - std::f64::consts::TAU).abs() < 1e-12);
}

#[test]
fn hyperbolic_flyby_scenario() {
    let elements = OrbitalElements {
        eccentricity: 1.5,
        semi_major_axis: -5000.0,
        mean_anomaly: 0.0,
        inclination: 12.0,
        argument_of_periapsis: 30.0,
        longitude_of_ascending_node: 140.0,
    };
    let orbit = OrbitData::from_elements(&elements, MU, 1.0);
    assert!(orbit.is_valid());
    assert_eq!(orbit.period, f64::INFINITY);
    assert_eq!(orbit.apoapsis_distance, f64::INFINITY);
    assert!(orbit.periapsis_distance.is_finite());
    assert!(orbit.periapsis_distance > 0.0);
    assert!((orbit.position.norm() - orbit.periapsis_distance).abs() < 1e-9);
}

#[test]
fn sampled_points_lie_on_the_conic() {
    let mut rng = StdRng::seed_from_u64(42);
    for e in [0.2, 0.9, 1.0, 2.5] {
        let (position, velocity) = sample_state(&mut rng, e, 9000.0, 0.0);
        let orbit = OrbitData::from_state_vectors(position, velocity, MU, 1.0);
        let points = orbit.generate_orbit_points(50, Vector3d::zeros(), 200_000.0);
        assert_eq!(points.len(), 50);
        for point in points {
            // r (1 + e cos ν) = p
            let cos_ta = point.dot(&orbit.semi_major_axis_basis) / point.norm();
            let p = point.norm() * (1.0 + orbit.eccentricity * cos_ta);
            assert!(
                (p - orbit.focal_parameter).abs() < 1e-6 * orbit.focal_parameter,
                "e={e}: {p} vs {}",
                orbit.focal_parameter
            );
            assert!(point.dot(&orbit.orbit_normal).abs() < 1e-6 * point.norm());
        }
    }
}
