use std::collections::HashMap;

use soisim::{
    bodies::{Body, SolarSystem},
    hierarchy::Hierarchy,
    kepler::orbits::OrbitData,
    math::Vector3d,
    soi::SoiTracker,
    time::UT,
};

fn circular(distance: f64, parent_mass: f64) -> OrbitData {
    OrbitData::from_state_vectors(
        Vector3d::new(distance, 0.0, 0.0),
        Vector3d::new(0.0, (parent_mass / distance).sqrt(), 0.0),
        parent_mass,
        1.0,
    )
}

#[test]
fn nested_spheres_prefer_the_closest_center() {
    // planet SOI 500 000, moon SOI 5000; the probe sits 4000 from the moon
    // and 100 000 from the planet
    let star_mass: f64 = 1e10;
    let planet_mass: f64 = 1e5;
    let planet_distance = 500_000.0 / (planet_mass / star_mass).powf(0.4);
    let moon_distance: f64 = 104_000.0;
    let moon_mass = planet_mass * (5000.0 / moon_distance).powf(2.5);

    let mut system = SolarSystem::new(1.0);
    system.insert(Body::fixed("Star", star_mass, Vector3d::zeros()));
    system.insert(Body::orbiting(
        "Planet",
        planet_mass,
        "Star",
        circular(planet_distance, star_mass),
    ));
    system.insert(Body::orbiting(
        "Moon",
        moon_mass,
        "Planet",
        circular(moon_distance, planet_mass),
    ));
    system.insert(Body::orbiting(
        "Probe",
        1e-9,
        "Planet",
        circular(100_000.0, planet_mass),
    ));

    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    let planet = hierarchy.find("Planet").unwrap();
    let moon = hierarchy.find("Moon").unwrap();
    assert!((hierarchy.node(planet).soi_radius - 500_000.0).abs() < 1e-3);
    assert!((hierarchy.node(moon).soi_radius - 5000.0).abs() < 1e-6);

    let probe = system.world_position("Probe").unwrap();
    assert!(((probe - system.world_position("Moon").unwrap()).norm() - 4000.0).abs() < 1e-6);
    assert!(((probe - system.world_position("Planet").unwrap()).norm() - 100_000.0).abs() < 1e-6);
    assert_eq!(hierarchy.detect_occupied_node(&system, probe).unwrap(), Some(moon));
}

/// A probe on an escape trajectory from a small moon of a planet.
fn escaping_probe() -> SolarSystem {
    let mut system = SolarSystem::new(1.0);
    system.insert(Body::fixed("Star", 1e10, Vector3d::zeros()));
    system.insert(Body::orbiting("Planet", 1e5, "Star", circular(5e7, 1e10)));
    system.insert(Body::orbiting("Moon", 1.0, "Planet", circular(2e5, 1e5)));
    let escape = OrbitData::from_state_vectors(
        Vector3d::new(500.0, 0.0, 0.0),
        Vector3d::new(0.0, 0.1, 0.0),
        1.0,
        1.0,
    );
    system.insert(Body::orbiting("Probe", 1e-6, "Moon", escape));
    system
}

#[test]
fn world_position_is_continuous_across_switches() {
    let mut system = escaping_probe();
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    let mut tracker = SoiTracker::new("Probe");

    let dt = 100.0;
    let mut switches = Vec::new();
    for step in 0..1000 {
        if step > 0 {
            system.propagate(dt);
        }
        let epoch = UT::new_seconds(step as f64 * dt);
        let before = system.world_position("Probe").unwrap();
        if let Some(node) = tracker.update(&mut system, &hierarchy, epoch).unwrap() {
            let after = system.world_position("Probe").unwrap();
            assert!(
                (after - before).norm() < 1e-6,
                "jump of {} switching to {node}",
                (after - before).norm()
            );
            switches.push(node.to_string());
        }
    }

    assert_eq!(switches, ["Moon", "Planet"]);
    let probe = system.get("Probe").unwrap();
    assert_eq!(probe.attractor.as_deref(), Some("Planet"));
    assert!(system.get("Planet").unwrap().attractor.is_none());
    assert_eq!(
        system.get("Star").unwrap().attractor.as_deref(),
        Some("Planet")
    );
    assert_eq!(system.get("Moon").unwrap().attractor.as_deref(), Some("Planet"));
}

#[test]
fn occupied_center_stays_put() {
    let mut system = escaping_probe();
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    let mut tracker = SoiTracker::new("Probe");
    let switched = tracker.update(&mut system, &hierarchy, UT::default()).unwrap();
    assert_eq!(switched.as_deref(), Some("Moon"));

    let moon = system.world_position("Moon").unwrap();
    for _ in 0..10 {
        system.propagate(50.0);
        assert_eq!(system.world_position("Moon").unwrap(), moon);
    }
    assert_eq!(tracker.chain().len(), 3);
}
