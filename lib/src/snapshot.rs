//! Persisted state.
//!
//! A body is stored as its orbit, field for field, next to the name and mass
//! of the attractor it was computed against.

use std::sync::Arc;

use color_eyre::eyre::{self, bail};
use serde::{Deserialize, Serialize};

use crate::{
    bodies::{Body, SolarSystem},
    kepler::orbits::OrbitData,
    math::Vector3d,
    sim::Simulation,
    soi::SoiTracker,
    time::UT,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttractorSettings {
    pub attractor_name: Option<String>,
    pub attractor_mass: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub name: String,
    pub mass: f64,
    pub attractor: AttractorSettings,
    pub orbit: OrbitData,
    pub anchor: Vector3d,
    pub propagating: bool,
    #[serde(default)]
    pub mirrored: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub gravitational_constant: f64,
    pub epoch: UT,
    pub bodies: Vec<BodySnapshot>,
    #[serde(default)]
    pub tracker: Option<SoiTracker>,
}

impl SolarSystem {
    /// Every body, sorted by name.
    pub fn snapshot(&self) -> Vec<BodySnapshot> {
        self.sorted_names()
            .iter()
            .filter_map(|name| self.bodies.get(name))
            .map(|body| BodySnapshot {
                name: body.name.to_string(),
                mass: body.mass,
                attractor: AttractorSettings {
                    attractor_name: body.attractor.as_deref().map(str::to_owned),
                    attractor_mass: self.attractor_mass(body).unwrap_or(0.0),
                },
                orbit: body.orbit.clone(),
                anchor: body.anchor,
                propagating: body.propagating,
                mirrored: body.mirrored,
            })
            .collect()
    }

    pub fn from_snapshot(
        gravitational_constant: f64,
        bodies: &[BodySnapshot],
    ) -> eyre::Result<Self> {
        let mut system = SolarSystem::new(gravitational_constant);
        for snapshot in bodies {
            if system.bodies.contains_key(&*snapshot.name) {
                bail!("Duplicate body {} in snapshot", snapshot.name);
            }
            system.insert(Body {
                name: Arc::from(&*snapshot.name),
                mass: snapshot.mass,
                attractor: snapshot.attractor.attractor_name.as_deref().map(Arc::from),
                orbit: snapshot.orbit.clone(),
                anchor: snapshot.anchor,
                propagating: snapshot.propagating,
                mirrored: snapshot.mirrored,
            });
        }
        for name in system.sorted_names() {
            system.world_position(&name)?;
        }
        Ok(system)
    }
}

impl Simulation {
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            gravitational_constant: self.system().gravitational_constant,
            epoch: self.epoch(),
            bodies: self.system().snapshot(),
            tracker: self.tracker().cloned(),
        }
    }

    /// Replace the whole state with `snapshot`. Listeners and time warp are
    /// kept.
    pub fn restore(&mut self, snapshot: &SystemSnapshot) -> eyre::Result<()> {
        let system =
            SolarSystem::from_snapshot(snapshot.gravitational_constant, &snapshot.bodies)?;
        if let Some(tracker) = &snapshot.tracker {
            system.get(tracker.tracked())?;
        }
        self.restore_parts(system, snapshot.tracker.clone(), snapshot.epoch);
        Ok(())
    }
}

#[cfg(test)]
fn sim() -> Simulation {
    let settings = crate::sim::SimulationSettings {
        gravitational_constant: 1.0,
        ..Default::default()
    };
    Simulation::new(crate::bodies::earth_moon(), &settings).unwrap()
}

#[test]
fn snapshot_keeps_attractor_settings() {
    let sim = sim();
    let snapshot = sim.snapshot();
    let names = snapshot.bodies.iter().map(|b| &*b.name).collect::<Vec<_>>();
    assert_eq!(names, ["Earth", "Moon", "Probe"]);
    let probe = &snapshot.bodies[2];
    assert_eq!(probe.attractor.attractor_name.as_deref(), Some("Moon"));
    assert_eq!(probe.attractor.attractor_mass, 4902.8);
    assert_eq!(snapshot.bodies[0].attractor.attractor_name, None);
}

#[test]
fn restore_returns_to_the_saved_state() {
    let mut sim = sim();
    sim.track("Probe").unwrap();
    sim.tick(100.0).unwrap();
    let snapshot = sim.snapshot();
    let position = sim.system().world_position("Probe").unwrap();

    sim.tick(5000.0).unwrap();
    assert!((sim.system().world_position("Probe").unwrap() - position).norm() > 1.0);

    let earth = snapshot.bodies.iter().find(|b| b.name == "Earth").unwrap();
    assert!(earth.mirrored);

    sim.restore(&snapshot).unwrap();
    assert_eq!(sim.epoch(), snapshot.epoch);
    assert_eq!(sim.snapshot(), snapshot);
    assert!((sim.system().world_position("Probe").unwrap() - position).norm() < 1e-9);
    assert_eq!(sim.tracker().unwrap().current().map(|n| &**n), Some("Moon"));
}

#[test]
fn snapshot_survives_ron() {
    let mut sim = sim();
    sim.tick(250.0).unwrap();
    let snapshot = sim.snapshot();
    let text = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default()).unwrap();
    let back: SystemSnapshot = ron::from_str(&text).unwrap();
    assert_eq!(back, snapshot);

    let restored = SolarSystem::from_snapshot(back.gravitational_constant, &back.bodies).unwrap();
    assert_eq!(&restored, sim.system());
}

#[test]
fn dangling_attractor_is_rejected() {
    let mut snapshot = sim().snapshot();
    snapshot.bodies.retain(|body| body.name != "Moon");
    assert!(SolarSystem::from_snapshot(1.0, &snapshot.bodies).is_err());
}
