//! Bodies of a simulated system.

use std::{collections::HashMap, sync::Arc};

use color_eyre::eyre::{self, bail};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    kepler::{elements::OrbitalElements, orbits::OrbitData},
    math::Vector3d,
};

/// A body: either orbiting an attractor, or fixed at an anchor point in
/// world space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: Arc<str>,
    pub mass: f64,
    /// Name of the body this one orbits, if any.
    pub attractor: Option<Arc<str>>,
    /// Orbit relative to [`attractor`](Self::attractor). Meaningless for
    /// unattached bodies.
    pub orbit: OrbitData,
    /// World position of an unattached body.
    pub anchor: Vector3d,
    /// Whether the orbit is advanced on each tick.
    pub propagating: bool,
    /// The orbit is the attractor's orbit around this body seen from the
    /// other end, so its `μ` comes from this body's own mass.
    #[serde(default)]
    pub mirrored: bool,
}

impl Body {
    pub fn fixed(name: impl Into<Arc<str>>, mass: f64, anchor: Vector3d) -> Self {
        Self {
            name: name.into(),
            mass,
            attractor: None,
            orbit: OrbitData::default(),
            anchor,
            propagating: false,
            mirrored: false,
        }
    }

    pub fn orbiting(
        name: impl Into<Arc<str>>,
        mass: f64,
        attractor: impl Into<Arc<str>>,
        orbit: OrbitData,
    ) -> Self {
        Self {
            name: name.into(),
            mass,
            attractor: Some(attractor.into()),
            orbit,
            anchor: Vector3d::zeros(),
            propagating: true,
            mirrored: false,
        }
    }

    /// Attach to `attractor` with the given state relative to it.
    pub fn attach(
        &mut self,
        attractor: Arc<str>,
        relative_position: Vector3d,
        relative_velocity: Vector3d,
        attractor_mass: f64,
        gravitational_constant: f64,
    ) {
        self.attractor = Some(attractor);
        self.mirrored = false;
        self.orbit = OrbitData::from_state_vectors(
            relative_position,
            relative_velocity,
            attractor_mass,
            gravitational_constant,
        );
    }

    /// Detach and pin the body at `anchor`.
    pub fn detach(&mut self, anchor: Vector3d) {
        self.attractor = None;
        self.mirrored = false;
        self.anchor = anchor;
    }
}

/// How a body described in a scenario starts out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BodyInit {
    Elements(OrbitalElements),
    Vectors { position: [f64; 3], velocity: [f64; 3] },
    Fixed { anchor: [f64; 3] },
}

/// A body as described in a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub attractor: Option<String>,
    pub init: BodyInit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolarSystem {
    pub gravitational_constant: f64,
    pub bodies: HashMap<Arc<str>, Body>,
}

impl SolarSystem {
    pub fn new(gravitational_constant: f64) -> Self {
        Self {
            gravitational_constant,
            bodies: HashMap::new(),
        }
    }

    /// Build a system from scenario descriptions.
    ///
    /// Every attractor reference must name another configured body, and
    /// only unattached bodies may be [`BodyInit::Fixed`].
    pub fn from_configs(gravitational_constant: f64, configs: &[BodyConfig]) -> eyre::Result<Self> {
        let masses: HashMap<&str, f64> = configs.iter().map(|c| (&*c.name, c.mass)).collect();
        if masses.len() != configs.len() {
            bail!("Duplicate body names in scenario");
        }

        let attractor_mass = |config: &BodyConfig, attractor: &str| {
            masses.get(attractor).copied().ok_or_else(|| {
                eyre::eyre!("Unknown attractor {attractor} for body {}", config.name)
            })
        };

        let mut system = Self::new(gravitational_constant);
        for config in configs {
            let body = match (config.attractor.as_deref(), &config.init) {
                (None, BodyInit::Fixed { anchor }) => {
                    Body::fixed(&*config.name, config.mass, Vector3d::from(*anchor))
                }
                (None, _) => bail!("Body {} has an initial orbit but no attractor", config.name),
                (Some(attractor), BodyInit::Fixed { .. }) => {
                    bail!("Body {} is fixed but has attractor {attractor}", config.name)
                }
                (Some(attractor), BodyInit::Elements(elements)) => {
                    let orbit = OrbitData::from_elements(
                        elements,
                        attractor_mass(config, attractor)?,
                        gravitational_constant,
                    );
                    Body::orbiting(&*config.name, config.mass, attractor, orbit)
                }
                (Some(attractor), BodyInit::Vectors { position, velocity }) => {
                    let orbit = OrbitData::from_state_vectors(
                        Vector3d::from(*position),
                        Vector3d::from(*velocity),
                        attractor_mass(config, attractor)?,
                        gravitational_constant,
                    );
                    Body::orbiting(&*config.name, config.mass, attractor, orbit)
                }
            };
            system.insert(body);
        }
        // reject cycles up front; world positions would never resolve
        for name in system.sorted_names() {
            system.world_position(&name)?;
        }
        Ok(system)
    }

    pub fn insert(&mut self, body: Body) {
        self.bodies.insert(body.name.clone(), body);
    }

    pub fn get(&self, name: &str) -> eyre::Result<&Body> {
        self.bodies
            .get(name)
            .ok_or_else(|| eyre::eyre!("Unknown body {name}"))
    }

    pub fn get_mut(&mut self, name: &str) -> eyre::Result<&mut Body> {
        self.bodies
            .get_mut(name)
            .ok_or_else(|| eyre::eyre!("Unknown body {name}"))
    }

    /// Body names in a stable (lexicographic) order.
    pub fn sorted_names(&self) -> Vec<Arc<str>> {
        self.bodies.keys().cloned().sorted().collect()
    }

    /// Mass of the attractor of `body`, if it has one that exists.
    pub fn attractor_mass(&self, body: &Body) -> Option<f64> {
        body.attractor
            .as_deref()
            .and_then(|name| self.bodies.get(name))
            .map(|attractor| attractor.mass)
    }

    /// Mass whose gravity the orbit of `body` is computed with: the
    /// attractor's, or the body's own for a mirrored orbit.
    pub fn orbit_mass(&self, body: &Body) -> Option<f64> {
        let attractor_mass = self.attractor_mass(body)?;
        Some(if body.mirrored { body.mass } else { attractor_mass })
    }

    /// Walk the attractor references from `name` up to an unattached body,
    /// calling `f` with every body on the way (including `name` itself).
    fn walk_up(&self, name: &str, mut f: impl FnMut(&Body)) -> eyre::Result<()> {
        let mut body = self.get(name)?;
        for _ in 0..=self.bodies.len() {
            f(body);
            match &body.attractor {
                Some(attractor) => {
                    body = self.bodies.get(attractor).ok_or_else(|| {
                        eyre::eyre!("Body {} refers to unknown attractor {attractor}", body.name)
                    })?;
                }
                None => return Ok(()),
            }
        }
        bail!("Attractor references starting at {name} form a cycle")
    }

    /// Position of `name` in world space.
    pub fn world_position(&self, name: &str) -> eyre::Result<Vector3d> {
        let mut position = Vector3d::zeros();
        self.walk_up(name, |body| {
            if body.attractor.is_some() {
                position += body.orbit.position;
            } else {
                position += body.anchor;
            }
        })?;
        Ok(position)
    }

    /// Velocity of `name` in world space. Unattached bodies are at rest.
    pub fn world_velocity(&self, name: &str) -> eyre::Result<Vector3d> {
        let mut velocity = Vector3d::zeros();
        self.walk_up(name, |body| {
            if body.attractor.is_some() {
                velocity += body.orbit.velocity;
            }
        })?;
        Ok(velocity)
    }

    /// Recompute, from their state vectors, the orbits whose gravitating mass
    /// (see [`orbit_mass`](Self::orbit_mass)) or gravitational constant no longer matches the system.
    ///
    /// Returns the number of orbits recomputed.
    pub fn refresh_orbits(&mut self) -> usize {
        let stale = self
            .bodies
            .values()
            .filter_map(|body| {
                let mass = self.orbit_mass(body)?;
                #[allow(clippy::float_cmp)]
                let changed = body.orbit.attractor_mass != mass
                    || body.orbit.gravitational_constant != self.gravitational_constant;
                changed.then(|| (body.name.clone(), mass))
            })
            .collect_vec();

        for (name, mass) in &stale {
            if let Some(body) = self.bodies.get_mut(name) {
                debug!(
                    "SolarSystem::refresh_orbits: recomputing {name} (M={mass}, G={})",
                    self.gravitational_constant
                );
                body.orbit.attractor_mass = *mass;
                body.orbit.gravitational_constant = self.gravitational_constant;
                body.orbit.calculate_from_vectors();
            }
        }
        stale.len()
    }

    /// Advance every propagating, attached body by `delta_t` seconds.
    pub fn propagate(&mut self, delta_t: f64) {
        for body in self.bodies.values_mut() {
            if body.propagating && body.attractor.is_some() && body.orbit.is_valid() {
                body.orbit.propagate(delta_t);
                trace!(
                    "SolarSystem::propagate: {} M={} r={}",
                    body.name,
                    body.orbit.mean_anomaly,
                    body.orbit.attractor_distance
                );
            }
        }
    }

    /// Reattach `name` to `attractor` (or detach it), keeping its world
    /// position and velocity.
    pub fn set_attractor(&mut self, name: &str, attractor: Option<Arc<str>>) -> eyre::Result<()> {
        let position = self.world_position(name)?;
        let velocity = self.world_velocity(name)?;
        match attractor {
            Some(attractor) => {
                if &*attractor == name {
                    bail!("Body {name} cannot orbit itself");
                }
                let attractor_position = self.world_position(&attractor)?;
                let attractor_velocity = self.world_velocity(&attractor)?;
                let attractor_mass = self.get(&attractor)?.mass;
                let g = self.gravitational_constant;
                let body = self.get_mut(name)?;
                let previous = (body.attractor.clone(), body.orbit.clone(), body.mirrored);
                body.attach(
                    attractor.clone(),
                    position - attractor_position,
                    velocity - attractor_velocity,
                    attractor_mass,
                    g,
                );
                if let Err(error) = self.world_position(name) {
                    // the new reference closed a loop; put the old one back
                    let body = self.get_mut(name)?;
                    (body.attractor, body.orbit, body.mirrored) = previous;
                    return Err(error);
                }
            }
            None => self.get_mut(name)?.detach(position),
        }
        Ok(())
    }

    /// Names of the bodies directly attached to `name`, sorted.
    pub fn satellites(&self, name: &str) -> Vec<Arc<str>> {
        self.bodies
            .values()
            .filter(|body| body.attractor.as_deref() == Some(name))
            .map(|body| body.name.clone())
            .sorted()
            .collect()
    }

    pub fn set_gravitational_constant(&mut self, gravitational_constant: f64) {
        self.gravitational_constant = gravitational_constant;
    }
}

#[cfg(test)]
pub(crate) fn earth_moon() -> SolarSystem {
    let configs = [
        BodyConfig {
            name: "Earth".into(),
            mass: 398_600.0,
            attractor: None,
            init: BodyInit::Fixed {
                anchor: [1e6, 0.0, 0.0],
            },
        },
        BodyConfig {
            name: "Moon".into(),
            mass: 4902.8,
            attractor: Some("Earth".into()),
            init: BodyInit::Vectors {
                position: [384_400.0, 0.0, 0.0],
                velocity: [0.0, 1.018, 0.0],
            },
        },
        BodyConfig {
            name: "Probe".into(),
            mass: 1e-9,
            attractor: Some("Moon".into()),
            init: BodyInit::Vectors {
                position: [0.0, 3000.0, 0.0],
                velocity: [-1.2, 0.0, 0.0],
            },
        },
    ];
    SolarSystem::from_configs(1.0, &configs).unwrap()
}

#[test]
fn world_state_sums_up_the_chain() {
    let system = earth_moon();
    let probe = system.world_position("Probe").unwrap();
    assert!((probe - Vector3d::new(1e6 + 384_400.0, 3000.0, 0.0)).norm() < 1e-9);
    let velocity = system.world_velocity("Probe").unwrap();
    assert!((velocity - Vector3d::new(-1.2, 1.018, 0.0)).norm() < 1e-12);
    assert_eq!(system.world_velocity("Earth").unwrap(), Vector3d::zeros());
    assert_eq!(&*system.satellites("Earth"), &[Arc::<str>::from("Moon")]);
}

#[test]
fn unknown_names_are_errors() {
    let system = earth_moon();
    assert!(system.world_position("Mars").is_err());

    let configs = [BodyConfig {
        name: "Lost".into(),
        mass: 1.0,
        attractor: Some("Nowhere".into()),
        init: BodyInit::Vectors {
            position: [1.0, 0.0, 0.0],
            velocity: [0.0, 1.0, 0.0],
        },
    }];
    assert!(SolarSystem::from_configs(1.0, &configs).is_err());
}

#[test]
fn attractor_cycles_are_rejected() {
    let mut system = earth_moon();
    let before = system.world_position("Earth").unwrap();
    assert!(system.set_attractor("Earth", Some("Probe".into())).is_err());
    assert!(system.get("Earth").unwrap().attractor.is_none());
    assert!((system.world_position("Earth").unwrap() - before).norm() < 1e-6);

    let moon = system.get("Moon").unwrap().clone();
    let probe = system.world_position("Probe").unwrap();
    assert!(system.set_attractor("Moon", Some("Probe".into())).is_err());
    assert_eq!(system.get("Moon").unwrap(), &moon);
    assert_eq!(system.world_position("Probe").unwrap(), probe);
}

#[test]
fn reattaching_keeps_world_state() {
    let mut system = earth_moon();
    let position = system.world_position("Probe").unwrap();
    let velocity = system.world_velocity("Probe").unwrap();
    system.set_attractor("Probe", Some("Earth".into())).unwrap();
    assert_eq!(system.get("Probe").unwrap().attractor.as_deref(), Some("Earth"));
    assert!((system.world_position("Probe").unwrap() - position).norm() < 1e-6);
    assert!((system.world_velocity("Probe").unwrap() - velocity).norm() < 1e-9);
    assert!((system.get("Probe").unwrap().orbit.mu - 398_600.0).abs() < 1e-9);
}

#[test]
fn changed_constants_trigger_recompute() {
    let mut system = earth_moon();
    assert_eq!(system.refresh_orbits(), 0);
    let period = system.get("Moon").unwrap().orbit.period;

    system.set_gravitational_constant(2.0);
    assert_eq!(system.refresh_orbits(), 2);
    let moon = system.get("Moon").unwrap();
    assert!((moon.orbit.mu - 2.0 * 398_600.0).abs() < 1e-6);
    assert!(moon.orbit.period < period);

    system.get_mut("Moon").unwrap().mass *= 2.0;
    assert_eq!(system.refresh_orbits(), 1);
    assert_eq!(system.refresh_orbits(), 0);
}
