//! Patched-conic switching between spheres of influence.
//!
//! While a tracked body sits inside a node's sphere of influence, that node is
//! the fixed center of the world: it is detached and pinned, and every
//! ancestor up to the root is reattached to orbit the next node inward. The
//! orbits the chain had before it was reparented are saved, and restored
//! (advanced to the current epoch) when the tracked body moves on.

use std::{collections::HashMap, mem, sync::Arc};

use color_eyre::eyre;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    bodies::SolarSystem,
    hierarchy::{Hierarchy, NodeId},
    kepler::orbits::OrbitData,
    math::Vector3d,
    time::UT,
};

/// The orbit and attractor a chain node had before it was reparented.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub orbit: OrbitData,
    pub attractor: Option<Arc<str>>,
    /// Epoch at which `orbit` was saved.
    pub epoch: UT,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoiTracker {
    tracked: Arc<str>,
    current: Option<Arc<str>>,
    /// Root to occupied node.
    chain: Vec<Arc<str>>,
    saved: HashMap<Arc<str>, SavedState>,
}

impl SoiTracker {
    pub fn new(tracked: impl Into<Arc<str>>) -> Self {
        Self {
            tracked: tracked.into(),
            current: None,
            chain: Vec::new(),
            saved: HashMap::new(),
        }
    }

    pub fn tracked(&self) -> &Arc<str> {
        &self.tracked
    }

    /// Name of the node the tracked body currently occupies.
    pub fn current(&self) -> Option<&Arc<str>> {
        self.current.as_ref()
    }

    pub fn chain(&self) -> &[Arc<str>] {
        &self.chain
    }

    pub fn saved(&self) -> &HashMap<Arc<str>, SavedState> {
        &self.saved
    }

    /// Detect the occupied node and switch to it if it changed.
    ///
    /// Returns the name of the newly occupied node after a switch. When no
    /// sphere of influence contains the tracked body nothing changes.
    pub fn update(
        &mut self,
        system: &mut SolarSystem,
        hierarchy: &Hierarchy,
        epoch: UT,
    ) -> eyre::Result<Option<Arc<str>>> {
        let position = system.world_position(&self.tracked)?;
        let Some(id) = hierarchy.detect_occupied_node(system, position)? else {
            return Ok(None);
        };
        let name = hierarchy.node(id).name.clone();
        if self.current.as_ref() == Some(&name) {
            return Ok(None);
        }
        self.transition(system, hierarchy, id, epoch)?;
        Ok(Some(name))
    }

    /// Make `node` the fixed center of the world.
    ///
    /// The tracked body keeps its world position: the new center is pinned
    /// where it was before the previous chain was restored, and the tracked
    /// body keeps its state relative to it.
    pub fn transition(
        &mut self,
        system: &mut SolarSystem,
        hierarchy: &Hierarchy,
        node: NodeId,
        epoch: UT,
    ) -> eyre::Result<()> {
        let name = hierarchy.node(node).name.clone();
        let center_position = system.world_position(&name)?;
        let center_velocity = system.world_velocity(&name)?;
        let relative_position = system.world_position(&self.tracked)? - center_position;
        let relative_velocity = system.world_velocity(&self.tracked)? - center_velocity;

        self.restore(system, epoch)?;

        let chain = hierarchy
            .chain(node)
            .into_iter()
            .map(|id| hierarchy.node(id).name.clone())
            .collect_vec();
        let states = chain
            .iter()
            .map(|name| Ok((system.world_position(name)?, system.world_velocity(name)?)))
            .collect::<eyre::Result<Vec<(Vector3d, Vector3d)>>>()?;
        for name in &chain {
            let body = system.get(name)?;
            self.saved.insert(
                name.clone(),
                SavedState {
                    orbit: body.orbit.clone(),
                    attractor: body.attractor.clone(),
                    epoch,
                },
            );
        }

        let g = system.gravitational_constant;
        for ((outer, (outer_position, outer_velocity)), (inner, (inner_position, inner_velocity))) in
            chain.iter().zip(&states).tuple_windows()
        {
            // the relative motion is the inner node's old orbit reversed, so
            // it keeps the gravity it was computed with: the outer body's
            let body = system.get_mut(outer)?;
            let mass = body.mass;
            body.attach(
                inner.clone(),
                outer_position - inner_position,
                outer_velocity - inner_velocity,
                mass,
                g,
            );
            let ma = body.orbit.mean_anomaly_from_position();
            body.orbit.set_mean_anomaly(ma);
            body.mirrored = true;
            body.propagating = true;
            debug!("SoiTracker::transition: {outer} now orbits {inner}");
        }

        let center = system.get_mut(&name)?;
        center.detach(center_position);
        center.propagating = false;
        let center_mass = center.mass;

        system.get_mut(&self.tracked)?.attach(
            name.clone(),
            relative_position,
            relative_velocity,
            center_mass,
            g,
        );

        info!(
            "[SOI] {} switched to {name} (chain: {})",
            self.tracked,
            chain.iter().join(" -> ")
        );
        self.chain = chain;
        self.current = Some(name);
        Ok(())
    }

    /// Put the saved chain back the way it was, advanced to `epoch`.
    ///
    /// The root stays where it currently is in world space.
    fn restore(&mut self, system: &mut SolarSystem, epoch: UT) -> eyre::Result<()> {
        let chain = mem::take(&mut self.chain);
        let Some(root) = chain.first() else {
            return Ok(());
        };
        let root_position = system.world_position(root)?;

        for name in &chain {
            let Some(state) = self.saved.remove(name) else {
                continue;
            };
            let body = system.get_mut(name)?;
            let mut orbit = state.orbit;
            if state.attractor.is_some() {
                orbit.propagate((epoch - state.epoch).as_seconds_f64());
            }
            body.orbit = orbit;
            body.attractor = state.attractor;
            body.mirrored = false;
            body.propagating = true;
            if body.attractor.is_none() {
                body.anchor = root_position;
            }
        }
        self.saved.clear();
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
fn captured() -> (SolarSystem, Hierarchy, SoiTracker) {
    let mut system = crate::hierarchy::nested_system();
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    let mut tracker = SoiTracker::new("Probe");
    let switched = tracker
        .update(&mut system, &hierarchy, UT::default())
        .unwrap();
    assert_eq!(switched.as_deref(), Some("Moon"));
    (system, hierarchy, tracker)
}

#[test]
fn capture_inverts_the_chain() {
    let system = crate::hierarchy::nested_system();
    let before = system.world_position("Probe").unwrap();
    let moon_before = system.world_position("Moon").unwrap();

    let (system, _, tracker) = captured();
    assert!((system.world_position("Probe").unwrap() - before).norm() < 1e-6);
    assert!((system.world_position("Moon").unwrap() - moon_before).norm() < 1e-6);

    let moon = system.get("Moon").unwrap();
    assert!(moon.attractor.is_none());
    assert!(!moon.propagating);
    assert_eq!(system.get("Planet").unwrap().attractor.as_deref(), Some("Moon"));
    assert_eq!(system.get("Star").unwrap().attractor.as_deref(), Some("Planet"));
    assert!(system.get("Star").unwrap().propagating);
    assert!(system.get("Planet").unwrap().mirrored);
    assert!(!system.get("Probe").unwrap().mirrored);
    assert_eq!(system.get("Probe").unwrap().attractor.as_deref(), Some("Moon"));
    assert_eq!(tracker.current().map(|n| &**n), Some("Moon"));
    assert_eq!(tracker.chain().len(), 3);
    assert_eq!(tracker.saved().len(), 3);
}

#[test]
fn saved_chain_keeps_the_tree_shape() {
    let (system, hierarchy, tracker) = captured();
    let rebuilt = Hierarchy::build(&system, Some("Probe"), tracker.saved()).unwrap();
    assert_eq!(rebuilt, hierarchy);
}

#[test]
fn same_node_does_not_switch() {
    let (mut system, hierarchy, mut tracker) = captured();
    let switched = tracker
        .update(&mut system, &hierarchy, UT::new_seconds(10.0))
        .unwrap();
    assert!(switched.is_none());
}

#[test]
fn no_containing_node_keeps_attractor() {
    let mut system = crate::hierarchy::nested_system();
    let mut tracker = SoiTracker::new("Probe");
    let switched = tracker
        .update(&mut system, &Hierarchy::default(), UT::default())
        .unwrap();
    assert!(switched.is_none());
    assert_eq!(system.get("Probe").unwrap().attractor.as_deref(), Some("Moon"));
    assert!(tracker.current().is_none());
}

#[test]
fn leaving_restores_the_previous_chain() {
    let (mut system, hierarchy, mut tracker) = captured();
    let moon_saved = tracker.saved()["Moon"].orbit.clone();

    // 100 000 km from the planet, well outside the moon
    system.get_mut("Probe").unwrap().orbit = OrbitData::from_state_vectors(
        Vector3d::new(-400_000.0, 0.0, 0.0),
        Vector3d::new(0.0, 0.5, 0.0),
        1.0,
        1.0,
    );
    let before = system.world_position("Probe").unwrap();
    let epoch = UT::new_seconds(1000.0);
    let switched = tracker.update(&mut system, &hierarchy, epoch).unwrap();
    assert_eq!(switched.as_deref(), Some("Planet"));
    assert!((system.world_position("Probe").unwrap() - before).norm() < 1e-6);

    let moon = system.get("Moon").unwrap();
    assert_eq!(moon.attractor.as_deref(), Some("Planet"));
    assert!(moon.propagating);
    let mut expected = moon_saved;
    expected.propagate(1000.0);
    assert!((moon.orbit.mean_anomaly - expected.mean_anomaly).abs() < 1e-12);
    assert!((moon.orbit.position - expected.position).norm() < 1e-6);

    assert!(system.get("Planet").unwrap().attractor.is_none());
    assert_eq!(system.get("Star").unwrap().attractor.as_deref(), Some("Planet"));
    assert_eq!(tracker.chain().len(), 2);
    assert!(!tracker.saved().contains_key("Moon"));
}

#[test]
fn reversed_chain_keeps_its_orbits() {
    let (mut system, _, _) = captured();
    let planet = system.get("Planet").unwrap();
    assert!((planet.orbit.mu - 1e5).abs() < 1e-9);
    assert!(planet.orbit.eccentricity < 1e-9);
    assert!((system.get("Star").unwrap().orbit.mu - 1e10).abs() < 1e-3);
    assert_eq!(system.refresh_orbits(), 0);

    let separation = |system: &SolarSystem| {
        (system.world_position("Planet").unwrap() - system.world_position("Moon").unwrap()).norm()
    };
    assert!((separation(&system) - 500_000.0).abs() < 1e-3);
    for _ in 0..100 {
        system.propagate(10_000.0);
        assert_eq!(system.refresh_orbits(), 0);
        assert!((separation(&system) - 500_000.0).abs() < 1e-3);
    }
    let star = (system.world_position("Star").unwrap() - system.world_position("Planet").unwrap()).norm();
    assert!((star - 5e7).abs() < 1.0);
}
