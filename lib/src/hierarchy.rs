//! The tree of attractors and their spheres of influence.

use std::{collections::HashMap, sync::Arc};

use color_eyre::eyre::{self, bail};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    arena::{Arena, IdLike},
    bodies::SolarSystem,
    math::Vector3d,
    soi::SavedState,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl IdLike for NodeId {
    fn from_raw(index: usize) -> Self {
        Self(index)
    }

    fn into_raw(self) -> usize {
        self.0
    }
}

/// One gravity well.
#[derive(Clone, Debug, PartialEq)]
pub struct AttractorNode {
    pub name: Arc<str>,
    /// `a (m/M)^0.4`, or `+∞` for roots.
    pub soi_radius: f64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Sphere-of-influence radius of a body of mass `mass` on an orbit with
/// semi-major axis `semi_major_axis` around a body of mass `parent_mass`.
///
/// Orbits without a finite semi-major axis have no sphere of influence.
pub fn soi_radius(semi_major_axis: f64, mass: f64, parent_mass: f64) -> f64 {
    let a = semi_major_axis.abs();
    if !a.is_finite() || mass <= 0.0 || parent_mass <= 0.0 {
        return 0.0;
    }
    a * libm::pow(mass / parent_mass, 0.4)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hierarchy {
    nodes: Arena<NodeId, AttractorNode>,
    by_name: HashMap<Arc<str>, NodeId>,
    roots: Vec<NodeId>,
}

impl Hierarchy {
    /// Build the tree from every body of `system` except `exclude`.
    ///
    /// Bodies listed in `saved` are placed by their saved attractor and orbit
    /// rather than the current ones, so that a chain reparented by a
    /// transition keeps its original shape. Bodies whose attractor is not a
    /// node become roots.
    pub fn build(
        system: &SolarSystem,
        exclude: Option<&str>,
        saved: &HashMap<Arc<str>, SavedState>,
    ) -> eyre::Result<Self> {
        let mut hierarchy = Hierarchy::default();
        let names = system
            .sorted_names()
            .into_iter()
            .filter(|name| Some(&**name) != exclude)
            .collect::<Vec<_>>();

        for name in &names {
            let id = hierarchy.nodes.push(AttractorNode {
                name: name.clone(),
                soi_radius: f64::INFINITY,
                parent: None,
                children: Vec::new(),
            });
            hierarchy.by_name.insert(name.clone(), id);
        }

        for name in &names {
            let id = hierarchy.by_name[name];
            let body = system.get(name)?;
            let (attractor, orbit) = match saved.get(name) {
                Some(state) => (state.attractor.as_ref(), &state.orbit),
                None => (body.attractor.as_ref(), &body.orbit),
            };
            let Some(attractor) = attractor else {
                hierarchy.roots.push(id);
                continue;
            };
            let Some(&parent) = hierarchy.by_name.get(attractor) else {
                warn!("Hierarchy::build: attractor {attractor} of {name} is not a node");
                hierarchy.roots.push(id);
                continue;
            };
            let parent_mass = system.get(attractor)?.mass;
            hierarchy.nodes[id].parent = Some(parent);
            hierarchy.nodes[id].soi_radius =
                soi_radius(orbit.semi_major_axis, body.mass, parent_mass);
            hierarchy.nodes[parent].children.push(id);
        }

        for id in hierarchy.nodes.ids() {
            let mut cur = id;
            let mut depth = 0;
            while let Some(parent) = hierarchy.nodes[cur].parent {
                depth += 1;
                if depth > hierarchy.nodes.len() {
                    bail!("Attractor cycle through {}", hierarchy.nodes[id].name);
                }
                cur = parent;
            }
        }

        info!(
            "Hierarchy::build: {} nodes, {} roots",
            hierarchy.nodes.len(),
            hierarchy.roots.len()
        );
        Ok(hierarchy)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &AttractorNode {
        &self.nodes[id]
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AttractorNode)> {
        self.nodes.iter()
    }

    /// Node ids from the root down to `id` (inclusive).
    pub fn chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(parent) = self.nodes[cur].parent {
            chain.push(parent);
            cur = parent;
        }
        chain.reverse();
        chain
    }

    /// The node whose sphere of influence contains `position` and whose
    /// center is closest to it. Ties go to the smaller sphere.
    pub fn detect_occupied_node(
        &self,
        system: &SolarSystem,
        position: Vector3d,
    ) -> eyre::Result<Option<NodeId>> {
        let mut best: Option<(OrderedFloat<f64>, OrderedFloat<f64>, NodeId)> = None;
        for (id, node) in self.nodes.iter() {
            let distance = (system.world_position(&node.name)? - position).norm();
            if distance > node.soi_radius {
                continue;
            }
            let key = (OrderedFloat(distance), OrderedFloat(node.soi_radius), id);
            if best.map_or(true, |best| key < best) {
                best = Some(key);
            }
        }
        Ok(best.map(|(_, _, id)| id))
    }
}

#[cfg(test)]
pub(crate) fn nested_system() -> SolarSystem {
    use crate::bodies::Body;
    use crate::kepler::orbits::OrbitData;

    // m/M = 1e-5 at both levels, so the SOI is a / 100
    let mut system = SolarSystem::new(1.0);
    system.insert(Body::fixed("Star", 1e10, Vector3d::zeros()));
    let planet_orbit = OrbitData::from_state_vectors(
        Vector3d::new(5e7, 0.0, 0.0),
        Vector3d::new(0.0, (1e10f64 / 5e7).sqrt(), 0.0),
        1e10,
        1.0,
    );
    system.insert(Body::orbiting("Planet", 1e5, "Star", planet_orbit));
    let moon_orbit = OrbitData::from_state_vectors(
        Vector3d::new(5e5, 0.0, 0.0),
        Vector3d::new(0.0, (1e5f64 / 5e5).sqrt(), 0.0),
        1e5,
        1.0,
    );
    system.insert(Body::orbiting("Moon", 1.0, "Planet", moon_orbit));
    let probe_orbit = OrbitData::from_state_vectors(
        Vector3d::new(0.0, 4000.0, 0.0),
        Vector3d::new(-0.01, 0.0, 0.0),
        1.0,
        1.0,
    );
    system.insert(Body::orbiting("Probe", 1e-3, "Moon", probe_orbit));
    system
}

#[test]
fn tree_shape_and_radii() {
    let system = nested_system();
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    assert_eq!(hierarchy.len(), 3);
    assert!(hierarchy.find("Probe").is_none());

    let star = hierarchy.find("Star").unwrap();
    let planet = hierarchy.find("Planet").unwrap();
    let moon = hierarchy.find("Moon").unwrap();
    assert_eq!(hierarchy.roots(), &[star]);
    assert_eq!(hierarchy.node(star).soi_radius, f64::INFINITY);
    assert!((hierarchy.node(planet).soi_radius - 500_000.0).abs() < 1e-3);
    assert!((hierarchy.node(moon).soi_radius - 5000.0).abs() < 1e-5);
    assert_eq!(hierarchy.node(planet).children, vec![moon]);
    assert_eq!(hierarchy.chain(moon), vec![star, planet, moon]);
}

#[test]
fn innermost_well_wins() {
    let system = nested_system();
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    let probe = system.world_position("Probe").unwrap();
    let occupied = hierarchy.detect_occupied_node(&system, probe).unwrap();
    assert_eq!(occupied, hierarchy.find("Moon"));

    let planet = system.world_position("Planet").unwrap();
    let near_planet = planet + Vector3d::new(0.0, -100_000.0, 0.0);
    let occupied = hierarchy.detect_occupied_node(&system, near_planet).unwrap();
    assert_eq!(occupied, hierarchy.find("Planet"));

    let far = Vector3d::new(-1e9, 0.0, 0.0);
    let occupied = hierarchy.detect_occupied_node(&system, far).unwrap();
    assert_eq!(occupied, hierarchy.find("Star"));
}

#[test]
fn dangling_attractor_becomes_root() {
    let mut system = nested_system();
    system.bodies.remove("Star");
    let hierarchy = Hierarchy::build(&system, Some("Probe"), &HashMap::new()).unwrap();
    // the planet's attractor is gone, so it is a root with an unbounded SOI
    let planet = hierarchy.find("Planet").unwrap();
    assert_eq!(hierarchy.roots(), &[planet]);
    assert_eq!(hierarchy.node(planet).soi_radius, f64::INFINITY);
}

#[test]
fn open_orbits_have_no_soi() {
    assert_eq!(soi_radius(f64::INFINITY, 1.0, 10.0), 0.0);
    assert!((soi_radius(-1000.0, 1.0, 1e5) - 10.0).abs() < 1e-9);
}
