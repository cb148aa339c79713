//! The simulation context: one system, its attractor hierarchy, an optional
//! tracked body, the epoch and the time warp, advanced by the host one
//! [`tick`](Simulation::tick) at a time.

use std::{collections::HashMap, fmt, sync::Arc};

use color_eyre::eyre::{self, bail, OptionExt};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, info};

use crate::{
    bodies::SolarSystem,
    hierarchy::Hierarchy,
    maneuver::Impulse,
    math::Vector3d,
    soi::SoiTracker,
    time::{TimeWarp, DEFAULT_WARP_INDEX, DEFAULT_WARP_LEVELS, UT},
};

/// SI value of the gravitational constant (`m^3 kg^-1 s^-2`).
pub const GRAVITATIONAL_CONSTANT_SI: f64 = 6.6743e-11;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub gravitational_constant: f64,
    pub warp_levels: Vec<f64>,
    pub warp_index: usize,
    /// Host seconds taken to ramp between warp levels.
    pub warp_ramp_seconds: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            gravitational_constant: GRAVITATIONAL_CONSTANT_SI,
            warp_levels: DEFAULT_WARP_LEVELS.to_vec(),
            warp_index: DEFAULT_WARP_INDEX,
            warp_ramp_seconds: 1.0,
        }
    }
}

/// Something listeners are told about.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    TimeScaleChanged(f64),
    GravitationalConstantChanged(f64),
    /// The epoch was set directly; `delta` is in seconds.
    EpochChanged { epoch: UT, delta: f64 },
    HierarchyRebuilt { nodes: usize },
    SoiChanged { body: Arc<str>, node: Arc<str> },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&SimEvent)>;

pub struct Simulation {
    system: SolarSystem,
    hierarchy: Hierarchy,
    hierarchy_dirty: bool,
    tracker: Option<SoiTracker>,
    warp: TimeWarp,
    epoch: UT,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("system", &self.system)
            .field("hierarchy", &self.hierarchy)
            .field("tracker", &self.tracker)
            .field("warp", &self.warp)
            .field("epoch", &self.epoch)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// `settings.gravitational_constant` replaces the one `system` carries;
    /// orbits computed with another value are recomputed.
    pub fn new(mut system: SolarSystem, settings: &SimulationSettings) -> eyre::Result<Self> {
        let warp = TimeWarp::new(
            settings.warp_levels.clone(),
            settings.warp_index,
            settings.warp_ramp_seconds,
        )?;
        system.set_gravitational_constant(settings.gravitational_constant);
        system.refresh_orbits();
        Ok(Self {
            system,
            hierarchy: Hierarchy::default(),
            hierarchy_dirty: true,
            tracker: None,
            warp,
            epoch: UT::default(),
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    /// Track `body` across spheres of influence.
    pub fn track(&mut self, body: &str) -> eyre::Result<()> {
        if self.tracker.is_some() {
            bail!("Already tracking a body");
        }
        let body = self.system.get(body)?.name.clone();
        self.tracker = Some(SoiTracker::new(body));
        self.hierarchy_dirty = true;
        Ok(())
    }

    pub fn system(&self) -> &SolarSystem {
        &self.system
    }

    /// Mutable access to the system. The hierarchy is rebuilt on the next
    /// tick.
    pub fn system_mut(&mut self) -> &mut SolarSystem {
        self.hierarchy_dirty = true;
        &mut self.system
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn tracker(&self) -> Option<&SoiTracker> {
        self.tracker.as_ref()
    }

    pub fn warp(&self) -> &TimeWarp {
        &self.warp
    }

    pub fn epoch(&self) -> UT {
        self.epoch
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SimEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether the listener was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != len
    }

    fn emit(&mut self, event: &SimEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// Advance by `real_dt` seconds of host time, scaled by the time warp.
    ///
    /// Returns the simulated time step.
    pub fn tick(&mut self, real_dt: f64) -> eyre::Result<f64> {
        if let Some(scale) = self.warp.advance(real_dt) {
            self.emit(&SimEvent::TimeScaleChanged(scale));
        }
        let dt = real_dt * self.warp.scale();
        let step = Duration::checked_seconds_f64(dt)
            .ok_or_eyre(format!("Time step of {dt} s is out of range"))?;
        self.epoch = self
            .epoch
            .checked_add(step)
            .ok_or_eyre("Epoch overflowed")?;

        let refreshed = self.system.refresh_orbits();
        if refreshed > 0 {
            debug!("Simulation::tick: {refreshed} orbits recomputed");
        }
        self.system.propagate(dt);
        self.update_soi()?;
        Ok(dt)
    }

    /// Rebuild the hierarchy if needed and switch the tracked body's sphere
    /// of influence if it changed.
    pub fn update_soi(&mut self) -> eyre::Result<()> {
        if self.hierarchy_dirty {
            let empty = HashMap::new();
            let (exclude, saved) = match &self.tracker {
                Some(tracker) => (Some(&**tracker.tracked()), tracker.saved()),
                None => (None, &empty),
            };
            self.hierarchy = Hierarchy::build(&self.system, exclude, saved)?;
            self.hierarchy_dirty = false;
            let nodes = self.hierarchy.len();
            self.emit(&SimEvent::HierarchyRebuilt { nodes });
        }

        let Some(tracker) = &mut self.tracker else {
            return Ok(());
        };
        let Some(node) = tracker.update(&mut self.system, &self.hierarchy, self.epoch)? else {
            return Ok(());
        };
        let body = tracker.tracked().clone();
        self.emit(&SimEvent::SoiChanged { body, node });
        Ok(())
    }

    /// Step the warp level up or down.
    pub fn change_warp(&mut self, direction: i32) {
        if self.warp.change_warp(direction) {
            info!("Target time warp: x{}", self.warp.target());
            if !self.warp.is_ramping() {
                let scale = self.warp.scale();
                self.emit(&SimEvent::TimeScaleChanged(scale));
            }
        }
    }

    /// Jump to `epoch`, propagating every body by the difference.
    pub fn set_epoch(&mut self, epoch: UT) -> eyre::Result<()> {
        let delta = epoch
            .checked_sub(self.epoch)
            .ok_or_eyre("Epoch difference is out of range")?
            .as_seconds_f64();
        if delta.abs() < f64::EPSILON {
            return Ok(());
        }
        self.system.propagate(delta);
        self.epoch = epoch;
        info!("Epoch updated: delta = {delta} s, now {epoch}");
        self.emit(&SimEvent::EpochChanged { epoch, delta });
        self.update_soi()
    }

    pub fn set_gravitational_constant(&mut self, gravitational_constant: f64) {
        self.system.set_gravitational_constant(gravitational_constant);
        self.system.refresh_orbits();
        self.emit(&SimEvent::GravitationalConstantChanged(gravitational_constant));
    }

    /// Reattach `body` to `attractor` keeping its world state. The hierarchy
    /// is rebuilt on the next tick.
    pub fn set_attractor(&mut self, body: &str, attractor: Option<&str>) -> eyre::Result<()> {
        let attractor = match attractor {
            Some(name) => Some(self.system.get(name)?.name.clone()),
            None => None,
        };
        self.system.set_attractor(body, attractor)?;
        self.hierarchy_dirty = true;
        Ok(())
    }

    /// Apply an impulse to `body`'s orbit. Returns whether it was applied.
    pub fn apply_impulse(&mut self, body: &str, impulse: &Impulse) -> eyre::Result<bool> {
        let body = self.system.get_mut(body)?;
        impulse.apply(&mut body.orbit)
    }

    /// Points along `body`'s orbit in world space.
    pub fn orbit_points(
        &self,
        body: &str,
        count: usize,
        max_distance: f64,
    ) -> eyre::Result<Vec<Vector3d>> {
        let body = self.system.get(body)?;
        let Some(attractor) = &body.attractor else {
            return Ok(Vec::new());
        };
        let origin = self.system.world_position(attractor)?;
        Ok(body.orbit.generate_orbit_points(count, origin, max_distance))
    }

    pub(crate) fn restore_parts(
        &mut self,
        system: SolarSystem,
        tracker: Option<SoiTracker>,
        epoch: UT,
    ) {
        self.system = system;
        self.tracker = tracker;
        self.epoch = epoch;
        self.hierarchy_dirty = true;
    }
}

#[cfg(test)]
fn earth_moon_sim() -> Simulation {
    let settings = SimulationSettings {
        gravitational_constant: 1.0,
        warp_ramp_seconds: 0.0,
        ..SimulationSettings::default()
    };
    Simulation::new(crate::bodies::earth_moon(), &settings).unwrap()
}

#[cfg(test)]
type Recorded = std::rc::Rc<std::cell::RefCell<Vec<SimEvent>>>;

#[cfg(test)]
fn recorder(sim: &mut Simulation) -> (ListenerId, Recorded) {
    let events = Recorded::default();
    let sink = events.clone();
    let id = sim.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    (id, events)
}

#[test]
fn tick_advances_epoch_and_orbits() {
    let mut sim = earth_moon_sim();
    let moon = sim.system().get("Moon").unwrap().orbit.clone();
    sim.change_warp(2);
    assert_eq!(sim.warp().scale(), 5.0);
    let dt = sim.tick(10.0).unwrap();
    assert_eq!(dt, 50.0);
    assert_eq!(sim.epoch().as_seconds_f64(), 50.0);

    let mut expected = moon;
    expected.propagate(50.0);
    let moved = &sim.system().get("Moon").unwrap().orbit;
    assert!((moved.position - expected.position).norm() < 1e-9);
    assert_eq!(sim.hierarchy().len(), 3);
}

#[test]
fn scrubbing_matches_ticking() {
    let mut ticked = earth_moon_sim();
    let mut scrubbed = earth_moon_sim();
    for _ in 0..10 {
        ticked.tick(360.0).unwrap();
    }
    scrubbed.set_epoch(UT::new_seconds(3600.0)).unwrap();
    assert_eq!(ticked.epoch(), scrubbed.epoch());
    let a = ticked.system().world_position("Probe").unwrap();
    let b = scrubbed.system().world_position("Probe").unwrap();
    assert!((a - b).norm() < 1e-6, "{a} vs {b}");
}

#[test]
fn listeners_hear_events_until_unsubscribed() {
    let mut sim = earth_moon_sim();
    let (id, events) = recorder(&mut sim);

    sim.change_warp(1);
    sim.set_gravitational_constant(2.0);
    sim.set_epoch(UT::new_seconds(10.0)).unwrap();
    assert_eq!(
        &*events.borrow(),
        &[
            SimEvent::TimeScaleChanged(2.0),
            SimEvent::GravitationalConstantChanged(2.0),
            SimEvent::EpochChanged {
                epoch: UT::new_seconds(10.0),
                delta: 10.0
            },
            SimEvent::HierarchyRebuilt { nodes: 3 },
        ]
    );
    assert!((sim.system().get("Moon").unwrap().orbit.mu - 2.0 * 398_600.0).abs() < 1e-6);

    assert!(sim.unsubscribe(id));
    assert!(!sim.unsubscribe(id));
    sim.change_warp(1);
    assert_eq!(events.borrow().len(), 4);
}

#[test]
fn tracked_body_switches_soi() {
    let mut sim = earth_moon_sim();
    let (_, events) = recorder(&mut sim);
    sim.track("Probe").unwrap();
    assert!(sim.track("Probe").is_err());

    let before = sim.system().world_position("Probe").unwrap();
    sim.update_soi().unwrap();
    assert!((sim.system().world_position("Probe").unwrap() - before).norm() < 1e-6);
    assert_eq!(sim.tracker().unwrap().current().map(|n| &**n), Some("Moon"));
    assert!(events.borrow().contains(&SimEvent::SoiChanged {
        body: "Probe".into(),
        node: "Moon".into(),
    }));

    // the moon is pinned, the earth now orbits it
    sim.tick(60.0).unwrap();
    assert!(sim.system().get("Moon").unwrap().attractor.is_none());
    assert_eq!(
        sim.system().get("Earth").unwrap().attractor.as_deref(),
        Some("Moon")
    );
}

#[test]
fn out_of_range_steps_are_errors() {
    let mut sim = earth_moon_sim();
    let probe = sim.system().get("Probe").unwrap().orbit.clone();
    assert!(sim.tick(1e300).is_err());
    assert!(sim.tick(f64::NAN).is_err());
    assert_eq!(sim.epoch(), UT::default());
    assert_eq!(sim.system().get("Probe").unwrap().orbit, probe);
}

#[test]
fn impulses_and_orbit_points() {
    let mut sim = earth_moon_sim();
    let before = sim.system().get("Probe").unwrap().orbit.semi_major_axis;
    assert!(sim
        .apply_impulse("Probe", &Impulse::Frenet(Vector3d::new(0.05, 0.0, 0.0)))
        .unwrap());
    assert!(sim.system().get("Probe").unwrap().orbit.semi_major_axis > before);
    assert!(sim.apply_impulse("Nobody", &Impulse::Inertial(Vector3d::x())).is_err());

    let points = sim.orbit_points("Probe", 16, 0.0).unwrap();
    assert_eq!(points.len(), 16);
    let moon = sim.system().world_position("Moon").unwrap();
    let orbit = &sim.system().get("Probe").unwrap().orbit;
    assert!((points[0] - moon - orbit.periapsis).norm() < 1e-6);
    assert!(sim.orbit_points("Earth", 16, 0.0).unwrap().is_empty());
}
