use std::path::Path;

use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use soisim::bodies::{BodyConfig, SolarSystem};

/// A system to simulate, read from RON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub bodies: Vec<BodyConfig>,
    /// Body to follow across spheres of influence.
    #[serde(default)]
    pub tracked: Option<String>,
    /// Starting epoch in seconds.
    #[serde(default)]
    pub epoch: f64,
}

impl Scenario {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read scenario {}", path.display()))?;
        let scenario = ron::from_str(&text)
            .wrap_err_with(|| format!("Invalid scenario {}", path.display()))?;
        Ok(scenario)
    }

    pub fn build(&self, gravitational_constant: f64) -> eyre::Result<SolarSystem> {
        SolarSystem::from_configs(gravitational_constant, &self.bodies)
    }
}

#[test]
fn scenario_from_ron() {
    let scenario: Scenario = ron::from_str(
        r#"(
    bodies: [
        (name: "Earth", mass: 398600.0, init: Fixed(anchor: (0.0, 0.0, 0.0))),
        (
            name: "Probe",
            mass: 1e-9,
            attractor: Some("Earth"),
            init: Vectors(position: (7000.0, 0.0, 0.0), velocity: (0.0, 7.546, 0.0)),
        ),
    ],
    tracked: Some("Probe"),
)"#,
    )
    .unwrap();
    assert_eq!(scenario.epoch, 0.0);
    let system = scenario.build(1.0).unwrap();
    let probe = system.get("Probe").unwrap();
    assert!((probe.orbit.semi_major_axis - 7000.0).abs() < 1.0);
}

#[test]
fn bundled_scenario_builds() {
    let scenario: Scenario = ron::from_str(include_str!("../scenarios/earth_moon.ron")).unwrap();
    let system = scenario.build(soisim::sim::GRAVITATIONAL_CONSTANT_SI).unwrap();
    assert_eq!(system.bodies.len(), 4);
    let moon = system.get("Moon").unwrap();
    assert!((moon.orbit.semi_major_axis - 3.844e8).abs() < 1.0);
    assert_eq!(scenario.tracked.as_deref(), Some("Probe"));
}
