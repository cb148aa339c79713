use std::path::{Path, PathBuf};

use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use soisim::sim::SimulationSettings;
use tracing::info;

/// Settings for one headless run, read from TOML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// RON file describing the bodies.
    pub scenario: PathBuf,
    /// Host seconds per tick, before time warp.
    pub tick_seconds: f64,
    pub ticks: usize,
    /// Points sampled along each orbit in the final report.
    pub orbit_points: usize,
    /// Open orbits are sampled out to this distance from their attractor.
    pub max_distance: f64,
    /// Where to write the final state, if anywhere.
    pub snapshot: Option<PathBuf>,
    pub simulation: SimulationSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("scenarios/earth_moon.ron"),
            tick_seconds: 1.0,
            ticks: 600,
            orbit_points: 16,
            max_distance: 1e9,
            snapshot: None,
            simulation: SimulationSettings::default(),
        }
    }
}

impl RunConfig {
    /// Read `path`, or fall back to the defaults if it does not exist.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read {}", path.display()))?;
        let config =
            toml::from_str(&text).wrap_err_with(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config: RunConfig = toml::from_str(
        r#"
ticks = 10

[simulation]
gravitational_constant = 1.0
"#,
    )
    .unwrap();
    assert_eq!(config.ticks, 10);
    assert_eq!(config.simulation.gravitational_constant, 1.0);
    assert_eq!(config.simulation.warp_index, SimulationSettings::default().warp_index);
    assert_eq!(config.tick_seconds, 1.0);
    assert_eq!(config.snapshot, None);
}
