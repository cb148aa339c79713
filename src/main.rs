#![warn(clippy::unwrap_used, clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]
use std::path::PathBuf;

use color_eyre::eyre::{self, WrapErr};
use itertools::Itertools;
use soisim::{
    sim::{SimEvent, Simulation},
    time::UT,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::RunConfig;
use scenario::Scenario;

mod config;
mod scenario;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("soisim.toml"), PathBuf::from);
    let config = RunConfig::load(&config_path)?;
    let scenario = Scenario::load(&config.scenario)?;
    let system = scenario.build(config.simulation.gravitational_constant)?;
    info!(
        "Loaded {} bodies from {}",
        system.bodies.len(),
        config.scenario.display()
    );

    let mut sim = Simulation::new(system, &config.simulation)?;
    sim.subscribe(|event| match event {
        SimEvent::SoiChanged { body, node } => info!("{body} entered the SOI of {node}"),
        SimEvent::HierarchyRebuilt { nodes } => debug!("Hierarchy rebuilt with {nodes} nodes"),
        other => debug!("{other:?}"),
    });
    if let Some(tracked) = &scenario.tracked {
        sim.track(tracked)?;
    }
    sim.set_epoch(UT::try_seconds(scenario.epoch)?)?;
    sim.update_soi()?;

    let mut simulated = 0.0;
    for _ in 0..config.ticks {
        simulated += sim.tick(config.tick_seconds)?;
    }
    info!("Simulated {simulated:.1} s, now at {}", sim.epoch());

    report(&sim, &config)?;

    if let Some(path) = &config.snapshot {
        let text =
            ron::ser::to_string_pretty(&sim.snapshot(), ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text)
            .wrap_err_with(|| format!("Could not write snapshot {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn report(sim: &Simulation, config: &RunConfig) -> eyre::Result<()> {
    let system = sim.system();
    println!("{}", sim.epoch());
    for name in system.sorted_names() {
        let body = system.get(&name)?;
        let position = system.world_position(&name)?;
        let Some(attractor) = &body.attractor else {
            println!("{name}: fixed at {:?}", position.as_slice());
            continue;
        };
        let el = body.orbit.elements();
        println!(
            "{name} around {attractor}: e={:.6} a={:.3} i={:.3} lan={:.3} argpe={:.3} M={:.3}",
            el.eccentricity,
            el.semi_major_axis,
            el.inclination,
            el.longitude_of_ascending_node,
            el.argument_of_periapsis,
            el.mean_anomaly
        );
        let points = sim.orbit_points(&name, config.orbit_points, config.max_distance)?;
        println!(
            "  {}",
            points
                .iter()
                .map(|p| format!("({:.0}, {:.0}, {:.0})", p.x, p.y, p.z))
                .join(" ")
        );
    }
    if let Some(tracker) = sim.tracker() {
        println!(
            "{} is in the SOI of {}",
            tracker.tracked(),
            tracker.current().map_or("nothing", |n| &**n)
        );
    }
    Ok(())
}
