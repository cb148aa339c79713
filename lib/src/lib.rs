#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]
//! Patched-conic orbital mechanics: exact two-body orbits around a hierarchy
//! of attractors, switched at sphere-of-influence boundaries.

pub mod arena;
pub mod bodies;
pub mod hierarchy;
pub mod kepler;
pub mod maneuver;
pub mod math;
pub mod sim;
pub mod snapshot;
pub mod soi;
pub mod time;
