//! Two-body (Keplerian) orbits.

pub mod anomaly;
pub mod elements;
pub mod orbits;
