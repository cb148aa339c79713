use color_eyre::eyre::{self, OptionExt};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    kepler::orbits::OrbitData,
    math::{Vector3d, Vector3dExt},
};

/// An instantaneous velocity change.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Impulse {
    /// Delta-V in the attractor-relative inertial frame.
    Inertial(Vector3d),
    /// Delta-V in the Frenet frame: prograde, normal, binormal.
    Frenet(Vector3d),
}

impl Impulse {
    /// Delta-V in the inertial frame for a body on `orbit`.
    pub fn inertial(&self, orbit: &OrbitData) -> eyre::Result<Vector3d> {
        match self {
            Impulse::Inertial(deltav) => Ok(*deltav),
            Impulse::Frenet(deltav) => {
                let frame = frenet(&orbit.position, &orbit.velocity)
                    .ok_or_eyre("Frenet frame is undefined for a radial or resting state")?;
                Ok(frame * deltav)
            }
        }
    }

    /// Apply the impulse to `orbit` and recompute it from its state vectors.
    ///
    /// Invalid orbits are left alone; returns whether the impulse was
    /// applied.
    pub fn apply(&self, orbit: &mut OrbitData) -> eyre::Result<bool> {
        if !orbit.is_valid() {
            debug!("Impulse::apply: skipped invalid orbit");
            return Ok(false);
        }
        let deltav = self.inertial(orbit)?;
        orbit.apply_velocity_delta(deltav);
        Ok(true)
    }
}

/// Returns the Frenet frame to inertial conversion matrix for the given
/// relative state, or `None` if the state has no orbital plane.
pub fn frenet(position: &Vector3d, velocity: &Vector3d) -> Option<Matrix3<f64>> {
    let t = velocity.checked_unit(f64::MIN_POSITIVE)?;
    let n = position.cross(velocity).checked_unit(f64::MIN_POSITIVE)?;
    let b = t.cross(&n);
    Some(Matrix3::from_columns(&[t, n, b]))
}

#[test]
fn frenet_axes() {
    let frame = frenet(&Vector3d::new(7000.0, 0.0, 0.0), &Vector3d::new(0.0, 7.5, 0.0)).unwrap();
    assert!((frame * Vector3d::x() - Vector3d::y()).norm() < 1e-15);
    assert!((frame * Vector3d::y() - Vector3d::z()).norm() < 1e-15);
    assert!((frame * Vector3d::z() - Vector3d::x()).norm() < 1e-15);
    assert!(frenet(&Vector3d::new(7000.0, 0.0, 0.0), &Vector3d::new(1.0, 0.0, 0.0)).is_none());
}

#[test]
fn prograde_and_normal_burns() {
    let leo = OrbitData::from_state_vectors(
        Vector3d::new(7000.0, 0.0, 0.0),
        Vector3d::new(0.0, 7.546, 0.0),
        398_600.0,
        1.0,
    );

    let mut raised = leo.clone();
    assert!(Impulse::Frenet(Vector3d::new(0.1, 0.0, 0.0)).apply(&mut raised).unwrap());
    assert!(raised.semi_major_axis > leo.semi_major_axis + 100.0);
    assert!(raised.inclination() < 1e-12);

    let mut tilted = leo.clone();
    Impulse::Frenet(Vector3d::new(0.0, 1.0, 0.0))
        .apply(&mut tilted)
        .unwrap();
    let expected = libm::atan2(1.0, 7.546);
    assert!((tilted.inclination() - expected).abs() < 1e-12);

    let mut inertial = leo.clone();
    Impulse::Inertial(Vector3d::new(0.0, 0.1, 0.0))
        .apply(&mut inertial)
        .unwrap();
    assert!((inertial.semi_major_axis - raised.semi_major_axis).abs() < 1e-6);

    let mut invalid = OrbitData::default();
    assert!(!Impulse::Inertial(Vector3d::x()).apply(&mut invalid).unwrap());
    assert_eq!(invalid, OrbitData::default());
}
