//! Kepler's equation and conversions between mean, eccentric and true
//! anomaly.
//!
//! All angles are in radians. Elliptic anomalies live in `[0, 2π)`;
//! hyperbolic and parabolic anomalies are monotonic and never wrapped.
//!
//! For parabolic orbits there is no eccentric anomaly proper; the
//! "eccentric" anomaly of a parabola is its true anomaly, and the mean
//! anomaly is Barker's `(D + D³/3) / 2` with `D = tan(ν/2)`.

use std::f64::consts;

use crate::math::{wrap_pi, wrap_two_pi};

/// Eccentricities this close to 1 are treated as parabolic.
pub const PARABOLIC_TOLERANCE: f64 = 1e-9;

/// Convergence tolerance of the hyperbolic Newton solve.
const HYPERBOLIC_TOLERANCE: f64 = 1e-8;
const HYPERBOLIC_MAXITER: u32 = 100;

/// Conic regime of an orbit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Regime {
    Elliptic,
    Parabolic,
    Hyperbolic,
}

impl Regime {
    pub fn of(eccentricity: f64) -> Self {
        if (eccentricity - 1.0).abs() < PARABOLIC_TOLERANCE {
            Regime::Parabolic
        } else if eccentricity < 1.0 {
            Regime::Elliptic
        } else {
            Regime::Hyperbolic
        }
    }
}

/// Solve `E - e sin E = M` for `0 <= e < 1`.
///
/// Uses the Laguerre-Conway update with a fixed iteration count that grows
/// with eccentricity, so every call costs the same for a given `e`. There is
/// no convergence check.
pub fn solve_kepler_elliptic(ma: f64, e: f64) -> f64 {
    let ma = wrap_two_pi(ma);
    let iterations = ((e + 0.7) * 1.25).ceil() as u32 * 2;

    let mut ea = ma;
    for _ in 0..iterations {
        let esin = e * libm::sin(ea);
        let ecos = e * libm::cos(ea);
        let f = ea - esin - ma;
        let df = 1.0 - ecos;
        let disc = (16.0 * df * df - 20.0 * f * esin).abs().sqrt();
        let denom = df + df.signum() * disc;
        if denom == 0.0 {
            break;
        }
        ea -= 5.0 * f / denom;
    }
    ea
}

/// Solve `e sinh F - F = M` for `e > 1`.
///
/// Newton iteration from a logarithmic initial guess. If the guess is not
/// finite the mean anomaly is returned unchanged.
pub fn solve_kepler_hyperbolic(ma: f64, e: f64) -> f64 {
    let mut fa = ma.signum() * libm::log(2.0 * ma.abs() / e + 1.8);
    if !fa.is_finite() {
        return ma;
    }

    for _ in 0..HYPERBOLIC_MAXITER {
        let delta = (e * libm::sinh(fa) - fa - ma) / (e * libm::cosh(fa) - 1.0);
        if !delta.is_finite() {
            break;
        }
        fa -= delta;
        if delta.abs() < HYPERBOLIC_TOLERANCE {
            break;
        }
    }
    fa
}

/// Solve Barker's equation `(D + D³/3) / 2 = M` in closed form and return
/// the true anomaly `2 atan D`.
pub fn solve_barker(ma: f64) -> f64 {
    // odd in M; solving for |M| avoids cancellation for large negative M
    let m = ma.abs();
    let w = libm::cbrt(3.0 * m + (9.0 * m * m + 1.0).sqrt());
    let d = w - 1.0 / w;
    ma.signum() * 2.0 * libm::atan(d)
}

pub fn mean_to_eccentric(ma: f64, e: f64) -> f64 {
    match Regime::of(e) {
        Regime::Elliptic => solve_kepler_elliptic(ma, e),
        Regime::Hyperbolic => solve_kepler_hyperbolic(ma, e),
        Regime::Parabolic => solve_barker(ma),
    }
}

pub fn eccentric_to_mean(ea: f64, e: f64) -> f64 {
    match Regime::of(e) {
        Regime::Elliptic => wrap_two_pi(ea - e * libm::sin(ea)),
        Regime::Hyperbolic => e * libm::sinh(ea) - ea,
        Regime::Parabolic => {
            let d = libm::tan(ea / 2.0);
            (d + d.powi(3) / 3.0) / 2.0
        }
    }
}

pub fn eccentric_to_true(ea: f64, e: f64) -> f64 {
    match Regime::of(e) {
        Regime::Elliptic => {
            let ta = 2.0
                * libm::atan2(
                    (1.0 + e).sqrt() * libm::sin(ea / 2.0),
                    (1.0 - e).sqrt() * libm::cos(ea / 2.0),
                );
            wrap_two_pi(ta)
        }
        Regime::Hyperbolic => {
            2.0 * libm::atan(((e + 1.0) / (e - 1.0)).sqrt() * libm::tanh(ea / 2.0))
        }
        Regime::Parabolic => ea,
    }
}

pub fn true_to_eccentric(ta: f64, e: f64) -> f64 {
    if !e.is_finite() {
        return ta;
    }
    match Regime::of(e) {
        Regime::Elliptic => {
            let ea = 2.0
                * libm::atan2(
                    (1.0 - e).sqrt() * libm::sin(ta / 2.0),
                    (1.0 + e).sqrt() * libm::cos(ta / 2.0),
                );
            wrap_two_pi(ea)
        }
        Regime::Hyperbolic => {
            let x = ((e - 1.0) / (e + 1.0)).sqrt() * libm::tan(wrap_pi(ta) / 2.0);
            // beyond the asymptote there is no point on the hyperbola
            2.0 * libm::atanh(x.clamp(-1.0 + f64::EPSILON, 1.0 - f64::EPSILON))
        }
        Regime::Parabolic => wrap_pi(ta),
    }
}

pub fn mean_to_true(ma: f64, e: f64) -> f64 {
    eccentric_to_true(mean_to_eccentric(ma, e), e)
}

pub fn true_to_mean(ta: f64, e: f64) -> f64 {
    eccentric_to_mean(true_to_eccentric(ta, e), e)
}

/// True anomaly (non-negative) at which an orbit with the given eccentricity
/// and focal parameter reaches `distance` from its focus.
///
/// Distances the orbit never reaches are clamped to periapsis (`0`) or,
/// for closed orbits, apoapsis (`π`). For open orbits the result tends to the
/// asymptote angle as the distance grows.
pub fn true_anomaly_for_distance(distance: f64, e: f64, focal_parameter: f64) -> f64 {
    if e <= f64::EPSILON {
        return consts::PI;
    }
    let cos_ta = (focal_parameter / distance - 1.0) / e;
    libm::acos(cos_ta.clamp(-1.0, 1.0))
}

#[test]
fn elliptic_kepler_residual() {
    for ei in 0..=95 {
        let e = ei as f64 / 100.0;
        for mi in 0..720 {
            let ma = mi as f64 / 720.0 * consts::TAU;
            let ea = solve_kepler_elliptic(ma, e);
            let residual = ea - e * libm::sin(ea) - ma;
            assert!(
                residual.abs() < 1e-8,
                "e={e}, M={ma}: E={ea}, residual={residual}"
            );
        }
    }
}

#[test]
fn elliptic_solver_wraps_input() {
    let e = 0.4;
    let a = solve_kepler_elliptic(1.0, e);
    let b = solve_kepler_elliptic(1.0 + 3.0 * consts::TAU, e);
    let c = solve_kepler_elliptic(1.0 - consts::TAU, e);
    assert!((a - b).abs() < 1e-12);
    assert!((a - c).abs() < 1e-12);
}

#[test]
fn hyperbolic_kepler_residual() {
    for e in [1.01, 1.5, 2.0, 5.0, 30.0] {
        for mi in -200..=200 {
            let ma = mi as f64 / 10.0;
            let fa = solve_kepler_hyperbolic(ma, e);
            let residual = e * libm::sinh(fa) - fa - ma;
            assert!(
                residual.abs() < 1e-7 * (1.0 + ma.abs()),
                "e={e}, M={ma}: F={fa}, residual={residual}"
            );
        }
    }
}

#[test]
fn hyperbolic_guard_returns_input() {
    assert!(solve_kepler_hyperbolic(f64::NAN, 1.5).is_nan());
    assert_eq!(solve_kepler_hyperbolic(f64::INFINITY, 1.5), f64::INFINITY);
}

#[test]
fn barker_inverts_mean_anomaly() {
    for mi in -100..=100 {
        let ma = mi as f64 / 7.0;
        let ta = solve_barker(ma);
        assert!(ta.abs() < consts::PI);
        let back = eccentric_to_mean(ta, 1.0);
        assert!((back - ma).abs() < 1e-9 * (1.0 + ma.abs()), "M={ma}, back={back}");
    }
}

#[test]
fn conversions_are_consistent() {
    for e in [0.0, 0.1, 0.7, 0.99] {
        for ti in 0..36 {
            let ta = ti as f64 * 10.0_f64.to_radians();
            let ma = true_to_mean(ta, e);
            assert!((0.0..consts::TAU).contains(&ma));
            let back = mean_to_true(ma, e);
            let diff = wrap_pi(back - ta);
            assert!(diff.abs() < 1e-8, "e={e}, ν={ta}, back={back}");
        }
    }
    for e in [1.2, 3.0] {
        let limit = libm::acos(-1.0 / e);
        for ti in -9..=9 {
            let ta = ti as f64 / 10.0 * limit;
            let back = mean_to_true(true_to_mean(ta, e), e);
            assert!((back - ta).abs() < 1e-7, "e={e}, ν={ta}, back={back}");
        }
    }
}

#[test]
fn regime_classification() {
    assert_eq!(Regime::of(0.0), Regime::Elliptic);
    assert_eq!(Regime::of(0.999), Regime::Elliptic);
    assert_eq!(Regime::of(1.0), Regime::Parabolic);
    assert_eq!(Regime::of(1.0 + 1e-12), Regime::Parabolic);
    assert_eq!(Regime::of(1.5), Regime::Hyperbolic);
}

#[test]
fn distance_to_true_anomaly() {
    // circle-like ellipse: periapsis at ν = 0
    let p = 7000.0 * (1.0 - 0.1f64.powi(2));
    assert!(true_anomaly_for_distance(7000.0 * 0.9, 0.1, p).abs() < 1e-6);
    assert!((true_anomaly_for_distance(7000.0 * 1.1, 0.1, p) - consts::PI).abs() < 1e-6);

    // hyperbola approaches its asymptote
    let e = 1.5;
    let p = 5000.0 * (e * e - 1.0);
    let far = true_anomaly_for_distance(1e12, e, p);
    assert!((far - libm::acos(-1.0 / e)).abs() < 1e-6);

    // parabola: r = p / (1 + cos ν)
    let ta = true_anomaly_for_distance(2.0 * 1000.0, 1.0, 2.0 * 1000.0);
    assert!((ta - consts::FRAC_PI_2).abs() < 1e-12);
}
