use std::{fmt, ops};

use color_eyre::eyre::{self, bail, OptionExt};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::debug;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
/// Years are a flat 365 days.
pub const SECONDS_PER_YEAR: i64 = 365 * SECONDS_PER_DAY;

/// Absolute simulation time (epoch).
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UT(Duration);

impl UT {
    pub fn from_ydhms(years: u32, days: u32, hours: u32, minutes: u32, seconds: f64) -> Self {
        let whole = years as i64 * SECONDS_PER_YEAR
            + days as i64 * SECONDS_PER_DAY
            + hours as i64 * 60 * 60
            + minutes as i64 * 60;
        Self(Duration::seconds(whole) + Duration::seconds_f64(seconds))
    }

    /// Panics if `sec` is not finite or out of range; see
    /// [`try_seconds`](Self::try_seconds).
    pub fn new_seconds(sec: f64) -> UT {
        UT::from_duration(Duration::seconds_f64(sec))
    }

    pub fn try_seconds(sec: f64) -> eyre::Result<UT> {
        Duration::checked_seconds_f64(sec)
            .map(UT::from_duration)
            .ok_or_eyre(format!("Epoch of {sec} s is out of range"))
    }

    pub fn checked_add(self, rhs: Duration) -> Option<UT> {
        self.0.checked_add(rhs).map(UT)
    }

    pub fn checked_sub(self, rhs: UT) -> Option<Duration> {
        self.0.checked_sub(rhs.0)
    }

    pub fn as_seconds_f64(self) -> f64 {
        self.0.as_seconds_f64()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    pub fn years(self) -> i64 {
        self.0.whole_seconds() / SECONDS_PER_YEAR
    }

    /// Day within the year.
    pub fn days(self) -> i64 {
        (self.0.whole_seconds() % SECONDS_PER_YEAR) / SECONDS_PER_DAY
    }

    pub fn hours(self) -> u8 {
        (self.0.whole_hours() % 24).unsigned_abs() as u8
    }

    pub fn minutes(self) -> u8 {
        (self.0.whole_minutes() % 60).unsigned_abs() as u8
    }

    /// Seconds within the minute, with the fractional part.
    pub fn seconds(self) -> f64 {
        self.as_seconds_f64() - (self.0.whole_minutes() * 60) as f64
    }

    pub fn into_duration(self) -> Duration {
        self.0
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }
}

impl ops::Sub<UT> for UT {
    type Output = Duration;

    fn sub(self, rhs: UT) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ops::Sub<Duration> for UT {
    type Output = UT;

    fn sub(self, rhs: Duration) -> Self::Output {
        UT(self.0 - rhs)
    }
}

impl ops::Add<Duration> for UT {
    type Output = UT;

    fn add(self, rhs: Duration) -> Self::Output {
        UT(self.0 + rhs)
    }
}

impl ops::AddAssign<Duration> for UT {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Display for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "UT({}s)", self.as_seconds_f64())
        } else {
            write!(
                f,
                "UT(Y{} D{} {:02}:{:02}:{:05.2})",
                self.years(),
                self.days(),
                self.hours(),
                self.minutes(),
                self.seconds()
            )
        }
    }
}

impl fmt::Debug for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:#}")
    }
}

pub const DEFAULT_WARP_LEVELS: [f64; 15] = [
    0.031_25, 0.0625, 0.125, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 200.0, 500.0, 1000.0,
    2000.0,
];
pub const DEFAULT_WARP_INDEX: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Ramp {
    from: f64,
    to: f64,
    elapsed: f64,
}

/// Time scale selected from discrete warp levels.
///
/// Changing level does not jump: the scale moves linearly from its current
/// value to the new level over `ramp_duration` seconds of host time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWarp {
    levels: Vec<f64>,
    index: usize,
    scale: f64,
    ramp_duration: f64,
    ramp: Option<Ramp>,
}

impl Default for TimeWarp {
    fn default() -> Self {
        Self {
            levels: DEFAULT_WARP_LEVELS.to_vec(),
            index: DEFAULT_WARP_INDEX,
            scale: DEFAULT_WARP_LEVELS[DEFAULT_WARP_INDEX],
            ramp_duration: 1.0,
            ramp: None,
        }
    }
}

impl TimeWarp {
    pub fn new(levels: Vec<f64>, index: usize, ramp_duration: f64) -> eyre::Result<Self> {
        if levels.is_empty() {
            bail!("No time warp levels");
        }
        if levels.iter().any(|level| !(*level > 0.0 && level.is_finite())) {
            bail!("Time warp levels must be positive: {levels:?}");
        }
        let Some(&scale) = levels.get(index) else {
            bail!("Time warp index {index} out of range (0..{})", levels.len());
        };
        Ok(Self {
            levels,
            index,
            scale,
            ramp_duration,
            ramp: None,
        })
    }

    /// The current time scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The level the scale is at or ramping towards.
    pub fn target(&self) -> f64 {
        self.levels[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }

    /// Step the target level up (`direction > 0`) or down. Returns whether
    /// the target changed.
    pub fn change_warp(&mut self, direction: i32) -> bool {
        let max = self.levels.len() - 1;
        let index = if direction >= 0 {
            self.index.saturating_add(direction.unsigned_abs() as usize).min(max)
        } else {
            self.index.saturating_sub(direction.unsigned_abs() as usize)
        };
        if index == self.index {
            return false;
        }
        self.index = index;
        debug!("TimeWarp::change_warp: target x{}", self.target());
        if self.ramp_duration > 0.0 {
            self.ramp = Some(Ramp {
                from: self.scale,
                to: self.target(),
                elapsed: 0.0,
            });
        } else {
            self.scale = self.target();
        }
        true
    }

    /// Set the scale directly, cancelling any ramp.
    pub fn set_scale(&mut self, scale: f64) {
        self.ramp = None;
        self.scale = scale;
    }

    /// Advance the ramp by `real_dt` seconds of host time. Returns the new
    /// scale while ramping.
    pub fn advance(&mut self, real_dt: f64) -> Option<f64> {
        let ramp = self.ramp.as_mut()?;
        ramp.elapsed += real_dt;
        let t = (ramp.elapsed / self.ramp_duration).min(1.0);
        let scale = ramp.from + (ramp.to - ramp.from) * t;
        if t >= 1.0 {
            self.ramp = None;
        }
        self.scale = scale;
        Some(scale)
    }
}

#[test]
fn epoch_components() {
    let ut = UT::from_ydhms(2, 45, 3, 4, 5.5);
    assert_eq!(
        ut.as_seconds_f64(),
        (2 * SECONDS_PER_YEAR + 45 * SECONDS_PER_DAY + 3 * 3600 + 4 * 60) as f64 + 5.5
    );
    assert_eq!(ut.years(), 2);
    assert_eq!(ut.days(), 45);
    assert_eq!(ut.hours(), 3);
    assert_eq!(ut.minutes(), 4);
    assert!((ut.seconds() - 5.5).abs() < 1e-9);
    assert_eq!(ut.to_string(), "UT(Y2 D45 03:04:05.50)");

    assert_eq!(UT::try_seconds(12.5).unwrap(), UT::new_seconds(12.5));
    assert!(UT::try_seconds(f64::NAN).is_err());
    assert!(UT::try_seconds(1e300).is_err());
    assert_eq!(UT::new_seconds(1.0).checked_add(Duration::MAX), None);

    let later = ut + Duration::seconds(60);
    assert_eq!((later - ut).as_seconds_f64(), 60.0);
    assert!(later > ut);
}

#[test]
fn warp_ramps_between_levels() {
    let mut warp = TimeWarp::default();
    assert_eq!(warp.scale(), 1.0);
    assert!(warp.change_warp(1));
    assert_eq!(warp.target(), 2.0);
    assert_eq!(warp.scale(), 1.0);

    assert_eq!(warp.advance(0.5), Some(1.5));
    assert!(warp.is_ramping());
    assert_eq!(warp.advance(0.75), Some(2.0));
    assert!(!warp.is_ramping());
    assert_eq!(warp.advance(1.0), None);
}

#[test]
fn warp_clamps_at_the_ends() {
    let mut warp = TimeWarp::new(DEFAULT_WARP_LEVELS.to_vec(), 0, 0.0).unwrap();
    assert!(!warp.change_warp(-1));
    assert!(warp.change_warp(100));
    assert_eq!(warp.scale(), 2000.0);
    assert!(!warp.change_warp(1));
    assert!(TimeWarp::new(vec![], 0, 1.0).is_err());
    assert!(TimeWarp::new(vec![1.0, -2.0], 0, 1.0).is_err());
    assert!(TimeWarp::new(vec![1.0], 3, 1.0).is_err());
}
