//! Timestamps for measurements, predictions and publishing
//!
//! All stamps are expressed in seconds on a single clock. Differences between
//! two stamps are plain `f64` seconds, matching how the filters consume `dt`.

use ::core::fmt;
use ::core::ops::{Add, Sub};

/// A point in time, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Time(f64);

impl Time {
    /// Creates a stamp from seconds.
    #[inline]
    pub const fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Creates a stamp from integer nanoseconds.
    #[inline]
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos as f64 * 1e-9)
    }

    /// Returns the stamp in seconds.
    #[inline]
    pub const fn seconds(&self) -> f64 {
        self.0
    }

    /// Returns the later of two stamps.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Sub for Time {
    type Output = f64;

    /// Elapsed seconds from `rhs` to `self`.
    #[inline]
    fn sub(self, rhs: Self) -> f64 {
        self.0 - rhs.0
    }
}

impl Add<f64> for Time {
    type Output = Time;

    #[inline]
    fn add(self, rhs: f64) -> Time {
        Time(self.0 + rhs)
    }
}

impl Sub<f64> for Time {
    type Output = Time;

    #[inline]
    fn sub(self, rhs: f64) -> Time {
        Time(self.0 - rhs)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}
