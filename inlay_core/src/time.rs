// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time in nanoseconds.
//!
//! [`HostTime`] is a point on the host's monotonic clock, always expressed in
//! nanoseconds. Task deadlines, vsync frame pairs and pointer timestamps are
//! all derived from it, so the engine sees one consistent timeline.
//!
//! [`Duration`] is a span on the same clock. Arithmetic saturates or is
//! checked where a wrap would silently reorder deadlines.

use core::fmt;
use core::ops::{Add, Sub};

const NANOS_PER_MICRO: u64 = 1_000;

/// A point in time on the host's monotonic clock, in nanoseconds.
///
/// `HostTime(0)` is the earliest representable instant; a task posted with
/// that deadline is eligible on the next drain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// The earliest instant. Used as the "run as soon as polled" deadline.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the value truncated to whole microseconds.
    #[inline]
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0 / NANOS_PER_MICRO
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

/// A span of time in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// One frame at 60 Hz, rounded to the nearest nanosecond.
    pub const FRAME_60HZ: Self = Self(16_666_667);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Creates a duration from whole microseconds, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(NANOS_PER_MICRO))
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_truncates() {
        assert_eq!(HostTime(1_999).micros(), 1);
        assert_eq!(HostTime(2_000).micros(), 2);
    }

    #[test]
    fn frame_interval_is_rounded_sixtieth() {
        assert_eq!(Duration::FRAME_60HZ.nanos(), 16_666_667);
        let sixty = Duration::FRAME_60HZ.nanos() * 60;
        assert!(sixty.abs_diff(1_000_000_000) < 60, "within rounding");
    }

    #[test]
    fn saturating_ops_do_not_wrap() {
        let t = HostTime(u64::MAX - 1);
        assert_eq!(t.saturating_add(Duration(10)), HostTime(u64::MAX));
        assert_eq!(t.checked_add(Duration(10)), None);
        assert_eq!(
            HostTime(5).saturating_duration_since(HostTime(9)),
            Duration::ZERO
        );
        assert_eq!(Duration(3).saturating_sub(Duration(7)), Duration::ZERO);
    }

    #[test]
    fn host_time_duration_ops() {
        let t = HostTime(1000);
        assert_eq!(t + Duration(200), HostTime(1200));
        assert_eq!(HostTime(1500) - t, Duration(500));
        assert_eq!(Duration::from_micros(3), Duration(3_000));
    }
}
