// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host monotonic clock reads.

use inlay_core::time::HostTime;

/// Returns the current monotonic host time in nanoseconds.
#[cfg(unix)]
#[must_use]
pub fn now() -> HostTime {
    use rustix::time::{ClockId, clock_gettime};

    const NANOS_PER_SECOND: u128 = 1_000_000_000;

    let timespec = clock_gettime(ClockId::Monotonic);
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(999_999_999);
    let ticks = u128::from(seconds)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(u128::from(nanos));
    HostTime(u64::try_from(ticks).unwrap_or(u64::MAX))
}

/// Returns the current monotonic host time in nanoseconds.
///
/// Measured from the first clock read in this process.
#[cfg(not(unix))]
#[must_use]
pub fn now() -> HostTime {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
    HostTime(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::now;

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let first = now();
        let second = now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }
}
