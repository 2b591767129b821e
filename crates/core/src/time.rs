// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Time handling as UNIX epoch nanoseconds.

use std::{
    fmt::{Debug, Display, Formatter},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of nanoseconds in one second.
pub const NANOSECONDS_IN_SECOND: u64 = 1_000_000_000;

/// Number of nanoseconds in one millisecond.
pub const NANOSECONDS_IN_MILLISECOND: u64 = 1_000_000;

/// Represents a timestamp in nanoseconds since the UNIX epoch.
#[repr(C)]
#[derive(
    Copy, Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixNanos(u64);

impl UnixNanos {
    /// Creates a new [`UnixNanos`] instance from the given nanoseconds value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value as `u64`.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the value rounded down to whole milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / NANOSECONDS_IN_MILLISECOND
    }

    /// Returns the value as a floating-point number of seconds.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOSECONDS_IN_SECOND as f64
    }

    /// Returns the saturating difference `self - other` in nanoseconds.
    #[must_use]
    pub const fn saturating_sub(&self, other: Self) -> u64 {
        self.0.saturating_sub(other.0)
    }

    /// Converts the timestamp to a [`DateTime<Utc>`].
    #[must_use]
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0 as i64)
    }
}

impl From<u64> for UnixNanos {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<UnixNanos> for u64 {
    fn from(value: UnixNanos) -> Self {
        value.0
    }
}

impl PartialEq<u64> for UnixNanos {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl Debug for UnixNanos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", stringify!(UnixNanos), self.0)
    }
}

impl Display for UnixNanos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the duration since the UNIX epoch based on the system realtime clock.
///
/// # Panics
///
/// Panics if the system clock reads earlier than the UNIX epoch.
#[must_use]
pub fn duration_since_unix_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Error calling `SystemTime::duration_since`")
}

/// Returns the current realtime clock reading as [`UnixNanos`].
#[must_use]
pub fn unix_nanos_now() -> UnixNanos {
    UnixNanos::new(duration_since_unix_epoch().as_nanos() as u64)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_as_millis_and_secs() {
        let ts = UnixNanos::new(1_500_000_000);
        assert_eq!(ts.as_u64(), 1_500_000_000);
        assert_eq!(ts.as_millis(), 1_500);
        assert!((ts.as_secs_f64() - 1.5).abs() < f64::EPSILON);
    }

    #[rstest]
    fn test_saturating_sub() {
        let a = UnixNanos::new(100);
        let b = UnixNanos::new(40);
        assert_eq!(a.saturating_sub(b), 60);
        assert_eq!(b.saturating_sub(a), 0);
    }

    #[rstest]
    fn test_ordering() {
        assert!(UnixNanos::new(1) < UnixNanos::new(2));
        assert_eq!(UnixNanos::new(42), 42u64);
    }

    #[rstest]
    fn test_serde_round_trip() {
        let ts = UnixNanos::new(1_234_567_890);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1234567890");
        let parsed: UnixNanos = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ts);
    }

    #[rstest]
    fn test_now_is_monotonic_enough() {
        let a = unix_nanos_now();
        let b = unix_nanos_now();
        assert!(b >= a);
    }

    #[rstest]
    fn test_to_datetime_utc() {
        let ts = UnixNanos::new(1_700_000_000 * NANOSECONDS_IN_SECOND);
        assert_eq!(ts.to_datetime_utc().timestamp(), 1_700_000_000);
    }
}
