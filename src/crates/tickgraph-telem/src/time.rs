//! Wall-clock timestamps and sample alignment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// A wall-clock instant in nanoseconds since the Unix epoch.
///
/// Timestamps are used for correlating emitted samples with captured data;
/// they are orthogonal to the scheduler's monotonic `elapsed` durations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX))
    }

    /// Nanoseconds since the Unix epoch.
    pub const fn nanoseconds(&self) -> i64 {
        self.0
    }
}

impl Add<Duration> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, rhs: Duration) -> TimeStamp {
        TimeStamp(self.0.saturating_add(rhs.as_nanos() as i64))
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Position of a sample within its channel's overall stream.
///
/// A series' alignment is the position of its first sample; consumers track
/// a high-water mark over alignments to suppress duplicate delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Alignment(pub u64);

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_positive() {
        assert!(TimeStamp::now().nanoseconds() > 0);
    }

    #[test]
    fn test_timestamp_add_duration() {
        let ts = TimeStamp(100) + Duration::from_nanos(50);
        assert_eq!(ts, TimeStamp(150));
    }

    #[test]
    fn test_alignment_ordering() {
        assert!(Alignment(3) > Alignment(2));
        assert_eq!(Alignment::default(), Alignment(0));
    }
}
