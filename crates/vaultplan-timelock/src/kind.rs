//! Timelock kinds and their protocol bounds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest absolute lock value still read as a block height.
/// Anything from `LOCK_TIME_THRESHOLD` up is a unix timestamp.
pub const MAX_ABSOLUTE_HEIGHT: i64 = bitcoin::absolute::LOCK_TIME_THRESHOLD as i64 - 1;

/// Relative block locks are carried in the low 16 bits of `nSequence`.
pub const MAX_RELATIVE_BLOCKS: i64 = u16::MAX as i64;

/// Longest relative time lock, in days
///
/// 65,535 intervals of 512 seconds is a little over 388 days.
pub const MAX_RELATIVE_DAYS: u32 = 388;

/// Absolute calendar locks must fall before this year
pub const MAX_CALENDAR_YEAR: i32 = 11_516;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
pub const SECONDS_PER_HOUR: i64 = 60 * 60;
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Fixed point vs. period measured from when coins are received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockType {
    Absolute,
    Relative,
}

/// Wall-clock time vs. block count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    CalendarTime,
    BlockHeight,
}

/// A (lock type, unit) pair; each has its own bounds and canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelockKind {
    pub lock: LockType,
    pub unit: TimeUnit,
}

impl TimelockKind {
    pub const ABSOLUTE_TIME: Self = Self::new(LockType::Absolute, TimeUnit::CalendarTime);
    pub const ABSOLUTE_HEIGHT: Self = Self::new(LockType::Absolute, TimeUnit::BlockHeight);
    pub const RELATIVE_TIME: Self = Self::new(LockType::Relative, TimeUnit::CalendarTime);
    pub const RELATIVE_HEIGHT: Self = Self::new(LockType::Relative, TimeUnit::BlockHeight);

    pub const fn new(lock: LockType, unit: TimeUnit) -> Self {
        Self { lock, unit }
    }

    pub fn is_relative(&self) -> bool {
        self.lock == LockType::Relative
    }

    pub fn is_calendar(&self) -> bool {
        self.unit == TimeUnit::CalendarTime
    }
}

impl fmt::Display for TimelockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = match self.lock {
            LockType::Absolute => "absolute",
            LockType::Relative => "relative",
        };
        let unit = match self.unit {
            TimeUnit::CalendarTime => "time",
            TimeUnit::BlockHeight => "height",
        };
        write!(f, "{} {}", lock, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        assert_eq!(MAX_ABSOLUTE_HEIGHT, 499_999_999);
        assert_eq!(MAX_RELATIVE_BLOCKS, 65_535);
        // 388 days still fits in a 512-second granularity sequence
        assert!(MAX_RELATIVE_DAYS as i64 * SECONDS_PER_DAY <= 65_535 * 512);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TimelockKind::ABSOLUTE_TIME.to_string(), "absolute time");
        assert_eq!(TimelockKind::RELATIVE_HEIGHT.to_string(), "relative height");
        assert!(TimelockKind::RELATIVE_TIME.is_relative());
        assert!(!TimelockKind::ABSOLUTE_HEIGHT.is_calendar());
    }
}
