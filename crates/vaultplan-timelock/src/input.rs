//! Raw timelock input as entered by the user

use crate::kind::{TimelockKind, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days / hours / minutes breakdown of a relative time lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub days: u64,
    pub hours: u32,
    pub minutes: u32,
}

impl Period {
    pub fn new(days: u64, hours: u32, minutes: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
        }
    }

    /// Whole days, no hours or minutes
    pub fn days(days: u64) -> Self {
        Self::new(days, 0, 0)
    }

    /// Split a second count into days, hours and minutes (seconds dropped)
    pub fn from_seconds(seconds: i64) -> Self {
        let seconds = seconds.max(0);
        Self {
            days: (seconds / SECONDS_PER_DAY) as u64,
            hours: ((seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR) as u32,
            minutes: ((seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u32,
        }
    }

    /// Saturates at `i64::MAX`, which no bound accepts
    pub fn total_seconds(&self) -> i64 {
        i64::try_from(self.days)
            .unwrap_or(i64::MAX)
            .saturating_mul(SECONDS_PER_DAY)
            .saturating_add(self.hours as i64 * SECONDS_PER_HOUR)
            .saturating_add(self.minutes as i64 * SECONDS_PER_MINUTE)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.days, "d"),
            (self.hours as u64, "h"),
            (self.minutes as u64, "m"),
        ]
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, suffix)| format!("{}{}", n, suffix))
            .collect();
        if parts.is_empty() {
            f.write_str("0d")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// User input for one timelock, tagged by its (type, unit) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelockInput {
    /// Wall-clock date and time, read in the selected time zone
    AbsoluteDate(NaiveDateTime),
    /// Target block height
    AbsoluteHeight(i64),
    /// Period after the coins are received
    RelativePeriod(Period),
    /// Blocks after the coins are received
    RelativeBlocks(i64),
}

impl TimelockInput {
    pub fn kind(&self) -> TimelockKind {
        match self {
            TimelockInput::AbsoluteDate(_) => TimelockKind::ABSOLUTE_TIME,
            TimelockInput::AbsoluteHeight(_) => TimelockKind::ABSOLUTE_HEIGHT,
            TimelockInput::RelativePeriod(_) => TimelockKind::RELATIVE_TIME,
            TimelockInput::RelativeBlocks(_) => TimelockKind::RELATIVE_HEIGHT,
        }
    }
}

/// Parse a numeric text field, ignoring anything that is not an ASCII digit
///
/// An empty field reads as `0`. Digit runs too long for `i64` saturate, so
/// they fail the range checks instead of wrapping to something valid.
pub fn parse_digits(text: &str) -> i64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<i64>().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digits() {
        assert_eq!(parse_digits("4320"), 4320);
        assert_eq!(parse_digits("4,320 blocks"), 4320);
        assert_eq!(parse_digits(""), 0);
        assert_eq!(parse_digits("abc"), 0);
        assert_eq!(parse_digits("-12"), 12);
        assert_eq!(parse_digits("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_period_seconds() {
        let period = Period::new(2, 3, 4);
        assert_eq!(period.total_seconds(), 2 * 86_400 + 3 * 3_600 + 4 * 60);
        assert_eq!(Period::from_seconds(period.total_seconds()), period);
        assert_eq!(Period::from_seconds(-5), Period::default());
        // trailing seconds are dropped
        assert_eq!(Period::from_seconds(61), Period::new(0, 0, 1));
    }

    #[test]
    fn test_period_keeps_large_day_counts() {
        let period = Period::from_seconds(i64::MAX);
        assert_eq!(period, Period::new(106_751_991_167_300, 15, 30));
        assert_eq!(Period::days(u64::MAX).total_seconds(), i64::MAX);
    }

    #[test]
    fn test_period_display() {
        assert_eq!(Period::new(1, 2, 3).to_string(), "1d 2h 3m");
        assert_eq!(Period::new(30, 0, 0).to_string(), "30d");
        assert_eq!(Period::new(0, 5, 0).to_string(), "5h");
        assert_eq!(Period::new(0, 0, 0).to_string(), "0d");
    }

    #[test]
    fn test_input_kind() {
        assert_eq!(
            TimelockInput::RelativeBlocks(10).kind(),
            TimelockKind::RELATIVE_HEIGHT
        );
        assert_eq!(
            TimelockInput::RelativePeriod(Period::days(30)).kind(),
            TimelockKind::RELATIVE_TIME
        );
    }
}
