//! A validated timelock and what can be derived from it

use crate::input::{Period, TimelockInput};
use crate::kind::{LockType, TimeUnit, TimelockKind};
use crate::normalize::{
    check_canonical, describe, to_canonical, validate, ValidationContext, ValidationError,
};
use crate::timezone::{parse_timezone, timezone_detail, zone_label, TimezoneDetail};
use bitcoin::{absolute, Sequence};
use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// First unix time that a script `after()` can no longer express.
pub const SCRIPT_TIME_LIMIT: i64 = 1 << 31;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocktimeError {
    #[error("{kind} value {value} has no consensus encoding")]
    Unencodable { kind: TimelockKind, value: i64 },
}

/// Consensus form of a timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locktime {
    /// `nLockTime` / `OP_CHECKLOCKTIMEVERIFY`
    After(absolute::LockTime),
    /// `nSequence` / `OP_CHECKSEQUENCEVERIFY`
    Older(Sequence),
}

/// Non-blocking warnings shown before the user commits to a timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelockAdvisory {
    /// Timestamp at or past 2^31 (January 2038)
    BeyondScriptTimeRange,
    /// Unlocks more than the configured number of years from now
    ExceedsRecommendedHorizon { years: i32, max_years: u32 },
}

impl fmt::Display for TimelockAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelockAdvisory::BeyondScriptTimeRange => {
                f.write_str("timelock is past January 19, 2038 and may not be supported by all signers")
            }
            TimelockAdvisory::ExceedsRecommendedHorizon { years, max_years } => write!(
                f,
                "timelock is {} years away, more than the recommended {}",
                years, max_years
            ),
        }
    }
}

/// A timelock whose value already passed validation
///
/// Deserialized values are checked against the bounds that do not depend on
/// the chain tip or the clock; [`TimelockPolicy::revalidate`] covers the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimelock", into = "RawTimelock")]
pub struct TimelockPolicy {
    kind: TimelockKind,
    value: i64,
    /// Set for absolute calendar locks
    timezone: Option<TimezoneDetail>,
    /// Set for relative calendar locks
    period: Option<Period>,
}

#[derive(Serialize, Deserialize)]
struct RawTimelock {
    kind: TimelockKind,
    value: i64,
    timezone: Option<TimezoneDetail>,
    period: Option<Period>,
}

impl TryFrom<RawTimelock> for TimelockPolicy {
    type Error = ValidationError;

    fn try_from(raw: RawTimelock) -> Result<Self, Self::Error> {
        let timezone = match &raw.timezone {
            Some(detail) => parse_timezone(&detail.id)?,
            None => Tz::UTC,
        };
        if let Some(period) = raw.period {
            if raw.kind != TimelockKind::RELATIVE_TIME || period.total_seconds() != raw.value {
                return Err(ValidationError::PeriodMismatch {
                    value: raw.value,
                    period,
                });
            }
        }
        // no chain tip and the epoch as "now": only the fixed bounds apply
        let ctx = ValidationContext::new(0, DateTime::<Utc>::UNIX_EPOCH, timezone);
        check_canonical(raw.kind, raw.value, &ctx)?;
        Ok(Self {
            kind: raw.kind,
            value: raw.value,
            timezone: raw.timezone,
            period: raw.period,
        })
    }
}

impl From<TimelockPolicy> for RawTimelock {
    fn from(policy: TimelockPolicy) -> Self {
        Self {
            kind: policy.kind,
            value: policy.value,
            timezone: policy.timezone,
            period: policy.period,
        }
    }
}

impl TimelockPolicy {
    /// Validate `input` and keep the display metadata for its kind
    pub fn from_input(
        input: &TimelockInput,
        ctx: &ValidationContext,
    ) -> Result<Self, ValidationError> {
        let value = validate(input, ctx)?;
        let (timezone, period) = match input {
            TimelockInput::AbsoluteDate(_) => (timezone_detail(ctx.timezone.name(), ctx.now), None),
            TimelockInput::RelativePeriod(period) => (None, Some(*period)),
            TimelockInput::AbsoluteHeight(_) | TimelockInput::RelativeBlocks(_) => (None, None),
        };
        Ok(Self {
            kind: input.kind(),
            value,
            timezone,
            period,
        })
    }

    /// Midnight in `timezone`, `days_ahead` days after today
    ///
    /// A distance that fails validation (zero days, or past the year limit)
    /// falls back to midnight tomorrow.
    pub fn default_absolute(now: DateTime<Utc>, timezone: Tz, days_ahead: u32) -> Self {
        let ctx = ValidationContext::new(0, now, timezone);
        let today = now.with_timezone(&timezone).date_naive();
        let midnight_after = |days: u32| {
            today
                .checked_add_days(Days::new(days as u64))
                .map(|date| date.and_time(NaiveTime::MIN))
        };

        let value = midnight_after(days_ahead)
            .map(|midnight| to_canonical(&TimelockInput::AbsoluteDate(midnight), timezone))
            .filter(|value| check_canonical(TimelockKind::ABSOLUTE_TIME, *value, &ctx).is_ok())
            .unwrap_or_else(|| {
                log::warn!(
                    "default timelock {} days out is out of range, using tomorrow",
                    days_ahead
                );
                let tomorrow = midnight_after(1).unwrap_or_else(|| today.and_time(NaiveTime::MIN));
                to_canonical(&TimelockInput::AbsoluteDate(tomorrow), timezone)
            });

        Self {
            kind: TimelockKind::ABSOLUTE_TIME,
            value,
            timezone: timezone_detail(timezone.name(), now),
            period: None,
        }
    }

    pub fn kind(&self) -> TimelockKind {
        self.kind
    }

    /// Canonical value, see [`crate::normalize`]
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn timezone_detail(&self) -> Option<&TimezoneDetail> {
        self.timezone.as_ref()
    }

    /// Zone the value is displayed in; UTC when none was recorded
    pub fn timezone(&self) -> Tz {
        self.timezone
            .as_ref()
            .and_then(|detail| parse_timezone(&detail.id).ok())
            .unwrap_or(Tz::UTC)
    }

    /// Days/hours/minutes of a relative calendar lock
    ///
    /// Rebuilt from the value when the breakdown was not recorded.
    pub fn period(&self) -> Option<Period> {
        match (self.kind.lock, self.kind.unit) {
            (LockType::Relative, TimeUnit::CalendarTime) => {
                Some(self.period.unwrap_or_else(|| Period::from_seconds(self.value)))
            }
            _ => None,
        }
    }

    /// Check the stored value again, e.g. against a newer chain tip
    pub fn revalidate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        check_canonical(self.kind, self.value, ctx)
    }

    /// Label in the recorded zone
    pub fn describe(&self) -> String {
        describe(self.kind, self.value, self.timezone())
    }

    /// Label with the zone appended for absolute calendar locks,
    /// e.g. `02/01/2027 (Ho Chi Minh (GMT+07:00))`
    pub fn describe_with_zone(&self, at: DateTime<Utc>) -> String {
        match &self.timezone {
            Some(detail) if self.kind == TimelockKind::ABSOLUTE_TIME => {
                format!("{} ({})", self.describe(), zone_label(&detail.id, at))
            }
            _ => self.describe(),
        }
    }

    /// `nLockTime` or `nSequence` encoding of the value
    pub fn to_locktime(&self) -> Result<Locktime, LocktimeError> {
        encode_locktime(self.kind, self.value)
    }

    /// Warnings for an absolute calendar lock; other kinds have none
    pub fn advisories(&self, now: DateTime<Utc>, max_years: Option<u32>) -> Vec<TimelockAdvisory> {
        let mut advisories = Vec::new();
        if self.kind != TimelockKind::ABSOLUTE_TIME {
            return advisories;
        }
        if self.value >= SCRIPT_TIME_LIMIT {
            advisories.push(TimelockAdvisory::BeyondScriptTimeRange);
        }
        if let (Some(max_years), Some(years)) = (max_years, self.years_from(now)) {
            if years > max_years as i32 {
                advisories.push(TimelockAdvisory::ExceedsRecommendedHorizon { years, max_years });
            }
        }
        advisories
    }

    /// Whole calendar years between `now` and the unlock date
    fn years_from(&self, now: DateTime<Utc>) -> Option<i32> {
        let tz = self.timezone();
        let target = DateTime::from_timestamp(self.value, 0)?.with_timezone(&tz);
        let today = now.with_timezone(&tz);
        let mut years = target.year() - today.year();
        if (target.month(), target.day()) < (today.month(), today.day()) {
            years -= 1;
        }
        Some(years)
    }
}

/// Consensus encoding of a canonical value
///
/// Relative calendar locks round up to the next 512-second interval.
pub fn encode_locktime(kind: TimelockKind, value: i64) -> Result<Locktime, LocktimeError> {
    let locktime = match (kind.lock, kind.unit) {
        (LockType::Absolute, TimeUnit::CalendarTime) => u32::try_from(value)
            .ok()
            .and_then(|v| absolute::LockTime::from_time(v).ok())
            .map(Locktime::After),
        (LockType::Absolute, TimeUnit::BlockHeight) => u32::try_from(value)
            .ok()
            .and_then(|v| absolute::LockTime::from_height(v).ok())
            .map(Locktime::After),
        (LockType::Relative, TimeUnit::CalendarTime) => u32::try_from(value)
            .ok()
            .and_then(|v| Sequence::from_seconds_ceil(v).ok())
            .map(Locktime::Older),
        (LockType::Relative, TimeUnit::BlockHeight) => u16::try_from(value)
            .ok()
            .map(|v| Locktime::Older(Sequence::from_height(v))),
    };
    locktime.ok_or(LocktimeError::Unencodable { kind, value })
}

impl fmt::Display for TimelockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
