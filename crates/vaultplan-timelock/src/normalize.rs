//! Validation and canonical form of timelock input
//!
//! Pure functions over explicit inputs: the time zone and "now" are always
//! passed in, nothing reads the device clock or default zone.
//!
//! | kind            | canonical value      | accepted range                          |
//! |-----------------|----------------------|-----------------------------------------|
//! | absolute time   | unix seconds         | after `now`, before year 11516          |
//! | absolute height | block height         | current height ..= 499,999,999          |
//! | relative time   | seconds              | 0 ..= 388 days                          |
//! | relative height | block count          | 0 ..= 65,535                            |

use crate::input::{Period, TimelockInput};
use crate::kind::{
    LockType, TimeUnit, TimelockKind, MAX_ABSOLUTE_HEIGHT, MAX_CALENDAR_YEAR, MAX_RELATIVE_BLOCKS,
    MAX_RELATIVE_DAYS, SECONDS_PER_DAY,
};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Quarter-hour probes cover any DST gap, including whole skipped days.
const GAP_PROBES: u32 = 24 * 4 + 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("value must be between today and year {max}", max = MAX_CALENDAR_YEAR)]
    BeforeNow { value: i64 },

    #[error("value must be between today and year {max}", max = MAX_CALENDAR_YEAR)]
    BeyondMaxYear { value: i64 },

    #[error(
        "value must be between the current block height ({current}) and {max}",
        max = MAX_ABSOLUTE_HEIGHT
    )]
    BelowCurrentHeight { value: i64, current: u32 },

    #[error(
        "value must be between the current block height ({current}) and {max}",
        max = MAX_ABSOLUTE_HEIGHT
    )]
    AboveMaxHeight { value: i64, current: u32 },

    #[error("timelock must not exceed {max} days", max = MAX_RELATIVE_DAYS)]
    PeriodTooLong { seconds: i64 },

    #[error("value must be between 0 and {max} blocks", max = MAX_RELATIVE_BLOCKS)]
    BlocksOutOfRange { value: i64 },

    #[error("{kind} value must not be negative: {value}")]
    NegativeValue { kind: TimelockKind, value: i64 },

    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("recorded period {period} does not match value {value}")]
    PeriodMismatch { value: i64, period: Period },
}

impl ValidationError {
    /// Input outside the bounds table, as opposed to a bad zone id or a
    /// malformed stored record
    pub fn is_bounds_violation(&self) -> bool {
        !matches!(
            self,
            ValidationError::UnknownTimezone(_) | ValidationError::PeriodMismatch { .. }
        )
    }
}

/// Everything a check depends on besides the input itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    /// Latest known chain tip; `0` when the read failed or is still pending
    pub current_block_height: u32,
    pub now: DateTime<Utc>,
    /// Zone the wall-clock input is read in
    pub timezone: Tz,
}

impl ValidationContext {
    pub fn new(current_block_height: u32, now: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            current_block_height,
            now,
            timezone,
        }
    }
}

/// Check `input` against its bounds and return the canonical value
pub fn validate(input: &TimelockInput, ctx: &ValidationContext) -> Result<i64, ValidationError> {
    if let TimelockInput::AbsoluteDate(wall_clock) = input {
        if wall_clock.year() >= MAX_CALENDAR_YEAR {
            return Err(ValidationError::BeyondMaxYear {
                value: wall_clock.and_utc().timestamp(),
            });
        }
    }
    let value = to_canonical(input, ctx.timezone);
    check_canonical(input.kind(), value, ctx)?;
    Ok(value)
}

/// Check an already-canonical value, e.g. when re-validating at submit time
pub fn check_canonical(
    kind: TimelockKind,
    value: i64,
    ctx: &ValidationContext,
) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeValue { kind, value });
    }
    match (kind.lock, kind.unit) {
        (LockType::Absolute, TimeUnit::CalendarTime) => {
            if value <= ctx.now.timestamp() {
                return Err(ValidationError::BeforeNow { value });
            }
            let year = DateTime::from_timestamp(value, 0)
                .map(|instant| instant.with_timezone(&ctx.timezone).year());
            match year {
                Some(year) if year < MAX_CALENDAR_YEAR => Ok(()),
                _ => Err(ValidationError::BeyondMaxYear { value }),
            }
        }
        (LockType::Absolute, TimeUnit::BlockHeight) => {
            let current = ctx.current_block_height;
            if value < current as i64 {
                return Err(ValidationError::BelowCurrentHeight { value, current });
            }
            if value > MAX_ABSOLUTE_HEIGHT {
                return Err(ValidationError::AboveMaxHeight { value, current });
            }
            Ok(())
        }
        (LockType::Relative, TimeUnit::CalendarTime) => {
            if value > MAX_RELATIVE_DAYS as i64 * SECONDS_PER_DAY {
                return Err(ValidationError::PeriodTooLong { seconds: value });
            }
            Ok(())
        }
        (LockType::Relative, TimeUnit::BlockHeight) => {
            if value > MAX_RELATIVE_BLOCKS {
                return Err(ValidationError::BlocksOutOfRange { value });
            }
            Ok(())
        }
    }
}

/// Convert raw input to its canonical integer
///
/// A wall-clock date keeps its year, month, day, hour and minute and is read
/// in `timezone`; seconds are dropped. Every other input is already canonical.
pub fn to_canonical(input: &TimelockInput, timezone: Tz) -> i64 {
    match input {
        TimelockInput::AbsoluteDate(wall_clock) => anchor_wall_clock(*wall_clock, timezone),
        TimelockInput::AbsoluteHeight(height) => *height,
        TimelockInput::RelativePeriod(period) => period.total_seconds(),
        TimelockInput::RelativeBlocks(blocks) => *blocks,
    }
}

/// Unix seconds of `wall_clock` in `timezone`, minute precision
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap move forward to the first wall-clock time that exists.
pub fn anchor_wall_clock(wall_clock: NaiveDateTime, timezone: Tz) -> i64 {
    let wall_clock = wall_clock
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(wall_clock);

    let mut probe = wall_clock;
    for _ in 0..GAP_PROBES {
        if let Some(instant) = timezone.from_local_datetime(&probe).earliest() {
            return instant.timestamp();
        }
        match probe.checked_add_signed(TimeDelta::minutes(15)) {
            Some(next) => probe = next,
            None => break,
        }
    }

    log::warn!(
        "{} does not exist in {}, reading it as UTC",
        wall_clock,
        timezone.name()
    );
    wall_clock.and_utc().timestamp()
}

/// Human-readable label for a canonical value
///
/// - absolute time: `MM/DD/YYYY`, plus ` HH:MM` unless it is midnight
/// - absolute height: `block {n}`
/// - relative time: `{d}d {h}h {m}m`, zero parts left out
/// - relative height: `{n} blocks`
pub fn describe(kind: TimelockKind, value: i64, timezone: Tz) -> String {
    match (kind.lock, kind.unit) {
        (LockType::Absolute, TimeUnit::CalendarTime) => match DateTime::from_timestamp(value, 0) {
            Some(instant) => {
                let local = instant.with_timezone(&timezone);
                if local.hour() == 0 && local.minute() == 0 {
                    local.format("%m/%d/%Y").to_string()
                } else {
                    local.format("%m/%d/%Y %H:%M").to_string()
                }
            }
            None => value.to_string(),
        },
        (LockType::Absolute, TimeUnit::BlockHeight) => format!("block {}", value),
        (LockType::Relative, TimeUnit::CalendarTime) => Period::from_seconds(value).to_string(),
        (LockType::Relative, TimeUnit::BlockHeight) => format!("{} blocks", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(2026, 10, 16, 9, 30).and_utc()
    }

    fn ctx(height: u32, timezone: Tz) -> ValidationContext {
        ValidationContext::new(height, now(), timezone)
    }

    #[test]
    fn test_absolute_height_bounds() {
        let ctx = ctx(900_000, Tz::UTC);

        let below = validate(&TimelockInput::AbsoluteHeight(899_999), &ctx);
        assert_eq!(
            below,
            Err(ValidationError::BelowCurrentHeight {
                value: 899_999,
                current: 900_000
            })
        );
        assert!(below.unwrap_err().is_bounds_violation());

        assert_eq!(
            validate(&TimelockInput::AbsoluteHeight(900_000), &ctx),
            Ok(900_000)
        );
        assert_eq!(
            validate(&TimelockInput::AbsoluteHeight(499_999_999), &ctx),
            Ok(499_999_999)
        );
        assert!(matches!(
            validate(&TimelockInput::AbsoluteHeight(500_000_000), &ctx),
            Err(ValidationError::AboveMaxHeight { .. })
        ));
    }

    #[test]
    fn test_absolute_height_unknown_tip_accepts_more() {
        let ctx = ctx(0, Tz::UTC);
        assert_eq!(validate(&TimelockInput::AbsoluteHeight(0), &ctx), Ok(0));
        assert_eq!(validate(&TimelockInput::AbsoluteHeight(12), &ctx), Ok(12));
    }

    #[test]
    fn test_period_error_message() {
        let input = TimelockInput::RelativePeriod(Period::days(400));
        let err = validate(&input, &ctx(0, Tz::UTC)).unwrap_err();
        assert_eq!(err.to_string(), "timelock must not exceed 388 days");
        assert!(err.is_bounds_violation());
        assert!(!ValidationError::UnknownTimezone("X".into()).is_bounds_violation());
    }

    #[test]
    fn test_height_error_message() {
        let err = validate(&TimelockInput::AbsoluteHeight(5), &ctx(10, Tz::UTC)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "value must be between the current block height (10) and 499999999"
        );
    }

    #[test]
    fn test_relative_period_bounds() {
        let ctx = ctx(0, Tz::UTC);
        let days = |n| TimelockInput::RelativePeriod(Period::days(n));

        assert!(validate(&days(389), &ctx).is_err());
        assert_eq!(validate(&days(388), &ctx), Ok(388 * 86_400));
        assert_eq!(validate(&days(0), &ctx), Ok(0));

        // hours push the total over the limit
        let over = TimelockInput::RelativePeriod(Period::new(388, 1, 0));
        assert!(matches!(
            validate(&over, &ctx),
            Err(ValidationError::PeriodTooLong { .. })
        ));
        let under = TimelockInput::RelativePeriod(Period::new(387, 23, 59));
        assert!(validate(&under, &ctx).is_ok());
    }

    #[test]
    fn test_relative_blocks_bounds() {
        let ctx = ctx(0, Tz::UTC);
        assert!(validate(&TimelockInput::RelativeBlocks(65_536), &ctx).is_err());
        assert_eq!(
            validate(&TimelockInput::RelativeBlocks(65_535), &ctx),
            Ok(65_535)
        );
        assert_eq!(validate(&TimelockInput::RelativeBlocks(0), &ctx), Ok(0));
        assert_eq!(
            validate(&TimelockInput::RelativeBlocks(-1), &ctx),
            Err(ValidationError::NegativeValue {
                kind: TimelockKind::RELATIVE_HEIGHT,
                value: -1
            })
        );
    }

    #[test]
    fn test_absolute_date_yesterday_rejected_in_any_zone() {
        for zone in [
            Tz::UTC,
            chrono_tz::Pacific::Kiritimati,
            chrono_tz::Pacific::Pago_Pago,
            chrono_tz::Asia::Ho_Chi_Minh,
        ] {
            let today = now().with_timezone(&zone).date_naive();
            let yesterday = (today - Duration::days(1)).and_hms_opt(12, 0, 0).unwrap();
            let err = validate(&TimelockInput::AbsoluteDate(yesterday), &ctx(0, zone)).unwrap_err();
            assert!(matches!(err, ValidationError::BeforeNow { .. }));
            assert_eq!(err.to_string(), "value must be between today and year 11516");
        }
    }

    #[test]
    fn test_absolute_date_year_limit() {
        let ctx = ctx(0, Tz::UTC);
        let last_ok = TimelockInput::AbsoluteDate(at(11_515, 12, 31, 23, 59));
        assert!(validate(&last_ok, &ctx).is_ok());

        let too_far = TimelockInput::AbsoluteDate(at(11_516, 1, 1, 0, 0));
        assert!(matches!(
            validate(&too_far, &ctx),
            Err(ValidationError::BeyondMaxYear { .. })
        ));
    }

    #[test]
    fn test_absolute_date_at_chrono_limit() {
        let ctx = ctx(0, chrono_tz::America::New_York);
        assert!(matches!(
            validate(&TimelockInput::AbsoluteDate(NaiveDateTime::MAX), &ctx),
            Err(ValidationError::BeyondMaxYear { .. })
        ));

        let last_hour = TimelockInput::AbsoluteDate(at(262_142, 12, 31, 23, 0));
        assert!(matches!(
            validate(&last_hour, &ctx),
            Err(ValidationError::BeyondMaxYear { .. })
        ));
    }

    #[test]
    fn test_anchor_past_chrono_limit_reads_utc() {
        let zone = chrono_tz::America::New_York;
        assert_eq!(
            anchor_wall_clock(NaiveDateTime::MAX, zone),
            anchor_wall_clock(NaiveDateTime::MAX, Tz::UTC)
        );
    }

    #[test]
    fn test_wall_clock_reinterpreted_in_zone() {
        let wall = at(2027, 1, 15, 10, 30);
        let utc = anchor_wall_clock(wall, Tz::UTC);
        let saigon = anchor_wall_clock(wall, chrono_tz::Asia::Ho_Chi_Minh);
        let new_york = anchor_wall_clock(wall, chrono_tz::America::New_York);

        assert_eq!(utc, wall.and_utc().timestamp());
        assert_eq!(utc - saigon, 7 * 3_600);
        assert_eq!(new_york - utc, 5 * 3_600);
    }

    #[test]
    fn test_wall_clock_seconds_zeroed() {
        let wall = NaiveDate::from_ymd_opt(2027, 1, 15)
            .unwrap()
            .and_hms_milli_opt(10, 30, 45, 123)
            .unwrap();
        assert_eq!(
            anchor_wall_clock(wall, Tz::UTC),
            at(2027, 1, 15, 10, 30).and_utc().timestamp()
        );
    }

    #[test]
    fn test_wall_clock_dst_gap_and_overlap() {
        let zone = chrono_tz::America::New_York;

        // 02:30 on 2027-03-14 does not exist; 03:00 EDT is the next valid minute
        let gap = anchor_wall_clock(at(2027, 3, 14, 2, 30), zone);
        assert_eq!(gap, at(2027, 3, 14, 7, 0).and_utc().timestamp());

        // 01:30 on 2027-11-07 happens twice; take the EDT one
        let overlap = anchor_wall_clock(at(2027, 11, 7, 1, 30), zone);
        assert_eq!(overlap, at(2027, 11, 7, 5, 30).and_utc().timestamp());
    }

    #[test]
    fn test_describe_labels() {
        let midnight = at(2027, 2, 3, 0, 0).and_utc().timestamp();
        assert_eq!(
            describe(TimelockKind::ABSOLUTE_TIME, midnight, Tz::UTC),
            "02/03/2027"
        );
        assert_eq!(
            describe(TimelockKind::ABSOLUTE_TIME, midnight + 3_600 + 300, Tz::UTC),
            "02/03/2027 01:05"
        );
        assert_eq!(
            describe(TimelockKind::ABSOLUTE_HEIGHT, 950_000, Tz::UTC),
            "block 950000"
        );
        assert_eq!(
            describe(TimelockKind::RELATIVE_TIME, 90_000, Tz::UTC),
            "1d 1h"
        );
        assert_eq!(describe(TimelockKind::RELATIVE_TIME, 0, Tz::UTC), "0d");
        assert_eq!(
            describe(TimelockKind::RELATIVE_TIME, i64::MAX, Tz::UTC),
            "106751991167300d 15h 30m"
        );
        assert_eq!(
            describe(TimelockKind::RELATIVE_HEIGHT, 4_320, Tz::UTC),
            "4320 blocks"
        );
    }

    #[test]
    fn test_describe_uses_zone() {
        let instant = at(2027, 2, 3, 20, 0).and_utc().timestamp();
        assert_eq!(
            describe(TimelockKind::ABSOLUTE_TIME, instant, chrono_tz::Asia::Ho_Chi_Minh),
            "02/04/2027 03:00"
        );
    }

    /// Inverse of `describe`, for round-trip checks only.
    fn parse_label(kind: TimelockKind, label: &str) -> Option<i64> {
        match (kind.lock, kind.unit) {
            (LockType::Absolute, TimeUnit::CalendarTime) => None,
            (LockType::Absolute, TimeUnit::BlockHeight) => label.strip_prefix("block ")?.parse().ok(),
            (LockType::Relative, TimeUnit::BlockHeight) => label.strip_suffix(" blocks")?.parse().ok(),
            (LockType::Relative, TimeUnit::CalendarTime) => {
                let mut seconds = 0i64;
                for part in label.split(' ') {
                    let (number, unit) = part.split_at(part.len() - 1);
                    let n: i64 = number.parse().ok()?;
                    seconds += match unit {
                        "d" => n * SECONDS_PER_DAY,
                        "h" => n * 3_600,
                        "m" => n * 60,
                        _ => return None,
                    };
                }
                Some(seconds)
            }
        }
    }

    fn arb_zone() -> impl Strategy<Value = Tz> {
        prop::sample::select(vec![
            Tz::UTC,
            chrono_tz::Asia::Ho_Chi_Minh,
            chrono_tz::America::New_York,
            chrono_tz::Europe::Berlin,
            chrono_tz::Australia::Adelaide,
            chrono_tz::Asia::Kathmandu,
        ])
    }

    proptest! {
        #[test]
        fn prop_describe_roundtrip_counts(height in 0i64..=MAX_ABSOLUTE_HEIGHT, blocks in 0i64..=MAX_RELATIVE_BLOCKS) {
            let input = TimelockInput::AbsoluteHeight(height);
            let value = to_canonical(&input, Tz::UTC);
            prop_assert_eq!(parse_label(input.kind(), &describe(input.kind(), value, Tz::UTC)), Some(height));

            let input = TimelockInput::RelativeBlocks(blocks);
            let value = to_canonical(&input, Tz::UTC);
            prop_assert_eq!(parse_label(input.kind(), &describe(input.kind(), value, Tz::UTC)), Some(blocks));
        }

        #[test]
        fn prop_describe_roundtrip_period(days in 0u32..=MAX_RELATIVE_DAYS, hours in 0u32..24, minutes in 0u32..60) {
            let input = TimelockInput::RelativePeriod(Period::new(days.into(), hours, minutes));
            let value = to_canonical(&input, Tz::UTC);
            prop_assert_eq!(parse_label(input.kind(), &describe(input.kind(), value, Tz::UTC)), Some(value));
        }

        /// Calendar labels keep the chosen date in the chosen zone.
        #[test]
        fn prop_describe_roundtrip_date(
            zone in arb_zone(),
            day_offset in 1i64..20_000,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let date = now().date_naive() + Duration::days(day_offset);
            let wall = date.and_hms_opt(hour, minute, 0).unwrap();
            let value = to_canonical(&TimelockInput::AbsoluteDate(wall), zone);
            let label = describe(TimelockKind::ABSOLUTE_TIME, value, zone);
            let (date_part, _) = label.split_once(' ').unwrap_or((label.as_str(), ""));
            let parsed = NaiveDate::parse_from_str(date_part, "%m/%d/%Y").unwrap();
            prop_assert_eq!(parsed, date);
        }
    }
}
