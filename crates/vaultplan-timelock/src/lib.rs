//! vaultplan timelocks
//!
//! Validates what a user types into a timelock form and turns it into the
//! single integer a miniscript template needs, then back into a label.
//!
//! ```text
//! TimelockInput ──validate──▶ i64 ──describe──▶ "02/01/2027"
//!                                 └─to_locktime─▶ nLockTime / nSequence
//! ```
//!
//! Four kinds of lock are supported: absolute or relative, counted in
//! calendar time or in blocks. Calendar input is read as wall-clock time in
//! an explicit IANA zone; nothing here looks at the host clock or zone.

pub mod input;
pub mod kind;
pub mod normalize;
pub mod policy;
pub mod timezone;

pub use input::{parse_digits, Period, TimelockInput};
pub use kind::{
    LockType, TimeUnit, TimelockKind, MAX_ABSOLUTE_HEIGHT, MAX_CALENDAR_YEAR, MAX_RELATIVE_BLOCKS,
    MAX_RELATIVE_DAYS,
};
pub use normalize::{
    anchor_wall_clock, check_canonical, describe, to_canonical, validate, ValidationContext,
    ValidationError,
};
pub use policy::{
    encode_locktime, Locktime, LocktimeError, TimelockAdvisory, TimelockPolicy, SCRIPT_TIME_LIMIT,
};
pub use timezone::{
    offset_label, parse_timezone, search_timezones, timezone_detail, zone_label, TimezoneDetail,
};

/// Re-exported so callers can name zones without their own `chrono-tz` dependency
pub use chrono_tz::Tz;
