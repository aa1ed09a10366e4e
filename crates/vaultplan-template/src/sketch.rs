//! Miniscript policy sketch and plain-language summary
//!
//! Keys are placeholders (`K1`, `K2`, ...) since signers are picked later.
//!
//! ```text
//! or(
//!   thresh(m, K1..Kn),
//!   and(thresh(m', keys'), after(t) | older(t))
//! )
//! ```

use bitcoin::relative;
use miniscript::policy::Concrete;
use miniscript::{AbsLockTime, RelLockTime, Threshold};
use std::sync::Arc;
use thiserror::Error;
use vaultplan_policy::MultisigShape;
use vaultplan_timelock::{describe, Locktime, TimelockKind, Tz, SCRIPT_TIME_LIMIT};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    #[error("A zero timelock cannot be expressed in a policy")]
    ZeroTimelock,

    #[error("Timelock not expressible in script: {0}")]
    Timelock(String),

    #[error("Invalid threshold: {0}")]
    Threshold(String),
}

/// Build the two-stage spending policy
///
/// With `reuse_signers` the post-timelock keys are drawn from the same
/// `K1..` names as the initial ones; otherwise they continue the numbering.
pub fn policy_sketch(
    initial: MultisigShape,
    post_timelock: MultisigShape,
    locktime: Locktime,
    reuse_signers: bool,
) -> Result<Concrete<String>, SketchError> {
    let first_post_key = if reuse_signers {
        1
    } else {
        initial.total() as u16 + 1
    };
    let initial_keys = key_names(1, initial.total());
    let post_keys = key_names(first_post_key, post_timelock.total());

    let before = threshold(initial.required(), initial_keys)?;
    let after = Concrete::And(vec![
        Arc::new(threshold(post_timelock.required(), post_keys)?),
        Arc::new(timelock_policy(locktime)?),
    ]);
    Ok(Concrete::Or(vec![(1, Arc::new(before)), (1, Arc::new(after))]))
}

/// One-line description of what happens at the timelock
pub fn summary(
    initial: MultisigShape,
    post_timelock: MultisigShape,
    kind: TimelockKind,
    value: i64,
    timezone: Tz,
) -> String {
    let mut text = format!(
        "{} multisig will automatically change to a {} multisig after {}",
        initial,
        post_timelock,
        describe(kind, value, timezone)
    );
    if kind.is_relative() {
        text.push_str(" from the time the coins are received");
    }
    text
}

fn key_names(first: u16, count: u8) -> Vec<String> {
    (first..first + count as u16)
        .map(|i| format!("K{}", i))
        .collect()
}

fn threshold(k: u8, keys: Vec<String>) -> Result<Concrete<String>, SketchError> {
    let keys: Vec<Arc<Concrete<String>>> = keys
        .into_iter()
        .map(|key| Arc::new(Concrete::Key(key)))
        .collect();
    Threshold::new(k as usize, keys)
        .map(Concrete::Thresh)
        .map_err(|e| SketchError::Threshold(e.to_string()))
}

fn timelock_policy(locktime: Locktime) -> Result<Concrete<String>, SketchError> {
    match locktime {
        Locktime::After(lock) => {
            let n = lock.to_consensus_u32();
            if n == 0 {
                return Err(SketchError::ZeroTimelock);
            }
            if n as i64 >= SCRIPT_TIME_LIMIT {
                return Err(SketchError::Timelock(format!(
                    "after({}) is past the script time range",
                    n
                )));
            }
            AbsLockTime::from_consensus(n)
                .map(Concrete::After)
                .map_err(|e| SketchError::Timelock(e.to_string()))
        }
        Locktime::Older(sequence) => match sequence.to_relative_lock_time() {
            Some(relative::LockTime::Blocks(height)) if height.value() > 0 => {
                Ok(Concrete::Older(RelLockTime::from_height(height.value())))
            }
            Some(relative::LockTime::Time(time)) if time.value() > 0 => Ok(Concrete::Older(
                RelLockTime::from_512_second_intervals(time.value()),
            )),
            Some(_) => Err(SketchError::ZeroTimelock),
            None => Err(SketchError::Timelock(format!(
                "sequence {:#x} has relative locks disabled",
                sequence.to_consensus_u32()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{absolute, Sequence};

    fn shape(required: u8, total: u8) -> MultisigShape {
        MultisigShape::new(required, total).unwrap()
    }

    #[test]
    fn test_sketch_reusing_signers() {
        let lock = Locktime::After(absolute::LockTime::from_height(950_000).unwrap());
        let policy = policy_sketch(shape(2, 3), shape(3, 3), lock, true).unwrap();
        let text = policy.to_string();

        assert!(text.starts_with("or(thresh(2,pk(K1),pk(K2),pk(K3)),and(thresh(3,"));
        assert!(text.contains("after(950000)"));
        assert!(!text.contains("K4"));
    }

    #[test]
    fn test_sketch_fresh_signers() {
        let lock = Locktime::Older(Sequence::from_height(4_320));
        let policy = policy_sketch(shape(2, 2), shape(2, 3), lock, false).unwrap();
        let text = policy.to_string();

        assert!(text.contains("thresh(2,pk(K3),pk(K4),pk(K5))"));
        assert!(text.contains("older(4320)"));
    }

    #[test]
    fn test_sketch_rejects_zero_lock() {
        let lock = Locktime::Older(Sequence::from_height(0));
        assert_eq!(
            policy_sketch(shape(2, 3), shape(1, 3), lock, false),
            Err(SketchError::ZeroTimelock)
        );

        let lock = Locktime::After(absolute::LockTime::ZERO);
        assert_eq!(
            policy_sketch(shape(2, 3), shape(1, 3), lock, false),
            Err(SketchError::ZeroTimelock)
        );
    }

    #[test]
    fn test_sketch_rejects_late_timestamps() {
        // after() stops at 2^31 - 1
        let lock = Locktime::After(absolute::LockTime::from_time(0x8000_0000).unwrap());
        assert!(matches!(
            policy_sketch(shape(2, 3), shape(1, 3), lock, false),
            Err(SketchError::Timelock(_))
        ));
    }

    #[test]
    fn test_summary_text() {
        let value = chrono::NaiveDate::from_ymd_opt(2027, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(
            summary(shape(2, 3), shape(3, 3), TimelockKind::ABSOLUTE_TIME, value, Tz::UTC),
            "2 of 3 multisig will automatically change to a 3 of 3 multisig after 01/02/2027"
        );
        assert_eq!(
            summary(shape(2, 3), shape(1, 3), TimelockKind::RELATIVE_HEIGHT, 4_320, Tz::UTC),
            "2 of 3 multisig will automatically change to a 1 of 3 multisig after 4320 blocks \
             from the time the coins are received"
        );
    }
}
