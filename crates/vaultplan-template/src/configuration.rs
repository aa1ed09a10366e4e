//! The aggregate being edited: two shapes, a timelock and the signer reuse flag

use crate::sketch::{self, SketchError};
use chrono::{DateTime, Utc};
use miniscript::policy::Concrete;
use serde::Serialize;
use vaultplan_policy::{
    apply_edit, step, MultisigPolicy, MultisigShape, MultisigVariant, PolicySlot, ShapeField, Step,
};
use vaultplan_timelock::{LocktimeError, TimelockPolicy, Tz};

/// Days between "now" and the default absolute timelock
pub const DEFAULT_TIMELOCK_DAYS: u32 = 30;

/// Everything the user picks before a template is created
///
/// Edits consume the configuration and return the next one, so the
/// variant rules hold between any two calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyConfiguration {
    policy: MultisigPolicy,
    timelock: TimelockPolicy,
    reuse_signers: bool,
}

impl PolicyConfiguration {
    /// Variant defaults with an absolute timelock `timelock_days` out, at
    /// midnight in `timezone`
    pub fn new(
        variant: MultisigVariant,
        now: DateTime<Utc>,
        timezone: Tz,
        timelock_days: u32,
    ) -> Self {
        Self {
            policy: MultisigPolicy::default_for(variant),
            timelock: TimelockPolicy::default_absolute(now, timezone, timelock_days),
            reuse_signers: variant == MultisigVariant::Flexible,
        }
    }

    pub fn variant(&self) -> MultisigVariant {
        self.policy.variant()
    }

    pub fn policy(&self) -> &MultisigPolicy {
        &self.policy
    }

    pub fn initial(&self) -> MultisigShape {
        self.policy.initial()
    }

    pub fn post_timelock(&self) -> MultisigShape {
        self.policy.post_timelock()
    }

    pub fn timelock(&self) -> &TimelockPolicy {
        &self.timelock
    }

    pub fn reuse_signers(&self) -> bool {
        self.reuse_signers
    }

    /// Signer reuse can only be chosen for absolute timelocks
    pub fn reuse_signers_editable(&self) -> bool {
        !self.timelock.kind().is_relative()
    }

    /// Store `edited` in `slot` and auto-correct the other shape
    pub fn with_edit(self, slot: PolicySlot, edited: MultisigShape) -> Self {
        Self {
            policy: apply_edit(slot, edited, &self.policy),
            ..self
        }
    }

    /// Step one field; refused steps return the configuration unchanged
    pub fn with_step(self, slot: PolicySlot, field: ShapeField, direction: Step) -> Self {
        Self {
            policy: step(slot, field, direction, &self.policy),
            ..self
        }
    }

    /// Replace the timelock; a relative one turns signer reuse off
    pub fn with_timelock(self, timelock: TimelockPolicy) -> Self {
        let reuse_signers = self.reuse_signers && !timelock.kind().is_relative();
        if reuse_signers != self.reuse_signers {
            log::debug!("relative timelock selected, signer reuse turned off");
        }
        Self {
            timelock,
            reuse_signers,
            ..self
        }
    }

    /// `None` when the flag is locked by a relative timelock
    pub fn with_reuse_signers(self, reuse_signers: bool) -> Option<Self> {
        if !self.reuse_signers_editable() {
            return None;
        }
        Some(Self {
            reuse_signers,
            ..self
        })
    }

    /// e.g. "2 of 3 multisig will automatically change to a 3 of 3 multisig after 01/02/2027"
    pub fn summary(&self) -> String {
        sketch::summary(
            self.initial(),
            self.post_timelock(),
            self.timelock.kind(),
            self.timelock.value(),
            self.timelock.timezone(),
        )
    }

    /// Miniscript policy with placeholder keys
    pub fn policy_sketch(&self) -> Result<Concrete<String>, SketchError> {
        let locktime = self
            .timelock
            .to_locktime()
            .map_err(|e: LocktimeError| SketchError::Timelock(e.to_string()))?;
        sketch::policy_sketch(
            self.initial(),
            self.post_timelock(),
            locktime,
            self.reuse_signers,
        )
    }
}
