//! Field bounds and cross-shape auto-correction
//!
//! Pure logic: every function takes a [`MultisigPolicy`] and returns a new
//! one. Requests that would break a bound are refused (the input comes back
//! unchanged) or auto-corrected, never reported as errors.
//!
//! # Variant rules
//!
//! ```text
//! expanding:  post.total    > initial.total      post.required == initial.required
//! decaying:   post.required < initial.required   post.total    == initial.total
//! flexible:   no cross-shape rule
//! ```

use crate::shape::{MultisigPolicy, MultisigShape, MultisigVariant, PolicySlot, MAX_TOTAL_KEYS};
use serde::{Deserialize, Serialize};

/// Smallest total offered by the stepper controls
const MIN_STEPPER_TOTAL: u8 = 2;

/// Legal range for each field of the shape being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBounds {
    pub min_required: u8,
    pub max_required: u8,
    pub min_total: u8,
    pub max_total: u8,
    /// Whether the required-signatures field is user-editable
    pub show_required: bool,
    /// Whether the total-keys field is user-editable
    pub show_total: bool,
}

/// Field targeted by a stepper control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeField {
    Required,
    Total,
}

/// Stepper direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Increment,
    Decrement,
}

/// Compute the editable range for the shape in `slot`
pub fn compute_bounds(slot: PolicySlot, policy: &MultisigPolicy) -> FieldBounds {
    let initial = policy.initial;
    let post = policy.post_timelock;

    match (slot, policy.variant) {
        (PolicySlot::Initial, variant) => FieldBounds {
            min_required: if variant == MultisigVariant::Decaying {
                post.required() + 1
            } else {
                1
            },
            max_required: MAX_TOTAL_KEYS,
            min_total: MIN_STEPPER_TOTAL,
            // Expanding keeps one slot free for the post-timelock signer.
            max_total: if variant == MultisigVariant::Expanding {
                MAX_TOTAL_KEYS - 1
            } else {
                MAX_TOTAL_KEYS
            },
            show_required: true,
            show_total: true,
        },
        (PolicySlot::PostTimelock, MultisigVariant::Flexible) => FieldBounds {
            min_required: 1,
            max_required: MAX_TOTAL_KEYS,
            min_total: MIN_STEPPER_TOTAL,
            max_total: MAX_TOTAL_KEYS,
            show_required: true,
            show_total: true,
        },
        (PolicySlot::PostTimelock, MultisigVariant::Expanding) => FieldBounds {
            min_required: initial.required(),
            max_required: initial.required(),
            min_total: initial.total() + 1,
            max_total: MAX_TOTAL_KEYS,
            show_required: false,
            show_total: true,
        },
        (PolicySlot::PostTimelock, MultisigVariant::Decaying) => FieldBounds {
            min_required: 1,
            max_required: initial.required() - 1,
            min_total: initial.total(),
            max_total: initial.total(),
            show_required: true,
            show_total: false,
        },
    }
}

/// Move one field of `shape` by one, within `bounds`
///
/// Returns `shape` untouched when the control would be disabled.
pub fn step_shape(
    bounds: &FieldBounds,
    shape: MultisigShape,
    field: ShapeField,
    step: Step,
) -> MultisigShape {
    let (required, total) = (shape.required(), shape.total());

    let next = match (field, step) {
        (ShapeField::Required, _) if !bounds.show_required => None,
        (ShapeField::Total, _) if !bounds.show_total => None,
        (ShapeField::Required, Step::Increment) => {
            (required < total.min(bounds.max_required)).then(|| (required + 1, total))
        }
        (ShapeField::Required, Step::Decrement) => {
            (required > bounds.min_required).then(|| (required - 1, total))
        }
        (ShapeField::Total, Step::Increment) => {
            (total < bounds.max_total).then(|| (required, total + 1))
        }
        (ShapeField::Total, Step::Decrement) => {
            (total > bounds.min_total && total > required).then(|| (required, total - 1))
        }
    };

    match next {
        Some((required, total)) => MultisigShape::new_unchecked(required, total),
        None => shape,
    }
}

/// Step one field of the shape in `slot`, then auto-correct the other shape
pub fn step(
    slot: PolicySlot,
    field: ShapeField,
    step: Step,
    policy: &MultisigPolicy,
) -> MultisigPolicy {
    let bounds = compute_bounds(slot, policy);
    let current = policy.shape(slot);
    let stepped = step_shape(&bounds, current, field, step);
    if stepped == current {
        log::debug!("refused {:?} {:?} on {:?} {}", step, field, slot, current);
        return *policy;
    }
    apply_edit(slot, stepped, policy)
}

/// Write `edited` into `slot` and restore the variant rule
pub fn apply_edit(
    slot: PolicySlot,
    edited: MultisigShape,
    policy: &MultisigPolicy,
) -> MultisigPolicy {
    let mut next = *policy;
    match slot {
        PolicySlot::Initial => next.initial = edited,
        PolicySlot::PostTimelock => next.post_timelock = edited,
    }

    match next.variant {
        MultisigVariant::Flexible => {}
        MultisigVariant::Expanding => correct_expanding(&mut next),
        MultisigVariant::Decaying => correct_decaying(&mut next, slot),
    }

    debug_assert!(next.is_consistent(), "engine produced {:?}", next);
    next
}

fn correct_expanding(policy: &mut MultisigPolicy) {
    if policy.initial.total() >= MAX_TOTAL_KEYS {
        let total = MAX_TOTAL_KEYS - 1;
        let required = policy.initial.required().min(total);
        policy.initial = MultisigShape::new_unchecked(required, total);
    }

    let required = policy.initial.required();
    let mut total = policy.post_timelock.total();
    if total <= policy.initial.total() {
        total = policy.initial.total() + 1;
        log::debug!(
            "expanding: post-timelock total bumped to {} (initial {})",
            total,
            policy.initial
        );
    }
    policy.post_timelock = MultisigShape::new_unchecked(required, total);
}

fn correct_decaying(policy: &mut MultisigPolicy, slot: PolicySlot) {
    match slot {
        PolicySlot::Initial => {
            let mut initial = policy.initial;
            // Something has to be left to decay to.
            if initial.required() < 2 {
                initial = MultisigShape::new_unchecked(2, initial.total().max(2));
            }
            let required = policy
                .post_timelock
                .required()
                .min(initial.required() - 1);
            if required != policy.post_timelock.required() {
                log::debug!(
                    "decaying: post-timelock required lowered to {} (initial {})",
                    required,
                    initial
                );
            }
            policy.initial = initial;
            policy.post_timelock = MultisigShape::new_unchecked(required, initial.total());
        }
        PolicySlot::PostTimelock => {
            let required = policy.post_timelock.required().min(MAX_TOTAL_KEYS - 1);
            let mut initial = policy.initial;
            if required >= initial.required() {
                let bumped = required + 1;
                initial = MultisigShape::new_unchecked(bumped, initial.total().max(bumped));
                log::debug!("decaying: initial policy raised to {}", initial);
            }
            policy.initial = initial;
            policy.post_timelock = MultisigShape::new_unchecked(required, initial.total());
        }
    }
}
