//! vaultplan policy shapes
//!
//! M-of-N bookkeeping for two-stage miniscript wallets, where one multisig
//! policy automatically changes into another once a timelock expires.
//!
//! # Variants
//!
//! - **Flexible**: the post-timelock policy is independent
//! - **Expanding**: more signers join after the timelock, threshold unchanged
//! - **Decaying**: fewer signatures needed after the timelock, same signers
//!
//! ```text
//! 2 of 3  ──(timelock)──▶  1 of 3     decaying
//! 2 of 2  ──(timelock)──▶  2 of 3     expanding
//! ```
//!
//! The [`engine`] never errors on an edit: out-of-range requests are either
//! refused or auto-corrected so that a [`MultisigPolicy`] is always consistent.

pub mod engine;
pub mod shape;

pub use engine::{apply_edit, compute_bounds, step, step_shape, FieldBounds, ShapeField, Step};
pub use shape::{MultisigPolicy, MultisigShape, MultisigVariant, PolicyError, PolicySlot, MAX_TOTAL_KEYS};
