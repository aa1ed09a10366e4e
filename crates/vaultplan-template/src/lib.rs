//! vaultplan templates
//!
//! Assembles a two-stage multisig template: an initial M-of-N policy that
//! automatically changes into a second one once a timelock expires.
//!
//! A [`Coordinator`] owns the [`PolicyConfiguration`] for one wallet-creation
//! session. Shape edits go through `vaultplan-policy`, timelock input through
//! `vaultplan-timelock`, and [`Coordinator::finalize`] produces the
//! [`TemplateRequest`] handed to a [`TemplateService`].
//!
//! # Example
//!
//! ```ignore
//! use vaultplan_template::{AddressType, Coordinator, PolicySketcher};
//! use vaultplan_policy::{MultisigVariant, PolicySlot, ShapeField, Step};
//!
//! let mut session = Coordinator::new(MultisigVariant::Decaying, AddressType::Taproot, now, tz);
//! session.open_policy_editor(PolicySlot::Initial)?;
//! session.step_draft(ShapeField::Total, Step::Increment)?;
//! session.save_policy()?;
//! let template = session.submit(&PolicySketcher, now)?;
//! ```

pub mod config;
pub mod configuration;
pub mod coordinator;
pub mod request;
pub mod sketch;

pub use config::TemplateConfig;
pub use configuration::{PolicyConfiguration, DEFAULT_TIMELOCK_DAYS};
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorState};
pub use request::{
    AddressType, PolicySketcher, TemplateDescriptor, TemplateRequest, TemplateService,
    TemplateServiceError,
};
pub use sketch::{policy_sketch, summary, SketchError};
