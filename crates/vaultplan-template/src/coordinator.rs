//! Editing session for one policy configuration
//!
//! ```text
//! Idle ──open_policy_editor / open_timelock_editor──▶ Editing*
//!  ▲                                                     │
//!  └───────────────── save_* / dismiss ──────────────────┘
//!
//! Idle ──finalize──▶ Ready   (later edits: CoordinatorError::Finalized)
//! ```

use crate::configuration::{PolicyConfiguration, DEFAULT_TIMELOCK_DAYS};
use crate::request::{
    AddressType, TemplateDescriptor, TemplateRequest, TemplateService, TemplateServiceError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use vaultplan_electrum::{fetch_block_height, ChainTipProvider};
use vaultplan_policy::{
    compute_bounds, step_shape, FieldBounds, MultisigShape, MultisigVariant, PolicySlot, ShapeField,
    Step,
};
use vaultplan_timelock::{
    parse_timezone, TimelockAdvisory, TimelockInput, TimelockPolicy, Tz, ValidationContext,
    ValidationError,
};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Configuration is finalized; start a new coordinator to make changes")]
    Finalized,

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CoordinatorState,
    },

    #[error("Invalid timelock: {0}")]
    Validation(#[from] ValidationError),

    #[error("Signer reuse cannot be changed while the timelock is relative")]
    ReuseLocked,

    #[error("Template service error: {0}")]
    Service(#[from] TemplateServiceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinatorState {
    Idle,
    EditingInitialPolicy,
    EditingPostTimelockPolicy,
    EditingTimelock,
    Ready,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::EditingInitialPolicy => "editing the initial policy",
            CoordinatorState::EditingPostTimelockPolicy => "editing the post-timelock policy",
            CoordinatorState::EditingTimelock => "editing the timelock",
            CoordinatorState::Ready => "finalized",
        };
        f.write_str(name)
    }
}

/// Single owner of a [`PolicyConfiguration`] during wallet creation
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: PolicyConfiguration,
    address_type: AddressType,
    state: CoordinatorState,
    /// Shape under edit while a policy editor is open
    draft: Option<MultisigShape>,
    /// Latest chain tip; `0` until a read succeeds
    current_block_height: u32,
    /// Zone calendar input is read in
    timezone: Tz,
    max_timelock_years: Option<u32>,
    request: Option<TemplateRequest>,
}

impl Coordinator {
    /// Start a session with the variant's defaults
    pub fn new(
        variant: MultisigVariant,
        address_type: AddressType,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> Self {
        Self::with_timelock_days(variant, address_type, now, timezone, DEFAULT_TIMELOCK_DAYS)
    }

    /// Like [`Coordinator::new`] with a custom default timelock distance
    pub fn with_timelock_days(
        variant: MultisigVariant,
        address_type: AddressType,
        now: DateTime<Utc>,
        timezone: Tz,
        timelock_days: u32,
    ) -> Self {
        log::debug!(
            "starting {} session in {} ({} day default timelock)",
            variant,
            timezone.name(),
            timelock_days
        );
        Self {
            config: PolicyConfiguration::new(variant, now, timezone, timelock_days),
            address_type,
            state: CoordinatorState::Idle,
            draft: None,
            current_block_height: 0,
            timezone,
            max_timelock_years: None,
            request: None,
        }
    }

    /// Warn when a calendar lock is more than `years` away
    pub fn with_max_timelock_years(mut self, years: Option<u32>) -> Self {
        self.max_timelock_years = years;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn config(&self) -> &PolicyConfiguration {
        &self.config
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn current_block_height(&self) -> u32 {
        self.current_block_height
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Shape shown in the open policy editor
    pub fn draft(&self) -> Option<MultisigShape> {
        self.draft
    }

    /// The request produced by [`Coordinator::finalize`]
    pub fn request(&self) -> Option<&TemplateRequest> {
        self.request.as_ref()
    }

    // ------------------------------------------------------------------------
    // Policy editors
    // ------------------------------------------------------------------------

    /// Open the editor for one shape and return its bounds
    pub fn open_policy_editor(&mut self, slot: PolicySlot) -> Result<FieldBounds, CoordinatorError> {
        self.require_idle("open a policy editor")?;
        self.state = match slot {
            PolicySlot::Initial => CoordinatorState::EditingInitialPolicy,
            PolicySlot::PostTimelock => CoordinatorState::EditingPostTimelockPolicy,
        };
        self.draft = Some(self.config.policy().shape(slot));
        Ok(compute_bounds(slot, self.config.policy()))
    }

    /// Step one field of the draft; refused steps leave it unchanged
    pub fn step_draft(
        &mut self,
        field: ShapeField,
        direction: Step,
    ) -> Result<MultisigShape, CoordinatorError> {
        let (slot, draft) = self.editing_slot("step a policy field")?;
        let bounds = compute_bounds(slot, self.config.policy());
        let next = step_shape(&bounds, draft, field, direction);
        self.draft = Some(next);
        Ok(next)
    }

    /// Commit the draft, auto-correcting the other shape, and return to idle
    pub fn save_policy(&mut self) -> Result<&PolicyConfiguration, CoordinatorError> {
        let (slot, draft) = self.editing_slot("save a policy")?;
        self.config = self.config.clone().with_edit(slot, draft);
        log::debug!(
            "saved {:?}: {} then {}",
            slot,
            self.config.initial(),
            self.config.post_timelock()
        );
        self.close_editor();
        Ok(&self.config)
    }

    // ------------------------------------------------------------------------
    // Timelock editor
    // ------------------------------------------------------------------------

    pub fn open_timelock_editor(&mut self) -> Result<&TimelockPolicy, CoordinatorError> {
        self.require_idle("open the timelock editor")?;
        self.state = CoordinatorState::EditingTimelock;
        Ok(self.config.timelock())
    }

    /// Validate and store the timelock
    ///
    /// `timezone_id` switches the selected zone first. On a validation error
    /// the editor stays open and nothing changes.
    pub fn save_timelock(
        &mut self,
        input: &TimelockInput,
        timezone_id: Option<&str>,
    ) -> Result<&TimelockPolicy, CoordinatorError> {
        self.save_timelock_at(input, timezone_id, Utc::now())
    }

    /// [`Coordinator::save_timelock`] against an explicit clock
    pub fn save_timelock_at(
        &mut self,
        input: &TimelockInput,
        timezone_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&TimelockPolicy, CoordinatorError> {
        match self.state {
            CoordinatorState::EditingTimelock => {}
            CoordinatorState::Ready => return Err(CoordinatorError::Finalized),
            state => {
                return Err(CoordinatorError::InvalidState {
                    action: "save the timelock",
                    state,
                })
            }
        }

        let timezone = match timezone_id {
            Some(id) => parse_timezone(id)?,
            None => self.timezone,
        };
        let ctx = ValidationContext::new(self.current_block_height, now, timezone);
        let timelock = TimelockPolicy::from_input(input, &ctx).map_err(|e| {
            log::debug!("timelock rejected: {}", e);
            e
        })?;
        log::debug!("timelock set to {} ({})", timelock, timelock.kind());

        self.timezone = timezone;
        self.config = self.config.clone().with_timelock(timelock);
        self.state = CoordinatorState::Idle;
        Ok(self.config.timelock())
    }

    /// Close any open editor without saving
    pub fn dismiss(&mut self) -> Result<(), CoordinatorError> {
        if self.state == CoordinatorState::Ready {
            return Err(CoordinatorError::Finalized);
        }
        self.close_editor();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Other settings
    // ------------------------------------------------------------------------

    /// Returns the stored flag
    pub fn set_reuse_signers(&mut self, reuse_signers: bool) -> Result<bool, CoordinatorError> {
        self.require_mutable()?;
        match self.config.clone().with_reuse_signers(reuse_signers) {
            Some(config) => {
                self.config = config;
                Ok(reuse_signers)
            }
            None => Err(CoordinatorError::ReuseLocked),
        }
    }

    /// Select the zone used for the next calendar input
    pub fn set_timezone(&mut self, timezone_id: &str) -> Result<Tz, CoordinatorError> {
        self.require_mutable()?;
        self.timezone = parse_timezone(timezone_id)?;
        Ok(self.timezone)
    }

    pub fn set_address_type(&mut self, address_type: AddressType) -> Result<(), CoordinatorError> {
        self.require_mutable()?;
        self.address_type = address_type;
        Ok(())
    }

    /// Record a chain tip read; `0` means unknown
    pub fn set_block_height(&mut self, height: u32) {
        self.current_block_height = height;
    }

    /// Read the chain tip once and keep it for validation
    pub async fn refresh_block_height<P: ChainTipProvider>(&mut self, provider: Arc<P>) -> u32 {
        let height = fetch_block_height(provider).await;
        self.set_block_height(height);
        height
    }

    // ------------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------------

    /// Warnings for the current timelock
    pub fn advisories(&self, now: DateTime<Utc>) -> Vec<TimelockAdvisory> {
        self.config
            .timelock()
            .advisories(now, self.max_timelock_years)
    }

    /// Re-check the timelock against `now` and the latest height, then freeze
    ///
    /// A stale timelock keeps the coordinator idle so the user can fix it.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<TemplateRequest, CoordinatorError> {
        self.require_idle("finalize")?;

        let timelock = self.config.timelock();
        let ctx = ValidationContext::new(self.current_block_height, now, timelock.timezone());
        timelock.revalidate(&ctx)?;

        for advisory in self.advisories(now) {
            log::warn!("{}", advisory);
        }

        let request = TemplateRequest {
            variant: self.config.variant(),
            initial: self.config.initial(),
            post_timelock: self.config.post_timelock(),
            lock_type: timelock.kind().lock,
            time_unit: timelock.kind().unit,
            time_value: timelock.value(),
            address_type: self.address_type,
            reuse_signers: self.config.reuse_signers(),
            timezone_id: timelock.timezone_detail().map(|detail| detail.id.clone()),
        };
        log::info!("finalized template: {}", request.summary());

        self.state = CoordinatorState::Ready;
        self.request = Some(request.clone());
        Ok(request)
    }

    /// Finalize if needed and hand the request to `service`
    pub fn submit<S: TemplateService>(
        &mut self,
        service: &S,
        now: DateTime<Utc>,
    ) -> Result<TemplateDescriptor, CoordinatorError> {
        let request = match &self.request {
            Some(request) => request.clone(),
            None => self.finalize(now)?,
        };
        Ok(service.create_template(&request)?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn require_mutable(&self) -> Result<(), CoordinatorError> {
        if self.state == CoordinatorState::Ready {
            return Err(CoordinatorError::Finalized);
        }
        Ok(())
    }

    fn require_idle(&self, action: &'static str) -> Result<(), CoordinatorError> {
        match self.state {
            CoordinatorState::Idle => Ok(()),
            CoordinatorState::Ready => Err(CoordinatorError::Finalized),
            state => Err(CoordinatorError::InvalidState { action, state }),
        }
    }

    fn editing_slot(
        &self,
        action: &'static str,
    ) -> Result<(PolicySlot, MultisigShape), CoordinatorError> {
        let slot = match self.state {
            CoordinatorState::EditingInitialPolicy => PolicySlot::Initial,
            CoordinatorState::EditingPostTimelockPolicy => PolicySlot::PostTimelock,
            CoordinatorState::Ready => return Err(CoordinatorError::Finalized),
            state => return Err(CoordinatorError::InvalidState { action, state }),
        };
        let draft = self.draft.unwrap_or_else(|| self.config.policy().shape(slot));
        Ok((slot, draft))
    }

    fn close_editor(&mut self) {
        self.state = CoordinatorState::Idle;
        self.draft = None;
    }
}
