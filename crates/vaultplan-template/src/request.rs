//! Boundary with the wallet/template creation service

use crate::sketch::{self, SketchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use vaultplan_policy::{MultisigPolicy, MultisigShape, MultisigVariant, PolicyError};
use vaultplan_timelock::{encode_locktime, parse_timezone, LockType, TimeUnit, TimelockKind, Tz};

#[derive(Error, Debug)]
pub enum TemplateServiceError {
    #[error("Rejected request: {0}")]
    Rejected(String),

    #[error("Inconsistent policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Policy sketch failed: {0}")]
    Sketch(#[from] SketchError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Script type of the wallet addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    #[default]
    NativeSegwit,
    NestedSegwit,
    Legacy,
    Taproot,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressType::NativeSegwit => "native-segwit",
            AddressType::NestedSegwit => "nested-segwit",
            AddressType::Legacy => "legacy",
            AddressType::Taproot => "taproot",
        };
        f.write_str(name)
    }
}

impl FromStr for AddressType {
    type Err = TemplateServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "native-segwit" | "p2wsh" => Ok(AddressType::NativeSegwit),
            "nested-segwit" | "p2sh-p2wsh" => Ok(AddressType::NestedSegwit),
            "legacy" | "p2sh" => Ok(AddressType::Legacy),
            "taproot" | "p2tr" => Ok(AddressType::Taproot),
            other => Err(TemplateServiceError::Rejected(format!(
                "unknown address type: {}",
                other
            ))),
        }
    }
}

/// Arguments for one template creation call
///
/// Produced only by a finalized coordinator, so every field has already
/// been bounds-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub variant: MultisigVariant,
    pub initial: MultisigShape,
    pub post_timelock: MultisigShape,
    pub lock_type: LockType,
    pub time_unit: TimeUnit,
    /// Canonical timelock value
    pub time_value: i64,
    pub address_type: AddressType,
    pub reuse_signers: bool,
    /// Display zone of an absolute calendar lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
}

impl TemplateRequest {
    pub fn timelock_kind(&self) -> TimelockKind {
        TimelockKind::new(self.lock_type, self.time_unit)
    }

    fn timezone(&self) -> Tz {
        self.timezone_id
            .as_deref()
            .and_then(|id| parse_timezone(id).ok())
            .unwrap_or(Tz::UTC)
    }

    pub fn summary(&self) -> String {
        sketch::summary(
            self.initial,
            self.post_timelock,
            self.timelock_kind(),
            self.time_value,
            self.timezone(),
        )
    }
}

/// What the service hands back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// e.g. "Decaying multisig"
    pub title: String,
    pub summary: String,
    /// Spending policy in miniscript policy language
    pub policy: String,
}

/// External wallet/template creation service
pub trait TemplateService {
    fn create_template(
        &self,
        request: &TemplateRequest,
    ) -> Result<TemplateDescriptor, TemplateServiceError>;
}

/// Offline service that describes the template without creating a wallet
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicySketcher;

impl TemplateService for PolicySketcher {
    fn create_template(
        &self,
        request: &TemplateRequest,
    ) -> Result<TemplateDescriptor, TemplateServiceError> {
        // Requests can arrive deserialized, so check the pair again.
        MultisigPolicy::new(request.variant, request.initial, request.post_timelock)?;

        let locktime = encode_locktime(request.timelock_kind(), request.time_value)
            .map_err(|e| TemplateServiceError::Rejected(e.to_string()))?;
        let policy = sketch::policy_sketch(
            request.initial,
            request.post_timelock,
            locktime,
            request.reuse_signers,
        )?;

        Ok(TemplateDescriptor {
            title: request.variant.title().to_string(),
            summary: request.summary(),
            policy: policy.to_string(),
        })
    }
}
