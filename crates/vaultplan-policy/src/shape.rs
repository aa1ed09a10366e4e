//! Multisig shapes and the two-stage policy they form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on signers in a single multisig policy
pub const MAX_TOTAL_KEYS: u8 = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid threshold: {0} of {1} keys")]
    InvalidThreshold(u8, u8),

    #[error("Too many keys: {0} (maximum {max})", max = MAX_TOTAL_KEYS)]
    TooManyKeys(u8),

    #[error("Unknown multisig variant: {0}")]
    UnknownVariant(String),

    #[error("{variant} policy is inconsistent: {initial} then {post_timelock}")]
    Inconsistent {
        variant: MultisigVariant,
        initial: MultisigShape,
        post_timelock: MultisigShape,
    },
}

/// One M-of-N pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShape", into = "RawShape")]
pub struct MultisigShape {
    required: u8,
    total: u8,
}

#[derive(Serialize, Deserialize)]
struct RawShape {
    required: u8,
    total: u8,
}

impl TryFrom<RawShape> for MultisigShape {
    type Error = PolicyError;

    fn try_from(raw: RawShape) -> Result<Self, Self::Error> {
        Self::new(raw.required, raw.total)
    }
}

impl From<MultisigShape> for RawShape {
    fn from(shape: MultisigShape) -> Self {
        Self {
            required: shape.required,
            total: shape.total,
        }
    }
}

impl MultisigShape {
    /// Create a shape, enforcing `1 <= required <= total <= 20`
    pub fn new(required: u8, total: u8) -> Result<Self, PolicyError> {
        if total > MAX_TOTAL_KEYS {
            return Err(PolicyError::TooManyKeys(total));
        }
        if required == 0 || required > total {
            return Err(PolicyError::InvalidThreshold(required, total));
        }
        Ok(Self { required, total })
    }

    /// Callers must already hold the invariant.
    pub(crate) fn new_unchecked(required: u8, total: u8) -> Self {
        debug_assert!(
            required >= 1 && required <= total && total <= MAX_TOTAL_KEYS,
            "invalid shape {required} of {total}"
        );
        Self { required, total }
    }

    /// Signatures needed to spend
    pub fn required(&self) -> u8 {
        self.required
    }

    /// Keys in the policy
    pub fn total(&self) -> u8 {
        self.total
    }
}

impl fmt::Display for MultisigShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.required, self.total)
    }
}

/// How the post-timelock shape relates to the initial one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultisigVariant {
    Flexible,
    Expanding,
    Decaying,
}

impl MultisigVariant {
    pub fn title(&self) -> &'static str {
        match self {
            MultisigVariant::Flexible => "Flexible multisig",
            MultisigVariant::Expanding => "Expanding multisig",
            MultisigVariant::Decaying => "Decaying multisig",
        }
    }
}

impl fmt::Display for MultisigVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MultisigVariant::Flexible => "flexible",
            MultisigVariant::Expanding => "expanding",
            MultisigVariant::Decaying => "decaying",
        };
        f.write_str(name)
    }
}

impl FromStr for MultisigVariant {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flexible" => Ok(MultisigVariant::Flexible),
            "expanding" => Ok(MultisigVariant::Expanding),
            "decaying" => Ok(MultisigVariant::Decaying),
            other => Err(PolicyError::UnknownVariant(other.to_string())),
        }
    }
}

/// Which of the two shapes an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicySlot {
    /// Spending policy before the timelock expires
    Initial,
    /// Spending policy once the timelock has expired
    PostTimelock,
}

/// A variant plus its two shapes
///
/// Mutated only through [`crate::engine`], which keeps the variant's ordering
/// rule intact after every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MultisigPolicy {
    pub(crate) variant: MultisigVariant,
    pub(crate) initial: MultisigShape,
    pub(crate) post_timelock: MultisigShape,
}

impl MultisigPolicy {
    /// Starting shapes offered when a wallet-creation flow begins
    pub fn default_for(variant: MultisigVariant) -> Self {
        let (initial, post_timelock) = match variant {
            MultisigVariant::Flexible => ((2, 3), (3, 3)),
            MultisigVariant::Decaying => ((2, 3), (1, 3)),
            MultisigVariant::Expanding => ((2, 2), (2, 3)),
        };
        Self {
            variant,
            initial: MultisigShape::new_unchecked(initial.0, initial.1),
            post_timelock: MultisigShape::new_unchecked(post_timelock.0, post_timelock.1),
        }
    }

    /// Build from explicit shapes, rejecting pairs that break the variant rule
    pub fn new(
        variant: MultisigVariant,
        initial: MultisigShape,
        post_timelock: MultisigShape,
    ) -> Result<Self, PolicyError> {
        let policy = Self {
            variant,
            initial,
            post_timelock,
        };
        if !policy.is_consistent() {
            return Err(PolicyError::Inconsistent {
                variant,
                initial,
                post_timelock,
            });
        }
        Ok(policy)
    }

    pub fn variant(&self) -> MultisigVariant {
        self.variant
    }

    pub fn initial(&self) -> MultisigShape {
        self.initial
    }

    pub fn post_timelock(&self) -> MultisigShape {
        self.post_timelock
    }

    /// Shape stored in `slot`
    pub fn shape(&self, slot: PolicySlot) -> MultisigShape {
        match slot {
            PolicySlot::Initial => self.initial,
            PolicySlot::PostTimelock => self.post_timelock,
        }
    }

    /// Check the variant's cross-shape rule
    pub fn is_consistent(&self) -> bool {
        let (a, b) = (self.initial, self.post_timelock);
        match self.variant {
            MultisigVariant::Flexible => true,
            MultisigVariant::Expanding => b.total > a.total && b.required == a.required,
            MultisigVariant::Decaying => b.required < a.required && b.total == a.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_bounds() {
        assert!(MultisigShape::new(2, 3).is_ok());
        assert!(MultisigShape::new(20, 20).is_ok());
        assert_eq!(
            MultisigShape::new(0, 3),
            Err(PolicyError::InvalidThreshold(0, 3))
        );
        assert_eq!(
            MultisigShape::new(4, 3),
            Err(PolicyError::InvalidThreshold(4, 3))
        );
        assert_eq!(MultisigShape::new(2, 21), Err(PolicyError::TooManyKeys(21)));
    }

    #[test]
    fn test_shape_display() {
        let shape = MultisigShape::new(2, 3).unwrap();
        assert_eq!(shape.to_string(), "2 of 3");
    }

    #[test]
    fn test_defaults_are_consistent() {
        for variant in [
            MultisigVariant::Flexible,
            MultisigVariant::Expanding,
            MultisigVariant::Decaying,
        ] {
            let policy = MultisigPolicy::default_for(variant);
            assert!(policy.is_consistent(), "{} default broken", variant);
        }

        let decaying = MultisigPolicy::default_for(MultisigVariant::Decaying);
        assert_eq!(decaying.initial().to_string(), "2 of 3");
        assert_eq!(decaying.post_timelock().to_string(), "1 of 3");

        let expanding = MultisigPolicy::default_for(MultisigVariant::Expanding);
        assert_eq!(expanding.initial().to_string(), "2 of 2");
        assert_eq!(expanding.post_timelock().to_string(), "2 of 3");
    }

    #[test]
    fn test_new_rejects_inconsistent_pair() {
        let a = MultisigShape::new(2, 3).unwrap();
        let b = MultisigShape::new(2, 3).unwrap();
        let result = MultisigPolicy::new(MultisigVariant::Decaying, a, b);
        assert!(matches!(result, Err(PolicyError::Inconsistent { .. })));

        assert!(MultisigPolicy::new(MultisigVariant::Flexible, a, b).is_ok());
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!(
            "Decaying".parse::<MultisigVariant>().unwrap(),
            MultisigVariant::Decaying
        );
        assert!("linear".parse::<MultisigVariant>().is_err());
        assert_eq!(MultisigVariant::Expanding.title(), "Expanding multisig");
    }

    #[test]
    fn test_shape_serde_rejects_invalid() {
        let shape: MultisigShape = serde_json::from_str(r#"{"required":2,"total":3}"#).unwrap();
        assert_eq!(shape, MultisigShape::new(2, 3).unwrap());

        let bad = serde_json::from_str::<MultisigShape>(r#"{"required":5,"total":3}"#);
        assert!(bad.is_err());
    }
}
