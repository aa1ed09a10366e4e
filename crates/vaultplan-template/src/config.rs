//! Planner configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use crate::coordinator::Coordinator;
use crate::request::AddressType;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vaultplan_electrum::{default_server, ElectrumClient};
use vaultplan_policy::MultisigVariant;
use vaultplan_timelock::{parse_timezone, Tz};

/// Top-level planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Bitcoin / Electrum settings
    #[serde(default)]
    pub chain: ChainSection,

    /// Starting values for a new session
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Advisory thresholds
    #[serde(default)]
    pub limits: LimitsSection,
}

/// Bitcoin network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    /// Bitcoin network: "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,

    /// Electrum server URL; the network's default server when unset
    pub electrum_url: Option<String>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            electrum_url: None,
        }
    }
}

/// Session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    /// "flexible", "expanding" or "decaying"
    #[serde(default = "default_variant")]
    pub variant: String,

    /// IANA zone for calendar timelocks
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// "native-segwit", "nested-segwit", "legacy" or "taproot"
    #[serde(default = "default_address_type")]
    pub address_type: String,

    /// Distance of the default absolute timelock, in days
    #[serde(default = "default_timelock_days")]
    pub timelock_days: u32,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            timezone: default_timezone(),
            address_type: default_address_type(),
            timelock_days: default_timelock_days(),
        }
    }
}

/// Advisory thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
    /// Warn when a calendar timelock is further out (0 disables the warning)
    #[serde(default = "default_max_timelock_years")]
    pub max_timelock_years: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_timelock_years: default_max_timelock_years(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_network() -> String {
    "bitcoin".to_string()
}

fn default_variant() -> String {
    "flexible".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_address_type() -> String {
    "native-segwit".to_string()
}

fn default_timelock_days() -> u32 {
    30
}

fn default_max_timelock_years() -> u32 {
    10
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl TemplateConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TemplateConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// File (or defaults when `path` is `None`), then env overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `VAULTPLAN_NETWORK`
    /// - `VAULTPLAN_ELECTRUM_URL`
    /// - `VAULTPLAN_VARIANT`
    /// - `VAULTPLAN_TIMEZONE`
    /// - `VAULTPLAN_ADDRESS_TYPE`
    /// - `VAULTPLAN_TIMELOCK_DAYS`
    /// - `VAULTPLAN_MAX_TIMELOCK_YEARS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VAULTPLAN_NETWORK") {
            self.chain.network = v;
        }
        if let Ok(v) = std::env::var("VAULTPLAN_ELECTRUM_URL") {
            self.chain.electrum_url = Some(v);
        }
        if let Ok(v) = std::env::var("VAULTPLAN_VARIANT") {
            self.defaults.variant = v;
        }
        if let Ok(v) = std::env::var("VAULTPLAN_TIMEZONE") {
            self.defaults.timezone = v;
        }
        if let Ok(v) = std::env::var("VAULTPLAN_ADDRESS_TYPE") {
            self.defaults.address_type = v;
        }
        if let Ok(v) = std::env::var("VAULTPLAN_TIMELOCK_DAYS") {
            if let Ok(days) = v.parse::<u32>() {
                self.defaults.timelock_days = days;
            }
        }
        if let Ok(v) = std::env::var("VAULTPLAN_MAX_TIMELOCK_YEARS") {
            if let Ok(years) = v.parse::<u32>() {
                self.limits.max_timelock_years = years;
            }
        }
    }

    /// Parse the network string to a `bitcoin::Network`.
    pub fn network(&self) -> bitcoin::Network {
        match self.chain.network.as_str() {
            "testnet" | "testnet3" => bitcoin::Network::Testnet,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            _ => bitcoin::Network::Bitcoin,
        }
    }

    /// Configured Electrum server, or the network's default
    pub fn electrum_url(&self) -> &str {
        self.chain
            .electrum_url
            .as_deref()
            .unwrap_or_else(|| default_server(self.network()))
    }

    pub fn variant(&self) -> Result<MultisigVariant> {
        self.defaults
            .variant
            .parse::<MultisigVariant>()
            .with_context(|| format!("defaults.variant is invalid: {}", self.defaults.variant))
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.defaults.timezone)
            .with_context(|| format!("defaults.timezone is invalid: {}", self.defaults.timezone))
    }

    pub fn address_type(&self) -> Result<AddressType> {
        self.defaults.address_type.parse::<AddressType>().with_context(|| {
            format!(
                "defaults.address_type is invalid: {}",
                self.defaults.address_type
            )
        })
    }

    /// Advisory horizon; `None` when disabled
    pub fn max_timelock_years(&self) -> Option<u32> {
        (self.limits.max_timelock_years > 0).then_some(self.limits.max_timelock_years)
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.variant()?;
        self.timezone()?;
        self.address_type()?;

        // The default timelock must land after today
        anyhow::ensure!(
            self.defaults.timelock_days >= 1,
            "defaults.timelock_days must be >= 1"
        );
        anyhow::ensure!(
            self.defaults.timelock_days <= 365 * 100,
            "defaults.timelock_days must be <= 36500"
        );

        anyhow::ensure!(
            self.electrum_url().contains("://"),
            "chain.electrum_url must include a scheme (ssl:// or tcp://)"
        );

        log::debug!(
            "config ok: {} on {}",
            self.defaults.variant,
            self.chain.network
        );
        Ok(())
    }

    /// Start a session from the configured defaults
    pub fn coordinator(&self, now: DateTime<Utc>) -> Result<Coordinator> {
        let coordinator = Coordinator::with_timelock_days(
            self.variant()?,
            self.address_type()?,
            now,
            self.timezone()?,
            self.defaults.timelock_days,
        )
        .with_max_timelock_years(self.max_timelock_years());
        Ok(coordinator)
    }

    /// Connect to the configured Electrum server
    pub fn electrum_client(&self) -> Result<ElectrumClient> {
        let url = self.electrum_url();
        ElectrumClient::new(url, self.network())
            .with_context(|| format!("Failed to connect to Electrum server {}", url))
    }
}

// ============================================================================
// Tests
// ============================================================================
