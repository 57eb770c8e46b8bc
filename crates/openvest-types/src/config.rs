//! Engine configuration.
//!
//! Seeds the Admin/Fee Configuration Store. After start-up the values only
//! change through capability-checked setters.

use serde::{Deserialize, Serialize};

use crate::{Address, OpenvestError, Result, constants};

/// Process-wide configuration for an OpenVest engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fee charged on sale proceeds when a sale has no override.
    pub global_fee_bps: u32,
    /// Highest fee an administrator may configure.
    pub max_fee_bps: u32,
    /// Receives settlement fees.
    pub fee_recipient: Address,
    /// Maximum rows in one bulk lock creation.
    pub max_bulk_entries: usize,
    /// Refuse new locks.
    pub locks_paused: bool,
    /// Refuse purchases and refunds.
    pub sales_paused: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_fee_bps: constants::DEFAULT_FEE_BPS,
            max_fee_bps: constants::DEFAULT_MAX_FEE_BPS,
            fee_recipient: Address::ZERO,
            max_bulk_entries: constants::DEFAULT_MAX_BULK_ENTRIES,
            locks_paused: false,
            sales_paused: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    /// `Configuration` if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| OpenvestError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// `Configuration` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_fee_bps > constants::BPS_DENOMINATOR {
            return Err(OpenvestError::Configuration(format!(
                "max_fee_bps {} exceeds {}",
                self.max_fee_bps,
                constants::BPS_DENOMINATOR
            )));
        }
        if self.global_fee_bps > self.max_fee_bps {
            return Err(OpenvestError::Configuration(format!(
                "global_fee_bps {} exceeds max_fee_bps {}",
                self.global_fee_bps, self.max_fee_bps
            )));
        }
        if self.fee_recipient.is_zero() {
            return Err(OpenvestError::Configuration(
                "fee_recipient must be set".into(),
            ));
        }
        if self.max_bulk_entries == 0 {
            return Err(OpenvestError::Configuration(
                "max_bulk_entries must be > 0".into(),
            ));
        }
        Ok(())
    }
}
