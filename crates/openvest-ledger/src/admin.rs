//! Admin/Fee Configuration Store.
//!
//! Holds the global fee, its ceiling, the fee recipient and the pause
//! switches. Seeded from an [`EngineConfig`]; every later change goes through
//! a capability-checked setter and is announced on the store's own log.

use chrono::{DateTime, Utc};
use openvest_types::{
    Action, Address, EngineConfig, EventLog, LedgerEvent, Notification, OpenvestError, Result,
};

use crate::access::{Permissions, require};

#[derive(Debug)]
pub struct AdminConfig {
    global_fee_bps: u32,
    max_fee_bps: u32,
    fee_recipient: Address,
    max_bulk_entries: usize,
    locks_paused: bool,
    sales_paused: bool,
    events: EventLog,
}

impl AdminConfig {
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            global_fee_bps = config.global_fee_bps,
            max_fee_bps = config.max_fee_bps,
            fee_recipient = %config.fee_recipient,
            "Admin configuration loaded"
        );
        Ok(Self {
            global_fee_bps: config.global_fee_bps,
            max_fee_bps: config.max_fee_bps,
            fee_recipient: config.fee_recipient,
            max_bulk_entries: config.max_bulk_entries,
            locks_paused: config.locks_paused,
            sales_paused: config.sales_paused,
            events: EventLog::new(),
        })
    }

    #[must_use]
    pub fn global_fee_bps(&self) -> u32 {
        self.global_fee_bps
    }

    #[must_use]
    pub fn max_fee_bps(&self) -> u32 {
        self.max_fee_bps
    }

    #[must_use]
    pub fn fee_recipient(&self) -> Address {
        self.fee_recipient
    }

    #[must_use]
    pub fn max_bulk_entries(&self) -> usize {
        self.max_bulk_entries
    }

    #[must_use]
    pub fn locks_paused(&self) -> bool {
        self.locks_paused
    }

    #[must_use]
    pub fn sales_paused(&self) -> bool {
        self.sales_paused
    }

    /// Reject a fee above the configured ceiling.
    ///
    /// # Errors
    /// `InvalidParameter`.
    pub fn validate_fee(&self, fee_bps: u32) -> Result<()> {
        if fee_bps > self.max_fee_bps {
            return Err(OpenvestError::InvalidParameter {
                reason: format!("fee {fee_bps} bps exceeds maximum {}", self.max_fee_bps),
            });
        }
        Ok(())
    }

    /// # Errors
    /// `Unauthorized` without [`Action::SetFee`]; `InvalidParameter` above
    /// the ceiling.
    pub fn set_global_fee(
        &mut self,
        perms: &impl Permissions,
        caller: &Address,
        fee_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, caller, Action::SetFee)?;
        self.validate_fee(fee_bps)?;
        let previous = self.global_fee_bps;
        self.global_fee_bps = fee_bps;
        tracing::info!(caller = %caller, previous, fee_bps, "Global fee changed");
        self.announce_fees(now);
        Ok(())
    }

    /// # Errors
    /// `Unauthorized` without [`Action::SetFeeRecipient`]; `InvalidParameter`
    /// for the zero address.
    pub fn set_fee_recipient(
        &mut self,
        perms: &impl Permissions,
        caller: &Address,
        recipient: Address,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, caller, Action::SetFeeRecipient)?;
        if recipient.is_zero() {
            return Err(OpenvestError::InvalidParameter {
                reason: "fee recipient must not be the zero address".into(),
            });
        }
        self.fee_recipient = recipient;
        tracing::info!(caller = %caller, recipient = %recipient, "Fee recipient changed");
        self.announce_fees(now);
        Ok(())
    }

    /// # Errors
    /// `Unauthorized` without [`Action::SetPause`].
    pub fn set_pause(
        &mut self,
        perms: &impl Permissions,
        caller: &Address,
        locks_paused: bool,
        sales_paused: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, caller, Action::SetPause)?;
        self.locks_paused = locks_paused;
        self.sales_paused = sales_paused;
        tracing::warn!(caller = %caller, locks_paused, sales_paused, "Pause switches changed");
        self.events.record(
            now,
            LedgerEvent::PauseChanged {
                locks_paused,
                sales_paused,
            },
        );
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<Notification> {
        self.events.drain()
    }

    fn announce_fees(&mut self, now: DateTime<Utc>) {
        self.events.record(
            now,
            LedgerEvent::FeeConfigChanged {
                global_fee_bps: self.global_fee_bps,
                fee_recipient: self.fee_recipient,
            },
        );
    }
}
