//! Custody conservation checker.
//!
//! For every asset the escrow holds:
//! ```text
//! custody(asset) == Σ(deposits) - Σ(payouts)
//! ```
//!
//! and, for an escrow that also models external wallets:
//! ```text
//! Σ(wallets) + custody(asset) == Σ(minted)
//! ```
//!
//! A violation means value was created or destroyed somewhere between the
//! ledger and the token custodian.

use std::collections::{BTreeSet, HashMap};

use openvest_types::{Address, OpenvestError, Result};
use rust_decimal::Decimal;

/// Per-asset running totals of value entering and leaving custody.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    minted: HashMap<Address, Decimal>,
    deposits: HashMap<Address, Decimal>,
    payouts: HashMap<Address, Decimal>,
}

fn total(map: &HashMap<Address, Decimal>, asset: &Address) -> Decimal {
    map.get(asset).copied().unwrap_or(Decimal::ZERO)
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value created outside the system (wallet funding).
    pub fn record_mint(&mut self, asset: Address, amount: Decimal) {
        *self.minted.entry(asset).or_insert(Decimal::ZERO) += amount;
    }

    pub fn record_deposit(&mut self, asset: Address, amount: Decimal) {
        *self.deposits.entry(asset).or_insert(Decimal::ZERO) += amount;
    }

    pub fn record_payout(&mut self, asset: Address, amount: Decimal) {
        *self.payouts.entry(asset).or_insert(Decimal::ZERO) += amount;
    }

    /// Custody expected from the flows seen so far.
    #[must_use]
    pub fn expected_custody(&self, asset: &Address) -> Decimal {
        total(&self.deposits, asset) - total(&self.payouts, asset)
    }

    #[must_use]
    pub fn total_minted(&self, asset: &Address) -> Decimal {
        total(&self.minted, asset)
    }

    #[must_use]
    pub fn total_deposits(&self, asset: &Address) -> Decimal {
        total(&self.deposits, asset)
    }

    #[must_use]
    pub fn total_payouts(&self, asset: &Address) -> Decimal {
        total(&self.payouts, asset)
    }

    /// Check the custody balance against deposits minus payouts.
    ///
    /// # Errors
    /// `ConservationViolation` if they differ.
    pub fn verify_custody(&self, asset: &Address, actual: Decimal) -> Result<()> {
        let expected = self.expected_custody(asset);
        if actual != expected {
            return Err(OpenvestError::ConservationViolation {
                reason: format!(
                    "asset {asset}: custody {actual} != expected {expected} \
                     (deposits={}, payouts={})",
                    self.total_deposits(asset),
                    self.total_payouts(asset),
                ),
            });
        }
        Ok(())
    }

    /// Check that wallets plus custody account for everything minted.
    ///
    /// # Errors
    /// `ConservationViolation` if they differ.
    pub fn verify_supply(&self, asset: &Address, actual: Decimal) -> Result<()> {
        let minted = self.total_minted(asset);
        if actual != minted {
            return Err(OpenvestError::ConservationViolation {
                reason: format!("asset {asset}: supply {actual} != minted {minted}"),
            });
        }
        Ok(())
    }

    /// Every asset with at least one recorded flow, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<Address> {
        let mut assets: BTreeSet<Address> = self.minted.keys().copied().collect();
        assets.extend(self.deposits.keys().copied());
        assets.extend(self.payouts.keys().copied());
        assets.into_iter().collect()
    }
}
