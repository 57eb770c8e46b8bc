//! Token custody seam.
//!
//! The ledger never moves value itself. Every operation commits its state
//! change first and then hands one [`TransferBatch`] to an [`Escrow`]. If the
//! escrow refuses any leg, the operation restores the previous state and
//! surfaces the escrow's error unchanged.
//!
//! The escrow holds no reference back to the ledger, so a transfer can never
//! re-enter a ledger operation while one is in flight.

use std::collections::{HashMap, HashSet};

use openvest_types::{Address, OpenvestError, Result};
use rust_decimal::Decimal;

use crate::conservation::SupplyConservation;

/// One leg of value movement between custody and an external identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// `from` → custody.
    Deposit {
        asset: Address,
        from: Address,
        amount: Decimal,
    },
    /// Custody → `to`.
    Payout {
        asset: Address,
        to: Address,
        amount: Decimal,
    },
}

impl Transfer {
    #[must_use]
    pub fn asset(&self) -> Address {
        match self {
            Self::Deposit { asset, .. } | Self::Payout { asset, .. } => *asset,
        }
    }

    #[must_use]
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Deposit { amount, .. } | Self::Payout { amount, .. } => *amount,
        }
    }
}

/// The legs one operation must execute together. Zero-amount legs are
/// dropped when added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferBatch(Vec<Transfer>);

impl TransferBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, asset: Address, from: Address, amount: Decimal) -> &mut Self {
        if !amount.is_zero() {
            self.0.push(Transfer::Deposit {
                asset,
                from,
                amount,
            });
        }
        self
    }

    pub fn payout(&mut self, asset: Address, to: Address, amount: Decimal) -> &mut Self {
        if !amount.is_zero() {
            self.0.push(Transfer::Payout { asset, to, amount });
        }
        self
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Transfer] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Custody of every asset the ledger accounts for.
pub trait Escrow {
    /// Move `amount` of `asset` from `from` into custody.
    ///
    /// # Errors
    /// Any error; the calling operation is rolled back and returns it.
    fn deposit(&mut self, asset: Address, from: Address, amount: Decimal) -> Result<()>;

    /// Move `amount` of `asset` from custody to `to`.
    ///
    /// # Errors
    /// Any error; the calling operation is rolled back and returns it.
    fn payout(&mut self, asset: Address, to: Address, amount: Decimal) -> Result<()>;

    /// Execute every leg or none of them.
    ///
    /// The default runs the legs in order and stops at the first failure,
    /// which is only all-or-nothing for custodians whose legs cannot fail
    /// after an earlier one succeeded. Custodians that can fail part-way
    /// must override this.
    ///
    /// # Errors
    /// The first leg's error.
    fn execute(&mut self, transfers: &[Transfer]) -> Result<()> {
        for transfer in transfers {
            match *transfer {
                Transfer::Deposit {
                    asset,
                    from,
                    amount,
                } => self.deposit(asset, from, amount)?,
                Transfer::Payout { asset, to, amount } => self.payout(asset, to, amount)?,
            }
        }
        Ok(())
    }
}

/// In-process custodian with external wallets.
///
/// Tracks per-(holder, asset) wallet balances and per-asset custody, and
/// checks supply conservation. Holders can be blocked to simulate a
/// custodian refusing a transfer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrow {
    wallets: HashMap<(Address, Address), Decimal>,
    custody: HashMap<Address, Decimal>,
    blocked: HashSet<Address>,
    supply: SupplyConservation,
}

impl InMemoryEscrow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fund a wallet from outside the system.
    pub fn mint(&mut self, holder: Address, asset: Address, amount: Decimal) {
        *self.wallets.entry((holder, asset)).or_insert(Decimal::ZERO) += amount;
        self.supply.record_mint(asset, amount);
    }

    #[must_use]
    pub fn balance(&self, holder: Address, asset: Address) -> Decimal {
        self.wallets
            .get(&(holder, asset))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Quantity of `asset` currently in custody.
    #[must_use]
    pub fn custody(&self, asset: Address) -> Decimal {
        self.custody.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Refuse every transfer to or from `holder`.
    pub fn block(&mut self, holder: Address) {
        self.blocked.insert(holder);
    }

    pub fn unblock(&mut self, holder: Address) {
        self.blocked.remove(&holder);
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    /// Check both conservation equations for `asset`.
    ///
    /// # Errors
    /// `ConservationViolation` if either fails.
    pub fn verify(&self, asset: Address) -> Result<()> {
        self.supply.verify_custody(&asset, self.custody(asset))?;
        let wallets: Decimal = self
            .wallets
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, v)| *v)
            .sum();
        self.supply.verify_supply(&asset, wallets + self.custody(asset))
    }

    /// Check every asset the escrow has seen.
    ///
    /// # Errors
    /// The first `ConservationViolation`.
    pub fn verify_all(&self) -> Result<()> {
        for asset in self.supply.tracked_assets() {
            self.verify(asset)?;
        }
        Ok(())
    }

    fn ensure_unblocked(&self, holder: Address) -> Result<()> {
        if self.blocked.contains(&holder) {
            return Err(OpenvestError::TransferFailed {
                reason: format!("custodian refused transfer for {holder}"),
            });
        }
        Ok(())
    }
}

impl Escrow for InMemoryEscrow {
    fn deposit(&mut self, asset: Address, from: Address, amount: Decimal) -> Result<()> {
        self.ensure_unblocked(from)?;
        let available = self.balance(from, asset);
        if available < amount {
            return Err(OpenvestError::TransferFailed {
                reason: format!(
                    "{from} holds {available} of {asset}, deposit needs {amount}"
                ),
            });
        }
        *self.wallets.entry((from, asset)).or_insert(Decimal::ZERO) -= amount;
        *self.custody.entry(asset).or_insert(Decimal::ZERO) += amount;
        self.supply.record_deposit(asset, amount);
        Ok(())
    }

    fn payout(&mut self, asset: Address, to: Address, amount: Decimal) -> Result<()> {
        self.ensure_unblocked(to)?;
        let held = self.custody(asset);
        if held < amount {
            return Err(OpenvestError::TransferFailed {
                reason: format!("custody holds {held} of {asset}, payout needs {amount}"),
            });
        }
        *self.custody.entry(asset).or_insert(Decimal::ZERO) -= amount;
        *self.wallets.entry((to, asset)).or_insert(Decimal::ZERO) += amount;
        self.supply.record_payout(asset, amount);
        Ok(())
    }

    fn execute(&mut self, transfers: &[Transfer]) -> Result<()> {
        let wallets = self.wallets.clone();
        let custody = self.custody.clone();
        let supply = self.supply.clone();
        for transfer in transfers {
            let applied = match *transfer {
                Transfer::Deposit {
                    asset,
                    from,
                    amount,
                } => self.deposit(asset, from, amount),
                Transfer::Payout { asset, to, amount } => self.payout(asset, to, amount),
            };
            if let Err(err) = applied {
                self.wallets = wallets;
                self.custody = custody;
                self.supply = supply;
                return Err(err);
            }
        }
        Ok(())
    }
}
