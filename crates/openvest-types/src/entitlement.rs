//! Entitlement records: the unit that represents both a lock and a purchase.
//!
//! An entitlement grants its current owner the right to receive
//! `total_amount` of `asset`, released over time per its [`UnlockMode`].
//!
//! ## Invariants
//!
//! - `released_amount <= total_amount`
//! - `released_amount <= amount_vested_at(now)`
//! - purchase records: `refunded_amount <= released_amount`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, EntitlementId, SaleId, UnlockMode};

/// Result of asset classification, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    /// A liquidity-pool token over the pair `(token0, token1)`.
    Pool { token0: Address, token1: Address },
}

impl Classification {
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Normal => AssetKind::Normal,
            Self::Pool { .. } => AssetKind::Pool,
        }
    }

    #[must_use]
    pub fn is_pool(&self) -> bool {
        matches!(self, Self::Pool { .. })
    }
}

/// Classification without pair details, used to partition counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum AssetKind {
    Normal,
    Pool,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Pool => write!(f, "POOL"),
        }
    }
}

/// What product created the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntitlementKind {
    /// A token lock created directly by a depositor.
    Lock,
    /// A sale purchase. The tokens were escrowed by the sale.
    Purchase {
        sale_id: SaleId,
        /// Cumulative payment made for `total_amount`.
        paid_amount: Decimal,
        /// Tokens whose payment has been returned.
        refunded_amount: Decimal,
        /// Payment returned so far.
        refunded_payment: Decimal,
    },
}

/// A time-locked entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: EntitlementId,
    /// Current controlling identity.
    pub owner: Address,
    /// Identity that funded the record.
    pub creator: Address,
    pub asset: Address,
    pub classification: Classification,
    /// Total quantity ever entitled under this record.
    pub total_amount: Decimal,
    /// Cumulative quantity delivered to the owner.
    pub released_amount: Decimal,
    pub unlock: UnlockMode,
    pub kind: EntitlementKind,
    pub created_at: DateTime<Utc>,
    /// Opaque label, no semantic effect.
    pub description: String,
}

impl Entitlement {
    /// Quantity not yet delivered.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.total_amount - self.released_amount
    }

    /// Everything has been delivered. The record is kept for audit.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.released_amount >= self.total_amount
    }

    /// Ownership was handed to the burn sentinel.
    #[must_use]
    pub fn is_burned(&self) -> bool {
        self.owner.is_burn()
    }

    #[must_use]
    pub fn is_purchase(&self) -> bool {
        matches!(self.kind, EntitlementKind::Purchase { .. })
    }

    #[must_use]
    pub fn sale_id(&self) -> Option<SaleId> {
        match self.kind {
            EntitlementKind::Lock => None,
            EntitlementKind::Purchase { sale_id, .. } => Some(sale_id),
        }
    }

    /// Tokens refunded so far (always zero for locks).
    #[must_use]
    pub fn refunded_amount(&self) -> Decimal {
        match self.kind {
            EntitlementKind::Lock => Decimal::ZERO,
            EntitlementKind::Purchase {
                refunded_amount, ..
            } => refunded_amount,
        }
    }
}
