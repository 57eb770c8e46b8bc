//! Sale aggregate and its status state machine.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  approve   ┌──────────┐  settle   ┌───────┐
//!   │ PENDING ├───────────▶│ APPROVED ├──────────▶│ ENDED │
//!   └────┬────┘            └──┬────▲──┘           └───────┘
//!        │ reject      pause  │    │ unpause
//!        ▼                    ▼    │
//!   ┌──────────┐            ┌──────┴─┐
//!   │ REJECTED │            │ PAUSED │
//!   └──────────┘            └────────┘
//! ```
//!
//! `ENDED` and `REJECTED` are terminal. Pausing does not move the sale window.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, SaleId, VestingSchedule};

/// Lifecycle status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaleStatus {
    Pending,
    Approved,
    Rejected,
    Paused,
    Ended,
}

impl SaleStatus {
    /// Can this sale move to the given target status?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Paused | Self::Ended)
                | (Self::Paused, Self::Approved)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Rejected)
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Ended => write!(f, "ENDED"),
        }
    }
}

/// Inclusive purchase window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SaleWindow {
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

/// Parameters a project submits when creating a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleParams {
    /// Token being sold (held in escrow).
    pub sale_asset: Address,
    /// Asset buyers pay with.
    pub payment_asset: Address,
    /// Tokens per `payment_asset_unit` of payment.
    pub token_price: Decimal,
    /// Base units of the payment asset that `token_price` refers to.
    pub payment_asset_unit: Decimal,
    pub window: SaleWindow,
    /// Per-transaction payment bounds.
    pub min_buy: Decimal,
    pub max_buy: Decimal,
    pub total_offered: Decimal,
    /// Vesting for purchased tokens. `None` delivers at purchase time.
    pub schedule: Option<VestingSchedule>,
    pub refunds_enabled: bool,
    pub refund_window_end: DateTime<Utc>,
    pub description: String,
}

/// Administrative parameter edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleParamsPatch {
    pub token_price: Option<Decimal>,
    pub window: Option<SaleWindow>,
    pub min_buy: Option<Decimal>,
    pub max_buy: Option<Decimal>,
    pub refunds_enabled: Option<bool>,
    pub refund_window_end: Option<DateTime<Utc>>,
    /// Replace the purchase schedule. Only accepted before the first sale.
    pub schedule: Option<VestingSchedule>,
    pub description: Option<String>,
}

impl SaleParamsPatch {
    /// Apply this patch to a copy of `params`.
    #[must_use]
    pub fn apply(&self, params: &SaleParams) -> SaleParams {
        let mut next = params.clone();
        if let Some(price) = self.token_price {
            next.token_price = price;
        }
        if let Some(window) = self.window {
            next.window = window;
        }
        if let Some(min) = self.min_buy {
            next.min_buy = min;
        }
        if let Some(max) = self.max_buy {
            next.max_buy = max;
        }
        if let Some(enabled) = self.refunds_enabled {
            next.refunds_enabled = enabled;
        }
        if let Some(end) = self.refund_window_end {
            next.refund_window_end = end;
        }
        if let Some(schedule) = self.schedule {
            next.schedule = Some(schedule);
        }
        if let Some(description) = &self.description {
            next.description.clone_from(description);
        }
        next
    }
}

/// Outcome of the terminal withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Inventory returned to the project.
    pub unsold: Decimal,
    /// Sent to the fee recipient.
    pub fee: Decimal,
    /// Sent to the project owner (`total_raised - fee`).
    pub proceeds: Decimal,
    pub fee_bps: u32,
    pub settled_at: DateTime<Utc>,
}

/// One sale aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    /// Project owner: funded the inventory, receives proceeds.
    pub owner: Address,
    pub params: SaleParams,
    pub status: SaleStatus,
    /// Tokens currently sold (net of refunds).
    pub total_sold: Decimal,
    /// Payment currently held (net of refunds).
    pub total_raised: Decimal,
    /// Per-sale fee override; `None` inherits the global fee.
    pub fee_bps_override: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub settlement: Option<Settlement>,
}

impl Sale {
    /// Offered tokens not currently sold.
    #[must_use]
    pub fn unsold(&self) -> Decimal {
        self.params.total_offered - self.total_sold
    }

    /// Refunds can still be requested at `now`.
    #[must_use]
    pub fn refund_window_open(&self, now: DateTime<Utc>) -> bool {
        self.params.refunds_enabled && now <= self.params.refund_window_end
    }
}
