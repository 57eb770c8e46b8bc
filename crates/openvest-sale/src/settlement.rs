//! Sale settlement and proceeds conservation.
//!
//! Settlement is the terminal withdrawal of a sale. It runs once, after the
//! sale window and any refund window have closed, and splits the raised
//! payment:
//!
//! ```text
//! fee      = floor(total_raised * fee_bps / 10_000)
//! proceeds = total_raised - fee
//! unsold   = total_offered - total_sold
//! ```
//!
//! Before any transfer is issued the sale totals are checked against its
//! purchase records with [`ProceedsConservation`].

use chrono::{DateTime, Utc};
use openvest_ledger::{AdminConfig, Escrow, TransferBatch};
use openvest_types::{
    Address, Entitlement, EntitlementKind, LedgerEvent, OpenvestError, Result, Sale, SaleId,
    SaleStatus, Settlement, checked_add, mul_bps,
};
use rust_decimal::Decimal;

use crate::engine::{SaleEngine, conflict};

fn violation(reason: String) -> OpenvestError {
    tracing::error!(reason = %reason, "Proceeds conservation violated");
    OpenvestError::ConservationViolation { reason }
}

/// Totals derived from a sale's purchase records.
///
/// ```text
/// raised = Σ paid - Σ refunded_payment
/// sold   = Σ total - Σ refunded
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProceedsConservation {
    paid: Decimal,
    refunded_payment: Decimal,
    bought: Decimal,
    refunded: Decimal,
}

impl ProceedsConservation {
    /// Sum the purchase records of one sale. Lock records are ignored.
    ///
    /// # Errors
    /// `ArithmeticOverflow`.
    pub fn from_purchases<'a>(records: impl IntoIterator<Item = &'a Entitlement>) -> Result<Self> {
        let mut totals = Self::default();
        for record in records {
            if let EntitlementKind::Purchase {
                paid_amount,
                refunded_amount,
                refunded_payment,
                ..
            } = record.kind
            {
                totals.paid = checked_add(totals.paid, paid_amount)?;
                totals.refunded_payment = checked_add(totals.refunded_payment, refunded_payment)?;
                totals.bought = checked_add(totals.bought, record.total_amount)?;
                totals.refunded = checked_add(totals.refunded, refunded_amount)?;
            }
        }
        Ok(totals)
    }

    #[must_use]
    pub fn expected_raised(&self) -> Decimal {
        self.paid - self.refunded_payment
    }

    #[must_use]
    pub fn expected_sold(&self) -> Decimal {
        self.bought - self.refunded
    }

    /// # Errors
    /// `ConservationViolation` if the sale's totals disagree with its records.
    pub fn verify_sale(&self, sale: &Sale) -> Result<()> {
        if sale.total_raised != self.expected_raised() {
            return Err(violation(format!(
                "{}: total_raised {} != paid {} - refunded {}",
                sale.id, sale.total_raised, self.paid, self.refunded_payment
            )));
        }
        if sale.total_sold != self.expected_sold() {
            return Err(violation(format!(
                "{}: total_sold {} != bought {} - refunded {}",
                sale.id, sale.total_sold, self.bought, self.refunded
            )));
        }
        Ok(())
    }

    /// `fee + proceeds == raised`, both non-negative.
    ///
    /// # Errors
    /// `ConservationViolation`.
    pub fn verify_split(raised: Decimal, fee: Decimal, proceeds: Decimal) -> Result<()> {
        if fee.is_sign_negative() || proceeds.is_sign_negative() {
            return Err(violation(format!(
                "negative split: fee {fee}, proceeds {proceeds}"
            )));
        }
        if checked_add(fee, proceeds)? != raised {
            return Err(violation(format!(
                "fee {fee} + proceeds {proceeds} != raised {raised}"
            )));
        }
        Ok(())
    }
}

impl SaleEngine {
    /// Settle sale `id`: return unsold inventory to the owner, pay the fee to
    /// the fee recipient and the remaining proceeds to the owner. The sale
    /// becomes `Ended`.
    ///
    /// # Errors
    /// - `AlreadySettled` on a second call
    /// - `Unauthorized` unless `caller` is the sale owner
    /// - `StateConflict` unless the sale is `Approved`, its window has ended
    ///   and no refund window is open
    /// - `ConservationViolation` if the totals disagree with the records
    /// - the escrow's error (the sale stays unsettled)
    pub fn withdraw(
        &mut self,
        escrow: &mut impl Escrow,
        admin: &AdminConfig,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let sale = self.sale(id)?;
        if sale.settlement.is_some() {
            return Err(OpenvestError::AlreadySettled(id));
        }
        if sale.owner != caller {
            return Err(OpenvestError::Unauthorized {
                reason: format!("{caller} does not own {id}"),
            });
        }
        if sale.status != SaleStatus::Approved {
            return Err(conflict(format!("{id} is {}, not approved", sale.status)));
        }
        if now <= sale.params.window.end {
            return Err(conflict(format!(
                "{id} runs until {}",
                sale.params.window.end
            )));
        }
        if sale.refund_window_open(now) {
            return Err(conflict(format!(
                "{id} accepts refunds until {}",
                sale.params.refund_window_end
            )));
        }

        ProceedsConservation::from_purchases(self.purchases_for_sale(id))?.verify_sale(sale)?;
        let fee_bps = sale
            .fee_bps_override
            .unwrap_or_else(|| admin.global_fee_bps());
        let raised = sale.total_raised;
        let fee = mul_bps(raised, fee_bps)?;
        let proceeds = raised - fee;
        ProceedsConservation::verify_split(raised, fee, proceeds)?;
        let settlement = Settlement {
            unsold: sale.unsold(),
            fee,
            proceeds,
            fee_bps,
            settled_at: now,
        };
        let (owner, sale_asset, payment_asset) =
            (sale.owner, sale.params.sale_asset, sale.params.payment_asset);
        tracing::debug!(sale_id = %id, raised = %raised, fee_bps, "Settlement computed");

        if let Some(sale) = self.sales.get_mut(&id) {
            sale.status = SaleStatus::Ended;
            sale.settlement = Some(settlement);
        }
        let mut batch = TransferBatch::new();
        batch
            .payout(sale_asset, owner, settlement.unsold)
            .payout(payment_asset, admin.fee_recipient(), fee)
            .payout(payment_asset, owner, proceeds);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            if let Some(sale) = self.sales.get_mut(&id) {
                sale.status = SaleStatus::Approved;
                sale.settlement = None;
            }
            tracing::warn!(sale_id = %id, error = %err, "Settlement transfer failed, sale left open");
            return Err(err);
        }

        tracing::info!(
            sale_id = %id,
            unsold = %settlement.unsold,
            fee = %fee,
            proceeds = %proceeds,
            "Sale settled"
        );
        self.purchases.notify(
            now,
            LedgerEvent::SaleSettled {
                sale_id: id,
                unsold: settlement.unsold,
                fee,
                proceeds,
            },
        );
        self.announce_status(id, SaleStatus::Approved, SaleStatus::Ended, now);
        Ok(settlement)
    }
}
