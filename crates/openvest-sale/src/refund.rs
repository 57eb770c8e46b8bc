//! Refund Engine.
//!
//! A buyer may hand back tokens that were delivered to them and not yet
//! refunded, and receives the matching share of their payment:
//!
//! ```text
//! tokens  = released - refunded
//! payment = floor(paid * (refunded + tokens) / total) - refunded_payment
//! ```
//!
//! The payment share is computed on the cumulative refunded quantity, so a
//! series of partial refunds returns exactly what one refund of the same
//! total would, and refunding the whole record returns exactly `paid`.

use chrono::{DateTime, Utc};
use openvest_ledger::{AdminConfig, Escrow, TransferBatch};
use openvest_types::{
    Address, Entitlement, EntitlementId, EntitlementKind, LedgerEvent, OpenvestError, Result,
    SaleStatus, mul_div,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::{SaleEngine, conflict};

/// Quantities moved by one refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// Tokens clawed back from the buyer.
    pub tokens: Decimal,
    /// Payment returned to the buyer.
    pub payment: Decimal,
}

/// Tokens and payment a refund of `record` would move now.
///
/// # Errors
/// `StateConflict` for a lock record, `ArithmeticOverflow`.
pub fn refund_quote(record: &Entitlement) -> Result<Refund> {
    let EntitlementKind::Purchase {
        paid_amount,
        refunded_amount,
        refunded_payment,
        ..
    } = record.kind
    else {
        return Err(conflict(format!("{} is not a purchase", record.id)));
    };
    let tokens = record.released_amount - refunded_amount;
    if tokens.is_zero() {
        return Ok(Refund {
            tokens,
            payment: Decimal::ZERO,
        });
    }
    let cumulative = mul_div(paid_amount, refunded_amount + tokens, record.total_amount)?;
    Ok(Refund {
        tokens,
        payment: cumulative - refunded_payment,
    })
}

impl SaleEngine {
    /// Refund every delivered, not yet refunded token of purchase `id`.
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` owns the record
    /// - `StateConflict` while sales are paused or after settlement
    /// - `RefundsDisabled`, `RefundWindowClosed`
    /// - `NothingToRefund` if nothing delivered is left to refund
    /// - the escrow's error (nothing changes)
    pub fn refund(
        &mut self,
        escrow: &mut impl Escrow,
        admin: &AdminConfig,
        caller: Address,
        id: EntitlementId,
        now: DateTime<Utc>,
    ) -> Result<Refund> {
        if admin.sales_paused() {
            return Err(conflict("sales are paused"));
        }
        let record = self.purchases.get(id)?;
        let Some(sale_id) = record.sale_id() else {
            return Err(conflict(format!("{id} is not a purchase")));
        };
        if record.owner != caller {
            return Err(OpenvestError::Unauthorized {
                reason: format!("{caller} does not own {id}"),
            });
        }
        let sale = self.sale(sale_id)?;
        if sale.settlement.is_some() || sale.status == SaleStatus::Ended {
            return Err(conflict(format!("{sale_id} is settled")));
        }
        if !sale.params.refunds_enabled {
            return Err(OpenvestError::RefundsDisabled(sale_id));
        }
        if now > sale.params.refund_window_end {
            return Err(OpenvestError::RefundWindowClosed(sale_id));
        }
        let refund = refund_quote(record)?;
        if refund.tokens.is_zero() {
            return Err(OpenvestError::NothingToRefund(id));
        }
        let (sale_asset, payment_asset) = (sale.params.sale_asset, sale.params.payment_asset);
        let previous_sale = sale.clone();
        tracing::debug!(id = %id, tokens = %refund.tokens, payment = %refund.payment, "Refund quoted");

        let previous_record = self.purchases.update(id, |record| {
            if let EntitlementKind::Purchase {
                refunded_amount,
                refunded_payment,
                ..
            } = &mut record.kind
            {
                *refunded_amount += refund.tokens;
                *refunded_payment += refund.payment;
            }
        })?;
        let (total_sold, raised) = (
            previous_sale.total_sold - refund.tokens,
            previous_sale.total_raised - refund.payment,
        );
        if let Some(sale) = self.sales.get_mut(&sale_id) {
            sale.total_sold = total_sold;
            sale.total_raised = raised;
        }

        let mut batch = TransferBatch::new();
        batch
            .deposit(sale_asset, caller, refund.tokens)
            .payout(payment_asset, caller, refund.payment);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.purchases.restore(previous_record);
            self.sales.insert(sale_id, previous_sale);
            tracing::warn!(id = %id, error = %err, "Refund transfer failed, refund rolled back");
            return Err(err);
        }

        let record = self.purchases.get(id)?;
        let refunded_amount = record.refunded_amount();
        let refunded_payment = match record.kind {
            EntitlementKind::Purchase {
                refunded_payment, ..
            } => refunded_payment,
            EntitlementKind::Lock => Decimal::ZERO,
        };
        tracing::info!(
            sale_id = %sale_id,
            id = %id,
            tokens = %refund.tokens,
            payment = %refund.payment,
            total_sold = %total_sold,
            "Purchase refunded"
        );
        self.purchases.notify(
            now,
            LedgerEvent::Refunded {
                sale_id,
                id,
                tokens: refund.tokens,
                payment: refund.payment,
                refunded_amount,
                refunded_payment,
                total_sold,
            },
        );
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use openvest_types::{
        SaleParams,
        fixtures::{addr, day, dec, schedule},
    };

    use super::*;
    use crate::engine::tests::{BUYER, TOKEN, USD, World, params, world};

    fn refundable(vesting: bool) -> SaleParams {
        let mut p = params();
        p.refunds_enabled = true;
        p.refund_window_end = day(100);
        if vesting {
            p.schedule = Some(schedule(day(20), 2_000, 30, 1_000));
        }
        p
    }

    fn bought(w: &mut World, p: SaleParams) -> EntitlementId {
        let sale = w.open_sale(p);
        w.engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), sale, dec(1_000), day(2))
            .unwrap()
    }

    #[test]
    fn refund_is_capped_at_released_tokens() {
        let mut w = world();
        let id = bought(&mut w, refundable(true));
        // 10_000 tokens for 1_000 paid; nothing delivered yet.
        assert_eq!(
            w.engine.refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(5)).unwrap_err(),
            OpenvestError::NothingToRefund(id)
        );

        w.engine.claim(&mut w.escrow, addr(BUYER), id, day(20)).unwrap();
        let refund = w
            .engine
            .refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(21))
            .unwrap();
        assert_eq!(refund, Refund { tokens: dec(2_000), payment: dec(200) });

        let record = w.engine.ledger().get(id).unwrap();
        assert_eq!(record.refunded_amount(), dec(2_000));
        assert!(record.refunded_amount() <= record.released_amount);
        assert_eq!(w.escrow.balance(addr(BUYER), addr(TOKEN)), dec(0));
        let sale = w.engine.sale(record.sale_id().unwrap()).unwrap();
        assert_eq!(sale.total_sold, dec(8_000));
        assert_eq!(sale.total_raised, dec(800));
        assert_eq!(w.escrow.custody(addr(USD)), dec(800));

        // Refunded tokens are never delivered again.
        assert_eq!(w.engine.withdrawable(id, day(21)).unwrap(), dec(0));
    }

    #[test]
    fn partial_refunds_sum_to_the_payment() {
        let mut w = world();
        let mut p = refundable(true);
        p.token_price = dec(3);
        let sale = w.open_sale(p);
        // 10 paid at 3 tokens per unit: 30 tokens, each worth a third.
        let id = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), sale, dec(10), day(2))
            .unwrap();
        let mut payments = Vec::new();
        for at in [day(20), day(50), day(80)] {
            w.engine.claim(&mut w.escrow, addr(BUYER), id, at).unwrap();
            let refund = w
                .engine
                .refund(&mut w.escrow, &w.admin, addr(BUYER), id, at)
                .unwrap();
            payments.push(refund.payment);
        }
        // 6, 3 and 3 tokens: floor(10 * 6/30), then 3 - 2, then 4 - 3.
        assert_eq!(payments, vec![dec(2), dec(1), dec(1)]);
        let record = w.engine.ledger().get(id).unwrap();
        assert_eq!(record.refunded_amount(), dec(12));
        assert_eq!(
            mul_div(dec(10), record.refunded_amount(), record.total_amount).unwrap(),
            dec(4)
        );
    }

    #[test]
    fn full_refund_returns_exact_payment() {
        let mut w = world();
        let id = bought(&mut w, refundable(false));
        let refund = w
            .engine
            .refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(3))
            .unwrap();
        assert_eq!(refund, Refund { tokens: dec(10_000), payment: dec(1_000) });
        assert_eq!(w.escrow.balance(addr(BUYER), addr(USD)), dec(1_000_000));
        assert_eq!(
            w.engine.refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(3)).unwrap_err(),
            OpenvestError::NothingToRefund(id)
        );
    }

    #[test]
    fn refund_gates() {
        let mut w = world();
        let disabled = bought(&mut w, params());
        let err = w
            .engine
            .refund(&mut w.escrow, &w.admin, addr(BUYER), disabled, day(3))
            .unwrap_err();
        assert!(matches!(err, OpenvestError::RefundsDisabled(_)));

        let mut w = world();
        let id = bought(&mut w, refundable(false));
        assert!(matches!(
            w.engine.refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(101)),
            Err(OpenvestError::RefundWindowClosed(_))
        ));
        assert!(matches!(
            w.engine.refund(&mut w.escrow, &w.admin, addr(4), id, day(3)),
            Err(OpenvestError::Unauthorized { .. })
        ));
    }

    #[test]
    fn failed_clawback_changes_nothing() {
        let mut w = world();
        let id = bought(&mut w, refundable(false));
        // The buyer moved the delivered tokens away.
        w.escrow.block(addr(BUYER));
        assert!(w
            .engine
            .refund(&mut w.escrow, &w.admin, addr(BUYER), id, day(3))
            .is_err());
        assert_eq!(w.engine.ledger().get(id).unwrap().refunded_amount(), dec(0));
        let sale = w.engine.sale(w.engine.ledger().get(id).unwrap().sale_id().unwrap()).unwrap();
        assert_eq!(sale.total_sold, dec(10_000));
    }
}
