//! Purchases and claims on purchase records.

use chrono::{DateTime, Utc};
use openvest_ledger::{AdminConfig, Escrow, PurchaseDraft, TransferBatch};
use openvest_types::{
    Address, EntitlementId, EntitlementKind, LedgerEvent, OpenvestError, Result, SaleId,
    SaleStatus, UnlockMode, ensure_positive, mul_div,
};
use rust_decimal::Decimal;

use crate::engine::{SaleEngine, conflict};

fn limit(reason: impl Into<String>) -> OpenvestError {
    OpenvestError::LimitExceeded {
        reason: reason.into(),
    }
}

impl SaleEngine {
    /// Tokens `payment` buys in sale `id`: `floor(payment * price / unit)`.
    ///
    /// # Errors
    /// `SaleNotFound`, `ArithmeticOverflow`.
    pub fn quote(&self, id: SaleId, payment: Decimal) -> Result<Decimal> {
        let params = &self.sale(id)?.params;
        mul_div(payment, params.token_price, params.payment_asset_unit)
    }

    /// Buy tokens with `payment` of the sale's payment asset.
    ///
    /// Creates the buyer's purchase record or tops it up. Without a sale
    /// schedule the tokens are delivered in the same transfer batch.
    ///
    /// # Errors
    /// - `StateConflict` while sales are paused, the sale is not `Approved`
    ///   or `now` is outside the window
    /// - `LimitExceeded` outside `[min_buy, max_buy]`, for a payment that
    ///   buys nothing, or beyond the offered supply
    /// - the escrow's error (nothing changes)
    pub fn buy(
        &mut self,
        escrow: &mut impl Escrow,
        admin: &AdminConfig,
        buyer: Address,
        id: SaleId,
        payment: Decimal,
        now: DateTime<Utc>,
    ) -> Result<EntitlementId> {
        if admin.sales_paused() {
            return Err(conflict("sales are paused"));
        }
        if buyer.is_zero() || buyer.is_burn() {
            return Err(OpenvestError::InvalidParameter {
                reason: format!("{buyer} cannot buy"),
            });
        }
        ensure_positive(payment, "payment")?;

        let sale = self.sale(id)?;
        if sale.status != SaleStatus::Approved {
            return Err(conflict(format!("{id} is {}, not approved", sale.status)));
        }
        if !sale.params.window.contains(now) {
            return Err(conflict(format!("{id} is not open at {now}")));
        }
        let params = &sale.params;
        if payment < params.min_buy || payment > params.max_buy {
            return Err(limit(format!(
                "payment {payment} outside [{}, {}]",
                params.min_buy, params.max_buy
            )));
        }
        let tokens = mul_div(payment, params.token_price, params.payment_asset_unit)?;
        if tokens.is_zero() {
            return Err(limit(format!("payment {payment} buys no tokens")));
        }
        let sold = sale
            .total_sold
            .checked_add(tokens)
            .ok_or(OpenvestError::ArithmeticOverflow)?;
        if sold > params.total_offered {
            return Err(limit(format!(
                "{tokens} tokens exceed remaining supply {}",
                sale.unsold()
            )));
        }
        let raised = sale
            .total_raised
            .checked_add(payment)
            .ok_or(OpenvestError::ArithmeticOverflow)?;
        let delivered = params.schedule.is_none();
        let unlock = params
            .schedule
            .map_or(UnlockMode::Timed { unlock_date: now }, UnlockMode::Vesting);
        let draft = PurchaseDraft {
            sale_id: id,
            buyer,
            creator: sale.owner,
            asset: params.sale_asset,
            tokens,
            payment,
            unlock,
            delivered,
            description: params.description.clone(),
        };
        let existing = self.purchase_index.get(&(id, buyer)).copied();
        if let (Some(entitlement), Some(schedule)) = (existing, params.schedule) {
            if self.purchases.get(entitlement)?.unlock != UnlockMode::Vesting(schedule) {
                return Err(conflict(format!(
                    "{entitlement} does not vest on the schedule of {id}"
                )));
            }
        }
        let (sale_asset, payment_asset) = (params.sale_asset, params.payment_asset);
        let previous_sale = sale.clone();
        tracing::debug!(sale_id = %id, payment = %payment, tokens = %tokens, "Purchase quoted");

        // Commit.
        let (entitlement, previous_record) = match existing {
            Some(entitlement) => {
                let previous = self.purchases.update(entitlement, |record| {
                    record.total_amount += tokens;
                    if delivered {
                        record.released_amount += tokens;
                    }
                    if let EntitlementKind::Purchase { paid_amount, .. } = &mut record.kind {
                        *paid_amount += payment;
                    }
                })?;
                (entitlement, Some(previous))
            }
            None => {
                let entitlement = self.purchases.insert_purchase(draft, now)?;
                self.purchase_index.insert((id, buyer), entitlement);
                self.by_sale.entry(id).or_default().push(entitlement);
                (entitlement, None)
            }
        };
        if let Some(sale) = self.sales.get_mut(&id) {
            sale.total_sold = sold;
            sale.total_raised = raised;
        }

        let mut batch = TransferBatch::new();
        batch.deposit(payment_asset, buyer, payment);
        if delivered {
            batch.payout(sale_asset, buyer, tokens);
        }
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.sales.insert(id, previous_sale);
            match previous_record {
                Some(previous) => self.purchases.restore(previous),
                None => {
                    self.purchases.revert_insert(entitlement);
                    self.purchase_index.remove(&(id, buyer));
                    if let Some(index) = self.by_sale.get_mut(&id) {
                        index.undo_push(entitlement);
                        if index.is_empty() {
                            self.by_sale.remove(&id);
                        }
                    }
                }
            }
            tracing::warn!(sale_id = %id, buyer = %buyer, error = %err, "Purchase transfer failed, purchase rolled back");
            return Err(err);
        }

        let record = self.purchases.get(entitlement)?;
        let (total_amount, released_amount) = (record.total_amount, record.released_amount);
        tracing::info!(
            sale_id = %id,
            id = %entitlement,
            buyer = %buyer,
            payment = %payment,
            tokens = %tokens,
            total_sold = %sold,
            "Purchase recorded"
        );
        self.purchases.notify(
            now,
            LedgerEvent::PurchaseRecorded {
                sale_id: id,
                id: entitlement,
                buyer,
                payment,
                tokens,
                total_amount,
                released_amount,
                total_sold: sold,
            },
        );
        Ok(entitlement)
    }

    /// Amount a claim on purchase `id` would deliver at `now`.
    ///
    /// # Errors
    /// `EntitlementNotFound`.
    pub fn withdrawable(&self, id: EntitlementId, now: DateTime<Utc>) -> Result<Decimal> {
        self.purchases.withdrawable(id, now)
    }

    /// Claim vested tokens of a purchase record.
    ///
    /// # Errors
    /// As [`openvest_ledger::EntitlementLedger::claim`].
    pub fn claim(
        &mut self,
        escrow: &mut impl Escrow,
        caller: Address,
        id: EntitlementId,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        self.purchases.claim(escrow, caller, id, now)
    }
}

#[cfg(test)]
mod tests {
    use openvest_types::{
        EntitlementKind,
        fixtures::{addr, day, dec, schedule},
    };

    use super::*;
    use crate::engine::tests::{BUYER, PROJECT, TOKEN, USD, params, world};

    #[test]
    fn buy_converts_payment_at_price() {
        let mut w = world();
        let id = w.open_sale(params());
        assert_eq!(w.engine.quote(id, dec(100)).unwrap(), dec(1_000));

        let record = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(2))
            .unwrap();
        let sale = w.engine.sale(id).unwrap();
        assert_eq!(sale.total_sold, dec(1_000));
        assert_eq!(sale.total_raised, dec(100));

        // No schedule: delivered with the purchase, recorded fully released.
        let entitlement = w.engine.ledger().get(record).unwrap();
        assert_eq!(entitlement.total_amount, dec(1_000));
        assert_eq!(entitlement.released_amount, dec(1_000));
        assert_eq!(w.escrow.balance(addr(BUYER), addr(TOKEN)), dec(1_000));
        assert_eq!(w.escrow.custody(addr(USD)), dec(100));
    }

    #[test]
    fn repeat_buys_top_up_one_record() {
        let mut w = world();
        let mut p = params();
        p.schedule = Some(schedule(day(20), 2_000, 30, 1_000));
        let id = w.open_sale(p);

        let first = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(2))
            .unwrap();
        let second = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(50), day(3))
            .unwrap();
        assert_eq!(first, second);

        let record = w.engine.purchase_of(id, &addr(BUYER)).unwrap();
        assert_eq!(record.total_amount, dec(1_500));
        assert_eq!(record.released_amount, dec(0));
        assert!(matches!(
            record.kind,
            EntitlementKind::Purchase { paid_amount, .. } if paid_amount == dec(150)
        ));
        assert_eq!(w.engine.purchases_of(&addr(BUYER)).len(), 1);
        assert_eq!(w.engine.purchases_for_sale(id).len(), 1);
        assert_eq!(w.escrow.balance(addr(BUYER), addr(TOKEN)), dec(0));
    }

    #[test]
    fn buy_bounds() {
        let mut w = world();
        let mut p = params();
        p.total_offered = dec(15_000);
        let id = w.open_sale(p);
        let buy = |w: &mut crate::engine::tests::World, payment: i64| {
            w.engine
                .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(payment), day(2))
        };
        assert!(matches!(buy(&mut w, 9), Err(OpenvestError::LimitExceeded { .. })));
        assert!(matches!(buy(&mut w, 1_001), Err(OpenvestError::LimitExceeded { .. })));
        buy(&mut w, 1_000).unwrap();
        // 10_000 sold; 600 more would need 6_000 tokens of the remaining 5_000.
        assert!(matches!(buy(&mut w, 600), Err(OpenvestError::LimitExceeded { .. })));
        buy(&mut w, 500).unwrap();
        assert_eq!(w.engine.sale(id).unwrap().unsold(), dec(0));
    }

    #[test]
    fn payment_too_small_for_one_token() {
        let mut w = world();
        let mut p = params();
        p.token_price = dec(1);
        p.payment_asset_unit = dec(1_000);
        p.min_buy = dec(1);
        let id = w.open_sale(p);
        assert!(matches!(
            w.engine.buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(999), day(2)),
            Err(OpenvestError::LimitExceeded { .. })
        ));
        assert_eq!(
            w.engine.quote(id, dec(1_000)).unwrap(),
            dec(1)
        );
    }

    #[test]
    fn buy_requires_open_approved_sale() {
        let mut w = world();
        let pending = w
            .engine
            .create_sale(&mut w.escrow, addr(PROJECT), params(), day(0))
            .unwrap();
        assert!(matches!(
            w.engine.buy(&mut w.escrow, &w.admin, addr(BUYER), pending, dec(100), day(2)),
            Err(OpenvestError::StateConflict { .. })
        ));

        let id = w.open_sale(params());
        for at in [day(0), day(11)] {
            assert!(matches!(
                w.engine.buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), at),
                Err(OpenvestError::StateConflict { .. })
            ));
        }
        w.engine.pause(&w.perms, addr(crate::engine::tests::ADMIN), id, day(2)).unwrap();
        assert!(w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(2))
            .is_err());
    }

    #[test]
    fn failed_payment_rolls_back_everything() {
        let mut w = world();
        let id = w.open_sale(params());
        w.engine.drain_events();
        w.escrow.block(addr(BUYER));
        assert!(matches!(
            w.engine.buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(2)),
            Err(OpenvestError::TransferFailed { .. })
        ));
        assert_eq!(w.engine.sale(id).unwrap().total_sold, dec(0));
        assert!(w.engine.purchase_of(id, &addr(BUYER)).is_none());
        assert!(w.engine.ledger().is_empty());
        assert!(w.engine.drain_events().is_empty());
    }

    #[test]
    fn top_up_refuses_a_record_on_another_unlock() {
        let mut w = world();
        let id = w.open_sale(params());
        let record = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(2))
            .unwrap();
        // A sale whose schedule no longer matches the buyer's record.
        if let Some(sale) = w.engine.sales.get_mut(&id) {
            sale.params.schedule = Some(schedule(day(200), 0, 30, 1_000));
        }
        assert!(matches!(
            w.engine.buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(100), day(3)),
            Err(OpenvestError::StateConflict { .. })
        ));
        let entitlement = w.engine.ledger().get(record).unwrap();
        assert_eq!(entitlement.total_amount, dec(1_000));
        assert_eq!(w.engine.sale(id).unwrap().total_sold, dec(1_000));
        assert_eq!(w.engine.withdrawable(record, day(3)).unwrap(), dec(0));
    }

    #[test]
    fn vested_purchase_is_claimed_through_the_engine() {
        let mut w = world();
        let mut p = params();
        p.schedule = Some(schedule(day(20), 2_000, 30, 1_000));
        let id = w.open_sale(p);
        let record = w
            .engine
            .buy(&mut w.escrow, &w.admin, addr(BUYER), id, dec(1_000), day(2))
            .unwrap();
        assert_eq!(w.engine.withdrawable(record, day(19)).unwrap(), dec(0));
        assert_eq!(
            w.engine.claim(&mut w.escrow, addr(BUYER), record, day(20)).unwrap(),
            dec(2_000)
        );
        assert_eq!(w.escrow.balance(addr(BUYER), addr(TOKEN)), dec(2_000));
    }
}
