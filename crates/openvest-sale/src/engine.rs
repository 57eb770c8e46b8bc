//! Sale registry and status state machine.
//!
//! The engine owns every sale aggregate and a private [`EntitlementLedger`]
//! holding the purchase records. Sale notifications go through the same
//! ledger log, so one `drain_events` call yields every transition in order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use openvest_ledger::{
    AdminConfig, EntitlementLedger, Escrow, IdIndex, Permissions, TransferBatch, page_window,
    require, vesting,
};
use openvest_types::{
    Action, Address, Entitlement, EntitlementId, LedgerEvent, Notification, OpenvestError,
    Result, Sale, SaleId, SaleParams, SaleParamsPatch, SaleStatus, constants::FIRST_ID,
    ensure_positive,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sale counts by status with current sold/raised totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleStats {
    pub pending: u64,
    pub approved: u64,
    pub paused: u64,
    pub rejected: u64,
    pub ended: u64,
    /// Tokens sold across all sales, net of refunds.
    pub total_sold: Decimal,
    /// Payment raised across all sales, net of refunds.
    pub total_raised: Decimal,
}

#[derive(Debug)]
pub struct SaleEngine {
    pub(crate) sales: BTreeMap<SaleId, Sale>,
    by_owner: HashMap<Address, IdIndex<SaleId>>,
    pub(crate) purchases: EntitlementLedger,
    /// One purchase record per (sale, buyer).
    pub(crate) purchase_index: HashMap<(SaleId, Address), EntitlementId>,
    pub(crate) by_sale: HashMap<SaleId, IdIndex<EntitlementId>>,
    next_id: u64,
}

impl Default for SaleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sales: BTreeMap::new(),
            by_owner: HashMap::new(),
            purchases: EntitlementLedger::new(),
            purchase_index: HashMap::new(),
            by_sale: HashMap::new(),
            next_id: FIRST_ID,
        }
    }

    /// Register a sale and deposit its full inventory from `caller`, who
    /// becomes the project owner. The sale starts `Pending`.
    ///
    /// # Errors
    /// `InvalidParameter` for inconsistent parameters, or the escrow's error
    /// (nothing is created).
    pub fn create_sale(
        &mut self,
        escrow: &mut impl Escrow,
        caller: Address,
        params: SaleParams,
        now: DateTime<Utc>,
    ) -> Result<SaleId> {
        if caller.is_zero() {
            return Err(OpenvestError::InvalidParameter {
                reason: "sale owner must not be the zero address".into(),
            });
        }
        validate_params(&params, Some(now))?;

        let id = SaleId(self.next_id);
        self.next_id += 1;
        let (asset, offered) = (params.sale_asset, params.total_offered);
        let announced = params.clone();
        self.sales.insert(
            id,
            Sale {
                id,
                owner: caller,
                params,
                status: SaleStatus::Pending,
                total_sold: Decimal::ZERO,
                total_raised: Decimal::ZERO,
                fee_bps_override: None,
                created_at: now,
                settlement: None,
            },
        );
        self.by_owner.entry(caller).or_default().push(id);

        let mut batch = TransferBatch::new();
        batch.deposit(asset, caller, offered);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.sales.remove(&id);
            if let Some(index) = self.by_owner.get_mut(&caller) {
                index.undo_push(id);
                if index.is_empty() {
                    self.by_owner.remove(&caller);
                }
            }
            self.next_id = id.0;
            tracing::warn!(owner = %caller, error = %err, "Inventory deposit failed, sale not created");
            return Err(err);
        }

        tracing::info!(sale_id = %id, owner = %caller, offered = %offered, "Sale created");
        self.purchases.notify(
            now,
            LedgerEvent::SaleCreated {
                sale_id: id,
                owner: caller,
                total_offered: offered,
                params: announced,
            },
        );
        Ok(id)
    }

    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `StateConflict` unless `Pending`.
    pub fn approve(
        &mut self,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::ApproveSale)?;
        self.transition(id, SaleStatus::Approved, now).map(|_| ())
    }

    /// Reject a pending sale and return its inventory to the project owner.
    ///
    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `StateConflict` unless `Pending`, or
    /// the escrow's error (the sale stays `Pending`).
    pub fn reject(
        &mut self,
        escrow: &mut impl Escrow,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::RejectSale)?;
        let sale = self.sale(id)?;
        ensure_transition(sale, SaleStatus::Rejected)?;
        let (owner, asset, offered) = (sale.owner, sale.params.sale_asset, sale.params.total_offered);

        self.set_status(id, SaleStatus::Rejected);
        let mut batch = TransferBatch::new();
        batch.payout(asset, owner, offered);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.set_status(id, SaleStatus::Pending);
            tracing::warn!(sale_id = %id, error = %err, "Inventory return failed, rejection rolled back");
            return Err(err);
        }

        tracing::info!(sale_id = %id, returned = %offered, "Sale rejected");
        self.announce_status(id, SaleStatus::Pending, SaleStatus::Rejected, now);
        Ok(())
    }

    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `StateConflict` unless `Approved`.
    pub fn pause(
        &mut self,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::PauseSale)?;
        if self.sale(id)?.status != SaleStatus::Approved {
            return Err(conflict(format!("{id} is not approved")));
        }
        self.transition(id, SaleStatus::Paused, now).map(|_| ())
    }

    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `StateConflict` unless `Paused`.
    pub fn unpause(
        &mut self,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::PauseSale)?;
        if self.sale(id)?.status != SaleStatus::Paused {
            return Err(conflict(format!("{id} is not paused")));
        }
        self.transition(id, SaleStatus::Approved, now).map(|_| ())
    }

    /// Apply an administrative parameter patch.
    ///
    /// The schedule can only be replaced while the sale has no purchase
    /// records, refunded or not, since a record keeps the unlock it was
    /// created with.
    ///
    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `StateConflict` for `Ended`/`Rejected`
    /// sales or a late schedule change, `InvalidParameter` if the patched
    /// parameters are inconsistent.
    pub fn edit_sale(
        &mut self,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        patch: &SaleParamsPatch,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::EditSale)?;
        let sale = self.sale(id)?;
        if sale.status.is_terminal() {
            return Err(conflict(format!("{id} is {} and cannot be edited", sale.status)));
        }
        let has_purchases = self.by_sale.get(&id).is_some_and(|index| !index.is_empty());
        if patch.schedule.is_some() && has_purchases {
            return Err(conflict(format!(
                "{id} has purchase records; its schedule is fixed"
            )));
        }
        let next = patch.apply(&sale.params);
        validate_params(&next, None)?;
        if let Some(sale) = self.sales.get_mut(&id) {
            sale.params = next.clone();
        }
        tracing::info!(sale_id = %id, caller = %caller, "Sale parameters edited");
        self.purchases.notify(
            now,
            LedgerEvent::SaleParamsChanged {
                sale_id: id,
                params: next,
            },
        );
        Ok(())
    }

    /// Override the global fee for one sale.
    ///
    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `InvalidParameter` above the fee
    /// ceiling, `AlreadySettled`.
    pub fn set_sale_fee(
        &mut self,
        perms: &impl Permissions,
        admin: &AdminConfig,
        caller: Address,
        id: SaleId,
        fee_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::SetFee)?;
        admin.validate_fee(fee_bps)?;
        self.change_fee(id, Some(fee_bps), now)
    }

    /// Drop a sale's fee override so it inherits the global fee again.
    ///
    /// # Errors
    /// `Unauthorized`, `SaleNotFound`, `AlreadySettled`.
    pub fn clear_sale_fee(
        &mut self,
        perms: &impl Permissions,
        caller: Address,
        id: SaleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(perms, &caller, Action::SetFee)?;
        self.change_fee(id, None, now)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// # Errors
    /// `SaleNotFound`.
    pub fn sale(&self, id: SaleId) -> Result<&Sale> {
        self.sales.get(&id).ok_or(OpenvestError::SaleNotFound(id))
    }

    /// Sales created by `owner`, oldest first.
    #[must_use]
    pub fn sales_of(&self, owner: &Address) -> Vec<&Sale> {
        self.by_owner
            .get(owner)
            .map(|index| index.iter().filter_map(|id| self.sales.get(&id)).collect())
            .unwrap_or_default()
    }

    /// Sales at positions `[start, end)` in id order.
    ///
    /// # Errors
    /// `InvalidParameter` if `end < start`.
    pub fn range(&self, start: usize, end: usize) -> Result<Vec<&Sale>> {
        let (start, end) = page_window(start, end)?;
        Ok(self.sales.values().skip(start).take(end - start).collect())
    }

    #[must_use]
    pub fn purchase_of(&self, sale: SaleId, buyer: &Address) -> Option<&Entitlement> {
        self.purchase_index
            .get(&(sale, *buyer))
            .and_then(|id| self.purchases.find(*id))
    }

    /// Purchase records held by `buyer`, across all sales.
    #[must_use]
    pub fn purchases_of(&self, buyer: &Address) -> Vec<&Entitlement> {
        self.purchases.entitlements_of(buyer)
    }

    /// Purchase records of one sale, in first-purchase order.
    #[must_use]
    pub fn purchases_for_sale(&self, sale: SaleId) -> Vec<&Entitlement> {
        self.by_sale
            .get(&sale)
            .map(|index| index.iter().filter_map(|id| self.purchases.find(id)).collect())
            .unwrap_or_default()
    }

    /// The fee a settlement of `id` would charge right now.
    ///
    /// # Errors
    /// `SaleNotFound`.
    pub fn effective_fee_bps(&self, admin: &AdminConfig, id: SaleId) -> Result<u32> {
        Ok(self
            .sale(id)?
            .fee_bps_override
            .unwrap_or_else(|| admin.global_fee_bps()))
    }

    #[must_use]
    pub fn stats(&self) -> SaleStats {
        self.sales.values().fold(SaleStats::default(), |mut stats, sale| {
            match sale.status {
                SaleStatus::Pending => stats.pending += 1,
                SaleStatus::Approved => stats.approved += 1,
                SaleStatus::Paused => stats.paused += 1,
                SaleStatus::Rejected => stats.rejected += 1,
                SaleStatus::Ended => stats.ended += 1,
            }
            stats.total_sold = stats.total_sold.saturating_add(sale.total_sold);
            stats.total_raised = stats.total_raised.saturating_add(sale.total_raised);
            stats
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sales.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sales.is_empty()
    }

    /// The ledger holding purchase records (for digests and record queries).
    #[must_use]
    pub fn ledger(&self) -> &EntitlementLedger {
        &self.purchases
    }

    pub fn drain_events(&mut self) -> Vec<Notification> {
        self.purchases.drain_events()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn transition(&mut self, id: SaleId, to: SaleStatus, now: DateTime<Utc>) -> Result<SaleStatus> {
        let sale = self.sale(id)?;
        ensure_transition(sale, to)?;
        let from = sale.status;
        self.set_status(id, to);
        tracing::info!(sale_id = %id, from = %from, to = %to, "Sale status changed");
        self.announce_status(id, from, to, now);
        Ok(from)
    }

    pub(crate) fn set_status(&mut self, id: SaleId, status: SaleStatus) {
        if let Some(sale) = self.sales.get_mut(&id) {
            sale.status = status;
        }
    }

    pub(crate) fn announce_status(
        &mut self,
        id: SaleId,
        from: SaleStatus,
        to: SaleStatus,
        now: DateTime<Utc>,
    ) {
        self.purchases.notify(
            now,
            LedgerEvent::SaleStatusChanged {
                sale_id: id,
                from,
                to,
            },
        );
    }

    fn change_fee(&mut self, id: SaleId, fee_bps: Option<u32>, now: DateTime<Utc>) -> Result<()> {
        let sale = self
            .sales
            .get_mut(&id)
            .ok_or(OpenvestError::SaleNotFound(id))?;
        if sale.settlement.is_some() {
            return Err(OpenvestError::AlreadySettled(id));
        }
        sale.fee_bps_override = fee_bps;
        tracing::info!(sale_id = %id, fee_bps = ?fee_bps, "Sale fee override changed");
        self.purchases
            .notify(now, LedgerEvent::SaleFeeChanged { sale_id: id, fee_bps });
        Ok(())
    }
}

pub(crate) fn conflict(reason: impl Into<String>) -> OpenvestError {
    OpenvestError::StateConflict {
        reason: reason.into(),
    }
}

fn ensure_transition(sale: &Sale, to: SaleStatus) -> Result<()> {
    if !sale.status.can_transition_to(to) {
        return Err(conflict(format!(
            "{} cannot move from {} to {to}",
            sale.id, sale.status
        )));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> OpenvestError {
    OpenvestError::InvalidParameter {
        reason: reason.into(),
    }
}

/// Consistency checks on sale parameters. With `now`, the window must also
/// not have started yet.
///
/// # Errors
/// `InvalidParameter` naming the first violated rule.
pub fn validate_params(params: &SaleParams, now: Option<DateTime<Utc>>) -> Result<()> {
    if params.sale_asset.is_zero() || params.payment_asset.is_zero() {
        return Err(invalid("sale and payment assets must be set"));
    }
    if params.sale_asset == params.payment_asset {
        return Err(invalid("sale asset and payment asset must differ"));
    }
    ensure_positive(params.token_price, "token_price")?;
    ensure_positive(params.payment_asset_unit, "payment_asset_unit")?;
    ensure_positive(params.total_offered, "total_offered")?;
    ensure_positive(params.min_buy, "min_buy")?;
    ensure_positive(params.max_buy, "max_buy")?;
    if params.min_buy > params.max_buy {
        return Err(invalid(format!(
            "min_buy {} exceeds max_buy {}",
            params.min_buy, params.max_buy
        )));
    }
    if params.window.start >= params.window.end {
        return Err(invalid("sale window must end after it starts"));
    }
    if let Some(now) = now {
        if params.window.start < now {
            return Err(invalid(format!(
                "sale window start {} is in the past",
                params.window.start
            )));
        }
    }
    if let Some(schedule) = &params.schedule {
        vesting::validate_schedule(schedule)?;
    }
    if params.refunds_enabled && params.refund_window_end < params.window.start {
        return Err(invalid("refund window must not end before the sale starts"));
    }
    Ok(())
}
