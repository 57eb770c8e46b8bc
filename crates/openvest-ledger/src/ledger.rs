//! Entitlement Ledger.
//!
//! Owns every entitlement record in an id-keyed arena plus per-owner and
//! per-asset [`IdIndex`]es and running statistics. Records are never deleted:
//! a fully released record becomes inert and stays for audit.
//!
//! ## Operation ordering
//!
//! Every mutating operation follows the same sequence:
//!
//! 1. Validate against the current state.
//! 2. Commit the state change (record, indexes, counters).
//! 3. Execute the operation's transfers as one batch.
//! 4. On transfer failure, restore the previous state and return the error.
//! 5. On success, record the notification.
//!
//! The escrow therefore always observes already-committed state, and a failed
//! operation leaves no record, index entry, counter change or notification.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use openvest_types::{
    Address, AssetKind, Classification, Entitlement, EntitlementId, EntitlementKind, EventLog,
    LedgerEvent, Notification, OpenvestError, Result, SaleId, UnlockMode, checked_sum,
    constants::FIRST_ID, ensure_positive,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    admin::AdminConfig,
    classifier::{AssetClassifier, resolve},
    escrow::{Escrow, TransferBatch},
    index::{IdIndex, page_window},
    vesting,
};

/// A single lock, simple or vesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub owner: Address,
    pub asset: Address,
    pub is_pool_token: bool,
    pub amount: Decimal,
    pub unlock: UnlockMode,
    pub description: String,
}

/// Many locks over one asset sharing one unlock definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLockRequest {
    pub owners: Vec<Address>,
    pub amounts: Vec<Decimal>,
    pub asset: Address,
    pub is_pool_token: bool,
    pub unlock: UnlockMode,
    pub description: String,
}

/// A purchase record as drafted by the sale product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub sale_id: SaleId,
    pub buyer: Address,
    /// Project owner; funded the inventory.
    pub creator: Address,
    pub asset: Address,
    pub tokens: Decimal,
    pub payment: Decimal,
    pub unlock: UnlockMode,
    /// Tokens were delivered with the purchase itself.
    pub delivered: bool,
    pub description: String,
}

/// Record counts partitioned by classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_records: u64,
    pub normal_records: u64,
    pub pool_records: u64,
    /// Records not yet fully released.
    pub live_records: u64,
}

/// Aggregates for one locked asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLockStats {
    pub asset: Address,
    pub kind: AssetKind,
    pub records: u64,
    pub live_count: u64,
    /// `Σ(total - released)` over the asset's records.
    pub outstanding: Decimal,
    /// `Σ(total)` ever entitled.
    pub cumulative: Decimal,
}

impl AssetLockStats {
    fn empty(asset: Address, kind: AssetKind) -> Self {
        Self {
            asset,
            kind,
            records: 0,
            live_count: 0,
            outstanding: Decimal::ZERO,
            cumulative: Decimal::ZERO,
        }
    }
}

fn bump(counter: &mut u64, by: u64, add: bool) {
    *counter = if add {
        counter.saturating_add(by)
    } else {
        counter.saturating_sub(by)
    };
}

fn shift(total: &mut Decimal, by: Decimal, add: bool) {
    *total = if add {
        total.saturating_add(by)
    } else {
        total.saturating_sub(by)
    };
}

/// The entitlement arena with its indexes and statistics.
#[derive(Debug)]
pub struct EntitlementLedger {
    records: BTreeMap<EntitlementId, Entitlement>,
    by_owner: HashMap<Address, IdIndex<EntitlementId>>,
    by_asset: HashMap<Address, IdIndex<EntitlementId>>,
    /// Assets in first-seen order.
    assets: Vec<Address>,
    asset_stats: HashMap<Address, AssetLockStats>,
    stats: LedgerStats,
    next_id: u64,
    events: EventLog,
}

impl Default for EntitlementLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitlementLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            by_owner: HashMap::new(),
            by_asset: HashMap::new(),
            assets: Vec::new(),
            asset_stats: HashMap::new(),
            stats: LedgerStats::default(),
            next_id: FIRST_ID,
            events: EventLog::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lock product
    // -----------------------------------------------------------------------

    /// Create one lock and deposit its amount from `caller`.
    ///
    /// # Errors
    /// - `StateConflict` while locks are paused
    /// - `InvalidParameter` for zero identities, zero amount or a bad unlock
    /// - `NotAPoolToken` if a flagged asset is not a pool
    /// - the escrow's error if the deposit fails (nothing is created)
    pub fn create(
        &mut self,
        escrow: &mut impl Escrow,
        classifier: &impl AssetClassifier,
        admin: &AdminConfig,
        caller: Address,
        request: LockRequest,
        now: DateTime<Utc>,
    ) -> Result<EntitlementId> {
        ensure_locks_open(admin)?;
        ensure_identity(caller, "caller")?;
        ensure_owner_address(request.owner)?;
        ensure_identity(request.asset, "asset")?;
        ensure_positive(request.amount, "amount")?;
        vesting::ensure_unlock(&request.unlock, now)?;
        let classification = resolve(classifier, request.asset, request.is_pool_token)?;
        self.ensure_asset_kind(request.asset, classification.kind())?;

        let id = self.insert(Entitlement {
            id: EntitlementId(0),
            owner: request.owner,
            creator: caller,
            asset: request.asset,
            classification,
            total_amount: request.amount,
            released_amount: Decimal::ZERO,
            unlock: request.unlock,
            kind: EntitlementKind::Lock,
            created_at: now,
            description: request.description,
        });

        let mut batch = TransferBatch::new();
        batch.deposit(request.asset, caller, request.amount);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.revert_insert(id);
            tracing::warn!(caller = %caller, asset = %request.asset, error = %err, "Lock deposit failed, creation rolled back");
            return Err(err);
        }

        tracing::info!(
            id = %id,
            owner = %request.owner,
            asset = %request.asset,
            amount = %request.amount,
            classification = %classification.kind(),
            "Lock created"
        );
        self.announce_created(id, now);
        Ok(id)
    }

    /// Create one lock per `(owner, amount)` row, depositing the sum once.
    ///
    /// All rows are created or none are.
    ///
    /// # Errors
    /// As [`create`](Self::create), plus `InvalidParameter` for mismatched or
    /// empty rows and `LimitExceeded` above the configured row limit.
    pub fn bulk_create(
        &mut self,
        escrow: &mut impl Escrow,
        classifier: &impl AssetClassifier,
        admin: &AdminConfig,
        caller: Address,
        request: BulkLockRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntitlementId>> {
        ensure_locks_open(admin)?;
        ensure_identity(caller, "caller")?;
        if request.owners.len() != request.amounts.len() {
            return Err(OpenvestError::InvalidParameter {
                reason: format!(
                    "{} owners but {} amounts",
                    request.owners.len(),
                    request.amounts.len()
                ),
            });
        }
        if request.owners.is_empty() {
            return Err(OpenvestError::InvalidParameter {
                reason: "bulk lock needs at least one row".into(),
            });
        }
        if request.owners.len() > admin.max_bulk_entries() {
            return Err(OpenvestError::LimitExceeded {
                reason: format!(
                    "{} rows exceeds bulk limit {}",
                    request.owners.len(),
                    admin.max_bulk_entries()
                ),
            });
        }
        ensure_identity(request.asset, "asset")?;
        for (owner, amount) in request.owners.iter().zip(&request.amounts) {
            ensure_owner_address(*owner)?;
            ensure_positive(*amount, "amount")?;
        }
        let total = checked_sum(&request.amounts)?;
        vesting::ensure_unlock(&request.unlock, now)?;
        let classification = resolve(classifier, request.asset, request.is_pool_token)?;
        self.ensure_asset_kind(request.asset, classification.kind())?;

        let ids: Vec<EntitlementId> = request
            .owners
            .iter()
            .zip(&request.amounts)
            .map(|(owner, amount)| {
                self.insert(Entitlement {
                    id: EntitlementId(0),
                    owner: *owner,
                    creator: caller,
                    asset: request.asset,
                    classification,
                    total_amount: *amount,
                    released_amount: Decimal::ZERO,
                    unlock: request.unlock,
                    kind: EntitlementKind::Lock,
                    created_at: now,
                    description: request.description.clone(),
                })
            })
            .collect();

        let mut batch = TransferBatch::new();
        batch.deposit(request.asset, caller, total);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            for id in ids.iter().rev() {
                self.revert_insert(*id);
            }
            tracing::warn!(caller = %caller, rows = ids.len(), error = %err, "Bulk deposit failed, creation rolled back");
            return Err(err);
        }

        tracing::info!(
            caller = %caller,
            asset = %request.asset,
            rows = ids.len(),
            total = %total,
            "Bulk locks created"
        );
        for id in &ids {
            self.announce_created(*id, now);
        }
        Ok(ids)
    }

    /// Raise a lock's amount and/or postpone its unlock.
    ///
    /// Only changes that release nothing earlier are accepted: the amount may
    /// only grow, a date may only move later, a schedule may only become
    /// slower in every component, and the amount vested at `now` must not
    /// drop. The added amount is deposited from the owner.
    ///
    /// # Errors
    /// `Unauthorized` for a non-owner, `StateConflict` for purchases and
    /// burned records, `InvalidEdit` for a regressive change, or the
    /// escrow's error.
    pub fn edit(
        &mut self,
        escrow: &mut impl Escrow,
        caller: Address,
        id: EntitlementId,
        new_amount: Decimal,
        new_unlock: UnlockMode,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let current = self.get(id)?.clone();
        ensure_lock(&current, "edit")?;
        ensure_not_burned(&current)?;
        ensure_controller(&current, caller)?;
        ensure_positive(new_amount, "new_amount")?;
        check_edit(&current, new_amount, &new_unlock, now)?;

        let delta = new_amount - current.total_amount;
        let previous = self.update(id, |record| {
            record.total_amount = new_amount;
            record.unlock = new_unlock;
        })?;

        let mut batch = TransferBatch::new();
        batch.deposit(current.asset, caller, delta);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.restore(previous);
            tracing::warn!(id = %id, delta = %delta, error = %err, "Edit deposit failed, edit rolled back");
            return Err(err);
        }

        tracing::info!(id = %id, total = %new_amount, delta = %delta, unlock = %new_unlock, "Lock edited");
        self.events.record(
            now,
            LedgerEvent::EntitlementEdited {
                id,
                total_amount: new_amount,
                unlock: new_unlock,
            },
        );
        Ok(())
    }

    /// Hand a lock to `new_owner`. The old owner loses every right to it.
    ///
    /// [`Address::BURN`] is accepted and is irreversible.
    ///
    /// # Errors
    /// `Unauthorized` for a non-owner, `StateConflict` for purchases and
    /// burned records, `InvalidParameter` for the zero address or the
    /// current owner.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        id: EntitlementId,
        new_owner: Address,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let current = self.get(id)?;
        ensure_lock(current, "transfer")?;
        ensure_not_burned(current)?;
        ensure_controller(current, caller)?;
        ensure_identity(new_owner, "new owner")?;
        if new_owner == current.owner {
            return Err(OpenvestError::InvalidParameter {
                reason: format!("{new_owner} already owns {id}"),
            });
        }
        let from = current.owner;

        if let Some(record) = self.records.get_mut(&id) {
            record.owner = new_owner;
        }
        self.unindex_owner(from, id);
        self.by_owner.entry(new_owner).or_default().push(id);

        if new_owner.is_burn() {
            tracing::warn!(id = %id, from = %from, "Lock burned");
        } else {
            tracing::info!(id = %id, from = %from, to = %new_owner, "Lock ownership transferred");
        }
        self.events.record(
            now,
            LedgerEvent::OwnershipChanged {
                id,
                from,
                to: new_owner,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Product primitives
    // -----------------------------------------------------------------------

    /// Insert a purchase record. No transfer is made; the caller executes
    /// its own batch and calls [`revert_insert`](Self::revert_insert) if it
    /// fails.
    ///
    /// # Errors
    /// `InvalidParameter` for a zero buyer/asset or zero tokens.
    pub fn insert_purchase(&mut self, draft: PurchaseDraft, now: DateTime<Utc>) -> Result<EntitlementId> {
        ensure_owner_address(draft.buyer)?;
        ensure_identity(draft.asset, "asset")?;
        ensure_positive(draft.tokens, "tokens")?;
        self.ensure_asset_kind(draft.asset, AssetKind::Normal)?;
        let released = if draft.delivered {
            draft.tokens
        } else {
            Decimal::ZERO
        };
        Ok(self.insert(Entitlement {
            id: EntitlementId(0),
            owner: draft.buyer,
            creator: draft.creator,
            asset: draft.asset,
            classification: Classification::Normal,
            total_amount: draft.tokens,
            released_amount: released,
            unlock: draft.unlock,
            kind: EntitlementKind::Purchase {
                sale_id: draft.sale_id,
                paid_amount: draft.payment,
                refunded_amount: Decimal::ZERO,
                refunded_payment: Decimal::ZERO,
            },
            created_at: now,
            description: draft.description,
        }))
    }

    /// Mutate a record in place and return its previous state.
    ///
    /// Identity, owner, asset and classification are fixed; a closure that
    /// changes them is undone.
    ///
    /// # Errors
    /// `EntitlementNotFound`, or `StateConflict` if the closure moved a
    /// fixed field or released more than the total.
    pub fn update(
        &mut self,
        id: EntitlementId,
        apply: impl FnOnce(&mut Entitlement),
    ) -> Result<Entitlement> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(OpenvestError::EntitlementNotFound(id))?;
        let previous = record.clone();
        apply(record);
        let moved = record.id != previous.id
            || record.owner != previous.owner
            || record.asset != previous.asset
            || record.classification != previous.classification;
        if moved || record.released_amount > record.total_amount {
            *record = previous;
            return Err(OpenvestError::StateConflict {
                reason: format!("update of {id} would break record invariants"),
            });
        }
        let after = record.clone();
        self.account(&previous, false);
        self.account(&after, true);
        Ok(previous)
    }

    /// Put back a state returned by [`update`](Self::update).
    pub fn restore(&mut self, previous: Entitlement) {
        let id = previous.id;
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        let replaced = std::mem::replace(record, previous);
        let restored = record.clone();
        self.account(&replaced, false);
        self.account(&restored, true);
        tracing::debug!(id = %id, "Record restored");
    }

    /// Remove a record whose creating operation failed. The id goes back to
    /// the allocator if it was the last one handed out.
    pub fn revert_insert(&mut self, id: EntitlementId) {
        let Some(record) = self.records.remove(&id) else {
            return;
        };
        if let Some(index) = self.by_owner.get_mut(&record.owner) {
            index.undo_push(id);
            if index.is_empty() {
                self.by_owner.remove(&record.owner);
            }
        }
        if let Some(index) = self.by_asset.get_mut(&record.asset) {
            index.undo_push(id);
            if index.is_empty() {
                self.by_asset.remove(&record.asset);
            }
        }
        self.account(&record, false);
        if self.asset_stats.get(&record.asset).is_some_and(|s| s.records == 0) {
            self.asset_stats.remove(&record.asset);
            self.assets.retain(|a| *a != record.asset);
        }
        if id.0 + 1 == self.next_id {
            self.next_id = id.0;
        }
        tracing::debug!(id = %id, "Record creation reverted");
    }

    /// Append a notification on behalf of a product.
    pub fn notify(&mut self, at: DateTime<Utc>, event: LedgerEvent) -> u64 {
        self.events.record(at, event)
    }

    /// Hand over pending notifications.
    pub fn drain_events(&mut self) -> Vec<Notification> {
        self.events.drain()
    }

    #[must_use]
    pub fn pending_events(&self) -> &[Notification] {
        self.events.pending()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// # Errors
    /// `EntitlementNotFound`.
    pub fn get(&self, id: EntitlementId) -> Result<&Entitlement> {
        self.records
            .get(&id)
            .ok_or(OpenvestError::EntitlementNotFound(id))
    }

    #[must_use]
    pub fn find(&self, id: EntitlementId) -> Option<&Entitlement> {
        self.records.get(&id)
    }

    /// Records currently owned by `owner`, in the order they were acquired.
    #[must_use]
    pub fn entitlements_of(&self, owner: &Address) -> Vec<&Entitlement> {
        self.resolve_ids(self.by_owner.get(owner).map(|i| i.iter().collect()))
    }

    /// A page of [`entitlements_of`](Self::entitlements_of).
    ///
    /// # Errors
    /// `InvalidParameter` if `end < start`.
    pub fn entitlements_of_range(
        &self,
        owner: &Address,
        start: usize,
        end: usize,
    ) -> Result<Vec<&Entitlement>> {
        let (start, end) = page_window(start, end)?;
        Ok(self.resolve_ids(self.by_owner.get(owner).map(|i| i.page(start, end))))
    }

    /// Records over `asset`, in creation order.
    #[must_use]
    pub fn entitlements_for_asset(&self, asset: &Address) -> Vec<&Entitlement> {
        self.resolve_ids(self.by_asset.get(asset).map(|i| i.iter().collect()))
    }

    /// # Errors
    /// `InvalidParameter` if `end < start`.
    pub fn entitlements_for_asset_range(
        &self,
        asset: &Address,
        start: usize,
        end: usize,
    ) -> Result<Vec<&Entitlement>> {
        let (start, end) = page_window(start, end)?;
        Ok(self.resolve_ids(self.by_asset.get(asset).map(|i| i.page(start, end))))
    }

    /// Every record, positions `[start, end)` in id order.
    ///
    /// # Errors
    /// `InvalidParameter` if `end < start`.
    pub fn range(&self, start: usize, end: usize) -> Result<Vec<&Entitlement>> {
        let (start, end) = page_window(start, end)?;
        Ok(self.records.values().skip(start).take(end - start).collect())
    }

    /// Every record in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entitlement> {
        self.records.values()
    }

    #[must_use]
    pub fn owner_count(&self, owner: &Address) -> usize {
        self.by_owner.get(owner).map_or(0, IdIndex::len)
    }

    #[must_use]
    pub fn asset_count(&self, asset: &Address) -> usize {
        self.by_asset.get(asset).map_or(0, IdIndex::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    #[must_use]
    pub fn asset_stats(&self, asset: &Address) -> Option<&AssetLockStats> {
        self.asset_stats.get(asset)
    }

    /// Assets of one classification, in first-seen order.
    #[must_use]
    pub fn all_assets(&self, kind: AssetKind) -> Vec<Address> {
        self.assets
            .iter()
            .filter(|a| self.asset_stats.get(*a).is_some_and(|s| s.kind == kind))
            .copied()
            .collect()
    }

    /// The id the next created record will receive.
    #[must_use]
    pub fn next_id(&self) -> EntitlementId {
        EntitlementId(self.next_id)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn insert(&mut self, mut record: Entitlement) -> EntitlementId {
        let id = EntitlementId(self.next_id);
        self.next_id += 1;
        record.id = id;
        self.by_owner.entry(record.owner).or_default().push(id);
        self.by_asset.entry(record.asset).or_default().push(id);
        if !self.asset_stats.contains_key(&record.asset) {
            self.assets.push(record.asset);
        }
        self.account(&record, true);
        self.records.insert(id, record);
        id
    }

    /// Add or remove one record's contribution to every counter.
    fn account(&mut self, record: &Entitlement, add: bool) {
        let live = u64::from(!record.is_inert());
        bump(&mut self.stats.total_records, 1, add);
        bump(&mut self.stats.live_records, live, add);
        match record.classification.kind() {
            AssetKind::Normal => bump(&mut self.stats.normal_records, 1, add),
            AssetKind::Pool => bump(&mut self.stats.pool_records, 1, add),
        }
        let stats = self
            .asset_stats
            .entry(record.asset)
            .or_insert_with(|| AssetLockStats::empty(record.asset, record.classification.kind()));
        bump(&mut stats.records, 1, add);
        bump(&mut stats.live_count, live, add);
        shift(&mut stats.outstanding, record.remaining(), add);
        shift(&mut stats.cumulative, record.total_amount, add);
    }

    fn ensure_asset_kind(&self, asset: Address, kind: AssetKind) -> Result<()> {
        match self.asset_stats.get(&asset) {
            Some(stats) if stats.kind != kind => Err(OpenvestError::InvalidParameter {
                reason: format!("asset {asset} is already recorded as {}", stats.kind),
            }),
            _ => Ok(()),
        }
    }

    fn unindex_owner(&mut self, owner: Address, id: EntitlementId) {
        if let Some(index) = self.by_owner.get_mut(&owner) {
            index.remove(id);
            if index.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
    }

    fn resolve_ids(&self, ids: Option<Vec<EntitlementId>>) -> Vec<&Entitlement> {
        ids.unwrap_or_default()
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    fn announce_created(&mut self, id: EntitlementId, now: DateTime<Utc>) {
        let Some(record) = self.records.get(&id) else {
            return;
        };
        let event = LedgerEvent::EntitlementCreated {
            id,
            owner: record.owner,
            creator: record.creator,
            asset: record.asset,
            classification: record.classification,
            total_amount: record.total_amount,
            unlock: record.unlock,
        };
        self.events.record(now, event);
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

fn ensure_locks_open(admin: &AdminConfig) -> Result<()> {
    if admin.locks_paused() {
        return Err(OpenvestError::StateConflict {
            reason: "lock creation is paused".into(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_identity(address: Address, what: &str) -> Result<()> {
    if address.is_zero() {
        return Err(OpenvestError::InvalidParameter {
            reason: format!("{what} must not be the zero address"),
        });
    }
    Ok(())
}

/// A new record's owner: neither zero nor the burn sentinel.
fn ensure_owner_address(owner: Address) -> Result<()> {
    ensure_identity(owner, "owner")?;
    if owner.is_burn() {
        return Err(OpenvestError::InvalidParameter {
            reason: "records are burned by transfer, not created burned".into(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_controller(record: &Entitlement, caller: Address) -> Result<()> {
    if record.owner != caller {
        return Err(OpenvestError::Unauthorized {
            reason: format!("{caller} does not own {}", record.id),
        });
    }
    Ok(())
}

pub(crate) fn ensure_not_burned(record: &Entitlement) -> Result<()> {
    if record.is_burned() {
        return Err(OpenvestError::StateConflict {
            reason: format!("{} has been burned", record.id),
        });
    }
    Ok(())
}

fn ensure_lock(record: &Entitlement, operation: &str) -> Result<()> {
    if record.is_purchase() {
        return Err(OpenvestError::StateConflict {
            reason: format!("cannot {operation} purchase record {}", record.id),
        });
    }
    Ok(())
}

fn invalid_edit(reason: impl Into<String>) -> OpenvestError {
    OpenvestError::InvalidEdit {
        reason: reason.into(),
    }
}

fn check_edit(
    current: &Entitlement,
    new_amount: Decimal,
    new_unlock: &UnlockMode,
    now: DateTime<Utc>,
) -> Result<()> {
    if new_amount < current.total_amount {
        return Err(invalid_edit(format!(
            "amount {new_amount} is below current total {}",
            current.total_amount
        )));
    }
    match (&current.unlock, new_unlock) {
        (UnlockMode::Timed { unlock_date: old }, UnlockMode::Timed { unlock_date: new }) => {
            if new < old {
                return Err(invalid_edit(format!(
                    "unlock date {new} is earlier than {old}"
                )));
            }
        }
        (UnlockMode::Vesting(old), UnlockMode::Vesting(new)) => {
            vesting::validate_schedule(new).map_err(|e| invalid_edit(e.to_string()))?;
            if !vesting::is_no_faster(new, old) {
                return Err(invalid_edit("schedule would unlock faster"));
            }
        }
        _ => return Err(invalid_edit("unlock mode cannot change")),
    }
    let vested_before = vesting::amount_vested_at(&current.unlock, current.total_amount, now)?;
    let vested_after = vesting::amount_vested_at(new_unlock, new_amount, now)?;
    if vested_after < vested_before {
        return Err(invalid_edit(format!(
            "vested amount would drop from {vested_before} to {vested_after}"
        )));
    }
    Ok(())
}
