//! Claim Engine.
//!
//! `withdrawable = vested(now) - released`. A claim releases exactly that and
//! pays it out, so repeated claims only ever deliver what vested since the
//! previous one.

use chrono::{DateTime, Utc};
use openvest_types::{Address, EntitlementId, LedgerEvent, OpenvestError, Result};
use rust_decimal::Decimal;

use crate::{
    escrow::{Escrow, TransferBatch},
    ledger::{EntitlementLedger, ensure_controller, ensure_not_burned},
    vesting,
};

impl EntitlementLedger {
    /// Amount of the record vested at `now`.
    ///
    /// # Errors
    /// `EntitlementNotFound`, `ArithmeticOverflow`.
    pub fn vested(&self, id: EntitlementId, now: DateTime<Utc>) -> Result<Decimal> {
        let record = self.get(id)?;
        vesting::amount_vested_at(&record.unlock, record.total_amount, now)
    }

    /// Amount a claim at `now` would deliver.
    ///
    /// # Errors
    /// `EntitlementNotFound`, `ArithmeticOverflow`.
    pub fn withdrawable(&self, id: EntitlementId, now: DateTime<Utc>) -> Result<Decimal> {
        let record = self.get(id)?;
        let vested = vesting::amount_vested_at(&record.unlock, record.total_amount, now)?;
        Ok((vested - record.released_amount).max(Decimal::ZERO))
    }

    /// Release and pay out everything vested but not yet delivered.
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` owns the record
    /// - `StateConflict` for a burned record
    /// - `NothingToClaim` if nothing new has vested
    /// - the escrow's error (the release is rolled back)
    pub fn claim(
        &mut self,
        escrow: &mut impl Escrow,
        caller: Address,
        id: EntitlementId,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let record = self.get(id)?;
        ensure_not_burned(record)?;
        ensure_controller(record, caller)?;
        let (owner, asset) = (record.owner, record.asset);
        let amount = self.withdrawable(id, now)?;
        if amount.is_zero() {
            return Err(OpenvestError::NothingToClaim(id));
        }
        tracing::debug!(id = %id, amount = %amount, "Claimable amount computed");

        let previous = self.update(id, |r| r.released_amount += amount)?;

        let mut batch = TransferBatch::new();
        batch.payout(asset, owner, amount);
        if let Err(err) = escrow.execute(batch.as_slice()) {
            self.restore(previous);
            tracing::warn!(id = %id, amount = %amount, error = %err, "Claim payout failed, release rolled back");
            return Err(err);
        }

        let released_amount = previous.released_amount + amount;
        tracing::info!(id = %id, owner = %owner, amount = %amount, released = %released_amount, "Tokens released");
        self.notify(
            now,
            LedgerEvent::Released {
                id,
                owner,
                amount,
                released_amount,
            },
        );
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use openvest_types::{
        EngineConfig, UnlockMode,
        fixtures::{addr, day, dec, schedule},
    };

    use super::*;
    use crate::{
        admin::AdminConfig, classifier::StaticClassifier, escrow::InMemoryEscrow,
        ledger::LockRequest,
    };

    const TOKEN: u64 = 100;
    const OWNER: u64 = 7;

    fn vesting_lock() -> (EntitlementLedger, InMemoryEscrow, EntitlementId) {
        let mut escrow = InMemoryEscrow::new();
        escrow.mint(addr(1), addr(TOKEN), dec(10_000));
        let admin = AdminConfig::from_config(&EngineConfig {
            fee_recipient: addr(900),
            ..EngineConfig::default()
        })
        .unwrap();
        let mut ledger = EntitlementLedger::new();
        let id = ledger
            .create(
                &mut escrow,
                &StaticClassifier::new(),
                &admin,
                addr(1),
                LockRequest {
                    owner: addr(OWNER),
                    asset: addr(TOKEN),
                    is_pool_token: false,
                    amount: dec(10_000),
                    unlock: UnlockMode::Vesting(schedule(day(1), 2_000, 30, 1_000)),
                    description: String::new(),
                },
                day(0),
            )
            .unwrap();
        (ledger, escrow, id)
    }

    #[test]
    fn claims_follow_the_schedule() {
        let (mut ledger, mut escrow, id) = vesting_lock();
        assert_eq!(ledger.withdrawable(id, day(0)).unwrap(), dec(0));

        assert_eq!(ledger.claim(&mut escrow, addr(OWNER), id, day(1)).unwrap(), dec(2_000));
        assert_eq!(ledger.withdrawable(id, day(1)).unwrap(), dec(0));
        assert_eq!(ledger.withdrawable(id, day(91)).unwrap(), dec(3_000));
        assert_eq!(ledger.claim(&mut escrow, addr(OWNER), id, day(91)).unwrap(), dec(3_000));
        assert_eq!(ledger.claim(&mut escrow, addr(OWNER), id, day(801)).unwrap(), dec(5_000));

        let record = ledger.get(id).unwrap();
        assert_eq!(record.released_amount, dec(10_000));
        assert!(record.is_inert());
        assert_eq!(escrow.balance(addr(OWNER), addr(TOKEN)), dec(10_000));
        assert_eq!(ledger.stats().live_records, 0);
        assert_eq!(ledger.asset_stats(&addr(TOKEN)).unwrap().outstanding, dec(0));
    }

    #[test]
    fn nothing_to_claim_twice() {
        let (mut ledger, mut escrow, id) = vesting_lock();
        ledger.claim(&mut escrow, addr(OWNER), id, day(1)).unwrap();
        assert_eq!(
            ledger.claim(&mut escrow, addr(OWNER), id, day(2)).unwrap_err(),
            OpenvestError::NothingToClaim(id)
        );
    }

    #[test]
    fn only_owner_claims() {
        let (mut ledger, mut escrow, id) = vesting_lock();
        assert!(matches!(
            ledger.claim(&mut escrow, addr(8), id, day(1)),
            Err(OpenvestError::Unauthorized { .. })
        ));
    }

    #[test]
    fn failed_payout_keeps_amount_claimable() {
        let (mut ledger, mut escrow, id) = vesting_lock();
        ledger.drain_events();
        escrow.block(addr(OWNER));
        assert!(matches!(
            ledger.claim(&mut escrow, addr(OWNER), id, day(1)),
            Err(OpenvestError::TransferFailed { .. })
        ));
        assert_eq!(ledger.get(id).unwrap().released_amount, dec(0));
        assert!(ledger.drain_events().is_empty());

        escrow.unblock(addr(OWNER));
        assert_eq!(ledger.claim(&mut escrow, addr(OWNER), id, day(1)).unwrap(), dec(2_000));
    }

    #[test]
    fn burned_record_cannot_be_claimed() {
        let (mut ledger, mut escrow, id) = vesting_lock();
        ledger
            .transfer_ownership(addr(OWNER), id, Address::BURN, day(0))
            .unwrap();
        assert!(matches!(
            ledger.claim(&mut escrow, Address::BURN, id, day(900)),
            Err(OpenvestError::StateConflict { .. })
        ));
        assert_eq!(escrow.custody(addr(TOKEN)), dec(10_000));
    }
}
