//! Ledger state digest.
//!
//! Two hosts that replay the same operations with the same timestamps must
//! hold identical ledgers. `state_root` condenses the whole arena into one
//! SHA-256 hash so that can be checked without comparing records.

use openvest_types::{Classification, Entitlement, EntitlementKind, UnlockMode};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::ledger::EntitlementLedger;

fn amount(hasher: &mut Sha256, value: Decimal) {
    let text = value.normalize().to_string();
    hasher.update((text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}

fn hash_record(hasher: &mut Sha256, record: &Entitlement) {
    hasher.update(record.id.0.to_le_bytes());
    hasher.update(record.owner.as_bytes());
    hasher.update(record.creator.as_bytes());
    hasher.update(record.asset.as_bytes());
    match record.classification {
        Classification::Normal => hasher.update([0u8]),
        Classification::Pool { token0, token1 } => {
            hasher.update([1u8]);
            hasher.update(token0.as_bytes());
            hasher.update(token1.as_bytes());
        }
    }
    amount(hasher, record.total_amount);
    amount(hasher, record.released_amount);
    match record.unlock {
        UnlockMode::Timed { unlock_date } => {
            hasher.update([0u8]);
            hasher.update(unlock_date.timestamp().to_le_bytes());
        }
        UnlockMode::Vesting(s) => {
            hasher.update([1u8]);
            hasher.update(s.tge_timestamp.timestamp().to_le_bytes());
            hasher.update(s.tge_fraction_bps.to_le_bytes());
            hasher.update(s.cycle_length_seconds.to_le_bytes());
            hasher.update(s.cycle_fraction_bps.to_le_bytes());
        }
    }
    match &record.kind {
        EntitlementKind::Lock => hasher.update([0u8]),
        EntitlementKind::Purchase {
            sale_id,
            paid_amount,
            refunded_amount,
            refunded_payment,
        } => {
            hasher.update([1u8]);
            hasher.update(sale_id.0.to_le_bytes());
            amount(hasher, *paid_amount);
            amount(hasher, *refunded_amount);
            amount(hasher, *refunded_payment);
        }
    }
    hasher.update(record.created_at.timestamp().to_le_bytes());
    hasher.update((record.description.len() as u64).to_le_bytes());
    hasher.update(record.description.as_bytes());
}

impl EntitlementLedger {
    /// SHA-256 over every record in id order.
    #[must_use]
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"openvest:state_root:v1:");
        hasher.update((self.len() as u64).to_le_bytes());
        for record in self.iter() {
            hash_record(&mut hasher, record);
        }
        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }

    /// Hex form of [`state_root`](Self::state_root).
    #[must_use]
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root())
    }

    #[must_use]
    pub fn verify_state_root(&self, expected: &[u8; 32]) -> bool {
        self.state_root() == *expected
    }
}
