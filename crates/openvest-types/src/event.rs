//! Change notifications.
//!
//! Every committed state transition produces a [`Notification`] carrying the
//! affected id and the new authoritative values. Off-core collaborators must
//! treat these as the sole source of truth and never infer state on their own.
//! Notifications are appended only after an operation fully succeeds, so a
//! rolled-back operation leaves no trace in the log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Classification, EntitlementId, SaleId, SaleParams, SaleStatus, UnlockMode};

/// The state transition a notification reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    EntitlementCreated {
        id: EntitlementId,
        owner: Address,
        creator: Address,
        asset: Address,
        classification: Classification,
        total_amount: Decimal,
        unlock: UnlockMode,
    },
    EntitlementEdited {
        id: EntitlementId,
        total_amount: Decimal,
        unlock: UnlockMode,
    },
    Released {
        id: EntitlementId,
        owner: Address,
        amount: Decimal,
        released_amount: Decimal,
    },
    OwnershipChanged {
        id: EntitlementId,
        from: Address,
        to: Address,
    },
    PurchaseRecorded {
        sale_id: SaleId,
        id: EntitlementId,
        buyer: Address,
        payment: Decimal,
        tokens: Decimal,
        total_amount: Decimal,
        released_amount: Decimal,
        total_sold: Decimal,
    },
    Refunded {
        sale_id: SaleId,
        id: EntitlementId,
        tokens: Decimal,
        payment: Decimal,
        refunded_amount: Decimal,
        refunded_payment: Decimal,
        total_sold: Decimal,
    },
    SaleCreated {
        sale_id: SaleId,
        owner: Address,
        total_offered: Decimal,
        params: SaleParams,
    },
    SaleStatusChanged {
        sale_id: SaleId,
        from: SaleStatus,
        to: SaleStatus,
    },
    /// `params` are the parameters in force after the edit.
    SaleParamsChanged {
        sale_id: SaleId,
        params: SaleParams,
    },
    SaleFeeChanged {
        sale_id: SaleId,
        fee_bps: Option<u32>,
    },
    SaleSettled {
        sale_id: SaleId,
        unsold: Decimal,
        fee: Decimal,
        proceeds: Decimal,
    },
    FeeConfigChanged {
        global_fee_bps: u32,
        fee_recipient: Address,
    },
    PauseChanged {
        locks_paused: bool,
        sales_paused: bool,
    },
}

/// A sequenced notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic per log, starting at 0.
    pub seq: u64,
    /// The caller-supplied time of the operation.
    pub at: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Append-only notification log with a drainable pending tail.
#[derive(Debug, Default)]
pub struct EventLog {
    next_seq: u64,
    pending: Vec<Notification>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and return its sequence number.
    pub fn record(&mut self, at: DateTime<Utc>, event: LedgerEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Notification { seq, at, event });
        seq
    }

    /// Hand over every notification recorded since the last drain.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    /// Notifications not yet drained.
    #[must_use]
    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }

    /// Total notifications ever recorded.
    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn seq_is_monotonic_across_drains() {
        let t = Utc.timestamp_opt(1_000, 0).unwrap();
        let mut log = EventLog::new();
        log.record(t, LedgerEvent::SaleFeeChanged { sale_id: SaleId(1), fee_bps: None });
        log.record(t, LedgerEvent::SaleFeeChanged { sale_id: SaleId(2), fee_bps: None });
        let first = log.drain();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].seq, 0);
        assert_eq!(first[1].seq, 1);
        assert!(log.pending().is_empty());

        let seq = log.record(t, LedgerEvent::SaleFeeChanged { sale_id: SaleId(3), fee_bps: None });
        assert_eq!(seq, 2);
        assert_eq!(log.recorded(), 3);
    }

    #[test]
    fn event_serde_tagged() {
        let ev = LedgerEvent::OwnershipChanged {
            id: EntitlementId(4),
            from: Address::from_low_u64(1),
            to: Address::BURN,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"ownership_changed\""), "Got: {json}");
        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
