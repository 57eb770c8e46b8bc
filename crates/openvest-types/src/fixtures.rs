//! Deterministic fixtures for tests. **Never use in production.**

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{Address, VestingSchedule};

/// Seconds in a day.
pub const DAY: i64 = 86_400;

/// Reference instant used as "genesis" by tests (2023-11-14T22:13:20Z).
pub const GENESIS: i64 = 1_700_000_000;

/// Whole-unit decimal.
#[must_use]
pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// `GENESIS + secs`.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(GENESIS + secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `GENESIS + days`.
#[must_use]
pub fn day(days: i64) -> DateTime<Utc> {
    at(days * DAY)
}

/// Fixture address.
#[must_use]
pub fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

/// Schedule with a TGE at `tge` and cycles measured in days.
#[must_use]
pub fn schedule(
    tge: DateTime<Utc>,
    tge_bps: u32,
    cycle_days: u64,
    cycle_bps: u32,
) -> VestingSchedule {
    VestingSchedule {
        tge_timestamp: tge,
        tge_fraction_bps: tge_bps,
        cycle_length_seconds: cycle_days * 86_400,
        cycle_fraction_bps: cycle_bps,
    }
}
