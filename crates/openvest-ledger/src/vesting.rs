//! Vesting Schedule Calculator.
//!
//! Pure functions: given an unlock definition, a total and an instant, how
//! much has unlocked. No state of its own and no clock: `now` is always supplied
//! by the caller, so every host computes the same amount for the same inputs.
//!
//! ## Rounding
//!
//! The unlocked *fraction* is computed in basis points and clamped to 10000
//! before any amount is derived from it, so once enough cycles have elapsed
//! to reach 100% the result is exactly `total`, never a truncated amount
//! just short of it.

use chrono::{DateTime, Utc};
use openvest_types::{
    OpenvestError, Result, UnlockMode, VestingSchedule, constants::BPS_DENOMINATOR, ensure_bps,
    mul_bps,
};
use rust_decimal::Decimal;

/// Cumulative fraction (bps) of a schedule unlocked at `now`, clamped to 10000.
#[must_use]
pub fn unlocked_bps(schedule: &VestingSchedule, now: DateTime<Utc>) -> u32 {
    if now < schedule.tge_timestamp {
        return 0;
    }
    let elapsed = u64::try_from((now - schedule.tge_timestamp).num_seconds()).unwrap_or(0);
    let cycles = elapsed / schedule.cycle_length_seconds.max(1);
    let bps = u64::from(schedule.tge_fraction_bps)
        .saturating_add(cycles.saturating_mul(u64::from(schedule.cycle_fraction_bps)));
    u32::try_from(bps.min(u64::from(BPS_DENOMINATOR))).unwrap_or(BPS_DENOMINATOR)
}

/// Cumulative amount of `total` unlocked at `now`.
///
/// Monotonic non-decreasing in `now` for a fixed unlock and total.
///
/// # Errors
/// `ArithmeticOverflow` if `total * bps` does not fit.
pub fn amount_vested_at(unlock: &UnlockMode, total: Decimal, now: DateTime<Utc>) -> Result<Decimal> {
    match unlock {
        UnlockMode::Timed { unlock_date } => Ok(if now >= *unlock_date {
            total
        } else {
            Decimal::ZERO
        }),
        UnlockMode::Vesting(schedule) => {
            let bps = unlocked_bps(schedule, now);
            if bps >= BPS_DENOMINATOR {
                Ok(total)
            } else {
                mul_bps(total, bps)
            }
        }
    }
}

/// Earliest instant from which everything is unlocked.
///
/// `None` if the schedule can never reach 100% or the instant is not
/// representable.
#[must_use]
pub fn fully_unlocked_at(unlock: &UnlockMode) -> Option<DateTime<Utc>> {
    match unlock {
        UnlockMode::Timed { unlock_date } => Some(*unlock_date),
        UnlockMode::Vesting(s) => {
            if s.tge_fraction_bps >= BPS_DENOMINATOR {
                return Some(s.tge_timestamp);
            }
            if s.cycle_fraction_bps == 0 {
                return None;
            }
            let missing = BPS_DENOMINATOR - s.tge_fraction_bps;
            let cycles = u64::from(missing.div_ceil(s.cycle_fraction_bps));
            let secs = i64::try_from(cycles.checked_mul(s.cycle_length_seconds)?).ok()?;
            s.tge_timestamp
                .checked_add_signed(chrono::Duration::try_seconds(secs)?)
        }
    }
}

/// Structural schedule checks (no reference to the current time).
///
/// # Errors
/// `InvalidParameter` describing the first violated rule.
pub fn validate_schedule(schedule: &VestingSchedule) -> Result<()> {
    if schedule.cycle_length_seconds == 0 {
        return Err(OpenvestError::InvalidParameter {
            reason: "cycle_length_seconds must be > 0 when vesting".into(),
        });
    }
    ensure_bps(schedule.tge_fraction_bps, "tge_fraction_bps")?;
    ensure_bps(schedule.cycle_fraction_bps, "cycle_fraction_bps")?;
    if schedule.tge_fraction_bps + schedule.cycle_fraction_bps > BPS_DENOMINATOR {
        return Err(OpenvestError::InvalidParameter {
            reason: format!(
                "tge_fraction_bps + cycle_fraction_bps = {} exceeds {BPS_DENOMINATOR}",
                schedule.tge_fraction_bps + schedule.cycle_fraction_bps
            ),
        });
    }
    if schedule.cycle_fraction_bps == 0 && schedule.tge_fraction_bps < BPS_DENOMINATOR {
        return Err(OpenvestError::InvalidParameter {
            reason: "cycle_fraction_bps must be > 0 unless the TGE unlocks 100%".into(),
        });
    }
    Ok(())
}

/// Checks for a new entitlement: structure plus a strictly future first unlock.
///
/// # Errors
/// `InvalidParameter` for a past-dated unlock or an invalid schedule.
pub fn ensure_unlock(unlock: &UnlockMode, now: DateTime<Utc>) -> Result<()> {
    if let UnlockMode::Vesting(schedule) = unlock {
        validate_schedule(schedule)?;
    }
    let first = unlock.first_unlock_at();
    if first <= now {
        return Err(OpenvestError::InvalidParameter {
            reason: format!("unlock {first} must be after {now}"),
        });
    }
    Ok(())
}

/// `next` never unlocks any fraction earlier than `prev` does.
///
/// Component-wise: TGE no earlier, TGE fraction no larger, cycles no shorter,
/// cycle fraction no larger. Each of these can only lower the unlocked
/// fraction at every instant.
#[must_use]
pub fn is_no_faster(next: &VestingSchedule, prev: &VestingSchedule) -> bool {
    next.tge_timestamp >= prev.tge_timestamp
        && next.tge_fraction_bps <= prev.tge_fraction_bps
        && next.cycle_length_seconds >= prev.cycle_length_seconds
        && next.cycle_fraction_bps <= prev.cycle_fraction_bps
}

#[cfg(test)]
mod tests {
    use openvest_types::fixtures::{DAY, at, day, dec, schedule};

    use super::*;

    fn standard() -> UnlockMode {
        // TGE 20%, then 10% every 30 days.
        UnlockMode::Vesting(schedule(day(0), 2_000, 30, 1_000))
    }

    #[test]
    fn nothing_before_tge() {
        assert_eq!(amount_vested_at(&standard(), dec(10_000), at(-1)).unwrap(), dec(0));
    }

    #[test]
    fn tge_tranche_at_tge() {
        assert_eq!(amount_vested_at(&standard(), dec(10_000), day(0)).unwrap(), dec(2_000));
        // One second before the first cycle completes, still only the TGE tranche.
        assert_eq!(
            amount_vested_at(&standard(), dec(10_000), at(30 * DAY - 1)).unwrap(),
            dec(2_000)
        );
    }

    #[test]
    fn three_cycles_after_ninety_days() {
        assert_eq!(amount_vested_at(&standard(), dec(10_000), day(90)).unwrap(), dec(5_000));
    }

    #[test]
    fn full_release_long_after_schedule() {
        assert_eq!(amount_vested_at(&standard(), dec(10_000), day(800)).unwrap(), dec(10_000));
        assert_eq!(fully_unlocked_at(&standard()), Some(day(240)));
        assert_eq!(amount_vested_at(&standard(), dec(10_000), day(240)).unwrap(), dec(10_000));
        assert_eq!(amount_vested_at(&standard(), dec(10_000), at(240 * DAY - 1)).unwrap(), dec(9_000));
    }

    #[test]
    fn truncation_never_strands_the_remainder() {
        // 33.33% per cycle on 3 units: 0, 0.9999 → 0, 1.9998 → 1, 2.9997 → 2, then clamp to 3.
        let unlock = UnlockMode::Vesting(schedule(day(0), 0, 1, 3_333));
        assert_eq!(amount_vested_at(&unlock, dec(3), day(1)).unwrap(), dec(0));
        assert_eq!(amount_vested_at(&unlock, dec(3), day(2)).unwrap(), dec(1));
        assert_eq!(amount_vested_at(&unlock, dec(3), day(3)).unwrap(), dec(2));
        assert_eq!(amount_vested_at(&unlock, dec(3), day(4)).unwrap(), dec(3));
        assert_eq!(fully_unlocked_at(&unlock), Some(day(4)));
    }

    #[test]
    fn timed_lock_is_all_or_nothing() {
        let unlock = UnlockMode::Timed { unlock_date: day(10) };
        assert_eq!(amount_vested_at(&unlock, dec(500), at(10 * DAY - 1)).unwrap(), dec(0));
        assert_eq!(amount_vested_at(&unlock, dec(500), day(10)).unwrap(), dec(500));
        assert_eq!(fully_unlocked_at(&unlock), Some(day(10)));
    }

    #[test]
    fn full_tge_unlocks_everything_at_once() {
        let unlock = UnlockMode::Vesting(schedule(day(0), 10_000, 1, 0));
        assert_eq!(amount_vested_at(&unlock, dec(77), day(0)).unwrap(), dec(77));
        assert_eq!(fully_unlocked_at(&unlock), Some(day(0)));
    }

    #[test]
    fn schedule_validation() {
        assert!(validate_schedule(&schedule(day(0), 2_000, 30, 1_000)).is_ok());
        assert!(validate_schedule(&schedule(day(0), 2_000, 0, 1_000)).is_err());
        assert!(validate_schedule(&schedule(day(0), 10_001, 30, 1_000)).is_err());
        assert!(validate_schedule(&schedule(day(0), 6_000, 30, 5_000)).is_err());
        assert!(validate_schedule(&schedule(day(0), 2_000, 30, 0)).is_err());
        assert!(validate_schedule(&schedule(day(0), 10_000, 1, 0)).is_ok());
    }

    #[test]
    fn unlock_must_be_in_the_future() {
        let now = day(5);
        assert!(ensure_unlock(&UnlockMode::Timed { unlock_date: day(6) }, now).is_ok());
        assert!(ensure_unlock(&UnlockMode::Timed { unlock_date: now }, now).is_err());
        let past_tge = UnlockMode::Vesting(schedule(day(4), 2_000, 30, 1_000));
        assert!(matches!(
            ensure_unlock(&past_tge, now).unwrap_err(),
            OpenvestError::InvalidParameter { .. }
        ));
        let cliff = UnlockMode::Vesting(schedule(day(6), 10_000, 1, 0));
        assert!(ensure_unlock(&cliff, now).is_ok());
    }

    #[test]
    fn no_faster_is_componentwise() {
        let base = schedule(day(10), 2_000, 30, 1_000);
        assert!(is_no_faster(&base, &base));
        assert!(is_no_faster(&schedule(day(11), 1_000, 31, 500), &base));
        assert!(!is_no_faster(&schedule(day(9), 2_000, 30, 1_000), &base));
        assert!(!is_no_faster(&schedule(day(10), 2_500, 30, 1_000), &base));
        assert!(!is_no_faster(&schedule(day(10), 2_000, 29, 1_000), &base));
        assert!(!is_no_faster(&schedule(day(10), 2_000, 30, 1_500), &base));
    }
}
