//! Unlock model: a single unlock date, or a TGE tranche followed by
//! linear-cyclic vesting.
//!
//! ```text
//!   bps
//!  10000 ┤                         ┌──────────  (clamped to 100%)
//!        │                    ┌────┘
//!        │               ┌────┘  + cycle_fraction_bps per full cycle
//!        │          ┌────┘
//!   tge  ┤──────────┘
//!      0 ┼──────────┬────┬────┬────┬──────────▶ time
//!               tge_timestamp  cycle_length_seconds
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linear-cyclic vesting definition attached to an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VestingSchedule {
    /// Instant at which the first tranche unlocks.
    pub tge_timestamp: DateTime<Utc>,
    /// Fraction unlocked at `tge_timestamp`.
    pub tge_fraction_bps: u32,
    /// Duration of each unlock cycle after TGE. Must be > 0.
    pub cycle_length_seconds: u64,
    /// Fraction unlocked per completed cycle after TGE.
    pub cycle_fraction_bps: u32,
}

/// How an entitlement unlocks. The two modes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UnlockMode {
    /// Nothing before `unlock_date`, everything at/after it.
    Timed { unlock_date: DateTime<Utc> },
    /// TGE tranche plus per-cycle tranches.
    Vesting(VestingSchedule),
}

impl UnlockMode {
    /// The first instant at which anything unlocks.
    #[must_use]
    pub fn first_unlock_at(&self) -> DateTime<Utc> {
        match self {
            Self::Timed { unlock_date } => *unlock_date,
            Self::Vesting(s) => s.tge_timestamp,
        }
    }

    #[must_use]
    pub fn is_vesting(&self) -> bool {
        matches!(self, Self::Vesting(_))
    }

    #[must_use]
    pub fn schedule(&self) -> Option<&VestingSchedule> {
        match self {
            Self::Timed { .. } => None,
            Self::Vesting(s) => Some(s),
        }
    }
}

impl std::fmt::Display for UnlockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timed { unlock_date } => write!(f, "TIMED({unlock_date})"),
            Self::Vesting(s) => write!(
                f,
                "VESTING(tge={}, tge_bps={}, cycle={}s, cycle_bps={})",
                s.tge_timestamp, s.tge_fraction_bps, s.cycle_length_seconds, s.cycle_fraction_bps
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn first_unlock_of_each_mode() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let timed = UnlockMode::Timed { unlock_date: t };
        assert_eq!(timed.first_unlock_at(), t);
        assert!(!timed.is_vesting());
        assert!(timed.schedule().is_none());

        let vesting = UnlockMode::Vesting(VestingSchedule {
            tge_timestamp: t,
            tge_fraction_bps: 2_000,
            cycle_length_seconds: 86_400,
            cycle_fraction_bps: 1_000,
        });
        assert_eq!(vesting.first_unlock_at(), t);
        assert!(vesting.is_vesting());
    }

    #[test]
    fn serde_tagged_mode() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mode = UnlockMode::Timed { unlock_date: t };
        let json = serde_json::to_string(&mode).unwrap();
        assert!(json.contains("\"mode\":\"timed\""), "Got: {json}");
        let back: UnlockMode = serde_json::from_str(&json).unwrap();
        assert_eq!(mode, back);
    }
}
