//! Named capabilities checked before administrative mutations.

use serde::{Deserialize, Serialize};

/// An administrative action gated by the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Action {
    ApproveSale,
    RejectSale,
    /// Pause and unpause a single sale.
    PauseSale,
    EditSale,
    /// Global fee and per-sale fee overrides.
    SetFee,
    SetFeeRecipient,
    /// Process-wide pause flags.
    SetPause,
    /// Grant or revoke capabilities.
    Grant,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ApproveSale,
        Self::RejectSale,
        Self::PauseSale,
        Self::EditSale,
        Self::SetFee,
        Self::SetFeeRecipient,
        Self::SetPause,
        Self::Grant,
    ];
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApproveSale => write!(f, "APPROVE_SALE"),
            Self::RejectSale => write!(f, "REJECT_SALE"),
            Self::PauseSale => write!(f, "PAUSE_SALE"),
            Self::EditSale => write!(f, "EDIT_SALE"),
            Self::SetFee => write!(f, "SET_FEE"),
            Self::SetFeeRecipient => write!(f, "SET_FEE_RECIPIENT"),
            Self::SetPause => write!(f, "SET_PAUSE"),
            Self::Grant => write!(f, "GRANT"),
        }
    }
}
