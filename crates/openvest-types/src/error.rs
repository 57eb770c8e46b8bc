//! Error types for the OpenVest escrow core.
//!
//! All errors use the `OV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Parameter errors
//! - 2xx: Authorization errors
//! - 3xx: Lookup errors
//! - 4xx: State errors
//! - 5xx: Claim / refund no-ops
//! - 6xx: Limit errors
//! - 7xx: Transfer errors
//! - 9xx: General / internal errors
//!
//! Every error is a rejection of the single current operation: the operation
//! has no partial effect once it returns `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Address, EntitlementId, SaleId};

/// Central error enum for all OpenVest operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenvestError {
    // =================================================================
    // Parameter Errors (1xx)
    // =================================================================
    /// Zero amount/address, malformed window, fraction out of range, etc.
    #[error("OV_ERR_100: Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// An edit would make an entitlement unlock earlier or claw back vested funds.
    #[error("OV_ERR_101: Invalid edit: {reason}")]
    InvalidEdit { reason: String },

    /// The asset was declared a pool token but the registry disagrees.
    #[error("OV_ERR_102: Asset {0} is not a pool token")]
    NotAPoolToken(Address),

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// Caller is not the owner or lacks the required capability.
    #[error("OV_ERR_200: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // =================================================================
    // Lookup Errors (3xx)
    // =================================================================
    /// The referenced entitlement does not exist.
    #[error("OV_ERR_300: Entitlement not found: {0}")]
    EntitlementNotFound(EntitlementId),

    /// The referenced sale does not exist.
    #[error("OV_ERR_301: Sale not found: {0}")]
    SaleNotFound(SaleId),

    // =================================================================
    // State Errors (4xx)
    // =================================================================
    /// The operation is not valid in the current state.
    #[error("OV_ERR_400: State conflict: {reason}")]
    StateConflict { reason: String },

    /// The sale has already been settled.
    #[error("OV_ERR_401: Sale already settled: {0}")]
    AlreadySettled(SaleId),

    /// Refunds are not enabled for this sale.
    #[error("OV_ERR_402: Refunds disabled for {0}")]
    RefundsDisabled(SaleId),

    /// The refund window of this sale has closed.
    #[error("OV_ERR_403: Refund window closed for {0}")]
    RefundWindowClosed(SaleId),

    // =================================================================
    // Claim / Refund (5xx)
    // =================================================================
    /// Nothing has vested since the last claim.
    #[error("OV_ERR_500: Nothing to claim on {0}")]
    NothingToClaim(EntitlementId),

    /// Nothing released remains to be refunded.
    #[error("OV_ERR_501: Nothing to refund on {0}")]
    NothingToRefund(EntitlementId),

    // =================================================================
    // Limit Errors (6xx)
    // =================================================================
    /// Purchase outside min/max bounds or beyond the offered supply.
    #[error("OV_ERR_600: Limit exceeded: {reason}")]
    LimitExceeded { reason: String },

    // =================================================================
    // Transfer Errors (7xx)
    // =================================================================
    /// The escrow collaborator rejected a transfer.
    #[error("OV_ERR_700: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Checked arithmetic overflowed.
    #[error("OV_ERR_900: Arithmetic overflow")]
    ArithmeticOverflow,

    /// A value-conservation invariant failed. Critical safety alert.
    #[error("OV_ERR_901: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    /// Configuration error (invalid config file, out-of-range values, etc.).
    #[error("OV_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("OV_ERR_903: Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category a host can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidParameter,
    Unauthorized,
    NotFound,
    StateConflict,
    NothingToClaim,
    NothingToRefund,
    LimitExceeded,
    TransferFailed,
    Internal,
}

impl OpenvestError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::InvalidEdit { .. }
            | Self::NotAPoolToken(_)
            | Self::ArithmeticOverflow => ErrorKind::InvalidParameter,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::EntitlementNotFound(_) | Self::SaleNotFound(_) => ErrorKind::NotFound,
            Self::StateConflict { .. }
            | Self::AlreadySettled(_)
            | Self::RefundsDisabled(_)
            | Self::RefundWindowClosed(_) => ErrorKind::StateConflict,
            Self::NothingToClaim(_) => ErrorKind::NothingToClaim,
            Self::NothingToRefund(_) => ErrorKind::NothingToRefund,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
            Self::ConservationViolation { .. }
            | Self::Configuration(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OpenvestError>;

impl From<serde_json::Error> for OpenvestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
