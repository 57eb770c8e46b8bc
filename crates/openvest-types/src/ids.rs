//! Identifiers used throughout OpenVest.
//!
//! Identities and assets are 20-byte [`Address`]es. Records are keyed by
//! monotonically allocated integer ids that are never reused, so external
//! callers may cache them indefinitely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{OpenvestError, Result};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte identity: an owner, a project, a fee recipient, or an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Rejected wherever an identity or asset is required.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Burn sentinel (`0x…dEaD`). An entitlement handed to it can never be
    /// claimed again.
    pub const BURN: Self = Self([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad,
    ]);

    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    #[must_use]
    pub fn is_burn(&self) -> bool {
        *self == Self::BURN
    }

    /// Parse a `0x`-prefixed (or bare) 40-character hex string.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the string is not 20 bytes of hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|e| OpenvestError::invalid(format!("address {s:?}: {e}")))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| OpenvestError::invalid(format!("address {s:?} is not 20 bytes")))?;
        Ok(Self(bytes))
    }

    /// First four bytes as hex, for compact log fields.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Address whose last eight bytes hold `n` (big-endian). Test fixture only.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// EntitlementId
// ---------------------------------------------------------------------------

/// Identifier of an entitlement record (a lock or a purchase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntitlementId(pub u64);

impl EntitlementId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntitlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ent:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SaleId
// ---------------------------------------------------------------------------

/// Identifier of a sale aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SaleId(pub u64);

impl SaleId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sale:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
