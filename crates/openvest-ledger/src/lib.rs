//! # openvest-ledger
//!
//! The **accounting core** of OpenVest.
//!
//! ## Components
//!
//! - [`vesting`]: Vesting Schedule Calculator, pure `amount_vested_at`
//! - [`EntitlementLedger`]: record arena, owner/asset indexes, statistics,
//!   lock creation, edits and ownership transfer
//! - [`claim`]: withdrawable amounts and claims for every record kind
//! - [`AdminConfig`]: global fee, fee recipient and pause switches
//! - [`digest`]: deterministic state root
//!
//! ## Collaborator seams
//!
//! - [`Escrow`]: token custody, called once per operation after the state
//!   change is committed ([`InMemoryEscrow`] for tests and embedding)
//! - [`Permissions`]: capability checks ([`CapabilityTable`])
//! - [`AssetClassifier`]: pool-token classification ([`StaticClassifier`])
//!
//! ## Atomicity
//!
//! Each operation is one state transition: it either commits fully, with its
//! transfers and notification, or leaves the ledger exactly as it was.

pub mod access;
pub mod admin;
pub mod claim;
pub mod classifier;
pub mod conservation;
pub mod digest;
pub mod escrow;
pub mod index;
pub mod ledger;
pub mod vesting;

pub use access::{CapabilityTable, Permissions, require};
pub use admin::AdminConfig;
pub use classifier::{AssetClassifier, StaticClassifier};
pub use conservation::SupplyConservation;
pub use escrow::{Escrow, InMemoryEscrow, Transfer, TransferBatch};
pub use index::{IdIndex, page_window};
pub use ledger::{
    AssetLockStats, BulkLockRequest, EntitlementLedger, LedgerStats, LockRequest, PurchaseDraft,
};
