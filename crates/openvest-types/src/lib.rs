//! # openvest-types
//!
//! Shared types, errors, and configuration for the **OpenVest** escrow core.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`EntitlementId`], [`SaleId`]
//! - **Amounts**: checked integer arithmetic over `Decimal` base units
//! - **Unlock model**: [`UnlockMode`], [`VestingSchedule`]
//! - **Entitlement model**: [`Entitlement`], [`EntitlementKind`], [`Classification`]
//! - **Sale model**: [`Sale`], [`SaleParams`], [`SaleStatus`], [`Settlement`]
//! - **Notifications**: [`LedgerEvent`], [`Notification`], [`EventLog`]
//! - **Access control**: [`Action`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`OpenvestError`] with `OV_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod access;
pub mod amount;
pub mod config;
pub mod constants;
pub mod entitlement;
pub mod error;
pub mod event;
pub mod ids;
pub mod sale;
pub mod schedule;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

// Re-export all primary types at crate root for ergonomic imports:
//   use openvest_types::{Entitlement, UnlockMode, SaleStatus, ...};

pub use access::*;
pub use amount::*;
pub use config::*;
pub use entitlement::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use sale::*;
pub use schedule::*;

// Constants are accessed via `openvest_types::constants::FOO`
// (not re-exported to avoid name collisions).
