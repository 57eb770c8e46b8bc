//! # openvest-sale
//!
//! **Sale product**: fixed-price token sales whose purchases become
//! entitlement records.
//!
//! ## Lifecycle
//!
//! ```text
//! create_sale -> Pending -> approve -> Approved <-> Paused
//!                   |                     |
//!                 reject               withdraw
//!                   v                     v
//!                Rejected               Ended
//! ```
//!
//! - [`SaleEngine::buy`]: converts payment at the sale price and records a
//!   purchase, vesting on the sale schedule or delivered at once
//! - [`SaleEngine::refund`]: hands delivered tokens back for a pro-rata
//!   share of the payment while the refund window is open
//! - [`SaleEngine::withdraw`]: one-shot settlement splitting the raised
//!   payment into fee and proceeds, checked by [`ProceedsConservation`]

pub mod engine;
pub mod purchase;
pub mod refund;
pub mod settlement;

pub use engine::{SaleEngine, SaleStats, validate_params};
pub use refund::{Refund, refund_quote};
pub use settlement::ProceedsConservation;
