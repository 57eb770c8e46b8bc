//! System-wide constants for the OpenVest escrow core.

/// Denominator for every basis-point fraction (10000 bps = 100.00%).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default platform fee charged on sale proceeds at settlement (2.00%).
pub const DEFAULT_FEE_BPS: u32 = 200;

/// Default upper bound an administrator may set the platform fee to (10.00%).
pub const DEFAULT_MAX_FEE_BPS: u32 = 1_000;

/// Maximum rows accepted by a single bulk lock creation.
pub const DEFAULT_MAX_BULK_ENTRIES: usize = 500;

/// Maximum page size returned by range queries.
pub const MAX_PAGE_SIZE: usize = 1_000;

/// Identifiers are allocated starting from this value; `0` is never issued.
pub const FIRST_ID: u64 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenVest";
