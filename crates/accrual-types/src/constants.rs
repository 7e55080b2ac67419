//! System-wide constants for the escrow ledgers.

/// Cadence applied when a deal is created with a cadence of zero, in seconds.
pub const DEFAULT_CADENCE_SECS: u64 = 3600;

/// Cadence over which an offering's rate accrues, in seconds.
pub const DEFAULT_OFFERING_CADENCE_SECS: u64 = 3600;
