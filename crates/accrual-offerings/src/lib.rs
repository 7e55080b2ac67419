//! # accrual-offerings
//!
//! **Offering ledger**: sellers publish named offerings with a rate; each
//! buyer who subscribes gets an isolated deposit and a rate locked at the
//! moment of their first subscription.
//!
//! ## Rate changes
//!
//! ```text
//! raise  → only future subscribers see the new rate
//! lower  → subscriptions above it are settled at their old rate, then clamped
//! ```
//!
//! A seller claim sweeps every subscription, pays each out of its own
//! deposit (not a shared pool) and transfers the total in one call. If that
//! transfer fails the whole sweep is undone.

pub mod ledger;
pub mod offering;

pub use ledger::OfferingLedger;
pub use offering::{Offering, Subscription};
