//! # accrual-deals
//!
//! **Deal ledger**: buyer-initiated escrow pools paying any number of
//! registered sellers at independently set per-cadence rates.
//!
//! ## Lifecycle
//!
//! ```text
//! create_deal → register_as_seller / set_seller_rate → (time passes)
//!     → claim (seller)  |  deposit_tokens / buyer_withdraw / move_deposit (buyer)
//! ```
//!
//! - The deposit is shared: every seller claims from the same pool.
//! - A claim pays at most the current deposit; any unpaid remainder is
//!   forfeited and the seller's balance resets to zero.
//! - Buyer withdrawals and moves settle every seller first and may only
//!   take what is not already owed.
//!
//! Deals are never deleted; an emptied deal simply stops paying out.

pub mod conservation;
pub mod deal;
pub mod ledger;

pub use conservation::{Conservation, DealFlows};
pub use deal::{Deal, SellerAccount};
pub use ledger::DealLedger;
