//! # accrual-types
//!
//! Shared types, errors, collaborators and the accrual primitive for the
//! **Accrual** escrow ledgers.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`DealId`], [`OfferingId`]
//! - **Accrual primitive**: [`Accrual`], [`accrued_between`], [`Timestamp`], [`TokenAmount`]
//! - **Collaborators**: [`TokenLedger`], [`Clock`], [`ManualClock`], [`SystemClock`]
//! - **Notifications**: [`DealEvent`], [`OfferingEvent`], [`EventJournal`]
//! - **Configuration**: [`LedgerConfig`]
//! - **Errors**: [`AccrualError`] with `AC_ERR_` prefix codes
//! - **Constants**: cadence defaults
//!
//! With the `test-helpers` feature, [`InMemoryTokenLedger`] is exported for
//! exercising the ledgers without a real token contract.

pub mod accrual;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod token;

pub use accrual::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use token::*;

// Constants are accessed via `accrual_types::constants::FOO`.
