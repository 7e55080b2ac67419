//! The accrual primitive shared by both ledgers.
//!
//! Converts elapsed time into an owed token amount at a per-cadence rate:
//!
//! ```text
//! newly_accrued = floor(rate * (now - last_settled_at) / cadence)
//! ```
//!
//! Partial-cadence remainders are dropped, never carried forward. Every
//! mutating ledger operation settles the accounts it touches through
//! [`Accrual::settle`] before changing a rate or a deposit.

use serde::{Deserialize, Serialize};

use crate::{AccrualError, Result};

/// Logical time in seconds, supplied by a [`Clock`](crate::Clock).
pub type Timestamp = u64;

/// Token quantity. Tokens are indivisible.
pub type TokenAmount = u128;

/// Tokens accrued at `rate` per `cadence_secs` over `[from, to)`.
///
/// Returns zero when `to <= from`. Callers resolve a requested cadence of
/// zero to their configured default before storing it, so a stored
/// cadence of zero is rejected here.
pub fn accrued_between(
    rate: TokenAmount,
    cadence_secs: u64,
    from: Timestamp,
    to: Timestamp,
) -> Result<TokenAmount> {
    if to <= from {
        return Ok(0);
    }
    if cadence_secs == 0 {
        return Err(AccrualError::InvalidArgument {
            reason: "accrual cadence must be positive".into(),
        });
    }
    let elapsed = TokenAmount::from(to - from);
    let cadence = TokenAmount::from(cadence_secs);
    rate.checked_mul(elapsed)
        .map(|scaled| scaled / cadence)
        .ok_or(AccrualError::ArithmeticOverflow { context: "accrual" })
}

/// Settlement cursor and unclaimed balance for one accruing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accrual {
    /// Time up to which accrual has been finalized.
    pub last_settled_at: Timestamp,
    /// Finalized, unclaimed amount owed.
    pub accrued: TokenAmount,
}

impl Accrual {
    /// A fresh account whose accrual starts at `now`.
    #[must_use]
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            last_settled_at: now,
            accrued: 0,
        }
    }

    /// Amount that [`settle`](Self::settle) would add at `now`, without
    /// mutating anything.
    pub fn preview(&self, rate: TokenAmount, cadence_secs: u64, now: Timestamp) -> Result<TokenAmount> {
        accrued_between(rate, cadence_secs, self.last_settled_at, now)
    }

    /// Finalize accrual up to `now` and return the newly accrued amount.
    ///
    /// The cursor advances to `now` even when the rate is zero, so a later
    /// rate increase cannot reach back over the idle interval. Calling this
    /// twice at the same instant accrues nothing the second time. On error
    /// the account is left untouched.
    pub fn settle(&mut self, rate: TokenAmount, cadence_secs: u64, now: Timestamp) -> Result<TokenAmount> {
        if now <= self.last_settled_at {
            return Ok(0);
        }
        let fresh = self.preview(rate, cadence_secs, now)?;
        self.accrued = self
            .accrued
            .checked_add(fresh)
            .ok_or(AccrualError::ArithmeticOverflow { context: "accrued balance" })?;
        tracing::debug!(
            from = self.last_settled_at,
            to = now,
            rate = %rate,
            fresh = %fresh,
            accrued = %self.accrued,
            "Accrual settled"
        );
        self.last_settled_at = now;
        Ok(fresh)
    }

    /// Total owed at `now`: the finalized balance plus pending accrual.
    pub fn owed_at(&self, rate: TokenAmount, cadence_secs: u64, now: Timestamp) -> Result<TokenAmount> {
        self.accrued
            .checked_add(self.preview(rate, cadence_secs, now)?)
            .ok_or(AccrualError::ArithmeticOverflow { context: "accrued balance" })
    }

    /// Drain the finalized balance, returning what was owed.
    pub fn take(&mut self) -> TokenAmount {
        std::mem::take(&mut self.accrued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_cadence_accrues_half_rate() {
        let mut acc = Accrual::starting_at(0);
        assert_eq!(acc.settle(100, 3600, 1800).unwrap(), 50);
        assert_eq!(acc.accrued, 50);
        assert_eq!(acc.last_settled_at, 1800);
    }

    #[test]
    fn exact_multiple_has_no_truncation() {
        let mut acc = Accrual::starting_at(10);
        assert_eq!(acc.settle(3600, 3600, 3610).unwrap(), 3600);
    }

    #[test]
    fn partial_interval_truncates_toward_zero() {
        // 7 * 1000 / 3600 = 1.94.. -> 1
        assert_eq!(accrued_between(7, 3600, 0, 1000).unwrap(), 1);
        // Remainder is lost, not carried.
        let mut acc = Accrual::starting_at(0);
        acc.settle(1, 3600, 1800).unwrap();
        acc.settle(1, 3600, 3600).unwrap();
        assert_eq!(acc.accrued, 0);
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let err = accrued_between(10, 0, 0, 3600).unwrap_err();
        assert!(matches!(err, AccrualError::InvalidArgument { .. }));
        // Nothing elapsed: no division, no error.
        assert_eq!(accrued_between(10, 0, 50, 50).unwrap(), 0);
    }

    #[test]
    fn settle_is_idempotent_at_fixed_instant() {
        let mut acc = Accrual::starting_at(0);
        acc.settle(100, 60, 120).unwrap();
        let before = acc;
        assert_eq!(acc.settle(100, 60, 120).unwrap(), 0);
        assert_eq!(acc, before);
    }

    #[test]
    fn clock_behind_cursor_is_noop() {
        let mut acc = Accrual::starting_at(500);
        assert_eq!(acc.settle(100, 60, 400).unwrap(), 0);
        assert_eq!(acc.last_settled_at, 500);
    }

    #[test]
    fn zero_rate_still_advances_cursor() {
        let mut acc = Accrual::starting_at(0);
        assert_eq!(acc.settle(0, 60, 10_000).unwrap(), 0);
        assert_eq!(acc.last_settled_at, 10_000);
        // A later rate applies only from the advanced cursor.
        assert_eq!(acc.settle(60, 60, 10_060).unwrap(), 60);
    }

    #[test]
    fn overflow_leaves_account_untouched() {
        let mut acc = Accrual::starting_at(0);
        let err = acc.settle(TokenAmount::MAX, 1, 2).unwrap_err();
        assert!(matches!(err, AccrualError::ArithmeticOverflow { .. }));
        assert_eq!(acc, Accrual::starting_at(0));
    }

    #[test]
    fn preview_matches_settle() {
        let mut acc = Accrual::starting_at(100);
        acc.accrued = 5;
        assert_eq!(acc.owed_at(30, 60, 220).unwrap(), 65);
        acc.settle(30, 60, 220).unwrap();
        assert_eq!(acc.accrued, 65);
        assert_eq!(acc.take(), 65);
        assert_eq!(acc.accrued, 0);
    }
}
