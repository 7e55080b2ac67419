//! Escrow conservation tracking for the deal ledger.
//!
//! Invariant checked on demand:
//! ```text
//! ∀ deal: deposit == deposited + moved_in − paid_out − withdrawn − moved_out
//! Σ deal.deposit == escrow_in − escrow_out
//! ```
//!
//! Moves between deals shift funds internally and never touch the escrow
//! totals.

use std::collections::HashMap;

use accrual_types::{AccrualError, DealId, Result, TokenAmount};

/// Running token flows for a single deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DealFlows {
    pub deposited: TokenAmount,
    pub moved_in: TokenAmount,
    pub paid_out: TokenAmount,
    pub withdrawn: TokenAmount,
    pub moved_out: TokenAmount,
}

impl DealFlows {
    /// Deposit implied by the recorded flows, or `None` if outflows exceed
    /// inflows.
    #[must_use]
    pub fn expected_deposit(&self) -> Option<TokenAmount> {
        self.deposited
            .checked_add(self.moved_in)?
            .checked_sub(self.paid_out)?
            .checked_sub(self.withdrawn)?
            .checked_sub(self.moved_out)
    }
}

/// Tracks per-deal and escrow-wide flows.
#[derive(Debug, Default)]
pub struct Conservation {
    flows: HashMap<DealId, DealFlows>,
    escrow_in: TokenAmount,
    escrow_out: TokenAmount,
}

impl Conservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens pulled from the buyer into a deal.
    pub fn record_deposit(&mut self, deal_id: DealId, amount: TokenAmount) {
        let f = self.flows.entry(deal_id).or_default();
        f.deposited = f.deposited.saturating_add(amount);
        self.escrow_in = self.escrow_in.saturating_add(amount);
    }

    /// Tokens paid from a deal to one of its sellers.
    pub fn record_payout(&mut self, deal_id: DealId, amount: TokenAmount) {
        let f = self.flows.entry(deal_id).or_default();
        f.paid_out = f.paid_out.saturating_add(amount);
        self.escrow_out = self.escrow_out.saturating_add(amount);
    }

    /// Tokens returned from a deal to its buyer.
    pub fn record_withdrawal(&mut self, deal_id: DealId, amount: TokenAmount) {
        let f = self.flows.entry(deal_id).or_default();
        f.withdrawn = f.withdrawn.saturating_add(amount);
        self.escrow_out = self.escrow_out.saturating_add(amount);
    }

    pub fn record_move(&mut self, from: DealId, to: DealId, amount: TokenAmount) {
        let src = self.flows.entry(from).or_default();
        src.moved_out = src.moved_out.saturating_add(amount);
        let dst = self.flows.entry(to).or_default();
        dst.moved_in = dst.moved_in.saturating_add(amount);
    }

    #[must_use]
    pub fn flows(&self, deal_id: DealId) -> DealFlows {
        self.flows.get(&deal_id).copied().unwrap_or_default()
    }

    /// Tokens the escrow should be holding across all deals.
    #[must_use]
    pub fn expected_escrow(&self) -> Option<TokenAmount> {
        self.escrow_in.checked_sub(self.escrow_out)
    }

    /// Check one deal's deposit against its recorded flows.
    ///
    /// # Errors
    /// Returns [`AccrualError::ConservationViolation`] on mismatch.
    pub fn verify(&self, deal_id: DealId, actual_deposit: TokenAmount) -> Result<()> {
        let flows = self.flows(deal_id);
        match flows.expected_deposit() {
            Some(expected) if expected == actual_deposit => Ok(()),
            expected => Err(AccrualError::ConservationViolation {
                reason: format!(
                    "{deal_id}: deposit {actual_deposit} != expected {expected:?} ({flows:?})"
                ),
            }),
        }
    }

    /// Check the sum of all deal deposits against escrow in/out totals.
    ///
    /// # Errors
    /// Returns [`AccrualError::ConservationViolation`] on mismatch.
    pub fn verify_escrow(&self, actual_total: TokenAmount) -> Result<()> {
        match self.expected_escrow() {
            Some(expected) if expected == actual_total => Ok(()),
            expected => Err(AccrualError::ConservationViolation {
                reason: format!(
                    "escrow holds {actual_total} != expected {expected:?} (in={}, out={})",
                    self.escrow_in, self.escrow_out
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_expects_zero() {
        let c = Conservation::new();
        assert!(c.verify(DealId(1), 0).is_ok());
        assert!(c.verify_escrow(0).is_ok());
    }

    #[test]
    fn flows_net_out() {
        let mut c = Conservation::new();
        c.record_deposit(DealId(1), 1000);
        c.record_payout(DealId(1), 300);
        c.record_withdrawal(DealId(1), 200);
        assert!(c.verify(DealId(1), 500).is_ok());
        assert!(c.verify_escrow(500).is_ok());
    }

    #[test]
    fn moves_are_internal() {
        let mut c = Conservation::new();
        c.record_deposit(DealId(1), 100);
        c.record_move(DealId(1), DealId(2), 40);
        assert!(c.verify(DealId(1), 60).is_ok());
        assert!(c.verify(DealId(2), 40).is_ok());
        assert!(c.verify_escrow(100).is_ok());
    }

    #[test]
    fn mismatch_is_violation() {
        let mut c = Conservation::new();
        c.record_deposit(DealId(1), 10);
        let err = c.verify(DealId(1), 11).unwrap_err();
        assert!(matches!(err, AccrualError::ConservationViolation { .. }));
        let err = c.verify_escrow(9).unwrap_err();
        assert!(err.to_string().starts_with("AC_ERR_901"));
    }
}
