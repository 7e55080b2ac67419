//! Token ledger collaborator.
//!
//! The escrow ledgers hold tokens on an external fungible-token ledger and
//! only ever observe whether a transfer succeeded. A `false` result makes
//! the calling operation roll back every change it staged.

#[cfg(any(test, feature = "test-helpers"))]
use std::collections::HashMap;

use crate::{AccountId, TokenAmount};

/// The fungible-token ledger as seen from an escrow contract.
pub trait TokenLedger {
    /// Send `amount` from the escrow's own balance to `recipient`.
    fn transfer(&mut self, recipient: AccountId, amount: TokenAmount) -> bool;

    /// Pull `amount` from `owner` to `recipient` using an allowance the
    /// owner granted the escrow beforehand.
    fn transfer_from(
        &mut self,
        owner: AccountId,
        recipient: AccountId,
        amount: TokenAmount,
    ) -> bool;
}

/// In-memory token ledger for tests and local hosts.
///
/// Tracks balances and the allowances owners granted to one escrow
/// account. Transfers can be forced to fail to exercise rollback paths.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone)]
pub struct InMemoryTokenLedger {
    escrow: AccountId,
    balances: HashMap<AccountId, TokenAmount>,
    allowances: HashMap<AccountId, TokenAmount>,
    failing: bool,
    calls: usize,
}

#[cfg(any(test, feature = "test-helpers"))]
impl InMemoryTokenLedger {
    /// Create a ledger whose `transfer` calls debit `escrow`.
    #[must_use]
    pub fn new(escrow: AccountId) -> Self {
        Self {
            escrow,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            failing: false,
            calls: 0,
        }
    }

    /// Give `account` tokens out of thin air (test funding).
    pub fn credit(&mut self, account: AccountId, amount: TokenAmount) {
        *self.balances.entry(account).or_insert(0) += amount;
    }

    /// Let the escrow pull up to `amount` from `owner`.
    pub fn approve(&mut self, owner: AccountId, amount: TokenAmount) {
        self.allowances.insert(owner, amount);
    }

    /// Fund `owner` and approve the escrow for the same amount.
    pub fn fund(&mut self, owner: AccountId, amount: TokenAmount) {
        self.credit(owner, amount);
        self.approve(owner, amount);
    }

    /// Make every subsequent transfer report failure (or stop doing so).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    #[must_use]
    pub fn balance(&self, account: AccountId) -> TokenAmount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn allowance(&self, owner: AccountId) -> TokenAmount {
        self.allowances.get(&owner).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn escrow(&self) -> AccountId {
        self.escrow
    }

    /// Number of transfer calls received, successful or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn move_tokens(&mut self, from: AccountId, to: AccountId, amount: TokenAmount) -> bool {
        let available = self.balance(from);
        if available < amount {
            return false;
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        true
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl TokenLedger for InMemoryTokenLedger {
    fn transfer(&mut self, recipient: AccountId, amount: TokenAmount) -> bool {
        self.calls += 1;
        if self.failing {
            return false;
        }
        self.move_tokens(self.escrow, recipient, amount)
    }

    fn transfer_from(&mut self, owner: AccountId, recipient: AccountId, amount: TokenAmount) -> bool {
        self.calls += 1;
        if self.failing {
            return false;
        }
        let allowed = self.allowance(owner);
        if allowed < amount || !self.move_tokens(owner, recipient, amount) {
            return false;
        }
        self.allowances.insert(owner, allowed - amount);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryTokenLedger, AccountId, AccountId) {
        let escrow = AccountId::new();
        let user = AccountId::new();
        (InMemoryTokenLedger::new(escrow), escrow, user)
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let (mut tl, escrow, user) = setup();
        tl.credit(user, 100);
        assert!(!tl.transfer_from(user, escrow, 50));
        tl.approve(user, 60);
        assert!(tl.transfer_from(user, escrow, 50));
        assert_eq!(tl.balance(user), 50);
        assert_eq!(tl.balance(escrow), 50);
        assert_eq!(tl.allowance(user), 10);
    }

    #[test]
    fn transfer_from_requires_balance() {
        let (mut tl, escrow, user) = setup();
        tl.approve(user, 100);
        assert!(!tl.transfer_from(user, escrow, 1));
        assert_eq!(tl.allowance(user), 100);
    }

    #[test]
    fn transfer_debits_escrow() {
        let (mut tl, escrow, user) = setup();
        tl.credit(escrow, 30);
        assert!(!tl.transfer(user, 31));
        assert!(tl.transfer(user, 30));
        assert_eq!(tl.balance(user), 30);
        assert_eq!(tl.balance(escrow), 0);
    }

    #[test]
    fn failing_switch_rejects_everything() {
        let (mut tl, escrow, user) = setup();
        tl.fund(user, 100);
        tl.set_failing(true);
        assert!(!tl.transfer_from(user, escrow, 10));
        assert_eq!(tl.balance(user), 100);
        assert_eq!(tl.calls(), 1);
        tl.set_failing(false);
        assert!(tl.transfer_from(user, escrow, 10));
    }
}
