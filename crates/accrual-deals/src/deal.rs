//! Deal and seller-account state.
//!
//! A deal is a buyer-funded pool shared by every seller registered against
//! it. Each seller accrues independently at the rate the buyer set for
//! them; all of them claim from the same deposit.

use std::collections::HashMap;

use accrual_types::{
    AccountId, Accrual, AccrualError, DealId, Result, Timestamp, TokenAmount,
};
use serde::{Deserialize, Serialize};

/// One seller's position on one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerAccount {
    /// Tokens owed per full cadence elapsed. Set by the deal owner only.
    pub(crate) rate: TokenAmount,
    pub(crate) accrual: Accrual,
}

impl SellerAccount {
    /// A freshly registered seller: zero rate, accrual starting at `now`.
    #[must_use]
    pub fn registered_at(now: Timestamp) -> Self {
        Self {
            rate: 0,
            accrual: Accrual::starting_at(now),
        }
    }

    #[must_use]
    pub fn rate(&self) -> TokenAmount {
        self.rate
    }

    #[must_use]
    pub fn last_settled_at(&self) -> Timestamp {
        self.accrual.last_settled_at
    }

    /// Finalized, unclaimed balance.
    #[must_use]
    pub fn accrued(&self) -> TokenAmount {
        self.accrual.accrued
    }
}

/// A buyer-initiated funding pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub(crate) id: DealId,
    pub(crate) owner: AccountId,
    pub(crate) service_identifier: String,
    pub(crate) cadence_secs: u64,
    pub(crate) deposit: TokenAmount,
    pub(crate) sellers: HashMap<AccountId, SellerAccount>,
    /// Registration order; append-only.
    pub(crate) seller_order: Vec<AccountId>,
}

impl Deal {
    pub(crate) fn new(
        id: DealId,
        owner: AccountId,
        service_identifier: String,
        cadence_secs: u64,
        deposit: TokenAmount,
    ) -> Self {
        Self {
            id,
            owner,
            service_identifier,
            cadence_secs,
            deposit,
            sellers: HashMap::new(),
            seller_order: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> DealId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> AccountId {
        self.owner
    }

    #[must_use]
    pub fn service_identifier(&self) -> &str {
        &self.service_identifier
    }

    #[must_use]
    pub fn cadence_secs(&self) -> u64 {
        self.cadence_secs
    }

    /// Current pooled balance.
    #[must_use]
    pub fn deposit(&self) -> TokenAmount {
        self.deposit
    }

    /// Registered sellers in registration order.
    #[must_use]
    pub fn sellers(&self) -> &[AccountId] {
        &self.seller_order
    }

    #[must_use]
    pub fn seller(&self, seller: &AccountId) -> Option<&SellerAccount> {
        self.sellers.get(seller)
    }

    #[must_use]
    pub fn is_registered(&self, seller: &AccountId) -> bool {
        self.sellers.contains_key(seller)
    }

    pub(crate) fn ensure_owner(&self, caller: AccountId) -> Result<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(AccrualError::NotDealOwner {
                deal_id: self.id,
                caller,
            })
        }
    }

    /// Register `seller` at `now`. Returns `false` if already registered.
    pub(crate) fn register(&mut self, seller: AccountId, now: Timestamp) -> bool {
        if self.is_registered(&seller) {
            return false;
        }
        self.sellers.insert(seller, SellerAccount::registered_at(now));
        self.seller_order.push(seller);
        true
    }

    /// Settle a copy of every seller up to `now` and return it with the
    /// total finalized balance. `self` is untouched.
    pub(crate) fn settled_sellers(
        &self,
        now: Timestamp,
    ) -> Result<(HashMap<AccountId, SellerAccount>, TokenAmount)> {
        let mut staged = self.sellers.clone();
        let mut total: TokenAmount = 0;
        for seller in &self.seller_order {
            let Some(account) = staged.get_mut(seller) else {
                continue;
            };
            account.accrual.settle(account.rate, self.cadence_secs, now)?;
            total = total
                .checked_add(account.accrual.accrued)
                .ok_or(AccrualError::ArithmeticOverflow { context: "total accrued" })?;
        }
        Ok((staged, total))
    }

    /// Total owed to all sellers at `now`, without settling.
    pub(crate) fn owed_at(&self, now: Timestamp) -> Result<TokenAmount> {
        self.seller_order
            .iter()
            .filter_map(|s| self.sellers.get(s))
            .try_fold(0 as TokenAmount, |acc, account| {
                let owed = account
                    .accrual
                    .owed_at(account.rate, self.cadence_secs, now)?;
                acc.checked_add(owed)
                    .ok_or(AccrualError::ArithmeticOverflow { context: "total accrued" })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> Deal {
        Deal::new(DealId(1), AccountId::new(), "indexer".into(), 3600, 1_000)
    }

    #[test]
    fn register_is_idempotent() {
        let mut d = deal();
        let seller = AccountId::new();
        assert!(d.register(seller, 10));
        assert!(!d.register(seller, 20));
        assert_eq!(d.sellers(), &[seller]);
        assert_eq!(d.seller(&seller).unwrap().last_settled_at(), 10);
    }

    #[test]
    fn register_at_time_zero_counts_as_registered() {
        let mut d = deal();
        let seller = AccountId::new();
        assert!(d.register(seller, 0));
        assert!(d.is_registered(&seller));
    }

    #[test]
    fn ensure_owner_rejects_strangers() {
        let d = deal();
        assert!(d.ensure_owner(d.owner()).is_ok());
        let err = d.ensure_owner(AccountId::new()).unwrap_err();
        assert!(matches!(err, AccrualError::NotDealOwner { .. }));
    }

    #[test]
    fn settled_sellers_leaves_original_untouched() {
        let mut d = deal();
        let a = AccountId::new();
        let b = AccountId::new();
        d.register(a, 0);
        d.register(b, 0);
        d.sellers.get_mut(&a).unwrap().rate = 100;

        let (staged, total) = d.settled_sellers(1800).unwrap();
        assert_eq!(total, 50);
        assert_eq!(staged[&a].accrued(), 50);
        assert_eq!(staged[&b].last_settled_at(), 1800);
        assert_eq!(d.seller(&a).unwrap().accrued(), 0);
        assert_eq!(d.seller(&b).unwrap().last_settled_at(), 0);
        assert_eq!(d.owed_at(1800).unwrap(), 50);
    }
}
