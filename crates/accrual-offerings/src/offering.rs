//! Offering and subscription state.
//!
//! Each subscription keeps its own deposit and the rate that was current
//! when the buyer first subscribed. Raising the offering's rate never
//! touches that locked rate; lowering it below a subscription's rate
//! finalizes the subscription at the old rate and then clamps it.

use std::collections::HashMap;

use accrual_types::{AccountId, Accrual, AccrualError, OfferingId, Result, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

/// One buyer's subscription to one offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub(crate) deposit: TokenAmount,
    pub(crate) sub_rate: TokenAmount,
    pub(crate) accrual: Accrual,
}

impl Subscription {
    pub(crate) fn locked_at(rate: TokenAmount, now: Timestamp) -> Self {
        Self {
            deposit: 0,
            sub_rate: rate,
            accrual: Accrual::starting_at(now),
        }
    }

    /// Buyer-owned balance backing this subscription.
    #[must_use]
    pub fn deposit(&self) -> TokenAmount {
        self.deposit
    }

    /// Rate locked at subscribe time, possibly clamped down since.
    #[must_use]
    pub fn sub_rate(&self) -> TokenAmount {
        self.sub_rate
    }

    /// Finalized amount owed to the seller and not yet claimed.
    #[must_use]
    pub fn owed_to_seller(&self) -> TokenAmount {
        self.accrual.accrued
    }

    #[must_use]
    pub fn last_accrual_at(&self) -> Timestamp {
        self.accrual.last_settled_at
    }
}

/// A seller's published offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub(crate) seller: AccountId,
    pub(crate) id: OfferingId,
    pub(crate) current_rate: TokenAmount,
    pub(crate) peak_rate: TokenAmount,
    pub(crate) subscribers: HashMap<AccountId, Subscription>,
    /// Subscription order; append-only.
    pub(crate) subscriber_order: Vec<AccountId>,
}

impl Offering {
    pub(crate) fn new(seller: AccountId, id: OfferingId, rate: TokenAmount) -> Self {
        Self {
            seller,
            id,
            current_rate: rate,
            peak_rate: rate,
            subscribers: HashMap::new(),
            subscriber_order: Vec::new(),
        }
    }

    #[must_use]
    pub fn seller(&self) -> AccountId {
        self.seller
    }

    #[must_use]
    pub fn id(&self) -> OfferingId {
        self.id
    }

    /// Rate new subscribers lock in.
    #[must_use]
    pub fn current_rate(&self) -> TokenAmount {
        self.current_rate
    }

    /// Highest rate this offering has ever had.
    #[must_use]
    pub fn peak_rate(&self) -> TokenAmount {
        self.peak_rate
    }

    /// Subscribers in the order they first subscribed.
    #[must_use]
    pub fn subscribers(&self) -> &[AccountId] {
        &self.subscriber_order
    }

    #[must_use]
    pub fn subscription(&self, buyer: &AccountId) -> Option<&Subscription> {
        self.subscribers.get(buyer)
    }

    pub(crate) fn set_rate(&mut self, rate: TokenAmount) {
        self.current_rate = rate;
        self.peak_rate = self.peak_rate.max(rate);
    }

    /// Copy of the subscriptions with every rate above `new_rate`
    /// finalized at its old rate and clamped. Returns the copy and the
    /// number of clamped subscriptions.
    pub(crate) fn clamped_subscribers(
        &self,
        new_rate: TokenAmount,
        cadence_secs: u64,
        now: Timestamp,
    ) -> Result<(HashMap<AccountId, Subscription>, usize)> {
        let mut staged = self.subscribers.clone();
        let mut clamped = 0;
        for buyer in &self.subscriber_order {
            let Some(sub) = staged.get_mut(buyer) else {
                continue;
            };
            if sub.sub_rate <= new_rate {
                continue;
            }
            sub.accrual.settle(sub.sub_rate, cadence_secs, now)?;
            sub.sub_rate = new_rate;
            clamped += 1;
        }
        Ok((staged, clamped))
    }

    /// Copy of the subscriptions after paying each one out of its own
    /// deposit. Returns the copy, the total paid and the total forfeited.
    pub(crate) fn drained_subscribers(
        &self,
        cadence_secs: u64,
        now: Timestamp,
    ) -> Result<(HashMap<AccountId, Subscription>, TokenAmount, TokenAmount)> {
        let mut staged = self.subscribers.clone();
        let mut paid: TokenAmount = 0;
        let mut forfeited: TokenAmount = 0;
        for buyer in &self.subscriber_order {
            let Some(sub) = staged.get_mut(buyer) else {
                continue;
            };
            sub.accrual.settle(sub.sub_rate, cadence_secs, now)?;
            let owed = sub.accrual.take();
            let payout = owed.min(sub.deposit);
            sub.deposit -= payout;
            forfeited = forfeited.saturating_add(owed - payout);
            paid = paid
                .checked_add(payout)
                .ok_or(AccrualError::ArithmeticOverflow { context: "seller claim" })?;
        }
        Ok((staged, paid, forfeited))
    }

    /// Sum of subscription deposits.
    pub(crate) fn total_deposit(&self) -> Option<TokenAmount> {
        self.subscribers
            .values()
            .try_fold(0 as TokenAmount, |acc, s| acc.checked_add(s.deposit))
    }
}
