//! The offering ledger: seller-published offerings with locked-rate
//! subscriptions.
//!
//! Operations follow the same discipline as the deal ledger: sample the
//! clock once, settle on staged copies, commit only after the token ledger
//! accepted the transfer. A seller claim pays every subscription out of
//! its own deposit but moves the total in a single transfer; if that
//! transfer is rejected, no subscription is touched.

use std::collections::HashMap;

use accrual_types::{
    AccountId, AccrualError, Clock, EventJournal, LedgerConfig, OfferingEvent, OfferingId, Result,
    TokenAmount, TokenLedger,
};

use crate::offering::{Offering, Subscription};

/// In-memory offering ledger backed by an external token ledger.
pub struct OfferingLedger<T, C> {
    escrow: AccountId,
    token: T,
    clock: C,
    config: LedgerConfig,
    /// Offerings keyed by `(seller, offering id)`.
    offerings: HashMap<(AccountId, OfferingId), Offering>,
    journal: EventJournal<OfferingEvent>,
}

impl<T: TokenLedger, C: Clock> OfferingLedger<T, C> {
    #[must_use]
    pub fn new(escrow: AccountId, token: T, clock: C) -> Self {
        Self {
            escrow,
            token,
            clock,
            config: LedgerConfig::default(),
            offerings: HashMap::new(),
            journal: EventJournal::new(),
        }
    }

    pub fn with_config(escrow: AccountId, token: T, clock: C, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let mut ledger = Self::new(escrow, token, clock);
        ledger.config = config;
        Ok(ledger)
    }

    // =================================================================
    // Seller operations
    // =================================================================

    /// Publish an offering or change its rate.
    ///
    /// - new offering: created at `new_rate`
    /// - same rate: no-op
    /// - lower rate: every subscription locked above `new_rate` is settled
    ///   at its old rate, then clamped to `new_rate`
    /// - higher rate: existing subscriptions keep their locked rate
    pub fn create_or_update_offering(
        &mut self,
        caller: AccountId,
        offering_id: OfferingId,
        new_rate: TokenAmount,
    ) -> Result<()> {
        let now = self.clock.now();
        let cadence = self.config.offering_cadence_secs;

        let Some(offering) = self.offerings.get_mut(&(caller, offering_id)) else {
            self.offerings.insert(
                (caller, offering_id),
                Offering::new(caller, offering_id, new_rate),
            );
            tracing::info!(seller = %caller, offering = %offering_id, rate = %new_rate, "Offering created");
            self.journal.record(OfferingEvent::OfferingCreated {
                seller: caller,
                offering_id,
                rate: new_rate,
            });
            return Ok(());
        };

        let old_rate = offering.current_rate;
        if new_rate == old_rate {
            tracing::debug!(seller = %caller, offering = %offering_id, "Offering rate unchanged");
            return Ok(());
        }
        let mut clamped = 0;
        if new_rate < old_rate {
            let (staged, count) = offering.clamped_subscribers(new_rate, cadence, now)?;
            offering.subscribers = staged;
            clamped = count;
        }
        offering.set_rate(new_rate);

        tracing::info!(
            seller = %caller,
            offering = %offering_id,
            old_rate = %old_rate,
            new_rate = %new_rate,
            clamped,
            "Offering rate updated"
        );
        self.journal.record(OfferingEvent::OfferingUpdated {
            seller: caller,
            offering_id,
            old_rate,
            new_rate,
        });
        Ok(())
    }

    /// Collect what every subscriber owes, each capped by their own
    /// deposit, in one transfer to the seller.
    ///
    /// Owed amounts beyond a subscription's deposit are forfeited. Returns
    /// the total paid.
    pub fn seller_claim(
        &mut self,
        seller: AccountId,
        offering_id: OfferingId,
        caller: AccountId,
    ) -> Result<TokenAmount> {
        if caller != seller {
            return Err(AccrualError::NotOfferingSeller {
                offering_id,
                caller,
            });
        }
        let now = self.clock.now();
        let cadence = self.config.offering_cadence_secs;
        let offering = Self::lookup(&self.offerings, seller, offering_id)?;
        let (staged, paid, forfeited) = offering.drained_subscribers(cadence, now)?;

        self.push(seller, paid, "seller_claim")?;

        Self::lookup_mut(&mut self.offerings, seller, offering_id)?.subscribers = staged;

        if forfeited > 0 {
            tracing::warn!(
                seller = %seller,
                offering = %offering_id,
                forfeited = %forfeited,
                "Subscription deposits underfunded: unpaid balance forfeited"
            );
        }
        if paid == 0 {
            tracing::debug!(seller = %seller, offering = %offering_id, "Nothing to claim");
            return Ok(0);
        }
        tracing::info!(seller = %seller, offering = %offering_id, amount = %paid, "Seller claimed");
        self.journal.record(OfferingEvent::SellerClaimed {
            seller,
            offering_id,
            amount: paid,
        });
        Ok(paid)
    }

    // =================================================================
    // Buyer operations
    // =================================================================

    /// Subscribe to an offering, or top up an existing subscription.
    ///
    /// A first subscription locks the offering's current rate. A returning
    /// subscriber is settled at their locked rate before the top-up.
    pub fn subscribe(
        &mut self,
        caller: AccountId,
        seller: AccountId,
        offering_id: OfferingId,
        amount: TokenAmount,
    ) -> Result<()> {
        if amount == 0 {
            return Err(AccrualError::ZeroDeposit);
        }
        let now = self.clock.now();
        let cadence = self.config.offering_cadence_secs;
        let offering = Self::lookup(&self.offerings, seller, offering_id)?;

        let first_time = offering.subscription(&caller).is_none();
        let mut sub = match offering.subscription(&caller) {
            Some(existing) => {
                let mut sub = *existing;
                sub.accrual.settle(sub.sub_rate, cadence, now)?;
                sub
            }
            None => Subscription::locked_at(offering.current_rate, now),
        };
        sub.deposit = sub
            .deposit
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow { context: "subscription deposit" })?;

        if !self.token.transfer_from(caller, self.escrow, amount) {
            tracing::warn!(buyer = %caller, amount = %amount, "transfer_from rejected, rolling back");
            return Err(AccrualError::TransferRejected {
                operation: "subscribe",
                amount,
            });
        }

        let offering = Self::lookup_mut(&mut self.offerings, seller, offering_id)?;
        if first_time {
            offering.subscriber_order.push(caller);
        }
        offering.subscribers.insert(caller, sub);

        tracing::info!(
            seller = %seller,
            offering = %offering_id,
            buyer = %caller,
            amount = %amount,
            deposit = %sub.deposit,
            locked_rate = %sub.sub_rate,
            first_time,
            "Subscribed"
        );
        self.journal.record(OfferingEvent::Subscribed {
            seller,
            offering_id,
            buyer: caller,
            amount,
            deposit: sub.deposit,
            locked_rate: sub.sub_rate,
        });
        Ok(())
    }

    /// Return `amount` of a subscription's unowed deposit to its buyer.
    pub fn buyer_withdraw(
        &mut self,
        seller: AccountId,
        offering_id: OfferingId,
        caller: AccountId,
        amount: TokenAmount,
    ) -> Result<()> {
        let now = self.clock.now();
        let cadence = self.config.offering_cadence_secs;
        let offering = Self::lookup(&self.offerings, seller, offering_id)?;
        let mut sub = offering
            .subscription(&caller)
            .copied()
            .ok_or(AccrualError::SubscriptionNotFound {
                offering_id,
                buyer: caller,
            })?;
        sub.accrual.settle(sub.sub_rate, cadence, now)?;

        let needed = sub
            .accrual
            .accrued
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow { context: "withdrawal" })?;
        if sub.deposit < needed {
            return Err(AccrualError::InsufficientFunds {
                needed,
                available: sub.deposit,
            });
        }
        sub.deposit -= amount;

        self.push(caller, amount, "buyer_withdraw")?;

        Self::lookup_mut(&mut self.offerings, seller, offering_id)?
            .subscribers
            .insert(caller, sub);

        tracing::info!(
            seller = %seller,
            offering = %offering_id,
            buyer = %caller,
            amount = %amount,
            deposit = %sub.deposit,
            "Buyer withdrew"
        );
        self.journal.record(OfferingEvent::BuyerWithdrew {
            seller,
            offering_id,
            buyer: caller,
            amount,
        });
        Ok(())
    }

    // =================================================================
    // Views
    // =================================================================

    #[must_use]
    pub fn offering(&self, seller: AccountId, offering_id: OfferingId) -> Option<&Offering> {
        self.offerings.get(&(seller, offering_id))
    }

    #[must_use]
    pub fn subscription(
        &self,
        seller: AccountId,
        offering_id: OfferingId,
        buyer: AccountId,
    ) -> Option<&Subscription> {
        self.offering(seller, offering_id)?.subscription(&buyer)
    }

    /// Subscribers of an offering in first-subscription order.
    pub fn subscribers(&self, seller: AccountId, offering_id: OfferingId) -> Result<&[AccountId]> {
        Ok(Self::lookup(&self.offerings, seller, offering_id)?.subscribers())
    }

    /// What `buyer` owes the seller right now, before the deposit clamp.
    pub fn owed(&self, seller: AccountId, offering_id: OfferingId, buyer: AccountId) -> Result<TokenAmount> {
        let sub = Self::lookup(&self.offerings, seller, offering_id)?
            .subscription(&buyer)
            .ok_or(AccrualError::SubscriptionNotFound { offering_id, buyer })?;
        sub.accrual.owed_at(
            sub.sub_rate,
            self.config.offering_cadence_secs,
            self.clock.now(),
        )
    }

    #[must_use]
    pub fn offering_count(&self) -> usize {
        self.offerings.len()
    }

    /// Tokens the escrow should hold: the sum of every subscription deposit.
    pub fn total_escrowed(&self) -> Result<TokenAmount> {
        self.offerings
            .values()
            .try_fold(0 as TokenAmount, |acc, o| acc.checked_add(o.total_deposit()?))
            .ok_or(AccrualError::ArithmeticOverflow { context: "escrow total" })
    }

    #[must_use]
    pub fn events(&self) -> &[OfferingEvent] {
        self.journal.events()
    }

    pub fn take_events(&mut self) -> Vec<OfferingEvent> {
        self.journal.take()
    }

    #[must_use]
    pub fn escrow(&self) -> AccountId {
        self.escrow
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // =================================================================
    // Internals
    // =================================================================

    fn lookup(
        offerings: &HashMap<(AccountId, OfferingId), Offering>,
        seller: AccountId,
        offering_id: OfferingId,
    ) -> Result<&Offering> {
        offerings
            .get(&(seller, offering_id))
            .ok_or(AccrualError::OfferingNotFound {
                seller,
                offering_id,
            })
    }

    fn lookup_mut(
        offerings: &mut HashMap<(AccountId, OfferingId), Offering>,
        seller: AccountId,
        offering_id: OfferingId,
    ) -> Result<&mut Offering> {
        offerings
            .get_mut(&(seller, offering_id))
            .ok_or(AccrualError::OfferingNotFound {
                seller,
                offering_id,
            })
    }

    /// Send tokens from escrow to `recipient`. Zero amounts skip the call.
    fn push(&mut self, recipient: AccountId, amount: TokenAmount, operation: &'static str) -> Result<()> {
        if amount == 0 || self.token.transfer(recipient, amount) {
            return Ok(());
        }
        tracing::warn!(recipient = %recipient, amount = %amount, operation, "transfer rejected, rolling back");
        Err(AccrualError::TransferRejected { operation, amount })
    }
}
