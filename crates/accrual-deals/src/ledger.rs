//! The deal ledger: buyer-initiated pools with per-seller accrual.
//!
//! Every operation samples the clock once, settles the accounts it touches
//! up to that instant, and stages its changes on copies. State is written
//! back only after the token ledger accepted every transfer, so a rejected
//! transfer leaves deposits, balances and settlement cursors exactly as
//! they were.

use std::collections::HashMap;

use accrual_types::{
    AccountId, AccrualError, Clock, DealEvent, DealId, EventJournal, LedgerConfig, Result,
    TokenAmount, TokenLedger,
};

use crate::conservation::Conservation;
use crate::deal::{Deal, SellerAccount};

/// In-memory deal ledger backed by an external token ledger.
pub struct DealLedger<T, C> {
    /// Account holding every deal's deposit on the token ledger.
    escrow: AccountId,
    token: T,
    clock: C,
    config: LedgerConfig,
    deals: HashMap<DealId, Deal>,
    next_id: DealId,
    conservation: Conservation,
    journal: EventJournal<DealEvent>,
}

impl<T: TokenLedger, C: Clock> DealLedger<T, C> {
    /// Create a ledger with the default configuration.
    #[must_use]
    pub fn new(escrow: AccountId, token: T, clock: C) -> Self {
        Self {
            escrow,
            token,
            clock,
            config: LedgerConfig::default(),
            deals: HashMap::new(),
            next_id: DealId::FIRST,
            conservation: Conservation::new(),
            journal: EventJournal::new(),
        }
    }

    /// Create a ledger with a validated configuration.
    pub fn with_config(escrow: AccountId, token: T, clock: C, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let mut ledger = Self::new(escrow, token, clock);
        ledger.config = config;
        Ok(ledger)
    }

    // =================================================================
    // Buyer operations
    // =================================================================

    /// Open a new deal owned by `caller`.
    ///
    /// A `cadence_secs` of zero selects the configured default. A non-zero
    /// `initial_deposit` is pulled from the caller first; if that fails no
    /// deal is recorded and no id is consumed.
    pub fn create_deal(
        &mut self,
        caller: AccountId,
        service_identifier: impl Into<String>,
        cadence_secs: u64,
        initial_deposit: TokenAmount,
    ) -> Result<DealId> {
        let service_identifier = service_identifier.into();
        let cadence_secs = if cadence_secs == 0 {
            self.config.default_cadence_secs
        } else {
            cadence_secs
        };

        self.pull(caller, initial_deposit, "create_deal")?;

        let deal_id = self.next_id;
        self.next_id = deal_id.next();
        self.deals.insert(
            deal_id,
            Deal::new(
                deal_id,
                caller,
                service_identifier.clone(),
                cadence_secs,
                initial_deposit,
            ),
        );
        self.conservation.record_deposit(deal_id, initial_deposit);

        tracing::info!(
            deal = %deal_id,
            owner = %caller,
            cadence_secs,
            deposit = %initial_deposit,
            "Deal created"
        );
        self.journal.record(DealEvent::DealCreated {
            deal_id,
            owner: caller,
            service_identifier,
            cadence_secs,
            deposit: initial_deposit,
        });
        Ok(deal_id)
    }

    /// Set `seller`'s per-cadence rate on a deal the caller owns.
    ///
    /// Registers the seller if needed, settles them at their old rate up
    /// to now, then applies `new_rate` from now on.
    pub fn set_seller_rate(
        &mut self,
        deal_id: DealId,
        caller: AccountId,
        seller: AccountId,
        new_rate: TokenAmount,
    ) -> Result<()> {
        let now = self.clock.now();
        let deal = Self::lookup_mut(&mut self.deals, deal_id)?;
        deal.ensure_owner(caller)?;

        let newly_registered = !deal.is_registered(&seller);
        let mut account = deal
            .seller(&seller)
            .copied()
            .unwrap_or_else(|| SellerAccount::registered_at(now));
        let accrued = account.accrual.settle(account.rate, deal.cadence_secs, now)?;
        let old_rate = account.rate;
        account.rate = new_rate;

        if newly_registered {
            deal.seller_order.push(seller);
        }
        deal.sellers.insert(seller, account);

        if newly_registered {
            tracing::info!(deal = %deal_id, seller = %seller, "Seller registered by owner");
            self.journal
                .record(DealEvent::SellerRegistered { deal_id, seller });
        }
        tracing::info!(
            deal = %deal_id,
            seller = %seller,
            old_rate = %old_rate,
            new_rate = %new_rate,
            settled = %accrued,
            "Seller rate set"
        );
        self.journal.record(DealEvent::RateSet {
            deal_id,
            seller,
            old_rate,
            new_rate,
        });
        Ok(())
    }

    /// Add `amount` to a deal's pool.
    pub fn deposit_tokens(
        &mut self,
        deal_id: DealId,
        caller: AccountId,
        amount: TokenAmount,
    ) -> Result<()> {
        let deal = Self::lookup(&self.deals, deal_id)?;
        deal.ensure_owner(caller)?;
        let deposit = deal
            .deposit
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow { context: "deal deposit" })?;

        self.pull(caller, amount, "deposit_tokens")?;

        Self::lookup_mut(&mut self.deals, deal_id)?.deposit = deposit;
        self.conservation.record_deposit(deal_id, amount);

        tracing::info!(deal = %deal_id, amount = %amount, deposit = %deposit, "Buyer deposited");
        self.journal.record(DealEvent::BuyerDeposited {
            deal_id,
            amount,
            deposit,
        });
        Ok(())
    }

    /// Return `amount` of unowed deposit to the deal's owner.
    ///
    /// Settles every registered seller (zero-rate ones included) first and
    /// requires `deposit >= Σ accrued + amount`.
    pub fn buyer_withdraw(
        &mut self,
        deal_id: DealId,
        caller: AccountId,
        amount: TokenAmount,
    ) -> Result<()> {
        let now = self.clock.now();
        let deal = Self::lookup(&self.deals, deal_id)?;
        deal.ensure_owner(caller)?;
        let (settled, owed) = deal.settled_sellers(now)?;
        let deposit = Self::free_after(deal.deposit, owed, amount)?;

        self.push(caller, amount, "buyer_withdraw")?;

        let deal = Self::lookup_mut(&mut self.deals, deal_id)?;
        deal.sellers = settled;
        deal.deposit = deposit;
        self.conservation.record_withdrawal(deal_id, amount);

        tracing::info!(
            deal = %deal_id,
            amount = %amount,
            deposit = %deposit,
            owed = %owed,
            "Buyer withdrew"
        );
        self.journal.record(DealEvent::BuyerWithdrew {
            deal_id,
            amount,
            deposit,
        });
        Ok(())
    }

    /// Shift `amount` of unowed deposit from one of the caller's deals to
    /// another. Purely internal; no tokens move on the token ledger.
    pub fn move_deposit(
        &mut self,
        from: DealId,
        to: DealId,
        caller: AccountId,
        amount: TokenAmount,
    ) -> Result<()> {
        if from == to {
            return Err(AccrualError::InvalidArgument {
                reason: format!("cannot move deposit from {from} to itself"),
            });
        }
        let now = self.clock.now();
        let source = Self::lookup(&self.deals, from)?;
        let target = Self::lookup(&self.deals, to)?;
        source.ensure_owner(caller)?;
        target.ensure_owner(caller)?;

        let (settled, owed) = source.settled_sellers(now)?;
        let source_deposit = Self::free_after(source.deposit, owed, amount)?;
        let target_deposit = target
            .deposit
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow { context: "deal deposit" })?;

        let source = Self::lookup_mut(&mut self.deals, from)?;
        source.sellers = settled;
        source.deposit = source_deposit;
        Self::lookup_mut(&mut self.deals, to)?.deposit = target_deposit;
        self.conservation.record_move(from, to, amount);

        tracing::info!(from = %from, to = %to, amount = %amount, "Deposit moved");
        self.journal
            .record(DealEvent::DepositMoved { from, to, amount });
        Ok(())
    }

    // =================================================================
    // Seller operations
    // =================================================================

    /// Register `caller` as a seller on a deal. Re-registering is a no-op.
    pub fn register_as_seller(&mut self, deal_id: DealId, caller: AccountId) -> Result<()> {
        let now = self.clock.now();
        let deal = Self::lookup_mut(&mut self.deals, deal_id)?;
        if !deal.register(caller, now) {
            tracing::debug!(deal = %deal_id, seller = %caller, "Seller already registered");
            return Ok(());
        }
        tracing::info!(deal = %deal_id, seller = %caller, "Seller registered");
        self.journal.record(DealEvent::SellerRegistered {
            deal_id,
            seller: caller,
        });
        Ok(())
    }

    /// Pay the caller what they are owed, up to the deal's deposit.
    ///
    /// When the pool cannot cover the full amount the seller receives the
    /// whole deposit and the remainder is forfeited: the seller's balance
    /// is reset to zero either way. Returns the amount paid.
    pub fn claim(&mut self, deal_id: DealId, caller: AccountId) -> Result<TokenAmount> {
        let now = self.clock.now();
        let deal = Self::lookup(&self.deals, deal_id)?;
        let mut account =
            deal.seller(&caller)
                .copied()
                .ok_or(AccrualError::SellerNotRegistered {
                    deal_id,
                    seller: caller,
                })?;
        account.accrual.settle(account.rate, deal.cadence_secs, now)?;
        let owed = account.accrual.take();
        let payout = owed.min(deal.deposit);
        let deposit = deal.deposit - payout;

        self.push(caller, payout, "claim")?;

        let deal = Self::lookup_mut(&mut self.deals, deal_id)?;
        deal.sellers.insert(caller, account);
        deal.deposit = deposit;

        if owed == 0 {
            tracing::debug!(deal = %deal_id, seller = %caller, "Nothing to claim");
            return Ok(0);
        }
        self.conservation.record_payout(deal_id, payout);
        if payout < owed {
            tracing::warn!(
                deal = %deal_id,
                seller = %caller,
                owed = %owed,
                paid = %payout,
                forfeited = %(owed - payout),
                "Pool underfunded: unpaid balance forfeited"
            );
        }
        tracing::info!(deal = %deal_id, seller = %caller, amount = %payout, "Seller claimed");
        self.journal.record(DealEvent::SellerClaimed {
            deal_id,
            seller: caller,
            amount: payout,
        });
        Ok(payout)
    }

    // =================================================================
    // Views
    // =================================================================

    #[must_use]
    pub fn deal(&self, deal_id: DealId) -> Option<&Deal> {
        self.deals.get(&deal_id)
    }

    #[must_use]
    pub fn seller_account(&self, deal_id: DealId, seller: AccountId) -> Option<&SellerAccount> {
        self.deals.get(&deal_id)?.seller(&seller)
    }

    /// Registered sellers of a deal in registration order.
    pub fn sellers(&self, deal_id: DealId) -> Result<&[AccountId]> {
        Ok(Self::lookup(&self.deals, deal_id)?.sellers())
    }

    /// What `seller` could claim right now, before the pool clamp.
    pub fn owed(&self, deal_id: DealId, seller: AccountId) -> Result<TokenAmount> {
        let deal = Self::lookup(&self.deals, deal_id)?;
        let account = deal
            .seller(&seller)
            .ok_or(AccrualError::SellerNotRegistered { deal_id, seller })?;
        account
            .accrual
            .owed_at(account.rate, deal.cadence_secs, self.clock.now())
    }

    /// What all sellers of a deal are owed right now.
    pub fn total_owed(&self, deal_id: DealId) -> Result<TokenAmount> {
        Self::lookup(&self.deals, deal_id)?.owed_at(self.clock.now())
    }

    #[must_use]
    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    /// Check a deal's deposit against its recorded token flows.
    pub fn verify_conservation(&self, deal_id: DealId) -> Result<()> {
        let deal = Self::lookup(&self.deals, deal_id)?;
        self.conservation.verify(deal_id, deal.deposit)
    }

    /// Check the sum of every deal's deposit against escrow inflow/outflow.
    pub fn verify_escrow(&self) -> Result<()> {
        let total = self
            .deals
            .values()
            .try_fold(0 as TokenAmount, |acc, d| acc.checked_add(d.deposit))
            .ok_or(AccrualError::ArithmeticOverflow { context: "escrow total" })?;
        self.conservation.verify_escrow(total)
    }

    #[must_use]
    pub fn conservation(&self) -> &Conservation {
        &self.conservation
    }

    #[must_use]
    pub fn events(&self) -> &[DealEvent] {
        self.journal.events()
    }

    pub fn take_events(&mut self) -> Vec<DealEvent> {
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

    fn lookup(deals: &HashMap<DealId, Deal>, deal_id: DealId) -> Result<&Deal> {
        deals.get(&deal_id).ok_or(AccrualError::DealNotFound(deal_id))
    }

    fn lookup_mut(deals: &mut HashMap<DealId, Deal>, deal_id: DealId) -> Result<&mut Deal> {
        deals
            .get_mut(&deal_id)
            .ok_or(AccrualError::DealNotFound(deal_id))
    }

    /// Deposit left after taking `amount` out, provided `owed` stays covered.
    fn free_after(deposit: TokenAmount, owed: TokenAmount, amount: TokenAmount) -> Result<TokenAmount> {
        let needed = owed
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow { context: "withdrawal" })?;
        if deposit < needed {
            return Err(AccrualError::InsufficientFunds {
                needed,
                available: deposit,
            });
        }
        Ok(deposit - amount)
    }

    /// Pull tokens from `owner` into escrow. Zero amounts skip the call.
    fn pull(&mut self, owner: AccountId, amount: TokenAmount, operation: &'static str) -> Result<()> {
        if amount == 0 || self.token.transfer_from(owner, self.escrow, amount) {
            return Ok(());
        }
        tracing::warn!(owner = %owner, amount = %amount, operation, "transfer_from rejected, rolling back");
        Err(AccrualError::TransferRejected { operation, amount })
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
