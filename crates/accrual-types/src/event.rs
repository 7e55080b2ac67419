//! Notifications emitted by the ledgers.
//!
//! Events are observational only: the ledgers never read them back. They
//! are appended to an [`EventJournal`] once an operation has committed, so
//! a rolled-back operation leaves no trace in the journal.

use serde::{Deserialize, Serialize};

use crate::{AccountId, DealId, OfferingId, TokenAmount};

/// Notifications from the buyer-initiated deal ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealEvent {
    DealCreated {
        deal_id: DealId,
        owner: AccountId,
        service_identifier: String,
        cadence_secs: u64,
        deposit: TokenAmount,
    },
    SellerRegistered {
        deal_id: DealId,
        seller: AccountId,
    },
    RateSet {
        deal_id: DealId,
        seller: AccountId,
        old_rate: TokenAmount,
        new_rate: TokenAmount,
    },
    SellerClaimed {
        deal_id: DealId,
        seller: AccountId,
        amount: TokenAmount,
    },
    BuyerDeposited {
        deal_id: DealId,
        amount: TokenAmount,
        deposit: TokenAmount,
    },
    BuyerWithdrew {
        deal_id: DealId,
        amount: TokenAmount,
        deposit: TokenAmount,
    },
    DepositMoved {
        from: DealId,
        to: DealId,
        amount: TokenAmount,
    },
}

/// Notifications from the seller-initiated offering ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingEvent {
    OfferingCreated {
        seller: AccountId,
        offering_id: OfferingId,
        rate: TokenAmount,
    },
    OfferingUpdated {
        seller: AccountId,
        offering_id: OfferingId,
        old_rate: TokenAmount,
        new_rate: TokenAmount,
    },
    Subscribed {
        seller: AccountId,
        offering_id: OfferingId,
        buyer: AccountId,
        amount: TokenAmount,
        deposit: TokenAmount,
        locked_rate: TokenAmount,
    },
    SellerClaimed {
        seller: AccountId,
        offering_id: OfferingId,
        amount: TokenAmount,
    },
    BuyerWithdrew {
        seller: AccountId,
        offering_id: OfferingId,
        buyer: AccountId,
        amount: TokenAmount,
    },
}

/// Append-only record of committed notifications.
#[derive(Debug, Clone)]
pub struct EventJournal<E> {
    events: Vec<E>,
}

impl<E> EventJournal<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: E) {
        self.events.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Hand over everything recorded so far, leaving the journal empty.
    pub fn take(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<E> Default for EventJournal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_take_drains() {
        let mut journal = EventJournal::new();
        journal.record(DealEvent::SellerRegistered {
            deal_id: DealId(1),
            seller: AccountId::new(),
        });
        assert_eq!(journal.len(), 1);
        let drained = journal.take();
        assert_eq!(drained.len(), 1);
        assert!(journal.is_empty());
    }

    #[test]
    fn deal_event_json_is_keyed_by_name() {
        let event = DealEvent::DepositMoved {
            from: DealId(1),
            to: DealId(2),
            amount: 25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["deposit_moved"]["amount"], 25);
    }

    #[test]
    fn offering_event_serde_roundtrip() {
        let event = OfferingEvent::Subscribed {
            seller: AccountId::new(),
            offering_id: OfferingId::from_name("relay").unwrap(),
            buyer: AccountId::new(),
            amount: 10,
            deposit: 30,
            locked_rate: 4,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: OfferingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
