//! Randomized operation sequences against the deal ledger.
//!
//! Whatever mix of calls succeeds or fails, the escrow's token balance must
//! equal the sum of deal deposits, every deal's deposit must match its
//! recorded flows, and a seller's finalized balance only shrinks through
//! their own claim.

use std::collections::HashMap;

use accrual_deals::DealLedger;
use accrual_types::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

const SELLERS: usize = 4;
const STEPS: usize = 2_000;

fn run(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let escrow = AccountId::new();
    let buyer = AccountId::new();
    let clock = ManualClock::new(0);
    let mut token = InMemoryTokenLedger::new(escrow);
    token.fund(buyer, 10_000_000);
    let mut ledger = DealLedger::new(escrow, token, clock.clone());

    let sellers: Vec<AccountId> = (0..SELLERS).map(|_| AccountId::new()).collect();
    let mut deals = vec![
        ledger.create_deal(buyer, "seed-a", 60, 5_000).unwrap(),
        ledger.create_deal(buyer, "seed-b", 0, 0).unwrap(),
    ];
    let mut last_accrued: HashMap<(DealId, AccountId), TokenAmount> = HashMap::new();

    for _ in 0..STEPS {
        clock.advance(rng.gen_range(0..900));
        ledger.token_mut().set_failing(rng.gen_bool(0.1));

        let deal = deals[rng.gen_range(0..deals.len())];
        let seller = sellers[rng.gen_range(0..SELLERS)];
        let mut claimed = None;

        match rng.gen_range(0..7) {
            0 => {
                if let Ok(id) = ledger.create_deal(buyer, "extra", rng.gen_range(0..7200), rng.gen_range(0..2_000)) {
                    deals.push(id);
                }
            }
            1 => {
                ledger.register_as_seller(deal, seller).unwrap();
            }
            2 => {
                ledger
                    .set_seller_rate(deal, buyer, seller, rng.gen_range(0..50))
                    .unwrap();
            }
            3 => {
                if ledger.claim(deal, seller).is_ok() {
                    claimed = Some((deal, seller));
                }
            }
            4 => {
                let _ = ledger.deposit_tokens(deal, buyer, rng.gen_range(0..1_000));
            }
            5 => {
                let _ = ledger.buyer_withdraw(deal, buyer, rng.gen_range(0..1_000));
            }
            _ => {
                let to = deals[rng.gen_range(0..deals.len())];
                let _ = ledger.move_deposit(deal, to, buyer, rng.gen_range(0..500));
            }
        }

        ledger.token_mut().set_failing(false);
        let held = ledger.token().balance(escrow);
        let total: TokenAmount = deals
            .iter()
            .map(|id| ledger.deal(*id).unwrap().deposit())
            .sum();
        assert_eq!(held, total, "seed {seed}: escrow drifted from deposits");
        ledger.verify_escrow().unwrap();

        for id in &deals {
            ledger.verify_conservation(*id).unwrap();
            for s in ledger.sellers(*id).unwrap() {
                let now = ledger.seller_account(*id, *s).unwrap().accrued();
                let prev = last_accrued.insert((*id, *s), now).unwrap_or(0);
                if claimed != Some((*id, *s)) {
                    assert!(now >= prev, "seed {seed}: accrued shrank without a claim");
                }
            }
        }
    }
}

#[test]
fn conservation_holds_across_random_sequences() {
    for seed in 0..8 {
        run(seed);
    }
}
