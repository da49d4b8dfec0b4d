//! Property-based tests for the correction cascade.
//!
//! Correcting an early entry and re-folding the ledger yields the same
//! final balance as appending the equivalent compensating entry at the end.

use proptest::prelude::*;
use rust_decimal::Decimal;

use bodega_shared::types::{Currency, EntryId, EntryRange, LedgerId, StoreId, Unit, UserId};

use super::fold::verify_chain;
use super::store::LedgerStore;
use super::types::{CashEntryType, EntryType, LedgerOwner, NewEntry};

/// Strategy to generate positive amounts (0.01 to 1,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

async fn seeded_register(
    store: &LedgerStore,
    opening: Decimal,
    incomes: &[Decimal],
) -> (LedgerId, Vec<EntryId>) {
    let actor = UserId::new();
    let ledger = store.create_ledger(
        LedgerOwner::Register(StoreId::new()),
        Unit::Currency(Currency::Ars),
    );
    store
        .append(NewEntry::new(ledger.id, EntryType::Cash(CashEntryType::Opening), opening, actor))
        .await
        .unwrap();
    let mut ids = Vec::new();
    for amount in incomes {
        let entry = store
            .append(NewEntry::new(ledger.id, EntryType::Cash(CashEntryType::Income), *amount, actor))
            .await
            .unwrap();
        ids.push(entry.entry_id);
    }
    (ledger.id, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// *For any* income-only history, correcting income `k` to a new
    /// amount ends at the same balance as booking the difference at the
    /// end of an identical ledger.
    #[test]
    fn prop_correction_matches_compensating_entry(
        opening in positive_amount(),
        incomes in prop::collection::vec(positive_amount(), 1..20),
        pick in any::<prop::sample::Index>(),
        corrected in positive_amount(),
    ) {
        let k = pick.index(incomes.len());
        let (corrected_balance, compensated_balance, chain) = runtime().block_on(async {
            let store = LedgerStore::default();

            let (fixed, ids) = seeded_register(&store, opening, &incomes).await;
            let outcome = store.correct_entry(ids[k], corrected, None).await.unwrap();

            let (compensated, _) = seeded_register(&store, opening, &incomes).await;
            let delta = corrected - incomes[k];
            if !delta.is_zero() {
                let entry_type = if delta > Decimal::ZERO {
                    CashEntryType::Income
                } else {
                    CashEntryType::Expense
                };
                store
                    .append(NewEntry::new(
                        compensated,
                        EntryType::Cash(entry_type),
                        delta.abs(),
                        UserId::new(),
                    ))
                    .await
                    .unwrap();
            }

            (
                outcome.final_balance,
                store.current_balance(compensated).await.unwrap(),
                store.get_entries(fixed, EntryRange::all()).await.unwrap(),
            )
        });

        prop_assert_eq!(corrected_balance, compensated_balance);
        prop_assert_eq!(verify_chain(&chain), Ok(corrected_balance));
    }
}
