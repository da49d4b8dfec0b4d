//! Property-based tests for the balance fold.
//!
//! - Fold consistency: every recorded `balance_after` equals the fold of
//!   its predecessor, and the last one equals the stored current balance.
//! - Non-negativity: no sequence of accepted appends leaves a balance
//!   below zero.

use proptest::prelude::*;
use rust_decimal::Decimal;

use bodega_shared::types::{Currency, EntryRange, StoreId, Unit, UserId};

use super::error::LedgerError;
use super::fold::{FoldError, apply, verify_chain};
use super::store::LedgerStore;
use super::types::{CashEntryType, EntryType, LedgerOwner, NewEntry};

/// Strategy to generate positive amounts (0.01 to 5,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..500_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate register movements.
fn movement() -> impl Strategy<Value = (CashEntryType, Decimal)> {
    (
        prop_oneof![
            Just(CashEntryType::Income),
            Just(CashEntryType::Sale),
            Just(CashEntryType::Expense),
            Just(CashEntryType::Withdrawal),
        ],
        positive_amount(),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// *For any* sequence of appends, accepted or rejected, the stored
    /// chain re-folds to the stored current balance.
    #[test]
    fn prop_fold_consistency(
        opening in positive_amount(),
        movements in prop::collection::vec(movement(), 0..40),
    ) {
        let (entries, balance) = runtime().block_on(async {
            let store = LedgerStore::default();
            let ledger = store.create_ledger(
                LedgerOwner::Register(StoreId::new()),
                Unit::Currency(Currency::Ars),
            );
            let actor = UserId::new();
            store
                .append(NewEntry::new(ledger.id, EntryType::Cash(CashEntryType::Opening), opening, actor))
                .await
                .unwrap();
            for (entry_type, amount) in movements {
                let result = store
                    .append(NewEntry::new(ledger.id, EntryType::Cash(entry_type), amount, actor))
                    .await;
                if let Err(err) = result {
                    assert!(matches!(err, LedgerError::InsufficientFunds { .. }), "{err}");
                }
            }
            (
                store.get_entries(ledger.id, EntryRange::all()).await.unwrap(),
                store.current_balance(ledger.id).await.unwrap(),
            )
        });

        prop_assert_eq!(verify_chain(&entries), Ok(balance));
        prop_assert!(entries.iter().all(|e| e.balance_after >= Decimal::ZERO));
        prop_assert!(entries.windows(2).all(|w| w[0].entry_id < w[1].entry_id));
    }

    /// *For any* balance and debit, `apply` either rejects the debit or
    /// yields a non-negative balance.
    #[test]
    fn prop_debits_never_overdraw(
        balance in positive_amount(),
        debit in positive_amount(),
    ) {
        match apply(balance, EntryType::Cash(CashEntryType::Expense), -debit) {
            Ok(folded) => {
                prop_assert!(debit <= balance);
                prop_assert_eq!(folded.balance_after, balance - debit);
            }
            Err(FoldError::Overdraft(overdraft)) => {
                prop_assert!(debit > balance);
                prop_assert_eq!(overdraft.available, balance);
                prop_assert_eq!(overdraft.requested, debit);
            }
            Err(FoldError::Overflow) => prop_assert!(false, "debit overflowed"),
        }
    }
}
