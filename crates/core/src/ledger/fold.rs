//! Balance fold: the combination rule of every entry type.
//!
//! A ledger's balance is never stored independently of its history. Every
//! `balance_after` is `apply(balance_after of the previous entry, entry)`,
//! starting from zero for an empty ledger.
//!
//! - cash `opening` resets the balance to the opening float
//! - cash `closing` sets the balance to the counted amount and records the
//!   pre-close balance as `expected_balance`
//! - `income`, `sale` (cash), `purchase` and `production` add
//! - `expense`, `withdrawal`, `usage`, `sale` (stock) and `adjustment`
//!   apply their signed quantity and are rejected if the result would be
//!   negative
//!
//! Sums that leave the decimal range are rejected as overflow rather than
//! wrapping or panicking.

use bodega_shared::types::EntryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{CashEntryType, EntryType, LedgerEntry, StockEntryType};

/// A debit that would drive a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overdraft {
    /// Balance before the debit.
    pub available: Decimal,
    /// Magnitude of the debit.
    pub requested: Decimal,
}

/// Why an entry cannot be folded onto a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldError {
    /// The debit would leave the balance negative.
    Overdraft(Overdraft),
    /// The new balance does not fit a `Decimal`.
    Overflow,
}

/// Outcome of folding one entry onto a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Folded {
    /// Balance after the entry.
    pub balance_after: Decimal,
    /// Pre-close balance, set only for closings.
    pub expected_balance: Option<Decimal>,
}

impl Folded {
    const fn plain(balance_after: Decimal) -> Self {
        Self {
            balance_after,
            expected_balance: None,
        }
    }
}

/// Applies one entry to `previous`.
///
/// # Errors
///
/// Returns [`FoldError::Overdraft`] if a debit would leave the balance
/// negative and [`FoldError::Overflow`] if the sum leaves the decimal range.
pub fn apply(
    previous: Decimal,
    entry_type: EntryType,
    signed_quantity: Decimal,
) -> Result<Folded, FoldError> {
    match entry_type {
        EntryType::Cash(CashEntryType::Opening) => Ok(Folded::plain(signed_quantity)),
        EntryType::Cash(CashEntryType::Closing) => Ok(Folded {
            balance_after: signed_quantity,
            expected_balance: Some(previous),
        }),
        EntryType::Cash(CashEntryType::Income | CashEntryType::Sale)
        | EntryType::Stock(StockEntryType::Purchase | StockEntryType::Production) => {
            let next = previous
                .checked_add(signed_quantity)
                .ok_or(FoldError::Overflow)?;
            Ok(Folded::plain(next))
        }
        EntryType::Cash(CashEntryType::Expense | CashEntryType::Withdrawal)
        | EntryType::Stock(
            StockEntryType::Usage | StockEntryType::Sale | StockEntryType::Adjustment,
        ) => {
            let next = previous
                .checked_add(signed_quantity)
                .ok_or(FoldError::Overflow)?;
            if next < Decimal::ZERO {
                return Err(FoldError::Overdraft(Overdraft {
                    available: previous,
                    requested: -signed_quantity,
                }));
            }
            Ok(Folded::plain(next))
        }
    }
}

/// Re-folds `entries` in place starting from `previous`.
///
/// Overwrites every `balance_after` (and closing `expected_balance`) and
/// returns the final balance. On failure the slice may be partially
/// rewritten, so callers fold a scratch copy.
///
/// # Errors
///
/// Returns the id of the first entry that no longer fits, with the reason.
pub fn refold(
    previous: Decimal,
    entries: &mut [LedgerEntry],
) -> Result<Decimal, (EntryId, FoldError)> {
    let mut balance = previous;
    for entry in entries.iter_mut() {
        let folded = apply(balance, entry.entry_type, entry.signed_quantity)
            .map_err(|err| (entry.entry_id, err))?;
        entry.balance_after = folded.balance_after;
        entry.expected_balance = folded.expected_balance;
        balance = folded.balance_after;
    }
    Ok(balance)
}

/// First entry whose recorded balance disagrees with the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    /// Offending entry.
    pub entry_id: EntryId,
    /// `balance_after` stored on the entry.
    pub recorded: Decimal,
    /// What the fold yields, `None` if the entry cannot be folded.
    pub recomputed: Option<Decimal>,
}

/// Verifies that every entry's `balance_after` equals the fold of its
/// predecessor, returning the final balance.
///
/// # Errors
///
/// Returns the first [`ChainBreak`].
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<Decimal, ChainBreak> {
    entries.iter().try_fold(Decimal::ZERO, |previous, entry| {
        match apply(previous, entry.entry_type, entry.signed_quantity) {
            Ok(folded) if folded.balance_after == entry.balance_after => Ok(folded.balance_after),
            Ok(folded) => Err(ChainBreak {
                entry_id: entry.entry_id,
                recorded: entry.balance_after,
                recomputed: Some(folded.balance_after),
            }),
            Err(_) => Err(ChainBreak {
                entry_id: entry.entry_id,
                recorded: entry.balance_after,
                recomputed: None,
            }),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_shared::types::{LedgerId, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    const OPENING: EntryType = EntryType::Cash(CashEntryType::Opening);
    const CLOSING: EntryType = EntryType::Cash(CashEntryType::Closing);
    const INCOME: EntryType = EntryType::Cash(CashEntryType::Income);
    const EXPENSE: EntryType = EntryType::Cash(CashEntryType::Expense);
    const PURCHASE: EntryType = EntryType::Stock(StockEntryType::Purchase);
    const USAGE: EntryType = EntryType::Stock(StockEntryType::Usage);

    fn entry(id: u64, entry_type: EntryType, signed: Decimal, balance_after: Decimal) -> LedgerEntry {
        LedgerEntry {
            entry_id: EntryId(id),
            ledger_id: LedgerId::from_uuid(uuid::Uuid::nil()),
            entry_type,
            signed_quantity: signed,
            balance_after,
            expected_balance: None,
            reference: None,
            created_at: Utc::now(),
            actor_id: UserId::from_uuid(uuid::Uuid::nil()),
            reason: None,
        }
    }

    #[test]
    fn test_opening_resets_balance() {
        let folded = apply(dec!(500), OPENING, dec!(100)).unwrap();
        assert_eq!(folded.balance_after, dec!(100));
        assert_eq!(folded.expected_balance, None);
    }

    #[test]
    fn test_closing_keeps_counted_amount_and_expected() {
        let folded = apply(dec!(250), CLOSING, dec!(240)).unwrap();
        assert_eq!(folded.balance_after, dec!(240));
        assert_eq!(folded.expected_balance, Some(dec!(250)));
    }

    #[test]
    fn test_expense_cannot_overdraw() {
        let rejected = apply(dec!(100), EXPENSE, dec!(-150)).unwrap_err();
        assert_eq!(
            rejected,
            FoldError::Overdraft(Overdraft {
                available: dec!(100),
                requested: dec!(150),
            })
        );

        let folded = apply(dec!(100), EXPENSE, dec!(-100)).unwrap();
        assert_eq!(folded.balance_after, dec!(0));
    }

    #[test]
    fn test_usage_cannot_go_negative() {
        assert!(apply(dec!(2), USAGE, dec!(-2.5)).is_err());
        assert_eq!(
            apply(dec!(2), PURCHASE, dec!(3)).unwrap().balance_after,
            dec!(5)
        );
    }

    #[test]
    fn test_credit_past_decimal_range_is_overflow() {
        assert_eq!(
            apply(Decimal::MAX, PURCHASE, dec!(1)),
            Err(FoldError::Overflow)
        );
        assert_eq!(
            apply(Decimal::MAX, INCOME, Decimal::MAX),
            Err(FoldError::Overflow)
        );
        assert_eq!(
            apply(Decimal::MAX, USAGE, dec!(-1)).unwrap().balance_after,
            Decimal::MAX - dec!(1)
        );
    }

    #[test]
    fn test_verify_chain_accepts_consistent_ledger() {
        let entries = vec![
            entry(1, OPENING, dec!(100), dec!(100)),
            entry(2, INCOME, dec!(50), dec!(150)),
            entry(3, EXPENSE, dec!(-30), dec!(120)),
        ];
        assert_eq!(verify_chain(&entries), Ok(dec!(120)));
    }

    #[test]
    fn test_verify_chain_reports_first_break() {
        let entries = vec![
            entry(1, OPENING, dec!(100), dec!(100)),
            entry(2, INCOME, dec!(50), dec!(140)),
            entry(3, EXPENSE, dec!(-30), dec!(110)),
        ];
        let broken = verify_chain(&entries).unwrap_err();
        assert_eq!(broken.entry_id, EntryId(2));
        assert_eq!(broken.recomputed, Some(dec!(150)));
    }

    #[test]
    fn test_refold_recomputes_closing_expectation() {
        let mut entries = vec![
            entry(2, INCOME, dec!(80), dec!(0)),
            entry(3, CLOSING, dec!(170), dec!(0)),
        ];
        let final_balance = refold(dec!(100), &mut entries).unwrap();
        assert_eq!(final_balance, dec!(170));
        assert_eq!(entries[0].balance_after, dec!(180));
        assert_eq!(entries[1].expected_balance, Some(dec!(180)));
        assert_eq!(entries[1].difference(), Some(dec!(-10)));
    }

    #[test]
    fn test_refold_stops_at_overdraft() {
        let mut entries = vec![
            entry(2, INCOME, dec!(10), dec!(0)),
            entry(3, EXPENSE, dec!(-200), dec!(0)),
        ];
        let (entry_id, rejected) = refold(dec!(100), &mut entries).unwrap_err();
        assert_eq!(entry_id, EntryId(3));
        assert!(matches!(
            rejected,
            FoldError::Overdraft(overdraft) if overdraft.available == dec!(110)
        ));
    }
}
