//! Per-day register summaries.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{CashEntryType, EntryType, LedgerEntry, LedgerError, LedgerResult};

const CASH_TYPES: [CashEntryType; 6] = [
    CashEntryType::Opening,
    CashEntryType::Closing,
    CashEntryType::Income,
    CashEntryType::Sale,
    CashEntryType::Expense,
    CashEntryType::Withdrawal,
];

/// Count and total of one entry type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTotal {
    /// The cash entry type.
    pub entry_type: CashEntryType,
    /// Number of entries.
    pub count: usize,
    /// Sum of the entries' unsigned amounts.
    pub total: Decimal,
}

/// What happened on a register during one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    /// The summarized date.
    pub date: NaiveDate,
    /// Totals per entry type, only for types that occurred.
    pub by_type: Vec<TypeTotal>,
    /// Float of the first opening of the day.
    pub opening_amount: Option<Decimal>,
    /// Counted amount of the last closing of the day.
    pub closing_amount: Option<Decimal>,
    /// Sum of signed income, sale, expense and withdrawal quantities.
    pub net_change: Decimal,
    /// Number of entries of the day.
    pub movement_count: usize,
    /// Whether the day ended with a closing.
    pub is_closed: bool,
}

impl DailySummary {
    /// Total for one entry type, zero if it did not occur.
    #[must_use]
    pub fn total(&self, entry_type: CashEntryType) -> Decimal {
        self.by_type
            .iter()
            .find(|t| t.entry_type == entry_type)
            .map_or(Decimal::ZERO, |t| t.total)
    }
}

/// Summarizes the entries of `date` from a cash ledger history.
///
/// # Errors
///
/// Returns [`LedgerError::Overflow`] if a total leaves the decimal range.
pub fn summarize(date: NaiveDate, entries: &[LedgerEntry]) -> LedgerResult<DailySummary> {
    let day: Vec<(CashEntryType, &LedgerEntry)> = entries
        .iter()
        .filter(|entry| entry.created_at.date_naive() == date)
        .filter_map(|entry| match entry.entry_type {
            EntryType::Cash(cash) => Some((cash, entry)),
            EntryType::Stock(_) => None,
        })
        .collect();

    let mut by_type = Vec::new();
    for entry_type in CASH_TYPES {
        let amounts: Vec<Decimal> = day
            .iter()
            .filter(|(cash, _)| *cash == entry_type)
            .map(|(_, entry)| entry.signed_quantity.abs())
            .collect();
        if !amounts.is_empty() {
            by_type.push(TypeTotal {
                entry_type,
                count: amounts.len(),
                total: checked_sum(amounts)?,
            });
        }
    }

    let net_change = checked_sum(
        day.iter()
            .filter(|(cash, _)| !matches!(cash, CashEntryType::Opening | CashEntryType::Closing))
            .map(|(_, entry)| entry.signed_quantity),
    )?;

    Ok(DailySummary {
        date,
        by_type,
        opening_amount: day
            .iter()
            .find(|(cash, _)| *cash == CashEntryType::Opening)
            .map(|(_, entry)| entry.signed_quantity),
        closing_amount: day
            .iter()
            .rev()
            .find(|(cash, _)| *cash == CashEntryType::Closing)
            .map(|(_, entry)| entry.signed_quantity),
        net_change,
        movement_count: day.len(),
        is_closed: day
            .last()
            .is_some_and(|(cash, _)| *cash == CashEntryType::Closing),
    })
}

fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> LedgerResult<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(LedgerError::Overflow("register summary"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_shared::types::{EntryId, LedgerId, UserId};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn entry(id: u64, day: u32, entry_type: CashEntryType, signed: Decimal) -> LedgerEntry {
        LedgerEntry {
            entry_id: EntryId(id),
            ledger_id: LedgerId::from_uuid(uuid::Uuid::nil()),
            entry_type: EntryType::Cash(entry_type),
            signed_quantity: signed,
            balance_after: Decimal::ZERO,
            expected_balance: None,
            reference: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            actor_id: UserId::from_uuid(uuid::Uuid::nil()),
            reason: None,
        }
    }

    #[test]
    fn test_summary_groups_one_day() {
        let entries = vec![
            entry(1, 9, CashEntryType::Opening, dec!(50)),
            entry(2, 9, CashEntryType::Closing, dec!(50)),
            entry(3, 10, CashEntryType::Opening, dec!(100)),
            entry(4, 10, CashEntryType::Sale, dec!(30)),
            entry(5, 10, CashEntryType::Sale, dec!(20)),
            entry(6, 10, CashEntryType::Expense, dec!(-15)),
            entry(7, 10, CashEntryType::Closing, dec!(135)),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let summary = summarize(date, &entries).unwrap();

        assert_eq!(summary.movement_count, 5);
        assert_eq!(summary.opening_amount, Some(dec!(100)));
        assert_eq!(summary.closing_amount, Some(dec!(135)));
        assert_eq!(summary.total(CashEntryType::Sale), dec!(50));
        assert_eq!(summary.total(CashEntryType::Expense), dec!(15));
        assert_eq!(summary.total(CashEntryType::Withdrawal), dec!(0));
        assert_eq!(summary.net_change, dec!(35));
        assert!(summary.is_closed);
        assert_eq!(summary.by_type.len(), 4);
    }

    #[test]
    fn test_summary_of_quiet_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
        let summary = summarize(date, &[entry(1, 10, CashEntryType::Opening, dec!(1))]).unwrap();
        assert_eq!(summary.movement_count, 0);
        assert!(summary.by_type.is_empty());
        assert!(!summary.is_closed);
    }

    #[test]
    fn test_summary_total_overflow() {
        let entries = vec![
            entry(1, 10, CashEntryType::Opening, Decimal::MAX),
            entry(2, 10, CashEntryType::Closing, dec!(0)),
            entry(3, 10, CashEntryType::Opening, Decimal::MAX),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(matches!(
            summarize(date, &entries),
            Err(LedgerError::Overflow(_))
        ));
    }
}
