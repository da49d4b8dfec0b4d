//! Cash register service.
//!
//! Every operation locks the register's cash ledger, derives the current
//! status from its last entry, validates the transition and appends in the
//! same transaction. Two concurrent `open` calls therefore cannot both see
//! a closed register.

use std::sync::Arc;

use bodega_shared::types::{Currency, EntryId, EntryRange, LedgerId, StoreId, Unit, UserId};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::state::{
    CloseOutcome, MovementKind, RegisterAction, RegisterState, RegisterStatus, transition,
};
use super::summary::{DailySummary, summarize};
use crate::events::{DiscrepancyAlert, EngineEvent, EventBus};
use crate::ledger::{
    CashEntryType, CorrectionOutcome, EntryType, Ledger, LedgerEntry, LedgerError, LedgerKind,
    LedgerOwner, LedgerResult, LedgerStore, LedgerTxn, NewEntry,
};

/// Default number of entries returned by [`CashRegister::recent_movements`].
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Rejects ledgers that are not cash registers.
fn ensure_register(ledger: &Ledger) -> LedgerResult<()> {
    if ledger.kind == LedgerKind::Cash {
        Ok(())
    } else {
        Err(LedgerError::InvalidInput(format!(
            "ledger {} is a {} ledger, not a cash register",
            ledger.id, ledger.kind
        )))
    }
}

/// Derives the register status inside a transaction holding its lock.
pub(crate) fn status_in(txn: &LedgerTxn<'_>, ledger_id: LedgerId) -> LedgerResult<RegisterStatus> {
    ensure_register(txn.ledger(ledger_id)?)?;
    Ok(RegisterStatus::from_last_entry(txn.last_entry(ledger_id)?))
}

/// Lifecycle and movements of cash registers.
#[derive(Debug, Clone)]
pub struct CashRegister {
    store: Arc<LedgerStore>,
    events: EventBus,
    discrepancy_threshold: Decimal,
}

impl CashRegister {
    /// Creates the service over a shared store.
    ///
    /// Closings whose absolute difference exceeds `discrepancy_threshold`
    /// raise a [`DiscrepancyAlert`].
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, events: EventBus, discrepancy_threshold: Decimal) -> Self {
        Self {
            store,
            events,
            discrepancy_threshold,
        }
    }

    /// Creates the cash ledger of a store's register. It starts closed.
    pub fn create(&self, store_id: StoreId, currency: Currency) -> Ledger {
        self.store
            .create_ledger(LedgerOwner::Register(store_id), Unit::Currency(currency))
    }

    /// Opens a closed register with an initial float.
    #[instrument(skip(self), fields(%ledger_id, %initial_amount))]
    pub async fn open(
        &self,
        ledger_id: LedgerId,
        initial_amount: Decimal,
        actor_id: UserId,
    ) -> LedgerResult<LedgerEntry> {
        let mut txn = self.store.begin([ledger_id]).await?;
        let status = status_in(&txn, ledger_id)?;
        transition(ledger_id, status, RegisterAction::Open)
            .inspect_err(|err| warn!(%err, "open rejected"))?;

        let entry = txn.append(
            NewEntry::new(
                ledger_id,
                EntryType::Cash(CashEntryType::Opening),
                initial_amount,
                actor_id,
            )
            .with_reason("Register opened"),
        )?;
        txn.commit();

        info!(entry_id = %entry.entry_id, "register opened");
        Ok(entry)
    }

    /// Records an income, sale, expense or withdrawal on an open register.
    #[instrument(skip(self, reason), fields(%ledger_id, ?kind, %amount))]
    pub async fn movement(
        &self,
        ledger_id: LedgerId,
        kind: MovementKind,
        amount: Decimal,
        reason: Option<String>,
        actor_id: UserId,
    ) -> LedgerResult<LedgerEntry> {
        let mut txn = self.store.begin([ledger_id]).await?;
        let status = status_in(&txn, ledger_id)?;
        transition(ledger_id, status, RegisterAction::Movement)
            .inspect_err(|err| warn!(%err, "movement rejected"))?;

        let mut new_entry = NewEntry::new(ledger_id, kind.entry_type(), amount, actor_id);
        new_entry.reason = reason;
        let entry = txn
            .append(new_entry)
            .inspect_err(|err| warn!(%err, "movement rejected"))?;
        txn.commit();

        info!(entry_id = %entry.entry_id, balance = %entry.balance_after, "movement recorded");
        Ok(entry)
    }

    /// Closes an open register with the physically counted amount.
    ///
    /// A difference between counted and expected cash is a normal outcome,
    /// not an error; it is reported in the result and, above the threshold,
    /// published as a [`DiscrepancyAlert`].
    #[instrument(skip(self), fields(%ledger_id, %counted))]
    pub async fn close(
        &self,
        ledger_id: LedgerId,
        counted: Decimal,
        actor_id: UserId,
    ) -> LedgerResult<CloseOutcome> {
        let mut txn = self.store.begin([ledger_id]).await?;
        let status = status_in(&txn, ledger_id)?;
        transition(ledger_id, status, RegisterAction::Close)
            .inspect_err(|err| warn!(%err, "close rejected"))?;

        let expected = txn.balance(ledger_id)?;
        let difference = counted - expected;
        let entry = txn.append(
            NewEntry::new(
                ledger_id,
                EntryType::Cash(CashEntryType::Closing),
                counted,
                actor_id,
            )
            .with_reason(format!("Register closed, difference {difference}")),
        )?;
        txn.commit();
        let state = RegisterState::derive(ledger_id, Some(&entry));

        let alert = (difference.abs() > self.discrepancy_threshold).then(|| DiscrepancyAlert {
            ledger_id,
            entry_id: entry.entry_id,
            expected,
            counted,
            difference,
            raised_at: Utc::now(),
        });
        if let Some(alert) = &alert {
            self.events
                .publish(EngineEvent::RegisterDiscrepancy(alert.clone()));
        }

        info!(entry_id = %entry.entry_id, %expected, %difference, "register closed");
        Ok(CloseOutcome {
            entry_id: entry.entry_id,
            expected,
            counted,
            difference,
            alert,
            state,
        })
    }

    /// Current derived state of a register.
    pub async fn state(&self, ledger_id: LedgerId) -> LedgerResult<RegisterState> {
        ensure_register(&self.store.ledger(ledger_id)?)?;
        let last = self.store.last_entry(ledger_id).await?;
        Ok(RegisterState::derive(ledger_id, last.as_ref()))
    }

    /// Most recent entries, latest first.
    ///
    /// Defaults to [`DEFAULT_RECENT_LIMIT`] entries.
    pub async fn recent_movements(
        &self,
        ledger_id: LedgerId,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        ensure_register(&self.store.ledger(ledger_id)?)?;
        let entries = self.store.get_entries(ledger_id, EntryRange::all()).await?;
        Ok(entries
            .into_iter()
            .rev()
            .take(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
            .collect())
    }

    /// Per-type counts and totals of one UTC day.
    pub async fn daily_summary(
        &self,
        ledger_id: LedgerId,
        date: NaiveDate,
    ) -> LedgerResult<DailySummary> {
        ensure_register(&self.store.ledger(ledger_id)?)?;
        let entries = self.store.get_entries(ledger_id, EntryRange::all()).await?;
        summarize(date, &entries)
    }

    /// Corrects the amount and reason of a past movement.
    ///
    /// `amount` is the unsigned magnitude, as for [`Self::movement`].
    /// Openings and closings cannot be corrected.
    pub async fn correct_movement(
        &self,
        entry_id: EntryId,
        amount: Decimal,
        reason: Option<String>,
    ) -> LedgerResult<CorrectionOutcome> {
        let entry = self.store.entry(entry_id).await?;
        ensure_register(&self.store.ledger(entry.ledger_id)?)?;
        if entry.entry_type.is_terminal() {
            return Err(LedgerError::ImmutableEntry(entry_id));
        }
        let signed = entry.entry_type.signed(amount)?;
        self.store.correct_entry(entry_id, signed, reason).await
    }
}
