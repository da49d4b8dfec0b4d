//! Scoped multi-ledger transactions.
//!
//! A [`LedgerTxn`] holds the locks of every ledger it touches. Appends are
//! staged against the locked books and only become visible on
//! [`LedgerTxn::commit`]. Dropping the transaction, including through `?`
//! on a failed append, discards every staged entry: there is no
//! compensation logic to write.

use bodega_shared::types::LedgerId;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::error::{LedgerError, LedgerResult};
use super::fold::{self, FoldError, Overdraft};
use super::store::{LedgerBook, LedgerStore, ensure_fits};
use super::types::{EntryReference, Ledger, LedgerEntry, LedgerKind, NewEntry};

/// Maps a fold rejection to the error of the ledger's kind.
pub(crate) fn fold_error(ledger: &Ledger, err: FoldError) -> LedgerError {
    match err {
        FoldError::Overdraft(overdraft) => overdraft_error(ledger, overdraft),
        FoldError::Overflow => LedgerError::Overflow("ledger balance"),
    }
}

fn overdraft_error(ledger: &Ledger, overdraft: Overdraft) -> LedgerError {
    match ledger.kind {
        LedgerKind::Cash => LedgerError::InsufficientFunds {
            ledger_id: ledger.id,
            available: overdraft.available,
            requested: overdraft.requested,
        },
        LedgerKind::Ingredient | LedgerKind::Product => LedgerError::InsufficientStock {
            ledger_id: ledger.id,
            available: overdraft.available,
            requested: overdraft.requested,
        },
    }
}

/// An open transaction over one or more locked ledgers.
pub struct LedgerTxn<'s> {
    store: &'s LedgerStore,
    books: Vec<OwnedMutexGuard<LedgerBook>>,
    staged: Vec<LedgerEntry>,
}

impl<'s> LedgerTxn<'s> {
    pub(crate) fn new(store: &'s LedgerStore, books: Vec<OwnedMutexGuard<LedgerBook>>) -> Self {
        Self {
            store,
            books,
            staged: Vec::new(),
        }
    }

    fn book(&self, ledger_id: LedgerId) -> LedgerResult<&LedgerBook> {
        self.books
            .iter()
            .map(|guard| &**guard)
            .find(|book| book.ledger.id == ledger_id)
            .ok_or_else(|| {
                LedgerError::Internal(format!("ledger {ledger_id} is not locked by this transaction"))
            })
    }

    /// The locked ledger's description.
    pub fn ledger(&self, ledger_id: LedgerId) -> LedgerResult<&Ledger> {
        self.book(ledger_id).map(|book| &book.ledger)
    }

    /// Most recent entry including staged ones.
    pub fn last_entry(&self, ledger_id: LedgerId) -> LedgerResult<Option<&LedgerEntry>> {
        let book = self.book(ledger_id)?;
        Ok(self
            .staged
            .iter()
            .rev()
            .find(|entry| entry.ledger_id == ledger_id)
            .or_else(|| book.last()))
    }

    /// Balance including staged entries.
    pub fn balance(&self, ledger_id: LedgerId) -> LedgerResult<Decimal> {
        Ok(self
            .last_entry(ledger_id)?
            .map_or(Decimal::ZERO, |entry| entry.balance_after))
    }

    /// Validates and stages one entry.
    ///
    /// The entry is folded onto the current (staged) balance; a rejected
    /// entry leaves the transaction unchanged.
    pub fn append(&mut self, entry: NewEntry) -> LedgerResult<LedgerEntry> {
        let ledger = self.ledger(entry.ledger_id)?;
        ensure_fits(ledger, entry.entry_type)?;
        let signed_quantity = entry.entry_type.signed(entry.amount)?;
        let previous = self.balance(entry.ledger_id)?;
        let folded = fold::apply(previous, entry.entry_type, signed_quantity)
            .map_err(|err| fold_error(ledger, err))?;

        let recorded = LedgerEntry {
            entry_id: self.store.next_entry_id(),
            ledger_id: entry.ledger_id,
            entry_type: entry.entry_type,
            signed_quantity,
            balance_after: folded.balance_after,
            expected_balance: folded.expected_balance,
            reference: entry.reference,
            created_at: Utc::now(),
            actor_id: entry.actor_id,
            reason: entry.reason,
        };
        self.staged.push(recorded.clone());
        Ok(recorded)
    }

    /// Committed and staged entries of the locked ledgers booked under
    /// `reference`, in `entry_id` order.
    #[must_use]
    pub fn referencing(&self, reference: EntryReference) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .books
            .iter()
            .flat_map(|book| book.entries.iter())
            .chain(&self.staged)
            .filter(|entry| entry.reference == Some(reference))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.entry_id);
        entries
    }

    /// Entries staged so far, in append order.
    #[must_use]
    pub fn staged(&self) -> &[LedgerEntry] {
        &self.staged
    }

    /// Publishes every staged entry and releases the locks.
    pub fn commit(mut self) -> Vec<LedgerEntry> {
        let staged = std::mem::take(&mut self.staged);
        for entry in &staged {
            if let Some(book) = self
                .books
                .iter_mut()
                .find(|book| book.ledger.id == entry.ledger_id)
            {
                book.entries.push(entry.clone());
            }
            self.store.index_entry(entry);
        }
        debug!(entries = staged.len(), ledgers = self.books.len(), "transaction committed");
        staged
    }

    /// Discards every staged entry and releases the locks.
    pub fn rollback(self) {
        drop(self);
    }
}

impl Drop for LedgerTxn<'_> {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            debug!(discarded = self.staged.len(), "transaction rolled back");
        }
    }
}
