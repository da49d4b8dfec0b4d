//! Point-in-time correction with cascading recomputation.
//!
//! Correcting an entry rewrites its quantity or reason in place and then
//! re-folds every later entry of the same ledger. The cascade runs on a
//! scratch copy of the tail under the ledger lock; the book is only touched
//! once the whole tail folds cleanly.

use bodega_shared::types::EntryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::error::{LedgerError, LedgerResult};
use super::fold;
use super::store::LedgerStore;
use super::txn::fold_error;
use super::types::LedgerEntry;

/// Result of a committed correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    /// The corrected entry as now stored.
    pub entry: LedgerEntry,
    /// Number of later entries whose balances were recomputed.
    pub recomputed: usize,
    /// Ledger balance before the correction.
    pub previous_balance: Decimal,
    /// Ledger balance after the cascade.
    pub final_balance: Decimal,
}

impl CorrectionOutcome {
    /// Returns true if the correction lowered the ledger's balance.
    #[must_use]
    pub fn lowered_balance(&self) -> bool {
        self.final_balance < self.previous_balance
    }
}

impl LedgerStore {
    /// Corrects a historical entry and re-folds every later entry.
    ///
    /// `new_reason` replaces the stored reason when given. Opening and
    /// closing entries are immutable. Entries booked by a sale or a
    /// production run may only change their reason, since their quantity
    /// is tied to the other ledgers of that operation.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ImmutableEntry`] for terminal entries or quantity
    ///   edits of referenced entries
    /// - [`LedgerError::SignMismatch`] if the quantity has the wrong sign
    /// - [`LedgerError::InsufficientFunds`] / [`LedgerError::InsufficientStock`]
    ///   if any downstream balance would turn negative; nothing is changed
    #[instrument(skip(self, new_reason), fields(entry_id = %entry_id))]
    pub async fn correct_entry(
        &self,
        entry_id: EntryId,
        new_signed_quantity: Decimal,
        new_reason: Option<String>,
    ) -> LedgerResult<CorrectionOutcome> {
        let ledger_id = self.ledger_of_entry(entry_id)?;
        let mut book = self.lock(ledger_id).await?;
        let index = book
            .position(entry_id)
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        let original = &book.entries[index];
        if original.entry_type.is_terminal() {
            return Err(LedgerError::ImmutableEntry(entry_id));
        }
        if original.reference.is_some() && new_signed_quantity != original.signed_quantity {
            return Err(LedgerError::ImmutableEntry(entry_id));
        }
        if !original.entry_type.accepts(new_signed_quantity) {
            return Err(LedgerError::SignMismatch {
                entry_type: original.entry_type,
                quantity: new_signed_quantity,
            });
        }

        let previous = index
            .checked_sub(1)
            .map_or(Decimal::ZERO, |before| book.entries[before].balance_after);
        let mut tail = book.entries[index..].to_vec();
        tail[0].signed_quantity = new_signed_quantity;
        if let Some(reason) = new_reason {
            tail[0].reason = Some(reason);
        }

        let final_balance = match fold::refold(previous, &mut tail) {
            Ok(balance) => balance,
            Err((failed_at, err)) => {
                warn!(%failed_at, ?err, "correction rejected, downstream balance does not fold");
                return Err(fold_error(&book.ledger, err));
            }
        };

        let entry = tail[0].clone();
        let recomputed = tail.len() - 1;
        let previous_balance = book.balance();
        book.entries.truncate(index);
        book.entries.extend(tail);

        info!(%ledger_id, recomputed, %final_balance, "entry corrected");
        Ok(CorrectionOutcome {
            entry,
            recomputed,
            previous_balance,
            final_balance,
        })
    }
}
