//! In-process ledger entry store.
//!
//! Each ledger lives in its own `tokio::sync::Mutex`, so writers to one
//! ledger are serialized while unrelated ledgers proceed in parallel.
//! Entries are only ever pushed by a committed [`LedgerTxn`] or rewritten
//! by a committed correction, which keeps the cached balance (the last
//! entry's `balance_after`) equal to the fold of the history.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bodega_shared::types::{EntryId, EntryRange, LedgerId, Unit};
use dashmap::DashMap;
use futures::stream::{self, Stream, TryStreamExt};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use super::error::{LedgerError, LedgerResult};
use super::fold::{ChainBreak, verify_chain};
use super::txn::LedgerTxn;
use super::types::{EntryReference, EntryType, Ledger, LedgerEntry, LedgerOwner, NewEntry};

/// Default time to wait for a ledger lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// A ledger together with its ordered entries.
#[derive(Debug)]
pub(crate) struct LedgerBook {
    pub(crate) ledger: Ledger,
    pub(crate) entries: Vec<LedgerEntry>,
}

impl LedgerBook {
    /// Cached fold result: the last entry's balance, zero if empty.
    pub(crate) fn balance(&self) -> Decimal {
        self.entries
            .last()
            .map_or(Decimal::ZERO, |entry| entry.balance_after)
    }

    pub(crate) fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub(crate) fn position(&self, entry_id: EntryId) -> Option<usize> {
        self.entries
            .binary_search_by_key(&entry_id, |entry| entry.entry_id)
            .ok()
    }

    fn slice(&self, range: EntryRange) -> Vec<LedgerEntry> {
        let start = range.from.map_or(0, |from| {
            self.entries.partition_point(|entry| entry.entry_id < from)
        });
        let end = range
            .limit
            .map_or(self.entries.len(), |limit| {
                start.saturating_add(limit).min(self.entries.len())
            });
        self.entries[start..end].to_vec()
    }
}

/// Append-only store of ledgers and their entries.
#[derive(Debug)]
pub struct LedgerStore {
    ledgers: DashMap<LedgerId, Ledger>,
    books: DashMap<LedgerId, Arc<Mutex<LedgerBook>>>,
    entry_index: DashMap<EntryId, LedgerId>,
    reference_index: DashMap<EntryReference, Vec<LedgerId>>,
    next_entry_id: AtomicU64,
    lock_timeout: Duration,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LedgerStore {
    /// Creates an empty store whose operations give up on a ledger lock
    /// after `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            ledgers: DashMap::new(),
            books: DashMap::new(),
            entry_index: DashMap::new(),
            reference_index: DashMap::new(),
            next_entry_id: AtomicU64::new(1),
            lock_timeout,
        }
    }

    /// Creates a new, empty ledger for `owner`.
    pub fn create_ledger(&self, owner: LedgerOwner, unit: Unit) -> Ledger {
        let ledger = Ledger::new(owner, unit);
        self.ledgers.insert(ledger.id, ledger.clone());
        self.books.insert(
            ledger.id,
            Arc::new(Mutex::new(LedgerBook {
                ledger: ledger.clone(),
                entries: Vec::new(),
            })),
        );
        debug!(ledger_id = %ledger.id, kind = %ledger.kind, "ledger created");
        ledger
    }

    /// Returns the immutable description of a ledger.
    pub fn ledger(&self, ledger_id: LedgerId) -> LedgerResult<Ledger> {
        self.ledgers
            .get(&ledger_id)
            .map(|ledger| ledger.value().clone())
            .ok_or(LedgerError::LedgerNotFound(ledger_id))
    }

    /// Returns the ledger an entry belongs to.
    pub fn ledger_of_entry(&self, entry_id: EntryId) -> LedgerResult<LedgerId> {
        self.entry_index
            .get(&entry_id)
            .map(|ledger_id| *ledger_id.value())
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// Appends one entry as its own transaction.
    ///
    /// The fold check and the append happen under the ledger lock, so a
    /// rejected entry is never recorded.
    #[instrument(skip(self, entry), fields(ledger_id = %entry.ledger_id, entry_type = %entry.entry_type))]
    pub async fn append(&self, entry: NewEntry) -> LedgerResult<LedgerEntry> {
        let mut txn = self.begin([entry.ledger_id]).await?;
        let recorded = txn.append(entry)?;
        txn.commit();
        Ok(recorded)
    }

    /// Locks `ledger_ids` in the global lock order and opens a transaction.
    ///
    /// Duplicate ids are locked once. Locks are released when the
    /// transaction is committed or dropped.
    pub async fn begin(
        &self,
        ledger_ids: impl IntoIterator<Item = LedgerId>,
    ) -> LedgerResult<LedgerTxn<'_>> {
        let mut ledgers = ledger_ids
            .into_iter()
            .map(|ledger_id| self.ledger(ledger_id))
            .collect::<LedgerResult<Vec<_>>>()?;
        ledgers.sort_by_key(Ledger::lock_key);
        ledgers.dedup_by_key(|ledger| ledger.id);

        let mut guards = Vec::with_capacity(ledgers.len());
        for ledger in &ledgers {
            guards.push(self.lock(ledger.id).await?);
        }
        Ok(LedgerTxn::new(self, guards))
    }

    /// Returns entries of a ledger in ascending `entry_id` order.
    pub async fn get_entries(
        &self,
        ledger_id: LedgerId,
        range: EntryRange,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let book = self.lock(ledger_id).await?;
        Ok(book.slice(range))
    }

    /// Streams a whole ledger page by page.
    ///
    /// Every page is read under the ledger lock; the stream can be
    /// restarted at any point with [`EntryRange::after`].
    pub fn stream_entries(
        &self,
        ledger_id: LedgerId,
        page_size: usize,
    ) -> impl Stream<Item = LedgerResult<LedgerEntry>> + '_ {
        let page_size = page_size.max(1);
        stream::try_unfold(
            Some(EntryRange::all().with_limit(page_size)),
            move |range| async move {
                let Some(range) = range else {
                    return Ok(None);
                };
                let page = self.get_entries(ledger_id, range).await?;
                let next = match page.last() {
                    Some(last) if page.len() == page_size => {
                        Some(EntryRange::after(last.entry_id, page_size))
                    }
                    _ => None,
                };
                Ok::<_, LedgerError>(Some((
                    stream::iter(page.into_iter().map(Ok::<_, LedgerError>)),
                    next,
                )))
            },
        )
        .try_flatten()
    }

    /// Balance after the most recent entry, zero for an empty ledger.
    pub async fn current_balance(&self, ledger_id: LedgerId) -> LedgerResult<Decimal> {
        Ok(self.lock(ledger_id).await?.balance())
    }

    /// The most recent entry of a ledger, if any.
    pub async fn last_entry(&self, ledger_id: LedgerId) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.lock(ledger_id).await?.last().cloned())
    }

    /// `balance_after` of a specific entry.
    pub async fn balance_as_of(
        &self,
        ledger_id: LedgerId,
        entry_id: EntryId,
    ) -> LedgerResult<Decimal> {
        let book = self.lock(ledger_id).await?;
        book.position(entry_id)
            .map(|index| book.entries[index].balance_after)
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// Returns a single entry by id.
    pub async fn entry(&self, entry_id: EntryId) -> LedgerResult<LedgerEntry> {
        let ledger_id = self.ledger_of_entry(entry_id)?;
        let book = self.lock(ledger_id).await?;
        book.position(entry_id)
            .map(|index| book.entries[index].clone())
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// Number of entries recorded on a ledger.
    pub async fn entry_count(&self, ledger_id: LedgerId) -> LedgerResult<usize> {
        Ok(self.lock(ledger_id).await?.entries.len())
    }

    /// Ledgers holding at least one entry booked under `reference`.
    #[must_use]
    pub fn ledgers_referencing(&self, reference: EntryReference) -> Vec<LedgerId> {
        self.reference_index
            .get(&reference)
            .map(|ledgers| ledgers.value().clone())
            .unwrap_or_default()
    }

    /// Every entry booked under `reference`, in `entry_id` order.
    ///
    /// The involved ledgers are locked together, so the result is a
    /// consistent snapshot of the operation.
    pub async fn entries_by_reference(
        &self,
        reference: EntryReference,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let txn = self.begin(self.ledgers_referencing(reference)).await?;
        Ok(txn.referencing(reference))
    }

    /// Re-folds a ledger's history and checks it against the recorded balances.
    ///
    /// Returns `Ok(Err(break))` when the history is inconsistent, so lookup
    /// and lock failures stay distinct from a broken chain.
    pub async fn verify(&self, ledger_id: LedgerId) -> LedgerResult<Result<Decimal, ChainBreak>> {
        let book = self.lock(ledger_id).await?;
        Ok(verify_chain(&book.entries))
    }

    pub(crate) async fn lock(&self, ledger_id: LedgerId) -> LedgerResult<OwnedMutexGuard<LedgerBook>> {
        let book = self
            .books
            .get(&ledger_id)
            .map(|book| Arc::clone(book.value()))
            .ok_or(LedgerError::LedgerNotFound(ledger_id))?;
        tokio::time::timeout(self.lock_timeout, book.lock_owned())
            .await
            .map_err(|_| LedgerError::LockTimeout(ledger_id))
    }

    pub(crate) fn next_entry_id(&self) -> EntryId {
        EntryId(self.next_entry_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn index_entry(&self, entry: &LedgerEntry) {
        self.entry_index.insert(entry.entry_id, entry.ledger_id);
        if let Some(reference) = entry.reference {
            let mut ledgers = self.reference_index.entry(reference).or_default();
            if !ledgers.contains(&entry.ledger_id) {
                ledgers.push(entry.ledger_id);
            }
        }
    }
}

/// Checks that `entry_type` may be written to `ledger`.
pub(crate) fn ensure_fits(ledger: &Ledger, entry_type: EntryType) -> LedgerResult<()> {
    if entry_type.fits(ledger.kind) {
        Ok(())
    } else {
        Err(LedgerError::EntryTypeMismatch {
            ledger_id: ledger.id,
            kind: ledger.kind,
            entry_type,
        })
    }
}
