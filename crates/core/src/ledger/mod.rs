//! Append-only ledgers with derived balances.
//!
//! This module implements the core ledger functionality:
//! - Ledger and entry domain types with closed entry-type variants
//! - The pure balance fold and chain verification
//! - The in-process entry store with per-ledger locking
//! - Scoped multi-ledger transactions (commit or discard, never partial)
//! - Point-in-time correction with cascading recomputation
//! - Error types for ledger operations

pub mod correction;
pub mod error;
pub mod fold;
pub mod store;
pub mod txn;
pub mod types;

#[cfg(test)]
mod correction_props;
#[cfg(test)]
mod fold_props;

pub use correction::CorrectionOutcome;
pub use error::{LedgerError, LedgerResult, Shortage};
pub use fold::{ChainBreak, FoldError, Folded, Overdraft, apply, refold, verify_chain};
pub use store::LedgerStore;
pub use txn::LedgerTxn;
pub use types::{
    CashEntryType, EntryReference, EntryType, Ledger, LedgerEntry, LedgerKind, LedgerOwner,
    NewEntry, StockEntryType,
};
