//! Range queries over ordered ledger entries.

use serde::{Deserialize, Serialize};

use super::id::EntryId;

/// Request parameters for reading a slice of a ledger.
///
/// Entries are always returned in ascending `entry_id` order. Reads are
/// restartable: feeding the last seen id back as `after` continues where
/// the previous page stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRange {
    /// Only entries with an id greater than or equal to this one.
    #[serde(default)]
    pub from: Option<EntryId>,
    /// Maximum number of entries to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EntryRange {
    /// The whole ledger.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            from: None,
            limit: None,
        }
    }

    /// Entries starting at `from` (inclusive).
    #[must_use]
    pub const fn starting_at(from: EntryId) -> Self {
        Self {
            from: Some(from),
            limit: None,
        }
    }

    /// Caps the number of returned entries.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Range that continues right after `last`.
    #[must_use]
    pub const fn after(last: EntryId, limit: usize) -> Self {
        Self {
            from: Some(EntryId(last.0 + 1)),
            limit: Some(limit),
        }
    }

    /// Returns true if `id` falls inside the lower bound of the range.
    #[must_use]
    pub fn admits(&self, id: EntryId) -> bool {
        self.from.is_none_or(|from| id >= from)
    }
}
