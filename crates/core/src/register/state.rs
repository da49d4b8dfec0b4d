//! Register lifecycle state machine.
//!
//! The state of a register is never stored. It is derived from the most
//! recent entry of its cash ledger: a register is open iff that entry
//! exists and is not a closing. The valid transitions are:
//! - Closed → Open (open)
//! - Open → Open (movement)
//! - Open → Closed (close)

use bodega_shared::types::{EntryId, LedgerId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::events::DiscrepancyAlert;
use crate::ledger::{CashEntryType, EntryType, LedgerEntry, LedgerError, LedgerResult};

/// Whether a register currently accepts movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterStatus {
    /// No opening since the last closing (or never opened).
    Closed,
    /// Opened and not yet closed.
    Open,
}

impl RegisterStatus {
    /// Derives the status from the most recent entry of a cash ledger.
    #[must_use]
    pub fn from_last_entry(last: Option<&LedgerEntry>) -> Self {
        match last {
            Some(entry) if entry.entry_type != EntryType::Cash(CashEntryType::Closing) => {
                Self::Open
            }
            _ => Self::Closed,
        }
    }

    /// Returns true if the register accepts movements.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}

impl std::fmt::Display for RegisterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation requested on a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAction {
    /// Start a session with an initial float.
    Open,
    /// Any income, sale, expense or withdrawal.
    Movement,
    /// End the session with a counted amount.
    Close,
}

/// Validates `action` against `status` and returns the resulting status.
///
/// # Errors
///
/// - [`LedgerError::AlreadyOpen`] when opening an open register
/// - [`LedgerError::RegisterClosed`] for a movement or close on a closed register
pub fn transition(
    ledger_id: LedgerId,
    status: RegisterStatus,
    action: RegisterAction,
) -> LedgerResult<RegisterStatus> {
    match (status, action) {
        (RegisterStatus::Closed, RegisterAction::Open) => Ok(RegisterStatus::Open),
        (RegisterStatus::Open, RegisterAction::Open) => Err(LedgerError::AlreadyOpen(ledger_id)),
        (RegisterStatus::Open, RegisterAction::Movement) => Ok(RegisterStatus::Open),
        (RegisterStatus::Open, RegisterAction::Close) => Ok(RegisterStatus::Closed),
        (RegisterStatus::Closed, RegisterAction::Movement | RegisterAction::Close) => {
            Err(LedgerError::RegisterClosed(ledger_id))
        }
    }
}

/// Movement kinds accepted while a register is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Money put into the register.
    Income,
    /// Cash received for a sale.
    Sale,
    /// Money paid out of the register.
    Expense,
    /// Money taken out of the register.
    Withdrawal,
}

impl MovementKind {
    /// The cash entry type recorded for this movement.
    #[must_use]
    pub const fn entry_type(self) -> EntryType {
        EntryType::Cash(match self {
            Self::Income => CashEntryType::Income,
            Self::Sale => CashEntryType::Sale,
            Self::Expense => CashEntryType::Expense,
            Self::Withdrawal => CashEntryType::Withdrawal,
        })
    }

    /// Parses a movement kind from its name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "sale" => Some(Self::Sale),
            "expense" => Some(Self::Expense),
            "withdrawal" => Some(Self::Withdrawal),
            _ => None,
        }
    }
}

/// Derived view of a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterState {
    /// The cash ledger.
    pub ledger_id: LedgerId,
    /// Open or closed.
    pub status: RegisterStatus,
    /// Shorthand for `status == Open`.
    pub is_open: bool,
    /// Balance after the most recent entry.
    pub current_balance: Decimal,
    /// When the most recent entry was recorded.
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl RegisterState {
    /// Derives the state from the most recent entry.
    #[must_use]
    pub fn derive(ledger_id: LedgerId, last: Option<&LedgerEntry>) -> Self {
        let status = RegisterStatus::from_last_entry(last);
        Self {
            ledger_id,
            status,
            is_open: status.is_open(),
            current_balance: last.map_or(Decimal::ZERO, |entry| entry.balance_after),
            last_movement_at: last.map(|entry| entry.created_at),
        }
    }
}

/// Result of closing a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    /// The recorded closing entry.
    pub entry_id: EntryId,
    /// Balance the register should have held.
    pub expected: Decimal,
    /// Amount the operator counted.
    pub counted: Decimal,
    /// `counted - expected`; positive means surplus.
    pub difference: Decimal,
    /// Raised when `|difference|` exceeds the configured threshold.
    pub alert: Option<DiscrepancyAlert>,
    /// The register right after the closing entry.
    pub state: RegisterState,
}
