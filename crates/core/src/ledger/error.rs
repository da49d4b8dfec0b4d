//! Ledger error types.
//!
//! Every failure is scoped to one ledger operation and leaves all ledgers in
//! a fold-consistent state. Variants carry the detail an operator needs for
//! the next action (which ledger, how much is missing, what can be produced).

use bodega_shared::AppError;
use bodega_shared::types::{EntryId, IngredientId, LedgerId, ProductId, RecipeId};
use uuid::Uuid;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{EntryType, LedgerKind};

/// Result type alias using `LedgerError`.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Missing quantity of one ingredient for a requested production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    /// The ingredient that is short.
    pub ingredient_id: IngredientId,
    /// Quantity the production needs.
    pub required: Decimal,
    /// Quantity currently in stock.
    pub available: Decimal,
    /// `required - available`.
    pub missing: Decimal,
}

fn describe_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(|s| format!("{} missing {}", s.ingredient_id, s.missing))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Lookup Errors ==========
    /// Ledger does not exist.
    #[error("Ledger not found: {0}")]
    LedgerNotFound(LedgerId),

    /// Entry does not exist.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(EntryId),

    /// Ingredient is not in the catalog.
    #[error("Ingredient not found: {0}")]
    IngredientNotFound(IngredientId),

    /// Product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Recipe is not in the catalog.
    #[error("Recipe not found: {0}")]
    RecipeNotFound(RecipeId),

    /// No entry was ever booked for this sale.
    #[error("Sale not found: {0}")]
    SaleNotFound(Uuid),

    // ========== Register Lifecycle Errors ==========
    /// Movement or close on a register that is not open.
    #[error("Cash register {0} is closed")]
    RegisterClosed(LedgerId),

    /// Open on a register that was never closed.
    #[error("Cash register {0} is already open")]
    AlreadyOpen(LedgerId),

    // ========== Balance Errors ==========
    /// A cash debit would drive the register negative.
    #[error("Insufficient funds in {ledger_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The cash ledger.
        ledger_id: LedgerId,
        /// Balance before the rejected entry.
        available: Decimal,
        /// Amount the entry tried to take.
        requested: Decimal,
    },

    /// A stock debit would drive the quantity negative.
    #[error("Insufficient stock in {ledger_id}: available {available}, requested {requested}")]
    InsufficientStock {
        /// The stock ledger.
        ledger_id: LedgerId,
        /// Quantity before the rejected entry.
        available: Decimal,
        /// Quantity the entry tried to take.
        requested: Decimal,
    },

    // ========== Production Errors ==========
    /// At least one ingredient cannot cover the requested production.
    #[error("Insufficient ingredients: {}", describe_shortages(.0))]
    InsufficientIngredients(Vec<Shortage>),

    /// Requested multiplier is above what stock allows.
    #[error("Requested {requested} exceeds capacity, at most {max_producible} can be produced")]
    ExceedsCapacity {
        /// Requested multiplier.
        requested: u32,
        /// Largest multiplier every ingredient can satisfy.
        max_producible: u64,
    },

    /// Production multiplier must be at least 1.
    #[error("Production multiplier must be at least 1")]
    ZeroMultiplier,

    /// The sale was already reversed.
    #[error("Sale {0} is already cancelled")]
    SaleAlreadyCancelled(Uuid),

    // ========== Entry Errors ==========
    /// Opening/closing entries and quantities booked by a sale or production
    /// cannot be edited in place.
    #[error("Ledger entry {0} is immutable")]
    ImmutableEntry(EntryId),

    /// Entry type does not belong to the ledger's family.
    #[error("Entry type {entry_type} cannot be recorded on {kind} ledger {ledger_id}")]
    EntryTypeMismatch {
        /// Target ledger.
        ledger_id: LedgerId,
        /// Kind of the target ledger.
        kind: LedgerKind,
        /// Rejected entry type.
        entry_type: EntryType,
    },

    /// A corrected quantity has the wrong sign for its entry type.
    #[error("Quantity {quantity} has the wrong sign for a {entry_type} entry")]
    SignMismatch {
        /// Entry type being corrected.
        entry_type: EntryType,
        /// Rejected signed quantity.
        quantity: Decimal,
    },

    /// Entry amount cannot be negative.
    #[error("Entry amount cannot be negative")]
    NegativeAmount,

    /// Entry amount cannot be zero.
    #[error("Entry amount cannot be zero")]
    ZeroAmount,

    /// A balance, requirement or total does not fit a `Decimal`.
    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    /// Malformed recipe, sale or catalog input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========== Concurrency Errors ==========
    /// Lock on a ledger could not be acquired in time.
    #[error("Timed out waiting for ledger {0}, please retry")]
    LockTimeout(LedgerId),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LedgerNotFound(_) => "LEDGER_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::IngredientNotFound(_) => "INGREDIENT_NOT_FOUND",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::RecipeNotFound(_) => "RECIPE_NOT_FOUND",
            Self::SaleNotFound(_) => "SALE_NOT_FOUND",
            Self::SaleAlreadyCancelled(_) => "SALE_ALREADY_CANCELLED",
            Self::RegisterClosed(_) => "REGISTER_CLOSED",
            Self::AlreadyOpen(_) => "ALREADY_OPEN",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InsufficientIngredients(_) => "INSUFFICIENT_INGREDIENTS",
            Self::ExceedsCapacity { .. } => "EXCEEDS_CAPACITY",
            Self::ZeroMultiplier => "ZERO_MULTIPLIER",
            Self::ImmutableEntry(_) => "IMMUTABLE_ENTRY",
            Self::EntryTypeMismatch { .. } => "ENTRY_TYPE_MISMATCH",
            Self::SignMismatch { .. } => "SIGN_MISMATCH",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::Overflow(_) => "ARITHMETIC_OVERFLOW",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::EntryTypeMismatch { .. }
            | Self::SignMismatch { .. }
            | Self::NegativeAmount
            | Self::ZeroAmount
            | Self::ZeroMultiplier
            | Self::Overflow(_)
            | Self::InvalidInput(_) => 400,

            // 404 Not Found
            Self::LedgerNotFound(_)
            | Self::EntryNotFound(_)
            | Self::IngredientNotFound(_)
            | Self::ProductNotFound(_)
            | Self::RecipeNotFound(_)
            | Self::SaleNotFound(_) => 404,

            // 409 Conflict - register or entry state
            Self::RegisterClosed(_)
            | Self::AlreadyOpen(_)
            | Self::ImmutableEntry(_)
            | Self::SaleAlreadyCancelled(_) => 409,

            // 422 Unprocessable - insufficient resources
            Self::InsufficientFunds { .. }
            | Self::InsufficientStock { .. }
            | Self::InsufficientIngredients(_)
            | Self::ExceedsCapacity { .. } => 422,

            // 503 Service Unavailable - retry with backoff
            Self::LockTimeout(_) => 503,

            // 500 Internal Server Error
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Everything else is a business-rule violation that retrying won't fix.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.http_status_code() {
            400 => Self::Validation(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            422 => Self::BusinessRule(message),
            503 => Self::Busy(message),
            _ => Self::Internal(message),
        }
    }
}
