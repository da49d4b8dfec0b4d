//! Ledger and ledger entry domain types.
//!
//! Entry types are closed variants per ledger family, so the combination
//! rule in [`super::fold`] is an exhaustive match rather than a string
//! comparison.

use bodega_shared::types::{
    EntryId, IngredientId, LedgerId, ProductId, StoreId, Unit, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{LedgerError, LedgerResult};

/// What a ledger tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// Money in a physical cash register.
    Cash,
    /// Stock of a raw ingredient.
    Ingredient,
    /// Stock of a finished, sellable product.
    Product,
}

impl LedgerKind {
    /// Position of this kind in the global lock order.
    ///
    /// Multi-ledger operations lock ingredients first, then products, then
    /// cash registers.
    #[must_use]
    pub const fn lock_rank(self) -> u8 {
        match self {
            Self::Ingredient => 0,
            Self::Product => 1,
            Self::Cash => 2,
        }
    }

    /// Returns true for ingredient and product ledgers.
    #[must_use]
    pub const fn is_stock(self) -> bool {
        matches!(self, Self::Ingredient | Self::Product)
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Ingredient => write!(f, "ingredient"),
            Self::Product => write!(f, "product"),
        }
    }
}

/// The entity a ledger belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LedgerOwner {
    /// A cash register of a store.
    Register(StoreId),
    /// An ingredient's stock.
    Ingredient(IngredientId),
    /// A product's stock.
    Product(ProductId),
}

impl LedgerOwner {
    /// The ledger kind implied by the owner.
    #[must_use]
    pub const fn kind(self) -> LedgerKind {
        match self {
            Self::Register(_) => LedgerKind::Cash,
            Self::Ingredient(_) => LedgerKind::Ingredient,
            Self::Product(_) => LedgerKind::Product,
        }
    }

    const fn uuid(self) -> Uuid {
        match self {
            Self::Register(id) => id.0,
            Self::Ingredient(id) => id.0,
            Self::Product(id) => id.0,
        }
    }
}

/// Identifies a balance stream. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger identifier.
    pub id: LedgerId,
    /// Cash, ingredient or product.
    pub kind: LedgerKind,
    /// Owning store, ingredient or product.
    pub owner: LedgerOwner,
    /// Currency or physical unit of the balance.
    pub unit: Unit,
    /// When the ledger was created.
    pub created_at: DateTime<Utc>,
}

impl Ledger {
    /// Creates a new ledger for `owner`.
    #[must_use]
    pub fn new(owner: LedgerOwner, unit: Unit) -> Self {
        Self {
            id: LedgerId::new(),
            kind: owner.kind(),
            owner,
            unit,
            created_at: Utc::now(),
        }
    }

    /// Key used to order lock acquisition across ledgers.
    ///
    /// Ingredient ledgers sort by ascending ingredient id, followed by
    /// product ledgers, followed by cash ledgers.
    #[must_use]
    pub fn lock_key(&self) -> (u8, Uuid, LedgerId) {
        (self.kind.lock_rank(), self.owner.uuid(), self.id)
    }
}

/// Entry types of a cash ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashEntryType {
    /// Register opened with an initial float. Resets the balance.
    Opening,
    /// Register closed with a counted amount.
    Closing,
    /// Money put into the register.
    Income,
    /// Cash received for a sale.
    Sale,
    /// Money paid out of the register.
    Expense,
    /// Money taken out of the register (e.g. to the safe).
    Withdrawal,
}

/// Entry types of an ingredient or product ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEntryType {
    /// Stock bought from a provider.
    Purchase,
    /// Stock consumed (manually or by production).
    Usage,
    /// Finished goods credited by a production run.
    Production,
    /// Signed correction of the counted stock.
    Adjustment,
    /// Stock sold to a customer.
    Sale,
}

/// Entry type, closed per ledger family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", content = "type", rename_all = "snake_case")]
pub enum EntryType {
    /// Cash ledger entry.
    Cash(CashEntryType),
    /// Ingredient or product ledger entry.
    Stock(StockEntryType),
}

impl EntryType {
    /// Returns true if this entry type may be appended to a ledger of `kind`.
    #[must_use]
    pub const fn fits(self, kind: LedgerKind) -> bool {
        match self {
            Self::Cash(_) => matches!(kind, LedgerKind::Cash),
            Self::Stock(_) => kind.is_stock(),
        }
    }

    /// Opening and closing entries can never be corrected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cash(CashEntryType::Opening | CashEntryType::Closing)
        )
    }

    /// Converts a caller-supplied amount into the stored signed quantity.
    ///
    /// Directional types take a magnitude and apply their own sign;
    /// adjustments take the signed delta as-is.
    pub fn signed(self, amount: Decimal) -> LedgerResult<Decimal> {
        match self {
            Self::Stock(StockEntryType::Adjustment) => {
                if amount.is_zero() {
                    return Err(LedgerError::ZeroAmount);
                }
                Ok(amount)
            }
            Self::Cash(CashEntryType::Opening | CashEntryType::Closing) => {
                if amount.is_sign_negative() && !amount.is_zero() {
                    return Err(LedgerError::NegativeAmount);
                }
                Ok(amount)
            }
            _ => {
                if amount.is_zero() {
                    return Err(LedgerError::ZeroAmount);
                }
                if amount.is_sign_negative() {
                    return Err(LedgerError::NegativeAmount);
                }
                if self.is_debit() { Ok(-amount) } else { Ok(amount) }
            }
        }
    }

    /// Returns true if `signed_quantity` carries the sign this type stores.
    #[must_use]
    pub fn accepts(self, signed_quantity: Decimal) -> bool {
        match self {
            Self::Stock(StockEntryType::Adjustment) => !signed_quantity.is_zero(),
            Self::Cash(CashEntryType::Opening | CashEntryType::Closing) => {
                signed_quantity >= Decimal::ZERO
            }
            _ if self.is_debit() => signed_quantity < Decimal::ZERO,
            _ => signed_quantity > Decimal::ZERO,
        }
    }

    const fn is_debit(self) -> bool {
        matches!(
            self,
            Self::Cash(CashEntryType::Expense | CashEntryType::Withdrawal)
                | Self::Stock(StockEntryType::Usage | StockEntryType::Sale)
        )
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cash(CashEntryType::Opening) => "opening",
            Self::Cash(CashEntryType::Closing) => "closing",
            Self::Cash(CashEntryType::Income) => "income",
            Self::Cash(CashEntryType::Sale) | Self::Stock(StockEntryType::Sale) => "sale",
            Self::Cash(CashEntryType::Expense) => "expense",
            Self::Cash(CashEntryType::Withdrawal) => "withdrawal",
            Self::Stock(StockEntryType::Purchase) => "purchase",
            Self::Stock(StockEntryType::Usage) => "usage",
            Self::Stock(StockEntryType::Production) => "production",
            Self::Stock(StockEntryType::Adjustment) => "adjustment",
        };
        f.write_str(name)
    }
}

/// Link from an entry back to the operation that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntryReference {
    /// A completed sale.
    Sale(Uuid),
    /// A production run.
    Production(Uuid),
    /// A purchase order from a provider.
    PurchaseOrder(Uuid),
}

/// An immutable-once-finalized fact in a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic id assigned at insert.
    pub entry_id: EntryId,
    /// The ledger this entry belongs to.
    pub ledger_id: LedgerId,
    /// What kind of movement this is.
    pub entry_type: EntryType,
    /// Positive for credits, negative for debits.
    pub signed_quantity: Decimal,
    /// Balance of the ledger right after this entry.
    pub balance_after: Decimal,
    /// For closings: the balance the register was expected to hold.
    pub expected_balance: Option<Decimal>,
    /// Originating sale, production or order.
    pub reference: Option<EntryReference>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// Who or what caused it.
    pub actor_id: UserId,
    /// Free-text reason.
    pub reason: Option<String>,
}

impl LedgerEntry {
    /// Counted minus expected for closing entries.
    #[must_use]
    pub fn difference(&self) -> Option<Decimal> {
        self.expected_balance
            .map(|expected| self.signed_quantity - expected)
    }
}

/// Input for appending an entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Target ledger.
    pub ledger_id: LedgerId,
    /// Entry type (must fit the ledger kind).
    pub entry_type: EntryType,
    /// Magnitude for directional types, signed delta for adjustments.
    pub amount: Decimal,
    /// Optional originating operation.
    pub reference: Option<EntryReference>,
    /// Optional free-text reason.
    pub reason: Option<String>,
    /// Who causes the entry.
    pub actor_id: UserId,
}

impl NewEntry {
    /// Creates an entry input without reference or reason.
    #[must_use]
    pub const fn new(
        ledger_id: LedgerId,
        entry_type: EntryType,
        amount: Decimal,
        actor_id: UserId,
    ) -> Self {
        Self {
            ledger_id,
            entry_type,
            amount,
            reference: None,
            reason: None,
            actor_id,
        }
    }

    /// Attaches a free-text reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an originating operation.
    #[must_use]
    pub const fn with_reference(mut self, reference: EntryReference) -> Self {
        self.reference = Some(reference);
        self
    }
}
