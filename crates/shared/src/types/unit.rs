//! Units a ledger balance is measured in.

use serde::{Deserialize, Serialize};

use super::currency::Currency;

/// Unit of a ledger: money for cash registers, a physical unit for stock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum Unit {
    /// Monetary balance in the given currency.
    Currency(Currency),
    /// Physical quantity such as `kg`, `l` or `unit`.
    Physical(String),
}

impl Unit {
    /// Shorthand for a physical unit.
    #[must_use]
    pub fn physical(code: impl Into<String>) -> Self {
        Self::Physical(code.into())
    }

    /// Returns true if the unit is monetary.
    #[must_use]
    pub const fn is_monetary(&self) -> bool {
        matches!(self, Self::Currency(_))
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Currency(currency) => write!(f, "{currency}"),
            Self::Physical(code) => write!(f, "{code}"),
        }
    }
}
