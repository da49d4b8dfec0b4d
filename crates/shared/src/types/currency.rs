//! Currencies a cash register can be kept in.

use serde::{Deserialize, Serialize};

/// ISO 4217 code of a register's currency.
///
/// Cash ledgers never mix currencies: the currency is fixed when the
/// register's ledger is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Argentine peso
    Ars,
    /// US dollar
    Usd,
    /// Euro
    Eur,
    /// Brazilian real
    Brl,
}

impl Currency {
    /// The ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ars => "ARS",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Brl => "BRL",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Ars, Self::Usd, Self::Eur, Self::Brl]
            .into_iter()
            .find(|currency| currency.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown currency: {s}"))
    }
}
