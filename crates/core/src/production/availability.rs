//! Resource availability checker.
//!
//! Pure functions over (requirement, stock) pairs. The global ceiling is
//! the minimum of the per-ingredient ceilings, each floor-divided because
//! partial yields cannot be produced.

use bodega_shared::types::{IngredientId, LedgerId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::types::{AvailabilityReport, IngredientAvailability};
use crate::ledger::{LedgerError, LedgerResult};

/// A recipe line paired with the current stock of its ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    /// The ingredient.
    pub ingredient_id: IngredientId,
    /// Its stock ledger.
    pub ledger_id: LedgerId,
    /// Per-yield requirement, positive.
    pub quantity_required: Decimal,
    /// Current stock.
    pub available: Decimal,
}

/// `floor(available / quantity_required)`, clamped at zero.
///
/// Saturates at `u64::MAX` when the quotient does not fit.
#[must_use]
pub fn max_yields(available: Decimal, quantity_required: Decimal) -> u64 {
    if available <= Decimal::ZERO || quantity_required <= Decimal::ZERO {
        return 0;
    }
    available
        .checked_div(quantity_required)
        .and_then(|quotient| quotient.floor().to_u64())
        .unwrap_or(u64::MAX)
}

/// Checks every line for `multiplier` yields.
///
/// # Errors
///
/// Returns [`LedgerError::Overflow`] if a scaled requirement does not fit a
/// `Decimal`.
pub fn assess(multiplier: u32, lines: &[StockLine]) -> LedgerResult<AvailabilityReport> {
    let scale = Decimal::from(multiplier);
    let lines = lines
        .iter()
        .map(|line| {
            let required = line
                .quantity_required
                .checked_mul(scale)
                .ok_or(LedgerError::Overflow("ingredient requirement"))?;
            Ok(IngredientAvailability {
                ingredient_id: line.ingredient_id,
                ledger_id: line.ledger_id,
                quantity_required: line.quantity_required,
                required,
                available: line.available,
                shortage: (required - line.available).max(Decimal::ZERO),
                max_yields: max_yields(line.available, line.quantity_required),
            })
        })
        .collect::<LedgerResult<Vec<_>>>()?;

    Ok(AvailabilityReport {
        multiplier,
        max_producible: lines.iter().map(|line| line.max_yields).min().unwrap_or(0),
        all_available: lines.iter().all(|line| line.shortage.is_zero()),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stock(available: Decimal, quantity_required: Decimal) -> StockLine {
        StockLine {
            ingredient_id: IngredientId::new(),
            ledger_id: LedgerId::new(),
            quantity_required,
            available,
        }
    }

    #[test]
    fn test_max_producible_is_minimum_of_floors() {
        let report = assess(1, &[stock(dec!(10), dec!(3)), stock(dec!(7), dec!(2))]).unwrap();
        assert_eq!(report.max_producible, 3);

        let report = assess(1, &[stock(dec!(5), dec!(3)), stock(dec!(7), dec!(2))]).unwrap();
        assert_eq!(report.max_producible, 1);
    }

    #[test]
    fn test_shortages_use_scaled_requirement() {
        let report = assess(3, &[stock(dec!(10), dec!(3)), stock(dec!(5), dec!(2))]).unwrap();

        assert!(!report.all_available);
        assert_eq!(report.lines[0].required, dec!(9));
        assert_eq!(report.lines[0].shortage, dec!(0));
        assert_eq!(report.lines[1].required, dec!(6));
        assert_eq!(report.lines[1].shortage, dec!(1));

        let shortages = report.shortages();
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].missing, dec!(1));
        assert_eq!(report.max_producible, 2);
    }

    #[test]
    fn test_fractional_quantities() {
        assert_eq!(max_yields(dec!(1.0), dec!(0.25)), 4);
        assert_eq!(max_yields(dec!(0.99), dec!(0.25)), 3);
        assert_eq!(max_yields(dec!(0), dec!(0.25)), 0);
        assert_eq!(max_yields(dec!(-1), dec!(0.25)), 0);
    }

    #[test]
    fn test_empty_recipe_produces_nothing() {
        let report = assess(1, &[]).unwrap();
        assert_eq!(report.max_producible, 0);
        assert!(report.all_available);
    }

    #[test]
    fn test_scaled_requirement_overflow() {
        let huge = stock(dec!(10), dec!(100000000000000000000));
        let result = assess(1_000_000_000, &[huge]);
        assert!(matches!(result, Err(LedgerError::Overflow(_))));
    }
}
