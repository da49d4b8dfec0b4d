//! Property-based tests for the availability checker.
//!
//! - The multiplier is satisfiable iff it does not exceed `max_producible`.
//! - `max_producible` is the minimum of the independent per-line ceilings.

use proptest::prelude::*;
use rust_decimal::Decimal;

use bodega_shared::types::{IngredientId, LedgerId};

use super::availability::{StockLine, assess, max_yields};

/// Strategy to generate stock quantities (0.000 to 500.000).
fn quantity() -> impl Strategy<Value = Decimal> {
    (0i64..500_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

/// Strategy to generate per-yield requirements (0.001 to 50.000).
fn requirement() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

fn stock_line() -> impl Strategy<Value = StockLine> {
    (quantity(), requirement()).prop_map(|(available, quantity_required)| StockLine {
        ingredient_id: IngredientId::new(),
        ledger_id: LedgerId::new(),
        quantity_required,
        available,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// *For any* recipe and multiplier, every line is available iff the
    /// multiplier is within `max_producible`.
    #[test]
    fn prop_all_available_iff_within_capacity(
        lines in prop::collection::vec(stock_line(), 1..8),
        multiplier in 1u32..200,
    ) {
        let report = assess(multiplier, &lines).unwrap();
        prop_assert_eq!(report.all_available, u64::from(multiplier) <= report.max_producible);
        prop_assert_eq!(report.shortages().is_empty(), report.all_available);
    }

    /// *For any* recipe, `max_producible` is the smallest per-line ceiling
    /// and producing that many yields never exceeds any line's stock.
    #[test]
    fn prop_max_producible_is_binding(
        lines in prop::collection::vec(stock_line(), 1..8),
    ) {
        let report = assess(1, &lines).unwrap();
        let expected = lines
            .iter()
            .map(|line| max_yields(line.available, line.quantity_required))
            .min()
            .unwrap();
        prop_assert_eq!(report.max_producible, expected);

        let batches = Decimal::from(report.max_producible);
        for line in &lines {
            prop_assert!(line.quantity_required * batches <= line.available);
        }
        prop_assert!(lines
            .iter()
            .any(|line| line.quantity_required * (batches + Decimal::ONE) > line.available));
    }
}
