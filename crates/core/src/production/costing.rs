//! Recipe costing and profit margin.

use bodega_shared::types::{IngredientId, RecipeId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::types::Recipe;
use crate::ledger::{LedgerError, LedgerResult};

/// Cost contribution of one recipe line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCost {
    /// The ingredient.
    pub ingredient_id: IngredientId,
    /// Per-yield requirement.
    pub quantity_required: Decimal,
    /// Unit cost of the ingredient.
    pub cost_per_unit: Decimal,
    /// `quantity_required * cost_per_unit`.
    pub cost: Decimal,
}

/// Cost of one yield of a recipe against its product price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeCosting {
    /// The recipe.
    pub recipe_id: RecipeId,
    /// Per-line costs in recipe order.
    pub lines: Vec<LineCost>,
    /// Cost of one yield, `Σ quantity_required * cost_per_unit`.
    pub batch_cost: Decimal,
    /// `batch_cost / yield_amount`.
    pub unit_cost: Decimal,
    /// Sale price of one product unit.
    pub price: Decimal,
    /// `(price - unit_cost) / price * 100` rounded to 2 places, `None`
    /// when the product has no positive price.
    pub margin_percent: Option<Decimal>,
}

/// Costs `recipe` with the given ingredient unit costs and product price.
///
/// `cost_of` returns the unit cost of an ingredient.
///
/// # Errors
///
/// Returns [`LedgerError::Overflow`] if a cost or the margin leaves the
/// decimal range.
pub fn cost_recipe(
    recipe: &Recipe,
    price: Decimal,
    cost_of: impl Fn(IngredientId) -> Decimal,
) -> LedgerResult<RecipeCosting> {
    let lines = recipe
        .lines
        .iter()
        .map(|line| {
            let cost_per_unit = cost_of(line.ingredient_id);
            Ok(LineCost {
                ingredient_id: line.ingredient_id,
                quantity_required: line.quantity_required,
                cost_per_unit,
                cost: line
                    .quantity_required
                    .checked_mul(cost_per_unit)
                    .ok_or(LedgerError::Overflow("line cost"))?,
            })
        })
        .collect::<LedgerResult<Vec<_>>>()?;
    let batch_cost = lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.cost))
        .ok_or(LedgerError::Overflow("batch cost"))?;
    let unit_cost = batch_cost
        .checked_div(recipe.yield_amount)
        .unwrap_or(batch_cost);
    let margin_percent = if price > Decimal::ZERO {
        let margin = (price - unit_cost)
            .checked_div(price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or(LedgerError::Overflow("margin"))?;
        Some(margin.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    } else {
        None
    };

    Ok(RecipeCosting {
        recipe_id: recipe.id,
        lines,
        batch_cost,
        unit_cost,
        price,
        margin_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::RecipeLine;
    use bodega_shared::types::ProductId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_costing_and_margin() {
        let flour = IngredientId::new();
        let butter = IngredientId::new();
        let recipe = Recipe::new(
            "Croissants",
            ProductId::new(),
            dec!(12),
            vec![RecipeLine::new(flour, dec!(1)), RecipeLine::new(butter, dec!(0.5))],
        )
        .unwrap();

        let costing = cost_recipe(&recipe, dec!(2.50), |id| {
            if id == flour { dec!(1.20) } else { dec!(9.60) }
        })
        .unwrap();

        assert_eq!(costing.batch_cost, dec!(6.00));
        assert_eq!(costing.unit_cost, dec!(0.5));
        assert_eq!(costing.margin_percent, Some(dec!(80.00)));
        assert_eq!(costing.lines[1].cost, dec!(4.80));
    }

    #[test]
    fn test_margin_rounds_to_two_places() {
        let sugar = IngredientId::new();
        let recipe =
            Recipe::new("Syrup", ProductId::new(), dec!(1), vec![RecipeLine::new(sugar, dec!(1))])
                .unwrap();

        let costing = cost_recipe(&recipe, dec!(3), |_| dec!(1)).unwrap();
        assert_eq!(costing.margin_percent, Some(dec!(66.67)));

        let unpriced = cost_recipe(&recipe, dec!(0), |_| dec!(1)).unwrap();
        assert_eq!(unpriced.margin_percent, None);
    }

    #[test]
    fn test_overflowing_cost_is_rejected() {
        let gold = IngredientId::new();
        let recipe =
            Recipe::new("Gilded", ProductId::new(), dec!(1), vec![RecipeLine::new(gold, dec!(2))])
                .unwrap();

        let result = cost_recipe(&recipe, dec!(1), |_| Decimal::MAX);
        assert!(matches!(result, Err(LedgerError::Overflow("line cost"))));
    }
}
