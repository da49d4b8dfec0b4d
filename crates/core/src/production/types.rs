//! Recipe and production domain types.

use bodega_shared::types::{EntryId, IngredientId, LedgerId, ProductId, RecipeId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::LowStockAlert;
use crate::ledger::{LedgerError, LedgerResult, Shortage};

/// One ingredient requirement per yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    /// Consumed ingredient.
    pub ingredient_id: IngredientId,
    /// Quantity consumed by one yield.
    pub quantity_required: Decimal,
}

impl RecipeLine {
    /// Creates a line.
    #[must_use]
    pub const fn new(ingredient_id: IngredientId, quantity_required: Decimal) -> Self {
        Self {
            ingredient_id,
            quantity_required,
        }
    }
}

/// How to turn ingredients into a product.
///
/// A recipe is immutable per version: editing replaces the whole line set
/// and bumps `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe identifier.
    pub id: RecipeId,
    /// Display name.
    pub name: String,
    /// Product credited by a production run.
    pub product_id: ProductId,
    /// Product units produced by one yield.
    pub yield_amount: Decimal,
    /// Ordered ingredient requirements.
    pub lines: Vec<RecipeLine>,
    /// Starts at 1, incremented on every line replacement.
    pub version: u32,
    /// When this version was installed.
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Creates and validates a first-version recipe.
    pub fn new(
        name: impl Into<String>,
        product_id: ProductId,
        yield_amount: Decimal,
        lines: Vec<RecipeLine>,
    ) -> LedgerResult<Self> {
        let recipe = Self {
            id: RecipeId::new(),
            name: name.into(),
            product_id,
            yield_amount,
            lines,
            version: 1,
            updated_at: Utc::now(),
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Checks name, yield and lines.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] for a blank name, a
    /// non-positive yield, no lines or a non-positive line quantity.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("recipe name is required".into()));
        }
        if self.yield_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "recipe yield must be positive, got {}",
                self.yield_amount
            )));
        }
        if self.lines.is_empty() {
            return Err(LedgerError::InvalidInput(
                "recipe needs at least one ingredient".into(),
            ));
        }
        if let Some(line) = self
            .lines
            .iter()
            .find(|line| line.quantity_required <= Decimal::ZERO)
        {
            return Err(LedgerError::InvalidInput(format!(
                "quantity for ingredient {} must be positive, got {}",
                line.ingredient_id, line.quantity_required
            )));
        }
        Ok(())
    }

    /// Next version of this recipe with `lines` as its full line set.
    pub fn with_lines(&self, lines: Vec<RecipeLine>) -> LedgerResult<Self> {
        let next = Self {
            lines,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        };
        next.validate()?;
        Ok(next)
    }
}

/// Input of the atomic consumption executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRequest {
    /// Recipe to produce.
    pub recipe_id: RecipeId,
    /// Number of yields to produce.
    pub multiplier: u32,
    /// Who requested the production.
    pub actor_id: UserId,
}

/// Availability of one recipe line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAvailability {
    /// The ingredient.
    pub ingredient_id: IngredientId,
    /// Its stock ledger.
    pub ledger_id: LedgerId,
    /// Per-yield requirement.
    pub quantity_required: Decimal,
    /// `quantity_required * multiplier`.
    pub required: Decimal,
    /// Current stock.
    pub available: Decimal,
    /// `max(0, required - available)`.
    pub shortage: Decimal,
    /// `floor(available / quantity_required)`.
    pub max_yields: u64,
}

/// Result of checking a recipe against current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    /// Requested multiplier.
    pub multiplier: u32,
    /// One row per recipe line, in recipe order.
    pub lines: Vec<IngredientAvailability>,
    /// Largest multiplier every ingredient can satisfy.
    pub max_producible: u64,
    /// True iff no line has a shortage.
    pub all_available: bool,
}

impl AvailabilityReport {
    /// Lines with a positive shortage.
    #[must_use]
    pub fn shortages(&self) -> Vec<Shortage> {
        self.lines
            .iter()
            .filter(|line| line.shortage > Decimal::ZERO)
            .map(|line| Shortage {
                ingredient_id: line.ingredient_id,
                required: line.required,
                available: line.available,
                missing: line.shortage,
            })
            .collect()
    }
}

/// Stock consumed from one ingredient by a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientDeduction {
    /// The ingredient.
    pub ingredient_id: IngredientId,
    /// The recorded usage entry.
    pub entry_id: EntryId,
    /// Quantity consumed.
    pub quantity: Decimal,
    /// Unit cost at production time.
    pub cost_per_unit: Decimal,
    /// `quantity * cost_per_unit`.
    pub cost: Decimal,
    /// Ingredient stock after the deduction.
    pub balance_after: Decimal,
}

/// Outcome of a committed production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionResult {
    /// Reference shared by every entry of this run.
    pub production_id: Uuid,
    /// Produced recipe.
    pub recipe_id: RecipeId,
    /// Recipe version used.
    pub recipe_version: u32,
    /// Credited product.
    pub product_id: ProductId,
    /// `yield_amount * multiplier`.
    pub produced_quantity: Decimal,
    /// Sum of all deduction costs.
    pub total_cost: Decimal,
    /// Per-ingredient usage, in recipe order.
    pub deductions: Vec<IngredientDeduction>,
    /// The production credit entry on the product ledger.
    pub product_entry_id: EntryId,
    /// Ingredients left at or below their minimum.
    pub low_stock: Vec<LowStockAlert>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal) -> RecipeLine {
        RecipeLine::new(IngredientId::new(), quantity)
    }

    #[test]
    fn test_valid_recipe() {
        let recipe = Recipe::new("Bread", ProductId::new(), dec!(10), vec![line(dec!(1))]).unwrap();
        assert_eq!(recipe.version, 1);
    }

    #[test]
    fn test_invalid_recipes() {
        let product = ProductId::new();
        assert!(Recipe::new("Bread", product, dec!(10), vec![]).is_err());
        assert!(Recipe::new("Bread", product, dec!(0), vec![line(dec!(1))]).is_err());
        assert!(Recipe::new(" ", product, dec!(1), vec![line(dec!(1))]).is_err());
        assert!(matches!(
            Recipe::new("Bread", product, dec!(1), vec![line(dec!(1)), line(dec!(-2))]),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_with_lines_bumps_version_and_validates() {
        let recipe = Recipe::new("Bread", ProductId::new(), dec!(10), vec![line(dec!(1))]).unwrap();
        let next = recipe.with_lines(vec![line(dec!(2)), line(dec!(3))]).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.id, recipe.id);
        assert_eq!(next.lines.len(), 2);
        assert!(recipe.with_lines(vec![]).is_err());
    }
}
