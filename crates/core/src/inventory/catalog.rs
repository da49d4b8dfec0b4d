//! In-memory catalog of ingredients, products and recipes.
//!
//! Catalog entries never carry a stock quantity. Stock is read from the
//! owning ledger, whose last `balance_after` is the only cache of it.

use bodega_shared::types::{IngredientId, LedgerId, ProductId, RecipeId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::events::{LowStockAlert, StockItem};
use crate::ledger::{LedgerError, LedgerResult};
use crate::production::{Recipe, RecipeLine};

/// A raw ingredient consumed by recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient identifier.
    pub id: IngredientId,
    /// Display name.
    pub name: String,
    /// Physical unit the stock is counted in.
    pub unit: String,
    /// Stock ledger of this ingredient.
    pub ledger_id: LedgerId,
    /// Quantity at or below which the ingredient is low.
    pub minimum_quantity: Decimal,
    /// Purchase cost of one unit.
    pub cost_per_unit: Decimal,
    /// When the ingredient was registered.
    pub created_at: DateTime<Utc>,
}

/// A finished, sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Physical unit the stock is counted in.
    pub unit: String,
    /// Stock ledger of this product.
    pub ledger_id: LedgerId,
    /// Sale price of one unit.
    pub price: Decimal,
    /// Quantity at or below which the product is low.
    pub minimum_stock: Decimal,
    /// When the product was registered.
    pub created_at: DateTime<Utc>,
}

/// Something with a stock ledger and a minimum.
pub trait Stocked {
    /// What the ledger holds.
    fn item(&self) -> StockItem;
    /// Display name.
    fn name(&self) -> &str;
    /// Stock ledger.
    fn ledger_id(&self) -> LedgerId;
    /// Low-stock threshold.
    fn minimum(&self) -> Decimal;

    /// Alert if `current` is at or below the minimum.
    fn low_stock_alert(&self, current: Decimal) -> Option<LowStockAlert> {
        (current <= self.minimum()).then(|| LowStockAlert {
            ledger_id: self.ledger_id(),
            item: self.item(),
            name: self.name().to_string(),
            current,
            minimum: self.minimum(),
            raised_at: Utc::now(),
        })
    }
}

impl Stocked for Ingredient {
    fn item(&self) -> StockItem {
        StockItem::Ingredient(self.id)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }
    fn minimum(&self) -> Decimal {
        self.minimum_quantity
    }
}

impl Stocked for Product {
    fn item(&self) -> StockItem {
        StockItem::Product(self.id)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }
    fn minimum(&self) -> Decimal {
        self.minimum_stock
    }
}

/// Concurrent catalog store.
#[derive(Debug, Default)]
pub struct Catalog {
    ingredients: DashMap<IngredientId, Ingredient>,
    products: DashMap<ProductId, Product>,
    recipes: DashMap<RecipeId, Recipe>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_ingredient(&self, ingredient: Ingredient) {
        self.ingredients.insert(ingredient.id, ingredient);
    }

    pub(crate) fn insert_product(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub(crate) fn insert_recipe(&self, recipe: Recipe) {
        self.recipes.insert(recipe.id, recipe);
    }

    /// Looks up an ingredient.
    pub fn ingredient(&self, id: IngredientId) -> LedgerResult<Ingredient> {
        self.ingredients
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::IngredientNotFound(id))
    }

    /// Looks up a product.
    pub fn product(&self, id: ProductId) -> LedgerResult<Product> {
        self.products
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::ProductNotFound(id))
    }

    /// Looks up a recipe.
    pub fn recipe(&self, id: RecipeId) -> LedgerResult<Recipe> {
        self.recipes
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::RecipeNotFound(id))
    }

    /// All ingredients, sorted by name.
    pub fn ingredients(&self) -> Vec<Ingredient> {
        let mut all: Vec<Ingredient> = self.ingredients.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// All products, sorted by name.
    pub fn products(&self) -> Vec<Product> {
        let mut all: Vec<Product> = self.products.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Recipes producing `product_id`, sorted by name.
    pub fn recipes_for_product(&self, product_id: ProductId) -> Vec<Recipe> {
        let mut found: Vec<Recipe> = self
            .recipes
            .iter()
            .filter(|e| e.value().product_id == product_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Swaps the full line set of a recipe and bumps its version.
    ///
    /// The map entry is held for the whole swap, so readers see either the
    /// old version or the new one.
    pub(crate) fn replace_recipe_lines(
        &self,
        id: RecipeId,
        lines: Vec<RecipeLine>,
    ) -> LedgerResult<Recipe> {
        let mut entry = self
            .recipes
            .get_mut(&id)
            .ok_or(LedgerError::RecipeNotFound(id))?;
        let replaced = entry.value().with_lines(lines)?;
        *entry.value_mut() = replaced.clone();
        Ok(replaced)
    }
}
