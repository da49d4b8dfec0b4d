//! Inventory service: catalog registration, stock movements and recipes.
//!
//! Stock quantities are never assigned. Every change goes through an
//! append on the item's ledger, and every read of "current stock" is the
//! ledger's cached fold result.

use std::sync::Arc;

use bodega_shared::types::{EntryId, IngredientId, ProductId, RecipeId, Unit, UserId};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::catalog::{Catalog, Ingredient, Product, Stocked};
use crate::events::{EngineEvent, EventBus, LowStockAlert, StockItem};
use crate::ledger::{
    CorrectionOutcome, EntryType, LedgerEntry, LedgerError, LedgerOwner, LedgerResult,
    LedgerStore, NewEntry, StockEntryType,
};
use crate::production::{Recipe, RecipeCosting, RecipeLine, cost_recipe};

/// Input for registering an ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIngredient {
    /// Display name.
    pub name: String,
    /// Physical unit (kg, l, unit...).
    pub unit: String,
    /// Stock on hand at registration, recorded as an adjustment.
    pub initial_quantity: Decimal,
    /// Low-stock threshold.
    pub minimum_quantity: Decimal,
    /// Purchase cost of one unit.
    pub cost_per_unit: Decimal,
}

/// Input for registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Physical unit.
    pub unit: String,
    /// Sale price of one unit.
    pub price: Decimal,
    /// Stock on hand at registration, recorded as an adjustment.
    pub initial_stock: Decimal,
    /// Low-stock threshold.
    pub minimum_stock: Decimal,
}

/// A catalog item together with its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockView<T> {
    /// The catalog item.
    pub item: T,
    /// Cached fold result of its ledger.
    pub current_quantity: Decimal,
}

/// A recorded stock movement and the alert it raised, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    /// The recorded entry.
    pub entry: LedgerEntry,
    /// Raised when a deduction left the item at or below its minimum.
    pub alert: Option<LowStockAlert>,
}

/// A corrected stock entry and the alert it raised, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCorrection {
    /// The committed correction.
    pub correction: CorrectionOutcome,
    /// Raised when the correction lowered the item to or below its minimum.
    pub alert: Option<LowStockAlert>,
}

fn require_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::InvalidInput("name is required".into()));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Decimal) -> LedgerResult<()> {
    if value < Decimal::ZERO {
        return Err(LedgerError::InvalidInput(format!(
            "{field} cannot be negative, got {value}"
        )));
    }
    Ok(())
}

/// Catalog and stock operations.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub(crate) store: Arc<LedgerStore>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) events: EventBus,
}

impl Inventory {
    /// Creates the service over a shared store and catalog.
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, catalog: Arc<Catalog>, events: EventBus) -> Self {
        Self {
            store,
            catalog,
            events,
        }
    }

    /// The shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Registers an ingredient and its stock ledger.
    ///
    /// A positive initial quantity is recorded as an "Initial stock"
    /// adjustment.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register_ingredient(
        &self,
        input: NewIngredient,
        actor_id: UserId,
    ) -> LedgerResult<StockView<Ingredient>> {
        require_name(&input.name)?;
        require_non_negative("initial quantity", input.initial_quantity)?;
        require_non_negative("minimum quantity", input.minimum_quantity)?;
        require_non_negative("cost per unit", input.cost_per_unit)?;

        let id = IngredientId::new();
        let ledger = self
            .store
            .create_ledger(LedgerOwner::Ingredient(id), Unit::physical(&input.unit));
        let ingredient = Ingredient {
            id,
            name: input.name,
            unit: input.unit,
            ledger_id: ledger.id,
            minimum_quantity: input.minimum_quantity,
            cost_per_unit: input.cost_per_unit,
            created_at: Utc::now(),
        };
        self.record_initial_stock(&ingredient, input.initial_quantity, actor_id)
            .await?;
        self.catalog.insert_ingredient(ingredient.clone());

        info!(ingredient_id = %id, "ingredient registered");
        Ok(StockView {
            item: ingredient,
            current_quantity: input.initial_quantity,
        })
    }

    /// Registers a product and its stock ledger.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register_product(
        &self,
        input: NewProduct,
        actor_id: UserId,
    ) -> LedgerResult<StockView<Product>> {
        require_name(&input.name)?;
        require_non_negative("price", input.price)?;
        require_non_negative("initial stock", input.initial_stock)?;
        require_non_negative("minimum stock", input.minimum_stock)?;

        let id = ProductId::new();
        let ledger = self
            .store
            .create_ledger(LedgerOwner::Product(id), Unit::physical(&input.unit));
        let product = Product {
            id,
            name: input.name,
            unit: input.unit,
            ledger_id: ledger.id,
            price: input.price,
            minimum_stock: input.minimum_stock,
            created_at: Utc::now(),
        };
        self.record_initial_stock(&product, input.initial_stock, actor_id)
            .await?;
        self.catalog.insert_product(product.clone());

        info!(product_id = %id, "product registered");
        Ok(StockView {
            item: product,
            current_quantity: input.initial_stock,
        })
    }

    async fn record_initial_stock(
        &self,
        item: &impl Stocked,
        quantity: Decimal,
        actor_id: UserId,
    ) -> LedgerResult<()> {
        if quantity > Decimal::ZERO {
            self.store
                .append(
                    NewEntry::new(
                        item.ledger_id(),
                        EntryType::Stock(StockEntryType::Adjustment),
                        quantity,
                        actor_id,
                    )
                    .with_reason("Initial stock"),
                )
                .await?;
        }
        Ok(())
    }

    /// An ingredient with its current stock.
    pub async fn ingredient(&self, id: IngredientId) -> LedgerResult<StockView<Ingredient>> {
        let item = self.catalog.ingredient(id)?;
        let current_quantity = self.store.current_balance(item.ledger_id).await?;
        Ok(StockView {
            item,
            current_quantity,
        })
    }

    /// A product with its current stock.
    pub async fn product(&self, id: ProductId) -> LedgerResult<StockView<Product>> {
        let item = self.catalog.product(id)?;
        let current_quantity = self.store.current_balance(item.ledger_id).await?;
        Ok(StockView {
            item,
            current_quantity,
        })
    }

    fn stocked(&self, item: StockItem) -> LedgerResult<Box<dyn Stocked + Send + Sync>> {
        Ok(match item {
            StockItem::Ingredient(id) => Box::new(self.catalog.ingredient(id)?),
            StockItem::Product(id) => Box::new(self.catalog.product(id)?),
        })
    }

    async fn record(
        &self,
        item: StockItem,
        entry_type: StockEntryType,
        amount: Decimal,
        reason: String,
        actor_id: UserId,
    ) -> LedgerResult<StockMovement> {
        let stocked = self.stocked(item)?;
        let entry = self
            .store
            .append(
                NewEntry::new(
                    stocked.ledger_id(),
                    EntryType::Stock(entry_type),
                    amount,
                    actor_id,
                )
                .with_reason(reason),
            )
            .await?;
        let alert = if entry.signed_quantity < Decimal::ZERO {
            stocked.low_stock_alert(entry.balance_after)
        } else {
            None
        };
        if let Some(alert) = &alert {
            self.events.publish(EngineEvent::LowStock(alert.clone()));
        }
        Ok(StockMovement { entry, alert })
    }

    /// Manual stock update by a signed delta.
    ///
    /// Positive deltas are recorded as purchases, negative ones as usage.
    #[instrument(skip(self, reason))]
    pub async fn adjust_stock(
        &self,
        item: StockItem,
        delta: Decimal,
        reason: Option<String>,
        actor_id: UserId,
    ) -> LedgerResult<StockMovement> {
        if delta.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let entry_type = if delta > Decimal::ZERO {
            StockEntryType::Purchase
        } else {
            StockEntryType::Usage
        };
        let reason = reason.unwrap_or_else(|| "Manual update".to_string());
        self.record(item, entry_type, delta.abs(), reason, actor_id)
            .await
    }

    /// Signed correction after a physical count.
    ///
    /// Used when a physical count disagrees with the ledger and no single
    /// past entry is to blame.
    #[instrument(skip(self, reason))]
    pub async fn record_adjustment(
        &self,
        item: StockItem,
        delta: Decimal,
        reason: impl Into<String> + Send,
        actor_id: UserId,
    ) -> LedgerResult<StockMovement> {
        self.record(item, StockEntryType::Adjustment, delta, reason.into(), actor_id)
            .await
    }

    /// Corrects a past stock entry of an ingredient or product.
    ///
    /// Runs [`LedgerStore::correct_entry`] and, when the cascade lowered
    /// the item's stock to or below its minimum, raises a low-stock alert.
    #[instrument(skip(self, reason))]
    pub async fn correct_stock_entry(
        &self,
        entry_id: EntryId,
        new_signed_quantity: Decimal,
        reason: Option<String>,
    ) -> LedgerResult<StockCorrection> {
        let ledger = self.store.ledger(self.store.ledger_of_entry(entry_id)?)?;
        let item = match ledger.owner {
            LedgerOwner::Ingredient(id) => StockItem::Ingredient(id),
            LedgerOwner::Product(id) => StockItem::Product(id),
            LedgerOwner::Register(_) => {
                return Err(LedgerError::InvalidInput(format!(
                    "entry {entry_id} belongs to a cash register"
                )));
            }
        };
        let stocked = self.stocked(item)?;

        let correction = self
            .store
            .correct_entry(entry_id, new_signed_quantity, reason)
            .await?;
        let alert = if correction.lowered_balance() {
            stocked.low_stock_alert(correction.final_balance)
        } else {
            None
        };
        if let Some(alert) = &alert {
            self.events.publish(EngineEvent::LowStock(alert.clone()));
        }
        Ok(StockCorrection { correction, alert })
    }

    /// Every ingredient and product at or below its minimum.
    ///
    /// Sorted by `current / minimum`, most depleted first.
    pub async fn low_stock(&self) -> LedgerResult<Vec<LowStockAlert>> {
        let mut items: Vec<Box<dyn Stocked + Send + Sync>> = Vec::new();
        for ingredient in self.catalog.ingredients() {
            items.push(Box::new(ingredient));
        }
        for product in self.catalog.products() {
            items.push(Box::new(product));
        }

        let mut alerts = Vec::new();
        for item in items {
            let current = self.store.current_balance(item.ledger_id()).await?;
            if let Some(alert) = item.low_stock_alert(current) {
                alerts.push(alert);
            }
        }
        alerts.sort_by(|a, b| depletion(a).cmp(&depletion(b)));
        Ok(alerts)
    }

    /// Registers a recipe for an existing product.
    #[instrument(skip(self, lines), fields(name = %name))]
    pub fn register_recipe(
        &self,
        name: &str,
        product_id: ProductId,
        yield_amount: Decimal,
        lines: Vec<RecipeLine>,
    ) -> LedgerResult<Recipe> {
        self.catalog.product(product_id)?;
        self.require_ingredients(&lines)?;
        let recipe = Recipe::new(name, product_id, yield_amount, lines)?;
        self.catalog.insert_recipe(recipe.clone());
        info!(recipe_id = %recipe.id, "recipe registered");
        Ok(recipe)
    }

    /// Replaces the full ingredient set of a recipe in one step.
    ///
    /// The old set is never visible mixed with the new one, and an invalid
    /// new set leaves the old version in place.
    #[instrument(skip(self, lines))]
    pub fn replace_recipe_ingredients(
        &self,
        recipe_id: RecipeId,
        lines: Vec<RecipeLine>,
    ) -> LedgerResult<Recipe> {
        self.require_ingredients(&lines)?;
        let recipe = self.catalog.replace_recipe_lines(recipe_id, lines)?;
        info!(version = recipe.version, "recipe ingredients replaced");
        Ok(recipe)
    }

    fn require_ingredients(&self, lines: &[RecipeLine]) -> LedgerResult<()> {
        for line in lines {
            self.catalog.ingredient(line.ingredient_id)?;
        }
        Ok(())
    }

    /// Cost of one yield and profit margin of a recipe.
    pub fn recipe_costing(&self, recipe_id: RecipeId) -> LedgerResult<RecipeCosting> {
        let recipe = self.catalog.recipe(recipe_id)?;
        let product = self.catalog.product(recipe.product_id)?;
        let costs = recipe
            .lines
            .iter()
            .map(|line| {
                self.catalog
                    .ingredient(line.ingredient_id)
                    .map(|ingredient| (ingredient.id, ingredient.cost_per_unit))
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        cost_recipe(&recipe, product.price, |id| {
            costs
                .iter()
                .find(|(ingredient_id, _)| *ingredient_id == id)
                .map_or(Decimal::ZERO, |(_, cost)| *cost)
        })
    }
}

/// `current / minimum`, zero minimums sort first.
fn depletion(alert: &LowStockAlert) -> Decimal {
    alert
        .current
        .checked_div(alert.minimum)
        .unwrap_or(Decimal::ZERO)
}
