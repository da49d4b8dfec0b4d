//! Atomic consumption executor.
//!
//! A production run locks every ingredient ledger of the recipe (ascending
//! ingredient id) and then the product ledger, re-checks availability under
//! those locks and stages one usage per line plus the production credit in
//! a single [`LedgerTxn`]. Any failure drops the transaction, so partial
//! consumption is never observable.

use std::sync::Arc;

use bodega_shared::types::{ProductId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::availability::{StockLine, assess};
use super::history::{HistoryFilter, ProductionLog, ProductionRecord, RecipeStats};
use super::types::{
    AvailabilityReport, IngredientDeduction, ProductionRequest, ProductionResult, Recipe,
};
use crate::events::{EngineEvent, EventBus};
use crate::inventory::catalog::{Catalog, Ingredient, Stocked};
use crate::ledger::{
    EntryReference, EntryType, LedgerError, LedgerResult, LedgerStore, LedgerTxn, NewEntry,
    StockEntryType,
};

/// A recipe line resolved against the catalog.
struct ResolvedLine {
    ingredient: Ingredient,
    quantity_required: Decimal,
}

/// Produces recipes out of ingredient stock.
#[derive(Debug, Clone)]
pub struct Production {
    store: Arc<LedgerStore>,
    catalog: Arc<Catalog>,
    events: EventBus,
    log: Arc<ProductionLog>,
}

impl Production {
    /// Creates the executor over a shared store and catalog.
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, catalog: Arc<Catalog>, events: EventBus) -> Self {
        Self {
            store,
            catalog,
            events,
            log: Arc::new(ProductionLog::new()),
        }
    }

    fn resolve(&self, recipe: &Recipe) -> LedgerResult<Vec<ResolvedLine>> {
        recipe
            .lines
            .iter()
            .map(|line| {
                Ok(ResolvedLine {
                    ingredient: self.catalog.ingredient(line.ingredient_id)?,
                    quantity_required: line.quantity_required,
                })
            })
            .collect()
    }

    fn report(
        txn: &LedgerTxn<'_>,
        lines: &[ResolvedLine],
        multiplier: u32,
    ) -> LedgerResult<AvailabilityReport> {
        let stock = lines
            .iter()
            .map(|line| {
                Ok(StockLine {
                    ingredient_id: line.ingredient.id,
                    ledger_id: line.ingredient.ledger_id,
                    quantity_required: line.quantity_required,
                    available: txn.balance(line.ingredient.ledger_id)?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        assess(multiplier, &stock)
    }

    /// Checks `recipe` against a consistent snapshot of current stock.
    ///
    /// The ingredient ledgers are locked together for the read and released
    /// before returning; [`Self::produce`] repeats the check under its own
    /// locks.
    pub async fn check_availability(
        &self,
        recipe: &Recipe,
        multiplier: u32,
    ) -> LedgerResult<AvailabilityReport> {
        recipe.validate()?;
        let lines = self.resolve(recipe)?;
        let txn = self
            .store
            .begin(lines.iter().map(|line| line.ingredient.ledger_id))
            .await?;
        Self::report(&txn, &lines, multiplier)
    }

    /// Largest multiplier current stock allows for `recipe`.
    pub async fn max_producible(&self, recipe: &Recipe) -> LedgerResult<u64> {
        Ok(self.check_availability(recipe, 1).await?.max_producible)
    }

    /// Consumes ingredients and credits the product, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroMultiplier`] for a zero multiplier
    /// - [`LedgerError::InsufficientIngredients`] with every short line
    /// - [`LedgerError::ExceedsCapacity`] if the multiplier is above
    ///   `max_producible`
    /// - [`LedgerError::InsufficientStock`] if a usage append still fails;
    ///   no entry of the run is recorded
    /// - [`LedgerError::Overflow`] if a scaled quantity or cost leaves the
    ///   decimal range
    /// - [`LedgerError::LockTimeout`] if a ledger stays busy
    #[instrument(skip(self, recipe), fields(recipe_id = %recipe.id, version = recipe.version))]
    pub async fn produce(
        &self,
        recipe: &Recipe,
        multiplier: u32,
        actor_id: UserId,
    ) -> LedgerResult<ProductionResult> {
        if multiplier == 0 {
            return Err(LedgerError::ZeroMultiplier);
        }
        recipe.validate()?;
        let lines = self.resolve(recipe)?;
        let product = self.catalog.product(recipe.product_id)?;

        let mut txn = self
            .store
            .begin(
                lines
                    .iter()
                    .map(|line| line.ingredient.ledger_id)
                    .chain([product.ledger_id]),
            )
            .await?;

        let report = Self::report(&txn, &lines, multiplier)?;
        if !report.all_available {
            let shortages = report.shortages();
            warn!(short = shortages.len(), "production rejected, insufficient ingredients");
            return Err(LedgerError::InsufficientIngredients(shortages));
        }
        if u64::from(multiplier) > report.max_producible {
            return Err(LedgerError::ExceedsCapacity {
                requested: multiplier,
                max_producible: report.max_producible,
            });
        }

        let production_id = Uuid::now_v7();
        let reference = EntryReference::Production(production_id);
        let reason = format!("Recipe: {} x{multiplier}", recipe.name);
        let scale = Decimal::from(multiplier);

        let mut deductions = Vec::with_capacity(lines.len());
        for line in &lines {
            let quantity = line
                .quantity_required
                .checked_mul(scale)
                .ok_or(LedgerError::Overflow("ingredient usage"))?;
            let cost = quantity
                .checked_mul(line.ingredient.cost_per_unit)
                .ok_or(LedgerError::Overflow("ingredient cost"))?;
            let entry = txn
                .append(
                    NewEntry::new(
                        line.ingredient.ledger_id,
                        EntryType::Stock(StockEntryType::Usage),
                        quantity,
                        actor_id,
                    )
                    .with_reference(reference)
                    .with_reason(reason.clone()),
                )
                .inspect_err(|err| warn!(%err, "production rolled back"))?;
            deductions.push(IngredientDeduction {
                ingredient_id: line.ingredient.id,
                entry_id: entry.entry_id,
                quantity,
                cost_per_unit: line.ingredient.cost_per_unit,
                cost,
                balance_after: entry.balance_after,
            });
        }

        let produced_quantity = recipe
            .yield_amount
            .checked_mul(scale)
            .ok_or(LedgerError::Overflow("produced quantity"))?;
        let total_cost = deductions
            .iter()
            .try_fold(Decimal::ZERO, |total, d| total.checked_add(d.cost))
            .ok_or(LedgerError::Overflow("production cost"))?;
        let credit = txn.append(
            NewEntry::new(
                product.ledger_id,
                EntryType::Stock(StockEntryType::Production),
                produced_quantity,
                actor_id,
            )
            .with_reference(reference)
            .with_reason(reason),
        )?;
        txn.commit();
        self.log.record(ProductionRecord {
            production_id,
            recipe_id: recipe.id,
            recipe_name: recipe.name.clone(),
            recipe_version: recipe.version,
            product_id: product.id,
            multiplier,
            produced_quantity,
            total_cost,
            product_entry_id: credit.entry_id,
            actor_id,
            produced_at: credit.created_at,
        });

        let low_stock: Vec<_> = lines
            .iter()
            .zip(&deductions)
            .filter_map(|(line, deduction)| line.ingredient.low_stock_alert(deduction.balance_after))
            .collect();
        for alert in &low_stock {
            self.events.publish(EngineEvent::LowStock(alert.clone()));
        }

        info!(%production_id, %produced_quantity, %total_cost, "production committed");
        Ok(ProductionResult {
            production_id,
            recipe_id: recipe.id,
            recipe_version: recipe.version,
            product_id: product.id,
            produced_quantity,
            total_cost,
            deductions,
            product_entry_id: credit.entry_id,
            low_stock,
        })
    }

    /// Looks up the recipe of `request` and produces it.
    pub async fn execute(&self, request: ProductionRequest) -> LedgerResult<ProductionResult> {
        let recipe = self.catalog.recipe(request.recipe_id)?;
        self.produce(&recipe, request.multiplier, request.actor_id)
            .await
    }

    /// Committed runs matching `filter` since `since`, oldest first.
    #[must_use]
    pub fn history(
        &self,
        filter: HistoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Vec<ProductionRecord> {
        self.log.history(filter, since)
    }

    /// The top `limit` recipes by produced quantity since `since`.
    pub fn popular_recipes(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> LedgerResult<Vec<RecipeStats>> {
        let mut stats = self.log.recipe_stats(since, |product_id| {
            self.catalog.product(product_id).ok().map(|product| product.price)
        })?;
        stats.truncate(limit);
        Ok(stats)
    }

    /// Largest multiplier for every recipe of a product.
    pub async fn capacity_for_product(
        &self,
        product_id: ProductId,
    ) -> LedgerResult<Vec<(Recipe, u64)>> {
        let mut capacity = Vec::new();
        for recipe in self.catalog.recipes_for_product(product_id) {
            let max = self.max_producible(&recipe).await?;
            capacity.push((recipe, max));
        }
        Ok(capacity)
    }
}
