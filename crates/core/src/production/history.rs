//! Production log and per-recipe statistics.
//!
//! The log holds one record per committed production run, written right
//! after the run's entries commit. Each record points at the product credit
//! booked under the run's [`EntryReference::Production`], so the ledgers
//! stay the source of truth for quantities.
//!
//! [`EntryReference::Production`]: crate::ledger::EntryReference::Production

use std::collections::HashMap;

use bodega_shared::types::{EntryId, ProductId, RecipeId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{LedgerError, LedgerResult};

/// One committed production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecord {
    /// Reference shared by every entry of the run.
    pub production_id: Uuid,
    /// Produced recipe.
    pub recipe_id: RecipeId,
    /// Recipe name at production time.
    pub recipe_name: String,
    /// Recipe version used.
    pub recipe_version: u32,
    /// Credited product.
    pub product_id: ProductId,
    /// Number of yields produced.
    pub multiplier: u32,
    /// Quantity credited to the product.
    pub produced_quantity: Decimal,
    /// Cost of the consumed ingredients.
    pub total_cost: Decimal,
    /// The product credit entry.
    pub product_entry_id: EntryId,
    /// Who ran the production.
    pub actor_id: UserId,
    /// When the run committed.
    pub produced_at: DateTime<Utc>,
}

/// Which runs a history query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "id", rename_all = "snake_case")]
pub enum HistoryFilter {
    /// Every run.
    All,
    /// Runs of one recipe.
    Recipe(RecipeId),
    /// Runs crediting one product, whatever the recipe.
    Product(ProductId),
}

impl HistoryFilter {
    fn matches(self, record: &ProductionRecord) -> bool {
        match self {
            Self::All => true,
            Self::Recipe(id) => record.recipe_id == id,
            Self::Product(id) => record.product_id == id,
        }
    }
}

/// Aggregated production of one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStats {
    /// The recipe.
    pub recipe_id: RecipeId,
    /// Name of its most recent run.
    pub recipe_name: String,
    /// Credited product.
    pub product_id: ProductId,
    /// Number of runs.
    pub times_made: usize,
    /// Sum of multipliers over all runs.
    pub total_multiplier: u64,
    /// Sum of produced quantities.
    pub total_quantity: Decimal,
    /// Sum of ingredient costs.
    pub total_cost: Decimal,
    /// `total_quantity * price` at the product's current price.
    pub revenue_potential: Decimal,
    /// Most recent run.
    pub last_made_at: DateTime<Utc>,
}

/// Append-only log of production runs.
#[derive(Debug, Default)]
pub struct ProductionLog {
    records: DashMap<Uuid, ProductionRecord>,
}

impl ProductionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, record: ProductionRecord) {
        self.records.insert(record.production_id, record);
    }

    /// Looks up one run.
    #[must_use]
    pub fn get(&self, production_id: Uuid) -> Option<ProductionRecord> {
        self.records
            .get(&production_id)
            .map(|record| record.value().clone())
    }

    /// Runs matching `filter` since `since` (inclusive), oldest first.
    #[must_use]
    pub fn history(
        &self,
        filter: HistoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Vec<ProductionRecord> {
        let mut records: Vec<ProductionRecord> = self
            .records
            .iter()
            .map(|record| record.value().clone())
            .filter(|record| filter.matches(record))
            .filter(|record| since.is_none_or(|since| record.produced_at >= since))
            .collect();
        records.sort_by_key(|record| (record.produced_at, record.production_id));
        records
    }

    /// Per-recipe totals since `since`, most produced first.
    ///
    /// `price_of` returns the current price of a product; products it does
    /// not know contribute no revenue.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if a total leaves the decimal range.
    pub fn recipe_stats(
        &self,
        since: Option<DateTime<Utc>>,
        price_of: impl Fn(ProductId) -> Option<Decimal>,
    ) -> LedgerResult<Vec<RecipeStats>> {
        let overflow = || LedgerError::Overflow("production statistics");
        let mut by_recipe: HashMap<RecipeId, RecipeStats> = HashMap::new();
        for record in self.history(HistoryFilter::All, since) {
            let stats = by_recipe
                .entry(record.recipe_id)
                .or_insert_with(|| RecipeStats {
                    recipe_id: record.recipe_id,
                    recipe_name: record.recipe_name.clone(),
                    product_id: record.product_id,
                    times_made: 0,
                    total_multiplier: 0,
                    total_quantity: Decimal::ZERO,
                    total_cost: Decimal::ZERO,
                    revenue_potential: Decimal::ZERO,
                    last_made_at: record.produced_at,
                });
            stats.times_made += 1;
            stats.total_multiplier += u64::from(record.multiplier);
            stats.total_quantity = stats
                .total_quantity
                .checked_add(record.produced_quantity)
                .ok_or_else(overflow)?;
            stats.total_cost = stats
                .total_cost
                .checked_add(record.total_cost)
                .ok_or_else(overflow)?;
            stats.recipe_name = record.recipe_name;
            stats.last_made_at = record.produced_at;
        }

        let mut stats = by_recipe
            .into_values()
            .map(|mut stats| {
                if let Some(price) = price_of(stats.product_id) {
                    stats.revenue_potential =
                        stats.total_quantity.checked_mul(price).ok_or_else(overflow)?;
                }
                Ok(stats)
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        stats.sort_by(|a, b| {
            b.total_quantity
                .cmp(&a.total_quantity)
                .then(b.times_made.cmp(&a.times_made))
        });
        Ok(stats)
    }
}
