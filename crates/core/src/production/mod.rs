//! Recipe production.
//!
//! # Modules
//!
//! - `types` - Recipes, production requests and results
//! - `availability` - Per-ingredient shortages and max producible
//! - `costing` - Recipe cost and profit margin
//! - `executor` - All-or-nothing ingredient consumption and product credit
//! - `history` - Log of committed runs and per-recipe statistics

pub mod availability;
pub mod costing;
pub mod executor;
pub mod history;
pub mod types;

#[cfg(test)]
mod availability_props;

pub use availability::{StockLine, assess, max_yields};
pub use costing::{LineCost, RecipeCosting, cost_recipe};
pub use executor::Production;
pub use history::{HistoryFilter, ProductionLog, ProductionRecord, RecipeStats};
pub use types::{
    AvailabilityReport, IngredientAvailability, IngredientDeduction, ProductionRequest,
    ProductionResult, Recipe, RecipeLine,
};
