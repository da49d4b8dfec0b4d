//! Ingredient and product inventory.
//!
//! # Modules
//!
//! - `catalog` - Ingredients, products and recipes by id
//! - `service` - Registration, manual stock movements, low stock and recipe upkeep
//! - `sale` - All-or-nothing stock deduction and cancellation of sales

pub mod catalog;
pub mod sale;
pub mod service;

pub use catalog::{Catalog, Ingredient, Product, Stocked};
pub use sale::{Payment, SaleCancellation, SaleLine, SaleOutcome, SaleRequest};
pub use service::{Inventory, NewIngredient, NewProduct, StockCorrection, StockMovement, StockView};
