//! Ledger-derived balance engine for Bodega.
//!
//! Cash registers, ingredient stock and finished-product stock are all kept
//! as append-only ledgers whose current balance is a fold over their
//! history. This crate holds that engine and nothing else: no web or
//! database dependencies.
//!
//! # Modules
//!
//! - `ledger` - Entry store, balance fold, scoped transactions and corrections
//! - `register` - Cash register lifecycle (open, movements, close)
//! - `production` - Recipe availability and all-or-nothing production
//! - `inventory` - Ingredient/product catalog, stock adjustments and sales
//! - `events` - Plain-data alerts published to outside collaborators
//! - `engine` - Facade wiring the services to one store

pub mod engine;
pub mod events;
pub mod inventory;
pub mod ledger;
pub mod production;
pub mod register;

pub use engine::Engine;
pub use events::{DiscrepancyAlert, EngineEvent, EventBus, LowStockAlert, StockItem};
pub use inventory::Inventory;
pub use ledger::{LedgerError, LedgerResult, LedgerStore};
pub use production::Production;
pub use register::CashRegister;
