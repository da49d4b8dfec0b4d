//! Shared types, errors, and configuration for Bodega.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for ledgers, registers, ingredients, products and recipes
//! - Register currencies and physical quantity units
//! - Entry range queries for paged ledger reads
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
