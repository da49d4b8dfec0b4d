//! Cash register lifecycle.
//!
//! # Modules
//!
//! - `state` - Derived register status and the transition rules
//! - `summary` - Per-day totals of a register
//! - `service` - Open, movement, close and register queries

pub mod service;
pub mod state;
pub mod summary;

pub use service::{CashRegister, DEFAULT_RECENT_LIMIT};
pub use state::{
    CloseOutcome, MovementKind, RegisterAction, RegisterState, RegisterStatus, transition,
};
pub use summary::{DailySummary, TypeTotal, summarize};
