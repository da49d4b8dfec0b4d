//! Common types used across the application.

pub mod currency;
pub mod id;
pub mod paging;
pub mod unit;

pub use currency::Currency;
pub use id::*;
pub use paging::EntryRange;
pub use unit::Unit;
