//! Plain-data alerts for outside collaborators.
//!
//! The engine never calls a notifier. Alerts are returned in the result of
//! the operation that raised them and also published on an [`EventBus`],
//! which any number of subscribers may follow. Publishing with no
//! subscriber is not an error.

use bodega_shared::types::{EntryId, IngredientId, LedgerId, ProductId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// A stock ledger at or below its minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// The stock ledger.
    pub ledger_id: LedgerId,
    /// What the ledger holds.
    pub item: StockItem,
    /// Display name of the item.
    pub name: String,
    /// Quantity after the triggering entry.
    pub current: Decimal,
    /// Configured minimum.
    pub minimum: Decimal,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl LowStockAlert {
    /// `minimum - current`, never negative.
    #[must_use]
    pub fn quantity_needed(&self) -> Decimal {
        (self.minimum - self.current).max(Decimal::ZERO)
    }
}

/// The catalog item behind a stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum StockItem {
    /// A raw ingredient.
    Ingredient(IngredientId),
    /// A finished product.
    Product(ProductId),
}

/// A register closed with a counted amount that differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyAlert {
    /// The cash ledger.
    pub ledger_id: LedgerId,
    /// The closing entry.
    pub entry_id: EntryId,
    /// Balance the register should have held.
    pub expected: Decimal,
    /// Amount counted by the operator.
    pub counted: Decimal,
    /// `counted - expected`.
    pub difference: Decimal,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

/// Engine event published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Stock fell to or below its minimum.
    LowStock(LowStockAlert),
    /// A register closed with a difference.
    RegisterDiscrepancy(DiscrepancyAlert),
}

/// Broadcast channel for [`EngineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: EngineEvent) {
        match &event {
            EngineEvent::LowStock(alert) => warn!(
                ledger_id = %alert.ledger_id,
                name = %alert.name,
                current = %alert.current,
                minimum = %alert.minimum,
                "low stock"
            ),
            EngineEvent::RegisterDiscrepancy(alert) => warn!(
                ledger_id = %alert.ledger_id,
                expected = %alert.expected,
                counted = %alert.counted,
                difference = %alert.difference,
                "register closed with a difference"
            ),
        }
        if self.sender.send(event).is_err() {
            debug!("engine event dropped, no subscribers");
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
