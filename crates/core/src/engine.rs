//! Engine facade.
//!
//! One [`Engine`] owns one ledger store, one catalog and one event bus and
//! hands out the services that operate on them. Services are cheap handles
//! over shared state, so cloning the engine shares the same ledgers.

use std::sync::Arc;

use bodega_shared::config::EngineConfig;
use bodega_shared::types::LedgerId;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::info;

use crate::events::{EngineEvent, EventBus};
use crate::inventory::{Catalog, Inventory};
use crate::ledger::{ChainBreak, LedgerResult, LedgerStore};
use crate::production::Production;
use crate::register::CashRegister;

/// The ledger engine and its services.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<LedgerStore>,
    catalog: Arc<Catalog>,
    events: EventBus,
    register: CashRegister,
    production: Production,
    inventory: Inventory,
}

impl Engine {
    /// Builds an empty engine from configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let store = Arc::new(LedgerStore::new(config.lock_timeout()));
        let catalog = Arc::new(Catalog::new());
        let events = EventBus::new(config.event_buffer);

        info!(
            lock_timeout_ms = config.lock_timeout_ms,
            discrepancy_threshold = %config.discrepancy_threshold,
            "ledger engine ready"
        );

        Self {
            register: CashRegister::new(
                Arc::clone(&store),
                events.clone(),
                config.discrepancy_threshold,
            ),
            production: Production::new(Arc::clone(&store), Arc::clone(&catalog), events.clone()),
            inventory: Inventory::new(Arc::clone(&store), Arc::clone(&catalog), events.clone()),
            store,
            catalog,
            events,
        }
    }

    /// The underlying ledger store.
    #[must_use]
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// The ingredient, product and recipe catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Cash register operations.
    #[must_use]
    pub fn register(&self) -> &CashRegister {
        &self.register
    }

    /// Recipe availability and production.
    #[must_use]
    pub fn production(&self) -> &Production {
        &self.production
    }

    /// Catalog registration, stock movements and sales.
    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// The bus alerts are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to engine events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Checks that a ledger's recorded balances match a fresh fold.
    pub async fn verify_ledger(&self, ledger_id: LedgerId) -> LedgerResult<Result<Decimal, ChainBreak>> {
        self.store.verify(ledger_id).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
