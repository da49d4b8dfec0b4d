//! Sale stock deduction.
//!
//! A completed sale deducts every line from its product ledger and, when
//! paid in cash, credits the register in the same transaction. One short
//! line rejects the whole sale.
//!
//! Cancelling a sale never edits its entries. It books a compensating
//! restock per deduction and a cash refund under the same sale reference,
//! again in one transaction.

use bodega_shared::types::{LedgerId, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::catalog::{Product, Stocked};
use super::service::Inventory;
use crate::events::{EngineEvent, LowStockAlert};
use crate::ledger::{
    CashEntryType, EntryReference, EntryType, LedgerEntry, LedgerError, LedgerResult, NewEntry,
    StockEntryType,
};
use crate::register::service::status_in;
use crate::register::{RegisterAction, transition};

/// One sold product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    /// Sold product.
    pub product_id: ProductId,
    /// Units sold, positive.
    pub quantity: Decimal,
    /// Price per unit; the catalog price when absent.
    pub unit_price: Option<Decimal>,
}

impl SaleLine {
    /// A line sold at catalog price.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
        }
    }
}

/// How the sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Payment {
    /// Cash into an open register.
    Cash {
        /// The register's cash ledger.
        register: LedgerId,
    },
    /// Card, transfer or anything that does not touch a register.
    Other,
}

/// A validated sale handed over by the sales front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    /// Identifier of the sale, stored as the entries' reference.
    pub sale_id: Uuid,
    /// Sold products.
    pub lines: Vec<SaleLine>,
    /// Payment method.
    pub payment: Payment,
    /// Cashier.
    pub actor_id: UserId,
}

/// Entries recorded for a completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOutcome {
    /// The sale.
    pub sale_id: Uuid,
    /// One stock deduction per line, in request order.
    pub deductions: Vec<LedgerEntry>,
    /// `Σ quantity * unit_price`.
    pub total: Decimal,
    /// The register credit for cash sales.
    pub cash_entry: Option<LedgerEntry>,
    /// Products left at or below their minimum.
    pub low_stock: Vec<LowStockAlert>,
}

/// Entries booked when a sale was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancellation {
    /// The cancelled sale.
    pub sale_id: Uuid,
    /// One restocking adjustment per original deduction.
    pub restocked: Vec<LedgerEntry>,
    /// The register debit for cash sales.
    pub refund: Option<LedgerEntry>,
}

fn is_sale_entry(entry: &LedgerEntry) -> bool {
    matches!(
        entry.entry_type,
        EntryType::Stock(StockEntryType::Sale) | EntryType::Cash(CashEntryType::Sale)
    )
}

impl Inventory {
    /// Deducts a sale from product stock, all lines or none.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidInput`] for an empty sale or a negative price
    /// - [`LedgerError::ProductNotFound`] for an unknown product
    /// - [`LedgerError::InsufficientStock`] if any line is short; nothing
    ///   is recorded
    /// - [`LedgerError::RegisterClosed`] for a cash sale on a closed register
    /// - [`LedgerError::Overflow`] if the total leaves the decimal range
    #[instrument(skip(self, request), fields(sale_id = %request.sale_id, lines = request.lines.len()))]
    pub async fn deduct_sale(&self, request: SaleRequest) -> LedgerResult<SaleOutcome> {
        if request.lines.is_empty() {
            return Err(LedgerError::InvalidInput("sale has no lines".into()));
        }
        let priced = request
            .lines
            .iter()
            .map(|line| {
                let product = self.catalog.product(line.product_id)?;
                let unit_price = line.unit_price.unwrap_or(product.price);
                if unit_price < Decimal::ZERO {
                    return Err(LedgerError::InvalidInput(format!(
                        "price for product {} cannot be negative",
                        product.id
                    )));
                }
                Ok((product, line.quantity, unit_price))
            })
            .collect::<LedgerResult<Vec<(Product, Decimal, Decimal)>>>()?;
        let total = priced
            .iter()
            .try_fold(Decimal::ZERO, |total, (_, quantity, unit_price)| {
                quantity
                    .checked_mul(*unit_price)
                    .and_then(|line_total| total.checked_add(line_total))
            })
            .ok_or(LedgerError::Overflow("sale total"))?;

        let register = match request.payment {
            Payment::Cash { register } => Some(register),
            Payment::Other => None,
        };
        let mut txn = self
            .store
            .begin(
                priced
                    .iter()
                    .map(|(product, _, _)| product.ledger_id)
                    .chain(register),
            )
            .await?;
        if let Some(register) = register {
            let status = status_in(&txn, register)?;
            transition(register, status, RegisterAction::Movement)
                .inspect_err(|err| warn!(%err, "sale rejected"))?;
        }

        let reference = EntryReference::Sale(request.sale_id);
        let mut deductions = Vec::with_capacity(priced.len());
        for (product, quantity, _) in &priced {
            let entry = txn
                .append(
                    NewEntry::new(
                        product.ledger_id,
                        EntryType::Stock(StockEntryType::Sale),
                        *quantity,
                        request.actor_id,
                    )
                    .with_reference(reference),
                )
                .inspect_err(|err| warn!(%err, product_id = %product.id, "sale rejected"))?;
            deductions.push(entry);
        }

        let cash_entry = match register {
            Some(register) if total > Decimal::ZERO => Some(txn.append(
                NewEntry::new(
                    register,
                    EntryType::Cash(CashEntryType::Sale),
                    total,
                    request.actor_id,
                )
                .with_reference(reference)
                .with_reason(format!("Sale {}", request.sale_id)),
            )?),
            _ => None,
        };
        txn.commit();

        let mut low_stock: Vec<LowStockAlert> = Vec::new();
        for ((product, _, _), entry) in priced.iter().zip(&deductions) {
            let is_last_for_product = deductions
                .iter()
                .rev()
                .find(|later| later.ledger_id == entry.ledger_id)
                .is_some_and(|last| last.entry_id == entry.entry_id);
            if is_last_for_product {
                low_stock.extend(product.low_stock_alert(entry.balance_after));
            }
        }
        for alert in &low_stock {
            self.events.publish(EngineEvent::LowStock(alert.clone()));
        }

        info!(%total, "sale deducted");
        Ok(SaleOutcome {
            sale_id: request.sale_id,
            deductions,
            total,
            cash_entry,
            low_stock,
        })
    }

    /// Reverses a sale: restocks every line and refunds its cash.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SaleNotFound`] if nothing was booked for `sale_id`
    /// - [`LedgerError::SaleAlreadyCancelled`] on a second cancellation
    /// - [`LedgerError::RegisterClosed`] if a cash sale's register has been
    ///   closed since
    /// - [`LedgerError::InsufficientFunds`] if the register cannot cover the
    ///   refund; nothing is recorded
    #[instrument(skip(self), fields(%sale_id))]
    pub async fn cancel_sale(
        &self,
        sale_id: Uuid,
        actor_id: UserId,
    ) -> LedgerResult<SaleCancellation> {
        let reference = EntryReference::Sale(sale_id);
        let ledgers = self.store.ledgers_referencing(reference);
        if ledgers.is_empty() {
            return Err(LedgerError::SaleNotFound(sale_id));
        }
        let mut txn = self.store.begin(ledgers).await?;
        let booked = txn.referencing(reference);
        if !booked.iter().all(is_sale_entry) {
            warn!("sale already cancelled");
            return Err(LedgerError::SaleAlreadyCancelled(sale_id));
        }

        let reason = format!("Sale {sale_id} cancelled");
        let mut restocked = Vec::new();
        let mut refund = None;
        for entry in &booked {
            match entry.entry_type {
                EntryType::Stock(_) => restocked.push(txn.append(
                    NewEntry::new(
                        entry.ledger_id,
                        EntryType::Stock(StockEntryType::Adjustment),
                        -entry.signed_quantity,
                        actor_id,
                    )
                    .with_reference(reference)
                    .with_reason(reason.clone()),
                )?),
                EntryType::Cash(_) => {
                    let status = status_in(&txn, entry.ledger_id)?;
                    transition(entry.ledger_id, status, RegisterAction::Movement)
                        .inspect_err(|err| warn!(%err, "cancellation rejected"))?;
                    refund = Some(
                        txn.append(
                            NewEntry::new(
                                entry.ledger_id,
                                EntryType::Cash(CashEntryType::Expense),
                                entry.signed_quantity,
                                actor_id,
                            )
                            .with_reference(reference)
                            .with_reason(reason.clone()),
                        )
                        .inspect_err(|err| warn!(%err, "cancellation rejected"))?,
                    );
                }
            }
        }
        txn.commit();

        info!(lines = restocked.len(), refunded = refund.is_some(), "sale cancelled");
        Ok(SaleCancellation {
            sale_id,
            restocked,
            refund,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::inventory::catalog::Catalog;
    use crate::inventory::service::NewProduct;
    use crate::ledger::LedgerStore;
    use crate::register::{CashRegister, MovementKind};
    use bodega_shared::types::{Currency, EntryRange, StoreId};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Shop {
        inventory: Inventory,
        register: CashRegister,
        till: LedgerId,
    }

    fn shop() -> Shop {
        let store = Arc::new(LedgerStore::default());
        let events = EventBus::new(32);
        let register = CashRegister::new(Arc::clone(&store), events.clone(), dec!(10));
        let till = register.create(StoreId::new(), Currency::Ars).id;
        Shop {
            inventory: Inventory::new(store, Arc::new(Catalog::new()), events),
            register,
            till,
        }
    }

    async fn product(shop: &Shop, name: &str, price: Decimal, stock: Decimal) -> Product {
        shop.inventory
            .register_product(
                NewProduct {
                    name: name.to_string(),
                    unit: "unit".to_string(),
                    price,
                    initial_stock: stock,
                    minimum_stock: dec!(2),
                },
                UserId::new(),
            )
            .await
            .unwrap()
            .item
    }

    fn sale(lines: Vec<SaleLine>, payment: Payment) -> SaleRequest {
        SaleRequest {
            sale_id: Uuid::now_v7(),
            lines,
            payment,
            actor_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn test_cash_sale_deducts_stock_and_credits_register() {
        let shop = shop();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;
        let cake = product(&shop, "Cake", dec!(12), dec!(3)).await;
        shop.register
            .open(shop.till, dec!(100), UserId::new())
            .await
            .unwrap();

        let outcome = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine::new(bread.id, dec!(4)), SaleLine::new(cake.id, dec!(1))],
                Payment::Cash { register: shop.till },
            ))
            .await
            .unwrap();

        assert_eq!(outcome.total, dec!(22));
        assert_eq!(outcome.deductions[0].balance_after, dec!(6));
        assert_eq!(outcome.cash_entry.unwrap().balance_after, dec!(122));
        assert_eq!(outcome.low_stock.len(), 1);
        assert_eq!(outcome.low_stock[0].name, "Cake");
    }

    #[tokio::test]
    async fn test_short_line_rejects_whole_sale() {
        let shop = shop();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;
        let cake = product(&shop, "Cake", dec!(12), dec!(1)).await;
        shop.register
            .open(shop.till, dec!(100), UserId::new())
            .await
            .unwrap();

        let result = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine::new(bread.id, dec!(4)), SaleLine::new(cake.id, dec!(2))],
                Payment::Cash { register: shop.till },
            ))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientStock { .. })));
        assert_eq!(
            shop.inventory.product(bread.id).await.unwrap().current_quantity,
            dec!(10)
        );
        assert_eq!(
            shop.register.state(shop.till).await.unwrap().current_balance,
            dec!(100)
        );
    }

    #[tokio::test]
    async fn test_cash_sale_needs_open_register() {
        let shop = shop();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;

        let result = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine::new(bread.id, dec!(1))],
                Payment::Cash { register: shop.till },
            ))
            .await;

        assert!(matches!(result, Err(LedgerError::RegisterClosed(_))));
        let entries = shop
            .inventory
            .store
            .get_entries(bread.ledger_id, EntryRange::all())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_card_sale_leaves_register_alone() {
        let shop = shop();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;
        shop.register
            .open(shop.till, dec!(50), UserId::new())
            .await
            .unwrap();
        shop.register
            .movement(shop.till, MovementKind::Income, dec!(5), None, UserId::new())
            .await
            .unwrap();

        let outcome = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine {
                    product_id: bread.id,
                    quantity: dec!(2),
                    unit_price: Some(dec!(2)),
                }],
                Payment::Other,
            ))
            .await
            .unwrap();

        assert_eq!(outcome.total, dec!(4));
        assert!(outcome.cash_entry.is_none());
        assert_eq!(
            shop.register.state(shop.till).await.unwrap().current_balance,
            dec!(55)
        );
    }

    #[tokio::test]
    async fn test_overflowing_total_is_rejected() {
        let shop = shop();
        let bread = product(&shop, "Bread", Decimal::MAX, dec!(10)).await;

        let result = shop
            .inventory
            .deduct_sale(sale(vec![SaleLine::new(bread.id, dec!(2))], Payment::Other))
            .await;

        assert!(matches!(result, Err(LedgerError::Overflow("sale total"))));
        assert_eq!(
            shop.inventory.product(bread.id).await.unwrap().current_quantity,
            dec!(10)
        );
    }

    #[tokio::test]
    async fn test_cancel_cash_sale_restocks_and_refunds() {
        let shop = shop();
        let actor = UserId::new();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;
        let cake = product(&shop, "Cake", dec!(12), dec!(3)).await;
        shop.register.open(shop.till, dec!(100), actor).await.unwrap();
        let sold = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine::new(bread.id, dec!(4)), SaleLine::new(cake.id, dec!(1))],
                Payment::Cash { register: shop.till },
            ))
            .await
            .unwrap();

        let cancelled = shop.inventory.cancel_sale(sold.sale_id, actor).await.unwrap();

        assert_eq!(cancelled.restocked.len(), 2);
        assert_eq!(cancelled.restocked[0].signed_quantity, dec!(4));
        assert_eq!(
            cancelled.restocked[0].entry_type,
            EntryType::Stock(StockEntryType::Adjustment)
        );
        let refund = cancelled.refund.unwrap();
        assert_eq!(refund.signed_quantity, dec!(-22));
        assert_eq!(refund.reference, Some(EntryReference::Sale(sold.sale_id)));
        assert_eq!(
            shop.inventory.product(bread.id).await.unwrap().current_quantity,
            dec!(10)
        );
        assert_eq!(
            shop.inventory.product(cake.id).await.unwrap().current_quantity,
            dec!(3)
        );
        assert_eq!(
            shop.register.state(shop.till).await.unwrap().current_balance,
            dec!(100)
        );

        let booked = shop
            .inventory
            .store
            .entries_by_reference(EntryReference::Sale(sold.sale_id))
            .await
            .unwrap();
        assert_eq!(booked.len(), 6);

        let again = shop.inventory.cancel_sale(sold.sale_id, actor).await;
        assert!(matches!(again, Err(LedgerError::SaleAlreadyCancelled(id)) if id == sold.sale_id));
        assert_eq!(
            shop.inventory.product(bread.id).await.unwrap().current_quantity,
            dec!(10)
        );
    }

    #[tokio::test]
    async fn test_cancel_card_sale_only_restocks() {
        let shop = shop();
        let bread = product(&shop, "Bread", dec!(2.50), dec!(10)).await;
        let sold = shop
            .inventory
            .deduct_sale(sale(vec![SaleLine::new(bread.id, dec!(3))], Payment::Other))
            .await
            .unwrap();

        let cancelled = shop
            .inventory
            .cancel_sale(sold.sale_id, UserId::new())
            .await
            .unwrap();

        assert!(cancelled.refund.is_none());
        assert_eq!(cancelled.restocked[0].balance_after, dec!(10));
    }

    #[tokio::test]
    async fn test_cancel_on_closed_register_changes_nothing() {
        let shop = shop();
        let actor = UserId::new();
        let bread = product(&shop, "Bread", dec!(2), dec!(10)).await;
        shop.register.open(shop.till, dec!(20), actor).await.unwrap();
        let sold = shop
            .inventory
            .deduct_sale(sale(
                vec![SaleLine::new(bread.id, dec!(5))],
                Payment::Cash { register: shop.till },
            ))
            .await
            .unwrap();
        shop.register.close(shop.till, dec!(30), actor).await.unwrap();

        let result = shop.inventory.cancel_sale(sold.sale_id, actor).await;

        assert!(matches!(result, Err(LedgerError::RegisterClosed(_))));
        assert_eq!(
            shop.inventory.product(bread.id).await.unwrap().current_quantity,
            dec!(5)
        );
        assert_eq!(shop.inventory.store.entry_count(bread.ledger_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale() {
        let shop = shop();
        let sale_id = Uuid::now_v7();
        let result = shop.inventory.cancel_sale(sale_id, UserId::new()).await;
        assert!(matches!(result, Err(LedgerError::SaleNotFound(id)) if id == sale_id));
    }

    #[tokio::test]
    async fn test_empty_sale_is_invalid() {
        let shop = shop();
        let result = shop.inventory.deduct_sale(sale(vec![], Payment::Other)).await;
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
    }
}
