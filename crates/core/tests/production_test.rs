//! All-or-nothing production and sale deduction.
//!
//! These tests verify that:
//! - A failed production leaves every involved ledger exactly as it was
//! - A failed sale deducts nothing, including the register credit
//! - Entries booked by a production keep their quantity, manual ones cascade

use bodega_core::events::StockItem;
use bodega_core::inventory::{NewIngredient, NewProduct, Payment, SaleLine, SaleRequest};
use bodega_core::ledger::LedgerEntry;
use bodega_core::production::RecipeLine;
use bodega_core::{Engine, LedgerError};
use bodega_shared::types::{
    Currency, EntryRange, IngredientId, LedgerId, ProductId, StoreId, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn snapshot(engine: &Engine, ledgers: &[LedgerId]) -> Vec<Vec<LedgerEntry>> {
    let mut entries = Vec::with_capacity(ledgers.len());
    for ledger_id in ledgers {
        entries.push(
            engine
                .store()
                .get_entries(*ledger_id, EntryRange::all())
                .await
                .unwrap(),
        );
    }
    entries
}

async fn ingredient(engine: &Engine, name: &str, stock: Decimal) -> (IngredientId, LedgerId) {
    let view = engine
        .inventory()
        .register_ingredient(
            NewIngredient {
                name: name.to_string(),
                unit: "kg".to_string(),
                initial_quantity: stock,
                minimum_quantity: dec!(1),
                cost_per_unit: dec!(2),
            },
            UserId::new(),
        )
        .await
        .unwrap();
    (view.item.id, view.item.ledger_id)
}

async fn product(
    engine: &Engine,
    name: &str,
    stock: Decimal,
    price: Decimal,
) -> (ProductId, LedgerId) {
    let view = engine
        .inventory()
        .register_product(
            NewProduct {
                name: name.to_string(),
                unit: "unit".to_string(),
                price,
                initial_stock: stock,
                minimum_stock: dec!(0),
            },
            UserId::new(),
        )
        .await
        .unwrap();
    (view.item.id, view.item.ledger_id)
}

#[tokio::test]
async fn test_failed_production_changes_no_ledger() {
    let engine = Engine::default();
    let (flour, flour_ledger) = ingredient(&engine, "Flour", dec!(10)).await;
    let (butter, butter_ledger) = ingredient(&engine, "Butter", dec!(4)).await;
    let (croissant, croissant_ledger) = product(&engine, "Croissant", dec!(0), dec!(5)).await;
    let recipe = engine
        .inventory()
        .register_recipe(
            "Croissant",
            croissant,
            dec!(12),
            vec![
                RecipeLine::new(flour, dec!(2)),
                RecipeLine::new(butter, dec!(1.5)),
            ],
        )
        .unwrap();
    let ledgers = [flour_ledger, butter_ledger, croissant_ledger];

    assert_eq!(engine.production().max_producible(&recipe).await.unwrap(), 2);
    let before = snapshot(&engine, &ledgers).await;

    let result = engine.production().produce(&recipe, 3, UserId::new()).await;

    match result {
        Err(LedgerError::InsufficientIngredients(shortages)) => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].ingredient_id, butter);
            assert_eq!(shortages[0].required, dec!(4.5));
            assert_eq!(shortages[0].missing, dec!(0.5));
        }
        other => panic!("expected shortages, got {other:?}"),
    }
    assert_eq!(snapshot(&engine, &ledgers).await, before);

    let produced = engine
        .production()
        .produce(&recipe, 2, UserId::new())
        .await
        .unwrap();
    assert_eq!(produced.produced_quantity, dec!(24));
    assert_eq!(produced.total_cost, dec!(14));
    assert_eq!(
        engine.store().current_balance(butter_ledger).await.unwrap(),
        dec!(1)
    );
    assert_eq!(produced.low_stock.len(), 1);
    assert_eq!(produced.low_stock[0].item, StockItem::Ingredient(butter));
}

#[tokio::test]
async fn test_failed_sale_deducts_nothing() {
    let engine = Engine::default();
    let actor = UserId::new();
    let register = engine.register().create(StoreId::new(), Currency::Ars).id;
    engine.register().open(register, dec!(20), actor).await.unwrap();
    let (bread, bread_ledger) = product(&engine, "Bread", dec!(10), dec!(3)).await;
    let (cake, cake_ledger) = product(&engine, "Cake", dec!(1), dec!(12)).await;
    let ledgers = [register, bread_ledger, cake_ledger];
    let before = snapshot(&engine, &ledgers).await;

    let result = engine
        .inventory()
        .deduct_sale(SaleRequest {
            sale_id: Uuid::now_v7(),
            lines: vec![SaleLine::new(bread, dec!(4)), SaleLine::new(cake, dec!(2))],
            payment: Payment::Cash { register },
            actor_id: actor,
        })
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientStock { ledger_id, .. }) if ledger_id == cake_ledger
    ));
    assert_eq!(snapshot(&engine, &ledgers).await, before);
}

#[tokio::test]
async fn test_stock_corrections_respect_operation_links() {
    let engine = Engine::default();
    let actor = UserId::new();
    let (sugar, sugar_ledger) = ingredient(&engine, "Sugar", dec!(5)).await;
    let (cookie, _) = product(&engine, "Cookie", dec!(0), dec!(1)).await;
    let recipe = engine
        .inventory()
        .register_recipe("Cookie", cookie, dec!(10), vec![RecipeLine::new(sugar, dec!(1))])
        .unwrap();

    let manual = engine
        .inventory()
        .adjust_stock(StockItem::Ingredient(sugar), dec!(-2), None, actor)
        .await
        .unwrap()
        .entry;
    let corrected = engine
        .store()
        .correct_entry(manual.entry_id, dec!(-1), Some("Spilled less".to_string()))
        .await
        .unwrap();
    assert_eq!(corrected.final_balance, dec!(4));

    let produced = engine.production().produce(&recipe, 1, actor).await.unwrap();
    let usage = produced.deductions[0].entry_id;
    let rejected = engine.store().correct_entry(usage, dec!(-2), None).await;
    assert!(matches!(rejected, Err(LedgerError::ImmutableEntry(id)) if id == usage));

    engine
        .inventory()
        .record_adjustment(StockItem::Ingredient(sugar), dec!(1), "Recount".to_string(), actor)
        .await
        .unwrap();
    assert_eq!(
        engine.store().current_balance(sugar_ledger).await.unwrap(),
        dec!(4)
    );
    assert_eq!(engine.verify_ledger(sugar_ledger).await.unwrap(), Ok(dec!(4)));
}
