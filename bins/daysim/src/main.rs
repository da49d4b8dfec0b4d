//! Bodega trading day simulator.
//!
//! Seeds a small bakery catalog, then replays one day through the ledger
//! engine: open the register, bake, sell, cancel a sale, pay an expense and
//! close with a short count. Prints the resulting balances, the production
//! log and every alert raised.
//!
//! Usage: cargo run --bin daysim

use anyhow::Context;
use bodega_core::inventory::{NewIngredient, NewProduct, Payment, SaleLine, SaleRequest};
use bodega_core::ledger::EntryType;
use bodega_core::production::{HistoryFilter, RecipeLine};
use bodega_core::register::MovementKind;
use bodega_core::{Engine, EngineEvent, LedgerError};
use bodega_shared::AppConfig;
use bodega_shared::config::LoggingConfig;
use bodega_shared::types::{IngredientId, ProductId, StoreId, UserId};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn ingredient(
    engine: &Engine,
    actor: UserId,
    name: &str,
    stock: Decimal,
    minimum: Decimal,
    cost: Decimal,
) -> anyhow::Result<IngredientId> {
    let view = engine
        .inventory()
        .register_ingredient(
            NewIngredient {
                name: name.to_string(),
                unit: "kg".to_string(),
                initial_quantity: stock,
                minimum_quantity: minimum,
                cost_per_unit: cost,
            },
            actor,
        )
        .await?;
    Ok(view.item.id)
}

async fn product(
    engine: &Engine,
    actor: UserId,
    name: &str,
    price: Decimal,
    stock: Decimal,
    minimum: Decimal,
) -> anyhow::Result<ProductId> {
    let view = engine
        .inventory()
        .register_product(
            NewProduct {
                name: name.to_string(),
                unit: "unit".to_string(),
                price,
                initial_stock: stock,
                minimum_stock: minimum,
            },
            actor,
        )
        .await?;
    Ok(view.item.id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let engine = Engine::new(&config.engine);
    let mut events = engine.subscribe();
    let actor = UserId::new();
    info!(store = %config.store.name, currency = %config.store.currency, "starting trading day");

    // Catalog
    let flour = ingredient(&engine, actor, "Flour", dec!(20), dec!(5), dec!(1.20)).await?;
    let butter = ingredient(&engine, actor, "Butter", dec!(6), dec!(2), dec!(4.50)).await?;
    let sugar = ingredient(&engine, actor, "Sugar", dec!(3), dec!(1), dec!(0.90)).await?;
    let croissant = product(&engine, actor, "Croissant", dec!(1.50), dec!(0), dec!(10)).await?;
    let bread = product(&engine, actor, "Bread", dec!(2.00), dec!(30), dec!(10)).await?;
    let recipe = engine.inventory().register_recipe(
        "Croissant",
        croissant,
        dec!(12),
        vec![
            RecipeLine::new(flour, dec!(1)),
            RecipeLine::new(butter, dec!(0.5)),
            RecipeLine::new(sugar, dec!(0.2)),
        ],
    )?;

    // Morning
    let register = engine
        .register()
        .create(StoreId::new(), config.store.currency)
        .id;
    engine.register().open(register, dec!(100), actor).await?;

    let costing = engine.inventory().recipe_costing(recipe.id)?;
    let max = engine.production().max_producible(&recipe).await?;
    println!(
        "Croissant: batch cost {}, unit cost {}, margin {}%, max batches {max}",
        costing.batch_cost,
        costing.unit_cost.round_dp(2),
        costing
            .margin_percent
            .map_or_else(|| "n/a".to_string(), |m| m.to_string()),
    );

    let baked = engine.production().produce(&recipe, 4, actor).await?;
    println!(
        "Baked {} croissants for {}",
        baked.produced_quantity, baked.total_cost
    );
    let again = u32::try_from(max).unwrap_or(u32::MAX);
    match engine.production().produce(&recipe, again, actor).await {
        Err(LedgerError::InsufficientIngredients(shortages)) => {
            for shortage in shortages {
                println!(
                    "Second batch refused: {} missing {}",
                    shortage.ingredient_id, shortage.missing
                );
            }
        }
        Err(err) => warn!(%err, "second batch refused"),
        Ok(result) => println!("Baked {} more croissants", result.produced_quantity),
    }

    // Sales
    let sales = [
        (vec![SaleLine::new(croissant, dec!(6)), SaleLine::new(bread, dec!(2))], true),
        (vec![SaleLine::new(bread, dec!(12))], true),
        (vec![SaleLine::new(croissant, dec!(50))], true),
        (vec![SaleLine::new(croissant, dec!(12)), SaleLine::new(bread, dec!(8))], false),
    ];
    let mut completed = Vec::new();
    for (lines, cash) in sales {
        let payment = if cash {
            Payment::Cash { register }
        } else {
            Payment::Other
        };
        let request = SaleRequest {
            sale_id: Uuid::now_v7(),
            lines,
            payment,
            actor_id: actor,
        };
        match engine.inventory().deduct_sale(request).await {
            Ok(outcome) => {
                println!("Sale {} for {}", outcome.sale_id, outcome.total);
                completed.push(outcome.sale_id);
            }
            Err(err) => println!("Sale rejected: {err}"),
        }
    }
    if let Some(&returned) = completed.first() {
        let cancelled = engine.inventory().cancel_sale(returned, actor).await?;
        let refund = cancelled
            .refund
            .map_or(Decimal::ZERO, |entry| entry.signed_quantity.abs());
        println!(
            "Sale {returned} cancelled: {} lines restocked, refund {refund}",
            cancelled.restocked.len()
        );
    }

    // Evening
    engine
        .register()
        .movement(
            register,
            MovementKind::Expense,
            dec!(15),
            Some("Cleaning supplies".to_string()),
            actor,
        )
        .await?;
    let expected = engine.register().state(register).await?.current_balance;
    let closed = engine
        .register()
        .close(register, expected - dec!(12), actor)
        .await?;
    println!(
        "Register closed: expected {}, counted {}, difference {}, now {}",
        closed.expected, closed.counted, closed.difference, closed.state.status
    );

    let summary = engine
        .register()
        .daily_summary(register, Utc::now().date_naive())
        .await?;
    for total in &summary.by_type {
        let name = EntryType::Cash(total.entry_type).to_string();
        println!("  {name:<10} x{:<3} {}", total.count, total.total);
    }

    for run in engine.production().history(HistoryFilter::All, None) {
        println!(
            "Production {} x{} of {}: {} units, cost {}",
            run.production_id,
            run.multiplier,
            run.recipe_name,
            run.produced_quantity,
            run.total_cost
        );
    }
    for stats in engine.production().popular_recipes(None, 5)? {
        println!(
            "  {} made {} times, {} units, revenue potential {}",
            stats.recipe_name, stats.times_made, stats.total_quantity, stats.revenue_potential
        );
    }

    for alert in engine.inventory().low_stock().await? {
        println!(
            "Low stock: {} at {} (minimum {}, order {})",
            alert.name,
            alert.current,
            alert.minimum,
            alert.quantity_needed()
        );
    }

    loop {
        match events.try_recv() {
            Ok(EngineEvent::LowStock(alert)) => {
                println!("Event: {} fell to {}", alert.name, alert.current);
            }
            Ok(EngineEvent::RegisterDiscrepancy(alert)) => {
                println!("Event: register difference {}", alert.difference);
            }
            Err(TryRecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    if let Err(broken) = engine.verify_ledger(register).await? {
        anyhow::bail!("register ledger inconsistent at entry {}", broken.entry_id);
    }
    info!("trading day replayed");
    Ok(())
}
