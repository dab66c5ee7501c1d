//! Seed data script - populates the catalog with demo products
//!
//! Run with: cargo run --bin seed-data

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use storefront_api::{
    config, db,
    events::{process_events, EventSender},
    services::{catalog::CreateProductInput, CatalogService},
};

struct SeedProduct {
    heading: &'static str,
    product_type: &'static str,
    brand: &'static str,
    item: &'static str,
    price: Decimal,
    mrp: Decimal,
    stock: i32,
}

const SEED_VENDOR: i32 = 1;

fn catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            heading: "Trail Runner 2",
            product_type: "Footwear",
            brand: "Stride",
            item: "Running Shoes",
            price: dec!(89.99),
            mrp: dec!(119.99),
            stock: 40,
        },
        SeedProduct {
            heading: "Everyday Crew Tee",
            product_type: "Apparel",
            brand: "Basics Co",
            item: "T-Shirt",
            price: dec!(14.50),
            mrp: dec!(14.50),
            stock: 200,
        },
        SeedProduct {
            heading: "Canvas Weekender",
            product_type: "Accessories",
            brand: "Harbor",
            item: "Duffel Bag",
            price: dec!(64.00),
            mrp: dec!(80.00),
            stock: 25,
        },
        SeedProduct {
            heading: "Noise Cancelling Headphones",
            product_type: "Electronics",
            brand: "Quietly",
            item: "Headphones",
            price: dec!(199.00),
            mrp: dec!(249.00),
            stock: 15,
        },
        SeedProduct {
            heading: "Steel Water Bottle",
            product_type: "Accessories",
            brand: "Harbor",
            item: "Bottle",
            price: dec!(22.00),
            mrp: dec!(25.00),
            stock: 120,
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cfg = config::load_config().context("failed to load configuration")?;
    info!("Connecting to database: {}", cfg.database_url());
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;

    let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
    let events = tokio::spawn(process_events(rx));
    let catalog_service = CatalogService::new(Arc::new(pool), Arc::new(EventSender::new(tx)));

    for (index, seed) in catalog().into_iter().enumerate() {
        let slug = seed.item.to_lowercase().replace(' ', "-");
        let input = CreateProductInput {
            user_id: SEED_VENDOR,
            heading: seed.heading.to_string(),
            sub_heading: None,
            details: Some(format!("{} by {}", seed.item, seed.brand)),
            price: seed.price,
            mrp: seed.mrp,
            specification: None,
            product_type: seed.product_type.to_string(),
            brand: seed.brand.to_string(),
            item: seed.item.to_string(),
            stock_quantity: Some(seed.stock),
            images: vec![
                format!("https://cdn.example.com/products/{}-{}/front.jpg", slug, index),
                format!("https://cdn.example.com/products/{}-{}/side.jpg", slug, index),
            ],
        };
        let id = catalog_service.create_product(input).await?;
        info!(product_id = id, heading = seed.heading, "Seeded product");
    }

    drop(catalog_service);
    events.await?;
    info!("Seeding complete");
    Ok(())
}
