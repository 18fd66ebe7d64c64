//! # Seed Data Generator
//!
//! Populates a database with a demo boutique catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p boutique-db --bin seed
//!
//! # Specify database path
//! cargo run -p boutique-db --bin seed -- --db ./data/boutique.db
//! ```
//!
//! Each product gets size variants with stock spread across them; product
//! aggregate stock is kept equal to the variant sum.

use chrono::Utc;
use std::env;
use uuid::Uuid;

use boutique_core::{Product, ProductVariant};
use boutique_db::{Database, DbConfig};

/// (sku, name, price_cents, sizes)
const CATALOG: &[(&str, &str, i64, &[&str])] = &[
    ("DRESS-LINEN", "Vestido de lino", 28900, &["S", "M", "L"]),
    ("DRESS-FLORAL", "Vestido floral", 24500, &["S", "M", "L", "XL"]),
    ("SHIRT-OXFORD", "Camisa oxford", 18900, &["S", "M", "L", "XL"]),
    ("SHIRT-LINEN", "Camisa de lino", 20900, &["M", "L"]),
    ("PANT-CHINO", "Pantalon chino", 22900, &["38", "40", "42", "44"]),
    ("SKIRT-MIDI", "Falda midi", 19900, &["S", "M", "L"]),
    ("SHOE-DERBY", "Zapato derby", 45900, &["39", "40", "41", "42", "43"]),
    ("SHOE-FLAT", "Balerina", 31900, &["36", "37", "38", "39"]),
    ("SCARF-WOOL", "Chalina de lana", 9900, &[]),
    ("BELT-LEATHER", "Cinturon de cuero", 12900, &[]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./boutique_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Boutique Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./boutique_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Boutique Seed Data Generator");
    println!("============================");
    println!("Database: {db_path}");
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("Database already has {existing} products, skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let products = db.products();
    let mut generated = 0usize;

    for (idx, (sku, name, price_cents, sizes)) in CATALOG.iter().enumerate() {
        let now = Utc::now();
        // stock per size derived from the position so runs are reproducible
        let per_size = 3 + (idx as i64 % 5);
        let total: i64 = if sizes.is_empty() {
            per_size * 2
        } else {
            per_size * sizes.len() as i64
        };

        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            description: None,
            price_cents: *price_cents,
            stock: total,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        products.insert(&product).await?;

        for size in sizes.iter() {
            let variant = ProductVariant {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                size: size.to_string(),
                stock: per_size,
                sku: Some(format!("{sku}-{size}")),
                created_at: now,
                updated_at: now,
            };
            products.insert_variant(&variant).await?;
        }

        generated += 1;
        println!("  {} ({} sizes, stock {})", sku, sizes.len(), total);
    }

    println!();
    println!("Seeded {generated} products");

    let shipping = db.methods().list_shipping().await?;
    let payment = db.methods().list_payment().await?;
    println!("Fulfillment catalog: {} shipping, {} payment methods", shipping.len(), payment.len());

    println!();
    println!("Seed complete");

    Ok(())
}
