//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use boutique_core::{Address, Order, OrderLineInput, PaymentMethod, Product, ProductVariant, ShippingMethod};
use boutique_db::{Database, DbConfig};
use boutique_engine::{InMemoryGateway, OrderService};

/// Everything a test scenario needs.
pub struct TestStore {
    pub db: Database,
    pub service: OrderService<InMemoryGateway>,
    pub gateway: InMemoryGateway,
}

/// In-memory store for sequential scenarios.
pub async fn store() -> TestStore {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    build(db)
}

/// File-backed store with a real pool, for concurrency scenarios.
pub async fn file_store(path: &Path) -> TestStore {
    let db = Database::new(DbConfig::new(path).max_connections(8))
        .await
        .unwrap();
    build(db)
}

fn build(db: Database) -> TestStore {
    let gateway = InMemoryGateway::new();
    let service = OrderService::with_gateway(db.clone(), gateway.clone());
    TestStore {
        db,
        service,
        gateway,
    }
}

/// A throwaway database path under the system temp dir.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("boutique-test-{}.db", Uuid::new_v4()))
}

/// Removes a file-backed test database (including WAL side files).
pub fn cleanup_db(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut p = path.as_os_str().to_owned();
        p.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(p));
    }
}

// =============================================================================
// Catalog fixtures
// =============================================================================

/// Inserts a product without variants.
pub async fn plain_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: format!("Producto {sku}"),
        description: None,
        price_cents,
        stock,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    product
}

/// Inserts a product plus size variants; aggregate stock equals the sum.
pub async fn product_with_sizes(
    db: &Database,
    sku: &str,
    price_cents: i64,
    sizes: &[(&str, i64)],
) -> (Product, Vec<ProductVariant>) {
    let total: i64 = sizes.iter().map(|(_, stock)| stock).sum();
    let product = plain_product(db, sku, price_cents, total).await;

    let mut variants = Vec::with_capacity(sizes.len());
    for (size, stock) in sizes {
        let now = Utc::now();
        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size: size.to_string(),
            stock: *stock,
            sku: Some(format!("{sku}-{size}")),
            created_at: now,
            updated_at: now,
        };
        db.products().insert_variant(&variant).await.unwrap();
        variants.push(variant);
    }

    (product, variants)
}

/// Inserts an address for a user.
pub async fn address_for(db: &Database, user_id: &str) -> Address {
    let now = Utc::now();
    let address = Address {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        full_name: Some("Ana Flores".into()),
        label: Some("Casa".into()),
        phone: "+591 700 00000".into(),
        line1: "Av. Arce 2100".into(),
        line2: None,
        city: "La Paz".into(),
        state: None,
        postal_code: Some("0000".into()),
        country: "BO".into(),
        is_default: true,
        created_at: now,
        updated_at: now,
    };
    db.addresses().insert(&address).await.unwrap();
    address
}

// =============================================================================
// Method lookups (seeded by migration 002)
// =============================================================================

pub async fn shipping_standard(db: &Database) -> ShippingMethod {
    db.methods()
        .shipping_by_code("standard")
        .await
        .unwrap()
        .unwrap()
}

pub async fn shipping_pickup(db: &Database) -> ShippingMethod {
    db.methods()
        .shipping_by_code("pickup")
        .await
        .unwrap()
        .unwrap()
}

pub async fn payment_cod(db: &Database) -> PaymentMethod {
    db.methods().payment_by_code("cod").await.unwrap().unwrap()
}

pub async fn payment_offline(db: &Database) -> PaymentMethod {
    db.methods()
        .payment_by_code("bank_transfer")
        .await
        .unwrap()
        .unwrap()
}

pub async fn payment_gateway(db: &Database) -> PaymentMethod {
    db.methods()
        .payment_by_code("card_gateway")
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Line builders
// =============================================================================

pub fn line_for_variant(product: &Product, variant: &ProductVariant, qty: i64) -> OrderLineInput {
    OrderLineInput {
        product_id: product.id.clone(),
        variant_id: Some(variant.id.clone()),
        size_label: None,
        quantity: qty,
    }
}

pub fn line_for_size(product: &Product, size: &str, qty: i64) -> OrderLineInput {
    OrderLineInput {
        product_id: product.id.clone(),
        variant_id: None,
        size_label: Some(size.to_string()),
        quantity: qty,
    }
}

pub fn line_plain(product: &Product, qty: i64) -> OrderLineInput {
    OrderLineInput {
        product_id: product.id.clone(),
        variant_id: None,
        size_label: None,
        quantity: qty,
    }
}

// =============================================================================
// Order builders
// =============================================================================

/// Starts a draft and selects standard shipping, COD payment and an address,
/// leaving it ready to confirm.
pub async fn ready_order(ts: &TestStore, user_id: &str, lines: &[OrderLineInput]) -> Order {
    let order = ts.service.start(user_id, lines).await.unwrap();
    let shipping = shipping_standard(&ts.db).await;
    let payment = payment_cod(&ts.db).await;
    let address = address_for(&ts.db, user_id).await;

    ts.service
        .set_shipping_method(user_id, &order.id, &shipping.id)
        .await
        .unwrap();
    ts.service
        .set_payment_method(user_id, &order.id, &payment.id)
        .await
        .unwrap();
    ts.service
        .set_address(user_id, &order.id, &address.id)
        .await
        .unwrap()
}
