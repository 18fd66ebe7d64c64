//! # Product Repository
//!
//! Database operations for products and their size variants - the catalog
//! store contract the reservation engine runs against.
//!
//! ## Stock Mutation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variant-backed product:                                                │
//! │     decrement/increment the variant row, then recompute                 │
//! │     products.stock = SUM(product_variants.stock)                        │
//! │                                                                         │
//! │  Variant-less product:                                                  │
//! │     adjust products.stock directly (deductions floor at zero)           │
//! │                                                                         │
//! │  Decrements are guarded: `stock = stock - ?` only `WHERE stock >= ?`.   │
//! │  Zero rows affected means a concurrent writer won the race.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock mutators and transactional readers take `&mut SqliteConnection` so
//! the engine can compose them inside one transaction; pool-backed methods
//! serve plain reads and catalog management.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use boutique_core::{Product, ProductVariant};

const PRODUCT_COLUMNS: &str = "id, sku, name, description, price_cents, stock, \
     is_active, created_at, updated_at";

const VARIANT_COLUMNS: &str = "id, product_id, size, stock, sku, created_at, updated_at";

/// Repository for product and variant database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Pool-backed reads
    // =========================================================================

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a variant by its ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Lists the variants of a product, ordered by size.
    pub async fn variants(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ?1 ORDER BY size"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Current stock of a product. Used by inventory verification.
    pub async fn product_stock(&self, id: &str) -> DbResult<i64> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        stock.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Current stock of a variant. Used by inventory verification.
    pub async fn variant_stock(&self, id: &str) -> DbResult<i64> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        stock.ok_or_else(|| DbError::not_found("ProductVariant", id))
    }

    // =========================================================================
    // Catalog management
    // =========================================================================

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, price_cents, stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2,
                name = ?3,
                description = ?4,
                price_cents = ?5,
                stock = ?6,
                is_active = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Inserts a new size variant.
    pub async fn insert_variant(&self, variant: &ProductVariant) -> DbResult<()> {
        debug!(product_id = %variant.product_id, size = %variant.size, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, size, stock, sku, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.size)
        .bind(variant.stock)
        .bind(&variant.sku)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a product.
    ///
    /// Historical orders keep referencing it, so rows are never removed.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Transactional reads (reservation engine)
    // =========================================================================

    /// Loads an active product inside the caller's transaction.
    pub async fn load_active(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND is_active = 1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }

    /// Loads a product regardless of active flag, inside the caller's
    /// transaction. Deduction/restoration must work even after a soft delete.
    pub async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }

    /// Loads a variant by id, scoped to its product.
    pub async fn load_variant(
        conn: &mut SqliteConnection,
        id: &str,
        product_id: &str,
    ) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = ?1 AND product_id = ?2"
        ))
        .bind(id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;

        Ok(variant)
    }

    /// Resolves a variant by size label. A miss is not an error.
    pub async fn load_variant_by_size(
        conn: &mut SqliteConnection,
        product_id: &str,
        size: &str,
    ) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ?1 AND size = ?2"
        ))
        .bind(product_id)
        .bind(size)
        .fetch_optional(conn)
        .await?;

        Ok(variant)
    }

    /// Counts a product's variants inside the caller's transaction.
    pub async fn variant_count(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_variants WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(conn)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Stock mutation (reservation engine)
    // =========================================================================

    /// Guarded variant decrement: succeeds only while enough stock remains.
    ///
    /// Returns `false` when no row matched, i.e. a concurrent transaction
    /// consumed the stock after the availability check.
    pub async fn decrement_variant_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(variant_id = %id, quantity, "Decrementing variant stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Adds restored units back to a variant.
    pub async fn increment_variant_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(variant_id = %id, quantity, "Incrementing variant stock");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE product_variants SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }

    /// Recomputes a product's aggregate stock as the sum of its variants.
    pub async fn recompute_product_stock(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = (
                    SELECT COALESCE(SUM(stock), 0)
                    FROM product_variants
                    WHERE product_id = ?1
                ),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Deducts directly from a variant-less product's stock, flooring at
    /// zero.
    pub async fn deduct_product_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(product_id = %id, quantity, "Deducting product stock");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET stock = MAX(0, stock - ?2), updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Adds restored units directly back to a variant-less product's stock.
    pub async fn restore_product_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(product_id = %id, quantity, "Restoring product stock");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(quantity)
                .bind(now)
                .execute(conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn product(sku: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: format!("Test {sku}"),
            description: None,
            price_cents: 4990,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(product_id: &str, size: &str, stock: i64) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            size: size.to_string(),
            stock,
            sku: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = product("DRESS-01", 10);
        repo.insert(&p).await.unwrap();

        let loaded = repo.get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "DRESS-01");
        assert_eq!(loaded.stock, 10);

        let by_sku = repo.get_by_sku("DRESS-01").await.unwrap().unwrap();
        assert_eq!(by_sku.id, p.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&product("DRESS-01", 1)).await.unwrap();
        let err = repo.insert(&product("DRESS-01", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_guarded_decrement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = product("SHOE-01", 0);
        repo.insert(&p).await.unwrap();
        let v = variant(&p.id, "42", 2);
        repo.insert_variant(&v).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(
            ProductRepository::decrement_variant_stock(&mut conn, &v.id, 2)
                .await
                .unwrap()
        );
        // nothing left: the guard refuses
        assert!(
            !ProductRepository::decrement_variant_stock(&mut conn, &v.id, 1)
                .await
                .unwrap()
        );
        drop(conn);

        assert_eq!(repo.variant_stock(&v.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recompute_from_variants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = product("SHIRT-01", 0);
        repo.insert(&p).await.unwrap();
        repo.insert_variant(&variant(&p.id, "S", 3)).await.unwrap();
        repo.insert_variant(&variant(&p.id, "M", 4)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        ProductRepository::recompute_product_stock(&mut conn, &p.id)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(repo.product_stock(&p.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_direct_deduction_floors_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = product("BELT-01", 2);
        repo.insert(&p).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        ProductRepository::deduct_product_stock(&mut conn, &p.id, 5)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(repo.product_stock(&p.id).await.unwrap(), 0);
    }
}
