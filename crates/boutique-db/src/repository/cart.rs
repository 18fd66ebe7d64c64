//! # Cart Repository
//!
//! Per-user cart persistence. Carts feed order creation and are cleared
//! (best-effort) once an order confirms.
//!
//! Adding a `(product, variant, size_label)` tuple that already exists in
//! the cart merges quantities instead of duplicating the row; a unique index
//! on the tuple backs this up at the schema level.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use boutique_core::{Cart, CartItem};

const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, variant_id, size_label, quantity, added_at";

/// One requested cart line for [`CartRepository::merge`].
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub size_label: Option<String>,
    pub quantity: i64,
}

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the user's cart, creating it on first use.
    pub async fn get_or_create(&self, user_id: &str) -> DbResult<Cart> {
        if let Some(cart) = self.get(user_id).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(user_id = %user_id, "Creating cart");

        let inserted = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(cart),
            // a concurrent request created it first
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed") => {
                self.get(user_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Cart", user_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Gets the user's cart without creating it.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Lists cart items, newest first.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 ORDER BY added_at DESC, id"
        ))
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Adds a line to the user's cart, merging quantity into an existing
    /// matching line.
    pub async fn add_item(&self, user_id: &str, line: &CartLine) -> DbResult<CartItem> {
        let cart = self.get_or_create(user_id).await?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items \
             WHERE cart_id = ?1 AND product_id = ?2 \
               AND ifnull(variant_id, '') = ifnull(?3, '') \
               AND ifnull(size_label, '') = ifnull(?4, '')"
        ))
        .bind(&cart.id)
        .bind(&line.product_id)
        .bind(&line.variant_id)
        .bind(&line.size_label)
        .fetch_optional(&mut *tx)
        .await?;

        let item = match existing {
            Some(mut item) => {
                item.quantity += line.quantity;
                sqlx::query("UPDATE cart_items SET quantity = ?2 WHERE id = ?1")
                    .bind(&item.id)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await?;
                item
            }
            None => {
                let item = CartItem {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart.id.clone(),
                    product_id: line.product_id.clone(),
                    variant_id: line.variant_id.clone(),
                    size_label: line.size_label.clone(),
                    quantity: line.quantity,
                    added_at: Utc::now(),
                };
                sqlx::query(
                    r#"
                    INSERT INTO cart_items (
                        id, cart_id, product_id, variant_id, size_label, quantity, added_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&item.id)
                .bind(&item.cart_id)
                .bind(&item.product_id)
                .bind(&item.variant_id)
                .bind(&item.size_label)
                .bind(item.quantity)
                .bind(item.added_at)
                .execute(&mut *tx)
                .await?;
                item
            }
        };

        tx.commit().await?;

        debug!(user_id = %user_id, product_id = %line.product_id, quantity = item.quantity,
               "Cart line upserted");

        Ok(item)
    }

    /// Sets a line's quantity. Zero or negative removes the line.
    pub async fn set_quantity(&self, user_id: &str, item_id: &str, quantity: i64) -> DbResult<()> {
        let cart = self.get_or_create(user_id).await?;

        if quantity <= 0 {
            return self.remove(user_id, item_id).await;
        }

        let result = sqlx::query("UPDATE cart_items SET quantity = ?3 WHERE id = ?1 AND cart_id = ?2")
            .bind(item_id)
            .bind(&cart.id)
            .bind(quantity)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", item_id));
        }

        Ok(())
    }

    /// Removes a line from the user's cart.
    pub async fn remove(&self, user_id: &str, item_id: &str) -> DbResult<()> {
        let cart = self.get_or_create(user_id).await?;

        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1 AND cart_id = ?2")
            .bind(item_id)
            .bind(&cart.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", item_id));
        }

        Ok(())
    }

    /// Imports a guest cart, merging line by line. Lines carrying only a
    /// size label are resolved to a variant when one matches.
    pub async fn merge(&self, user_id: &str, lines: &[CartLine]) -> DbResult<usize> {
        let mut merged = 0usize;

        for line in lines {
            let mut line = line.clone();
            if line.variant_id.is_none() {
                if let Some(size) = &line.size_label {
                    let variant_id: Option<String> = sqlx::query_scalar(
                        "SELECT id FROM product_variants WHERE product_id = ?1 AND size = ?2",
                    )
                    .bind(&line.product_id)
                    .bind(size)
                    .fetch_optional(&self.pool)
                    .await?;
                    line.variant_id = variant_id;
                }
            }
            self.add_item(user_id, &line).await?;
            merged += 1;
        }

        debug!(user_id = %user_id, merged, "Cart merge complete");

        Ok(merged)
    }

    /// Empties the user's cart. Called after an order confirms.
    pub async fn clear(&self, user_id: &str) -> DbResult<()> {
        let Some(cart) = self.get(user_id).await? else {
            return Ok(());
        };

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(&cart.id)
            .execute(&self.pool)
            .await?;

        debug!(user_id = %user_id, "Cart cleared");

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
