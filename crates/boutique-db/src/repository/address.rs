//! # Address Repository
//!
//! Per-user address book. Orders reference an address by id but always keep
//! their own frozen snapshot, so rows here stay freely editable.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use boutique_core::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, label, phone, line1, line2, city, \
     state, postal_code, country, is_default, created_at, updated_at";

/// Repository for address database operations.
#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    /// Creates a new AddressRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Lists a user's addresses, default first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE user_id = ?1 ORDER BY is_default DESC, updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }

    /// Gets an address scoped to its owner.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    /// Inserts an address. A new default displaces the previous one.
    pub async fn insert(&self, address: &Address) -> DbResult<()> {
        debug!(user_id = %address.user_id, city = %address.city, "Inserting address");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, user_id, full_name, label, phone, line1, line2,
                city, state, postal_code, country, is_default,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.full_name)
        .bind(&address.label)
        .bind(&address.phone)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ?1 AND id != ?2")
                .bind(&address.user_id)
                .bind(&address.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Updates an address owned by the user. A new default displaces the
    /// previous one.
    pub async fn update(&self, address: &Address) -> DbResult<()> {
        debug!(id = %address.id, "Updating address");

        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE addresses SET
                full_name = ?3, label = ?4, phone = ?5, line1 = ?6, line2 = ?7,
                city = ?8, state = ?9, postal_code = ?10, country = ?11,
                is_default = ?12, updated_at = ?13
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.full_name)
        .bind(&address.label)
        .bind(&address.phone)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", &address.id));
        }

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ?1 AND id != ?2")
                .bind(&address.user_id)
                .bind(&address.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Deletes an address owned by the user. Order snapshots are unaffected.
    pub async fn delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", id));
        }

        Ok(())
    }

    /// Loads an owner-scoped address inside the caller's transaction.
    pub async fn load_for_user(
        conn: &mut SqliteConnection,
        id: &str,
        user_id: &str,
    ) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        Ok(address)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
