//! # Fulfillment Method Repository
//!
//! Lookup of the shipping and payment method catalogs. The engine only ever
//! assigns active methods to orders; inactive rows stay resolvable through
//! order history joins but are never offered for selection.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use boutique_core::{PaymentMethod, ShippingMethod};

const SHIPPING_COLUMNS: &str = "id, code, name, description, base_cost_cents, \
     transit_days_min, transit_days_max, is_active, supports_cod, requires_pickup";

const PAYMENT_COLUMNS: &str = "id, code, name, kind, instructions, gateway_provider, \
     is_active, fee_percent_bps, fee_fixed_cents, supports_refund";

/// Repository for shipping and payment method lookups.
#[derive(Debug, Clone)]
pub struct MethodRepository {
    pool: SqlitePool,
}

impl MethodRepository {
    /// Creates a new MethodRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MethodRepository { pool }
    }

    /// Lists active shipping methods sorted by name.
    pub async fn list_shipping(&self) -> DbResult<Vec<ShippingMethod>> {
        let methods = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_methods WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(methods)
    }

    /// Lists active payment methods sorted by name.
    pub async fn list_payment(&self) -> DbResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_methods WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(methods)
    }

    /// Gets an active shipping method by id.
    pub async fn active_shipping(&self, id: &str) -> DbResult<Option<ShippingMethod>> {
        let method = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_methods WHERE id = ?1 AND is_active = 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }

    /// Gets an active payment method by id.
    pub async fn active_payment(&self, id: &str) -> DbResult<Option<PaymentMethod>> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_methods WHERE id = ?1 AND is_active = 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }

    /// Gets an active shipping method by code.
    pub async fn shipping_by_code(&self, code: &str) -> DbResult<Option<ShippingMethod>> {
        let method = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_methods WHERE code = ?1 AND is_active = 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }

    /// Gets an active payment method by code.
    pub async fn payment_by_code(&self, code: &str) -> DbResult<Option<PaymentMethod>> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_methods WHERE code = ?1 AND is_active = 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }

    /// Inserts a shipping method (operator tooling, seeds).
    pub async fn insert_shipping(&self, method: &ShippingMethod) -> DbResult<()> {
        debug!(code = %method.code, "Inserting shipping method");

        sqlx::query(
            r#"
            INSERT INTO shipping_methods (
                id, code, name, description, base_cost_cents,
                transit_days_min, transit_days_max, is_active, supports_cod, requires_pickup
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&method.id)
        .bind(&method.code)
        .bind(&method.name)
        .bind(&method.description)
        .bind(method.base_cost_cents)
        .bind(method.transit_days_min)
        .bind(method.transit_days_max)
        .bind(method.is_active)
        .bind(method.supports_cod)
        .bind(method.requires_pickup)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a payment method (operator tooling, seeds).
    pub async fn insert_payment(&self, method: &PaymentMethod) -> DbResult<()> {
        debug!(code = %method.code, "Inserting payment method");

        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                id, code, name, kind, instructions, gateway_provider,
                is_active, fee_percent_bps, fee_fixed_cents, supports_refund
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&method.id)
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.kind)
        .bind(&method.instructions)
        .bind(&method.gateway_provider)
        .bind(method.is_active)
        .bind(method.fee_percent_bps)
        .bind(method.fee_fixed_cents)
        .bind(method.supports_refund)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transactional reads (engine)
    // =========================================================================

    /// Loads an active shipping method inside the caller's transaction.
    pub async fn load_active_shipping(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<ShippingMethod>> {
        let method = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_methods WHERE id = ?1 AND is_active = 1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(method)
    }

    /// Loads an active payment method inside the caller's transaction.
    pub async fn load_active_payment(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<PaymentMethod>> {
        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_methods WHERE id = ?1 AND is_active = 1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(method)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use boutique_core::PaymentMethodKind;

    #[tokio::test]
    async fn test_seeded_catalog_loads() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.methods();

        let shipping = repo.list_shipping().await.unwrap();
        assert!(shipping.iter().any(|m| m.code == "standard"));
        assert!(shipping.iter().any(|m| m.code == "pickup" && m.requires_pickup));

        let payment = repo.list_payment().await.unwrap();
        let cod = payment.iter().find(|m| m.code == "cod").unwrap();
        assert_eq!(cod.kind, PaymentMethodKind::CashOnDelivery);
        let gateway = payment.iter().find(|m| m.code == "card_gateway").unwrap();
        assert_eq!(gateway.kind, PaymentMethodKind::Gateway);
        assert_eq!(gateway.fee_percent_bps, 250);
    }

    #[tokio::test]
    async fn test_lookup_by_code_and_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.methods();

        let standard = repo.shipping_by_code("standard").await.unwrap().unwrap();
        let by_id = repo.active_shipping(&standard.id).await.unwrap().unwrap();
        assert_eq!(by_id.code, "standard");

        assert!(repo.active_payment("missing").await.unwrap().is_none());
    }
}
