//! # Domain Types
//!
//! Core domain types for the boutique order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                 Checkout                  Lifecycle            │
//! │  ┌───────────────┐       ┌───────────────┐         ┌──────────────────┐ │
//! │  │ Product       │       │ Cart          │         │ Order            │ │
//! │  │ ProductVariant│──────►│ CartItem      │────────►│ OrderItem        │ │
//! │  └───────────────┘       └───────────────┘         │ OrderStatusHistory│ │
//! │                                                    └──────────────────┘ │
//! │  Fulfillment catalog: ShippingMethod, PaymentMethod, Address            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, code) - human-readable
//!
//! ## Snapshot Pattern
//! Order items cache name/sku/price and the order caches the shipping
//! address as an immutable copy taken at assignment time. Later catalog or
//! address edits never change what the customer agreed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{FeeRate, Money};
use crate::DEFAULT_CURRENCY;

// =============================================================================
// Product
// =============================================================================

/// A product available for purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Aggregate stock. Equals the sum of variant stock whenever the product
    /// carries size variants; directly authoritative otherwise.
    pub stock: i64,

    /// Whether the product can be purchased (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money value.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A per-size stock-keeping unit beneath a product.
///
/// `(product_id, size)` is unique. Variant stock is decremented and
/// incremented only by the stock reservation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    /// Size label, e.g. "M" or "42".
    pub size: String,
    /// Units on hand. Never negative.
    pub stock: i64,
    /// Optional variant-level SKU.
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Shipping Method
// =============================================================================

/// A way of getting an order to the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ShippingMethod {
    pub id: String,
    /// Business code, unique (e.g. "standard", "pickup").
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Flat cost added to the order subtotal.
    pub base_cost_cents: i64,
    pub transit_days_min: i64,
    pub transit_days_max: i64,
    pub is_active: bool,
    /// Whether cash-on-delivery payment is accepted on this method.
    pub supports_cod: bool,
    /// Pickup methods need no shipping address on the order.
    pub requires_pickup: bool,
}

impl ShippingMethod {
    /// Returns the base cost as a Money value.
    #[inline]
    pub fn base_cost(&self) -> Money {
        Money::from_cents(self.base_cost_cents)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a payment method settles.
///
/// A closed set: the post-confirm order status is derived from this tag via
/// an explicit mapping table (see [`crate::status::post_confirm_status`]),
/// never from string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    /// External payment processor (card, wallet).
    Gateway,
    /// Paid in cash when the order arrives.
    CashOnDelivery,
    /// Settled out of band (bank transfer, in-store).
    Offline,
}

/// A way of paying for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: String,
    /// Business code, unique (e.g. "cod", "card_gateway").
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    /// Customer-facing settlement instructions.
    pub instructions: Option<String>,
    /// Processor identifier for gateway methods.
    pub gateway_provider: Option<String>,
    pub is_active: bool,
    /// Percentage surcharge in basis points (250 = 2.50%).
    pub fee_percent_bps: u32,
    /// Fixed surcharge in cents.
    pub fee_fixed_cents: i64,
    pub supports_refund: bool,
}

impl PaymentMethod {
    /// Returns the percentage surcharge as a FeeRate.
    #[inline]
    pub fn fee_rate(&self) -> FeeRate {
        FeeRate::from_bps(self.fee_percent_bps)
    }

    /// Returns the fixed surcharge as Money.
    #[inline]
    pub fn fee_fixed(&self) -> Money {
        Money::from_cents(self.fee_fixed_cents)
    }
}

// =============================================================================
// Address
// =============================================================================

/// A customer shipping address. Owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub full_name: Option<String>,
    /// Free-form label ("Home", "Office").
    pub label: Option<String>,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    /// ISO-3166 alpha-2.
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of an address, frozen on the order at assignment time.
///
/// Orders keep this snapshot even if the source address is later edited or
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: Option<String>,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

impl From<&Address> for AddressSnapshot {
    fn from(addr: &Address) -> Self {
        AddressSnapshot {
            full_name: addr.full_name.clone(),
            phone: addr.phone.clone(),
            line1: addr.line1.clone(),
            line2: addr.line2.clone(),
            city: addr.city.clone(),
            state: addr.state.clone(),
            postal_code: addr.postal_code.clone(),
            country: addr.country.clone(),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle state of an order.
///
/// ```text
/// DRAFT ──► PENDING_PAYMENT ──► {PAID, AWAITING_DISPATCH} ──► SHIPPED ──► DELIVERED
///   │              │                      │                      │
///   └──────────────┴──────────┬───────────┴──────────────────────┘
///                             ▼
///                  CANCELED / REFUNDED          (terminal, like DELIVERED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Mutable order, no stock impact yet.
    Draft,
    /// Committed to inventory, waiting for payment.
    PendingPayment,
    /// Payment received.
    Paid,
    /// Ready for the courier.
    AwaitingDispatch,
    /// Handed to the courier.
    Shipped,
    /// Received by the customer. Terminal.
    Delivered,
    /// Canceled. Terminal.
    Canceled,
    /// Refunded after payment. Terminal.
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order. Never physically deleted (audit requirement).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub currency: String,

    pub total_items: i64,
    pub subtotal_cents: i64,
    pub shipping_cost_cents: i64,
    pub payment_fee_cents: i64,
    pub tax_total_cents: i64,
    pub grand_total_cents: i64,

    pub shipping_method_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub shipping_address_id: Option<String>,

    /// JSON-serialized [`AddressSnapshot`], frozen when the address was set.
    pub shipping_address_snapshot: Option<String>,

    pub placed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,

    /// Payment-processor reference (e.g. an intent id).
    pub external_payment_id: Option<String>,
    /// Last status reported by the processor. Informational only: orders are
    /// never advanced to PAID from this field.
    pub external_payment_status: Option<String>,

    pub notes: Option<String>,
    pub customer_note: Option<String>,

    /// Durable idempotency guard: stock has been deducted for this order.
    pub inventory_deducted: bool,
    /// Durable idempotency guard: a prior deduction has been restored.
    pub inventory_restored: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty draft order for a user.
    pub fn draft(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: OrderStatus::Draft,
            currency: DEFAULT_CURRENCY.to_string(),
            total_items: 0,
            subtotal_cents: 0,
            shipping_cost_cents: 0,
            payment_fee_cents: 0,
            tax_total_cents: 0,
            grand_total_cents: 0,
            shipping_method_id: None,
            payment_method_id: None,
            shipping_address_id: None,
            shipping_address_snapshot: None,
            placed_at: None,
            paid_at: None,
            canceled_at: None,
            external_payment_id: None,
            external_payment_status: None,
            notes: None,
            customer_note: None,
            inventory_deducted: false,
            inventory_restored: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the grand total as Money.
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    /// Parses the frozen address snapshot, if one was taken.
    pub fn address_snapshot(&self) -> Option<AddressSnapshot> {
        self.shipping_address_snapshot
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
///
/// Uses the snapshot pattern to freeze product data at purchase time.
/// Immutable once the order leaves DRAFT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Set when the line targets a specific size variant.
    pub variant_id: Option<String>,
    /// Product name at purchase time (frozen).
    pub name_snapshot: String,
    /// SKU at purchase time (frozen).
    pub sku_snapshot: String,
    /// Unit price in cents at purchase time (frozen).
    pub unit_price_cents: i64,
    /// Units ordered, at least 1.
    pub quantity: i64,
    /// unit_price × quantity.
    pub line_subtotal_cents: i64,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line subtotal as Money.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        Money::from_cents(self.line_subtotal_cents)
    }
}

// =============================================================================
// Order Status History
// =============================================================================

/// One row in the append-only status audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderStatusHistory {
    pub id: String,
    pub order_id: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    /// User who triggered the change, when known.
    pub changed_by: Option<String>,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Cart
// =============================================================================

/// A user's cart. One per user; ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A desired (product, variant-or-size, quantity) tuple.
///
/// Adding the same tuple again merges quantities instead of duplicating the
/// row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Raw size label when no variant was resolved at add time.
    pub size_label: Option<String>,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Input
// =============================================================================

/// One requested line at order-start time.
///
/// Variant resolution order: `variant_id` when given, otherwise a
/// `size_label` lookup. A size-label miss is not an error - the line is
/// treated as variant-less against the base product, since not all products
/// carry variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub size_label: Option<String>,
    pub quantity: i64,
}

// =============================================================================
// Listing Filter
// =============================================================================

/// Filters for the administrative order listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Free-text match against order id and notes.
    pub query: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    /// 1-based page number; unpaged when absent.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// =============================================================================
// Unit Tests
// =============================================================================
