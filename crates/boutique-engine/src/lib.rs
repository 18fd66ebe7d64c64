//! # boutique-engine: Order Lifecycle & Reservation Engine
//!
//! The transactional service layer of the boutique order system. It owns
//! every state-changing operation on orders - checkout, fulfillment
//! selection, confirm, cancel, administrative transitions - and guarantees
//! that each one commits as a single SQLite transaction together with its
//! inventory side effects.
//!
//! ## Modules
//!
//! - [`service`] - [`OrderService`], the boundary operations
//! - [`reservation`] - atomic stock deduction/restoration (crate-private)
//! - [`checkout`] - order line resolution with frozen snapshots
//!   (crate-private)
//! - [`gateway`] - the payment processor boundary
//! - [`error`] - the caller-facing error taxonomy
//!
//! ## Guarantees
//!
//! - Stock never goes negative; deduction happens exactly once per order
//!   and restoration exactly once, guarded by durable flags re-read inside
//!   the same transaction that mutates them.
//! - An order's totals always satisfy `grand_total == subtotal +
//!   shipping_cost + payment_fee + tax_total` after every operation.
//! - Concurrent confirms over the same stock serialize; losers observe the
//!   winner's committed deduction and fail cleanly.

pub mod error;
pub mod gateway;
pub mod service;

mod checkout;
mod reservation;

pub use error::{EngineError, EngineResult};
pub use gateway::{
    GatewayError, InMemoryGateway, NoGateway, PaymentGateway, PaymentIntentStatus,
};
pub use service::OrderService;
