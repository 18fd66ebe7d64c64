//! # Repository Module
//!
//! Data access is organized by aggregate:
//!
//! - [`product`] - products and size variants, including the stock mutators
//!   the reservation engine composes into its transactions
//! - [`order`] - orders, line items, status history
//! - [`cart`] - per-user carts
//! - [`method`] - shipping and payment method catalogs
//! - [`address`] - per-user address book
//!
//! Pool-backed methods serve standalone reads and catalog management.
//! Methods taking `&mut SqliteConnection` run inside a transaction owned by
//! the caller (boutique-engine), which is how an order state change and its
//! inventory side effects commit as one unit.

pub mod address;
pub mod cart;
pub mod method;
pub mod order;
pub mod product;

pub use address::AddressRepository;
pub use cart::{CartLine, CartRepository};
pub use method::MethodRepository;
pub use order::{OrderPage, OrderRepository};
pub use product::ProductRepository;
