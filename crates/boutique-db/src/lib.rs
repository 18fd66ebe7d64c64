//! # boutique-db: Database Layer
//!
//! SQLite persistence for the boutique order engine.
//!
//! ## Responsibilities
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          boutique-db                                    │
//! │                                                                         │
//! │  ✅ RESPONSIBILITIES                   ❌ NOT RESPONSIBLE FOR           │
//! │  ──────────────────────                ─────────────────────────        │
//! │  • Connection pool management          • Business rules (core)          │
//! │  • SQL query execution                 • Transaction orchestration      │
//! │  • Schema migrations                     (engine)                       │
//! │  • Repository implementations          • API surface                    │
//! │  • WAL mode + busy timeout                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    AddressRepository, CartLine, CartRepository, MethodRepository, OrderPage, OrderRepository,
    ProductRepository,
};
