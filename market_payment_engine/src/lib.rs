//! Market Payment Engine
//!
//! The Market Payment Engine carries an order through its full lifecycle in a multi-vendor marketplace: cart,
//! checkout, payment intent, provider webhook reconciliation, fulfillment and finally per-vendor settlement.
//! This library contains the core logic and is HTTP-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). You should never need to access the database directly;
//!    use the public API layer instead. The exception is the data types shared with storage, which live in
//!    [`mod@db_types`] and are public.
//! 2. The public API layer ([`mod@mpe_api`]): [`CartApi`], [`OrderFlowApi`], [`PaymentApi`] and
//!    [`SettlementApi`]. Backends implement the traits in [`mod@traits`] to plug in underneath them, and the
//!    external collaborators (pricing, payment provider, vendor policies) are traits at the same seam.
//!
//! The engine also emits events (order paid, payment failed, settlement created) through a small stateless hook
//! system, so callers can react to state changes without reaching into the engine.
pub mod db_types;
pub mod events;
pub mod helpers;
mod mpe_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteDatabaseError};

pub use mpe_api::{
    cart_api::CartApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
    settlement_api::SettlementApi,
};
