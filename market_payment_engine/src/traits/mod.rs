//! Behavioural contracts for the marketplace payment engine.
//!
//! This module defines the interfaces that storage backends and external collaborators must implement for the
//! engine to run on top of them.
//!
//! ## Storage traits
//! * [`MarketDatabase`] is the highest-level contract: the atomic, state-changing operations (checkout, intent
//!   creation, webhook reconciliation, fulfillment transitions). Every method is a single transaction against the
//!   store; partial effects are never observable.
//! * [`CartManagement`] covers per-buyer cart mutation and reads.
//! * [`OrderManagement`] covers order queries and filtered, stably-paginated search.
//! * [`SettlementManagement`] covers the settlement batch primitives and payout status updates.
//!
//! ## Collaborator traits
//! * [`PricingPolicy`] computes tax and shipping for a checkout (external service).
//! * [`PaymentProvider`] registers payment intents with the external provider.
//! * [`VendorPolicies`] resolves each vendor's commission configuration.
mod cart_management;
mod collaborators;
mod data_objects;
mod market_database;
mod order_management;
mod settlement_management;

pub use cart_management::{CartError, CartManagement};
pub use collaborators::{CollaboratorError, PaymentProvider, PricingPolicy, PricingQuote, ProviderIntent, VendorPolicies};
pub use data_objects::{NewSettlement, SettlementBatchResult, WebhookOutcome};
pub use market_database::{MarketDatabase, MarketError};
pub use order_management::{OrderManagement, OrderQueryError};
pub use settlement_management::{SettlementError, SettlementManagement};
