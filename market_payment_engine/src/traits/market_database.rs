use thiserror::Error;

use crate::{
    db_types::{
        FulfillmentStatus,
        IntentId,
        NewOrder,
        NewOrderItem,
        NewPaymentIntent,
        Order,
        OrderId,
        PaymentIntent,
        ProviderEvent,
    },
    traits::{CartError, CartManagement, CollaboratorError, OrderManagement, OrderQueryError, SettlementError, WebhookOutcome},
};

/// The highest-level contract a storage backend must satisfy. Every method here is one atomic unit of work:
/// concurrent checkouts by the same buyer, concurrent webhook deliveries for the same intent, and concurrent
/// fulfillment updates are serialized inside the backend, never by the (stateless) API layer above it.
#[allow(async_fn_in_trait)]
pub trait MarketDatabase: CartManagement + OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Persists the order with its line items and clears the buyer's cart, all in a single transaction.
    /// Subsequent reads either see the order and an empty cart, or neither.
    async fn checkout_cart(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, MarketError>;

    /// Creates a payment intent for the order and moves the order's payment track to `Processing`.
    ///
    /// Fails with [`MarketError::OrderNotPending`] unless the order's payment status is `Pending`, and with
    /// [`MarketError::IntentAlreadyActive`] if a non-terminal intent already exists for the order. Both checks
    /// run inside the same transaction as the insert.
    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, MarketError>;

    async fn fetch_intent(&self, intent_id: &IntentId) -> Result<Option<PaymentIntent>, MarketError>;

    /// Applies a provider webhook event: records the event id (the idempotency key), resolves the intent by
    /// provider reference, and moves intent and order to their terminal payment states in the same transaction.
    ///
    /// The signature has already been verified by the caller. This method never fails on redelivered, orphaned
    /// or conflicting events; those come back as the corresponding [`WebhookOutcome`] variant.
    async fn apply_provider_event(&self, event: &ProviderEvent) -> Result<WebhookOutcome, MarketError>;

    /// Transitions the order's fulfillment track.
    ///
    /// Only forward transitions are permitted (see [`FulfillmentStatus::can_transition_to`]). Re-applying the
    /// current status is an idempotent no-op returning the unchanged order. Anything else fails with
    /// [`MarketError::InvalidTransition`].
    async fn update_fulfillment_status(
        &self,
        order_id: &OrderId,
        new_status: FulfillmentStatus,
    ) -> Result<Order, MarketError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Cannot check out an empty cart for buyer {0}")]
    EmptyCart(String),
    #[error("Invalid shipping address: {0}")]
    InvalidAddress(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested payment intent {0} does not exist")]
    IntentNotFound(IntentId),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Order {0} is not awaiting payment")]
    OrderNotPending(OrderId),
    #[error("A payment intent is already active for order {0}")]
    IntentAlreadyActive(OrderId),
    #[error("Fulfillment cannot move from {from} to {to}")]
    InvalidTransition { from: FulfillmentStatus, to: FulfillmentStatus },
    #[error("{0}")]
    Upstream(#[from] CollaboratorError),
    #[error("{0}")]
    Cart(#[from] CartError),
    #[error("{0}")]
    Query(#[from] OrderQueryError),
    #[error("{0}")]
    Settlement(#[from] SettlementError),
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        MarketError::DatabaseError(e.to_string())
    }
}
