use mpg_common::Money;
use thiserror::Error;

use crate::db_types::{CommissionPolicy, NewOrderItem, OrderId, ShippingAddress};

/// Tax and shipping for a prospective order, as computed by the external pricing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PricingQuote {
    pub tax: Money,
    pub shipping: Money,
}

/// The provider-side handle for a freshly registered payment intent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderIntent {
    pub provider_ref: String,
    pub client_secret: String,
}

/// Computes tax and shipping for a checkout. Implementations must carry a bounded timeout and a single retry;
/// on exhaustion they return [`CollaboratorError::Unavailable`] rather than hanging.
#[allow(async_fn_in_trait)]
pub trait PricingPolicy {
    async fn quote(
        &self,
        items: &[NewOrderItem],
        address: &ShippingAddress,
        currency: &str,
    ) -> Result<PricingQuote, CollaboratorError>;
}

/// Registers payment intents with the external payment provider.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    fn name(&self) -> &str;

    async fn register_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError>;
}

/// Resolves each vendor's commission configuration. Called once per vendor per settlement run.
#[allow(async_fn_in_trait)]
pub trait VendorPolicies {
    async fn commission_policy(&self, vendor_code: &str) -> Result<CommissionPolicy, CollaboratorError>;
}

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Upstream service did not respond in time. {0}")]
    Unavailable(String),
    #[error("Upstream service rejected the request. {0}")]
    Rejected(String),
}
