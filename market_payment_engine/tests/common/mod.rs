//! Shared fixtures for the engine integration tests. Each test gets its own in-memory database.
#![allow(dead_code)]

use market_payment_engine::{
    db_types::{CartItem, CommissionPolicy, NewOrderItem, OrderId, ShippingAddress},
    traits::{CollaboratorError, PaymentProvider, PricingPolicy, PricingQuote, ProviderIntent, VendorPolicies},
    SqliteDatabase,
};
use mpg_common::Money;

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init().ok();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Failed to create in-memory database")
}

pub fn item(sku: &str, quantity: i64, unit_price: i64, vendor_code: &str) -> CartItem {
    CartItem { sku: sku.to_string(), quantity, unit_price: Money::from(unit_price), vendor_code: vendor_code.to_string() }
}

pub fn address() -> ShippingAddress {
    ShippingAddress::new("1 King Fahd Rd", "Riyadh")
}

/// A pricing collaborator that returns the same quote for every checkout.
pub struct FixedPricing {
    pub tax: Money,
    pub shipping: Money,
}

impl FixedPricing {
    pub fn new(tax: i64, shipping: i64) -> Self {
        Self { tax: Money::from(tax), shipping: Money::from(shipping) }
    }
}

impl PricingPolicy for FixedPricing {
    async fn quote(
        &self,
        _items: &[NewOrderItem],
        _address: &ShippingAddress,
        _currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        Ok(PricingQuote { tax: self.tax, shipping: self.shipping })
    }
}

/// A pricing collaborator that takes its time answering, holding checkouts open long enough for them to overlap.
pub struct SlowPricing {
    pub delay_ms: u64,
}

impl PricingPolicy for SlowPricing {
    async fn quote(
        &self,
        _items: &[NewOrderItem],
        _address: &ShippingAddress,
        _currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Ok(PricingQuote { tax: Money::from(0), shipping: Money::from(0) })
    }
}

/// A pricing collaborator that is always down.
pub struct UnavailablePricing;

impl PricingPolicy for UnavailablePricing {
    async fn quote(
        &self,
        _items: &[NewOrderItem],
        _address: &ShippingAddress,
        _currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        Err(CollaboratorError::Unavailable("pricing service timed out".to_string()))
    }
}

/// A payment provider that registers every intent with a deterministic provider reference.
pub struct StubProvider;

impl PaymentProvider for StubProvider {
    fn name(&self) -> &str {
        "stubpay"
    }

    async fn register_intent(
        &self,
        order_id: &OrderId,
        _amount: Money,
        _currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError> {
        Ok(ProviderIntent { provider_ref: format!("pr_{order_id}"), client_secret: "cs_test".to_string() })
    }
}

/// A payment provider that counts how many intents it has been asked to register.
pub struct CountingProvider {
    pub calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl PaymentProvider for CountingProvider {
    fn name(&self) -> &str {
        "countpay"
    }

    async fn register_intent(
        &self,
        order_id: &OrderId,
        _amount: Money,
        _currency: &str,
    ) -> Result<ProviderIntent, CollaboratorError> {
        let _ = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(ProviderIntent { provider_ref: format!("pr_{order_id}"), client_secret: "cs_test".to_string() })
    }
}

/// Applies the same commission policy to every vendor.
pub struct StubVendors(pub CommissionPolicy);

impl VendorPolicies for StubVendors {
    async fn commission_policy(&self, _vendor_code: &str) -> Result<CommissionPolicy, CollaboratorError> {
        Ok(self.0)
    }
}
