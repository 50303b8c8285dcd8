use log::*;
use market_payment_engine::{
    db_types::{NewOrderItem, ShippingAddress},
    traits::{CollaboratorError, PricingPolicy, PricingQuote},
};
use mpg_common::Money;
use serde::Serialize;

use super::{http_client, RETRY_BACKOFF};
use crate::{config::UpstreamConfig, errors::ServerError};

/// The pricing collaborator. Remote when `MPG_PRICING_URL` is set, otherwise a flat-rate fallback computed
/// locally from the configured tax rate and shipping fee.
#[derive(Clone)]
pub enum PricingClient {
    Remote(RemotePricing),
    FlatRate(FlatRatePricing),
}

impl PricingClient {
    pub fn try_new(config: &UpstreamConfig) -> Result<Self, ServerError> {
        match &config.pricing_url {
            Some(url) => Ok(Self::Remote(RemotePricing::try_new(url, config.timeout_ms)?)),
            None => Ok(Self::FlatRate(FlatRatePricing::new(config.tax_basis_points, config.flat_shipping))),
        }
    }
}

impl PricingPolicy for PricingClient {
    async fn quote(
        &self,
        items: &[NewOrderItem],
        address: &ShippingAddress,
        currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        match self {
            Self::Remote(remote) => remote.quote(items, address, currency).await,
            Self::FlatRate(flat) => flat.quote(items, address, currency).await,
        }
    }
}

//-----------------------------------------------  RemotePricing  -----------------------------------------------------

#[derive(Serialize)]
struct QuoteRequest<'a> {
    items: &'a [NewOrderItem],
    shipping_address: &'a ShippingAddress,
    currency: &'a str,
}

#[derive(Clone)]
pub struct RemotePricing {
    client: reqwest::Client,
    url: String,
}

impl RemotePricing {
    pub fn try_new(url: &str, timeout_ms: u64) -> Result<Self, ServerError> {
        Ok(Self { client: http_client(timeout_ms)?, url: url.to_string() })
    }

    async fn post_quote(&self, request: &QuoteRequest<'_>) -> Result<PricingQuote, reqwest::Error> {
        self.client.post(&self.url).json(request).send().await?.error_for_status()?.json::<PricingQuote>().await
    }
}

impl PricingPolicy for RemotePricing {
    async fn quote(
        &self,
        items: &[NewOrderItem],
        address: &ShippingAddress,
        currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        let request = QuoteRequest { items, shipping_address: address, currency };
        let first = match self.post_quote(&request).await {
            Ok(quote) => return Ok(quote),
            Err(e) => e,
        };
        if first.is_status() {
            return Err(CollaboratorError::Rejected(first.to_string()));
        }
        debug!("📞️ Pricing service call failed ({first}). Retrying once.");
        tokio::time::sleep(RETRY_BACKOFF).await;
        match self.post_quote(&request).await {
            Ok(quote) => Ok(quote),
            Err(e) if e.is_status() => Err(CollaboratorError::Rejected(e.to_string())),
            Err(e) => {
                warn!("📞️ Pricing service is unavailable. {e}");
                Err(CollaboratorError::Unavailable(e.to_string()))
            },
        }
    }
}

//----------------------------------------------  FlatRatePricing  ----------------------------------------------------

/// Tax as a fixed fraction of the subtotal plus a flat shipping fee. Good enough for development and for
/// deployments that do their real tax accounting downstream.
#[derive(Clone, Copy)]
pub struct FlatRatePricing {
    tax_basis_points: i64,
    flat_shipping: Money,
}

impl FlatRatePricing {
    pub fn new(tax_basis_points: i64, flat_shipping: i64) -> Self {
        Self { tax_basis_points, flat_shipping: Money::from(flat_shipping) }
    }
}

impl PricingPolicy for FlatRatePricing {
    async fn quote(
        &self,
        items: &[NewOrderItem],
        _address: &ShippingAddress,
        _currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        let subtotal = items.iter().map(|i| i.line_total()).sum::<Money>();
        let tax = subtotal.take_basis_points(self.tax_basis_points);
        Ok(PricingQuote { tax, shipping: self.flat_shipping })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn item(quantity: i64, unit_price: i64) -> NewOrderItem {
        NewOrderItem {
            sku: "SKU-1".to_string(),
            quantity,
            unit_price: Money::from(unit_price),
            vendor_code: "acme".to_string(),
        }
    }

    #[tokio::test]
    async fn flat_rate_quote() {
        let pricing = FlatRatePricing::new(1_500, 2_500);
        let address = ShippingAddress::new("1 King Fahd Rd", "Riyadh");
        let quote = pricing.quote(&[item(2, 10_000), item(1, 5_000)], &address, "SAR").await.unwrap();
        // 15% of 25,000
        assert_eq!(quote.tax, Money::from(3_750));
        assert_eq!(quote.shipping, Money::from(2_500));
    }
}
