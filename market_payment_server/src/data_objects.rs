use std::fmt::Display;

use chrono::{DateTime, Utc};
use market_payment_engine::{
    db_types::{FulfillmentStatus, OrderId, PaymentStatus, SettlementStatus, ShippingAddress},
    order_objects::SortOrder,
};
use mpg_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub vendor_code: String,
}

fn default_currency() -> String {
    mpg_common::DEFAULT_CURRENCY_CODE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    pub status: FulfillmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRunRequest {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementStatusRequest {
    pub status: SettlementStatus,
}

/// Query string parameters for the order list/search endpoint. `q` is a free-text match against order ids and
/// skus; `from` and `to` bound `created_at` and take RFC3339 timestamps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<SortOrder>,
    pub q: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl OrderListQuery {
    pub fn to_filter(&self) -> market_payment_engine::order_objects::OrderQueryFilter {
        use market_payment_engine::order_objects::{OrderQueryFilter, Pagination, DEFAULT_PAGE_SIZE};
        let mut filter = OrderQueryFilter::default()
            .sorted(self.sort.unwrap_or_default())
            .paged(Pagination::new(self.page.unwrap_or(1), self.limit.unwrap_or(DEFAULT_PAGE_SIZE)));
        if let Some(q) = &self.q {
            filter = filter.with_search(q.clone());
        }
        if let Some(status) = self.payment_status {
            filter = filter.with_payment_status(status);
        }
        if let Some(status) = self.fulfillment_status {
            filter = filter.with_fulfillment_status(status);
        }
        if let Some(from) = self.from {
            filter = filter.since(from);
        }
        if let Some(to) = self.to {
            filter = filter.until(to);
        }
        filter
    }
}
