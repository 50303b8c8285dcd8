use chrono::{DateTime, TimeZone, Utc};
use market_payment_engine::{
    db_types::{
        Cart,
        CartItem,
        CommissionPolicy,
        FulfillmentStatus,
        IntentId,
        IntentStatus,
        NewOrder,
        NewOrderItem,
        NewPaymentIntent,
        Order,
        OrderId,
        OrderItem,
        PaymentIntent,
        PaymentStatus,
        ProviderEvent,
        Settlement,
        SettlementId,
        SettlementLine,
        SettlementStatus,
        ShippingAddress,
    },
    order_objects::{OrderQueryFilter, OrderSearchResult},
    traits::{
        CartError,
        CartManagement,
        CollaboratorError,
        MarketDatabase,
        MarketError,
        NewSettlement,
        OrderManagement,
        OrderQueryError,
        PaymentProvider,
        PricingPolicy,
        PricingQuote,
        ProviderIntent,
        SettlementError,
        SettlementManagement,
        VendorPolicies,
        WebhookOutcome,
    },
};
use mockall::mock;
use mpg_common::Money;
use sqlx::types::Json;

mock! {
    pub MarketDb {}
    impl CartManagement for MarketDb {
        async fn upsert_cart_item(&self, buyer_id: &str, item: CartItem) -> Result<Cart, CartError>;
        async fn remove_cart_item(&self, buyer_id: &str, sku: &str) -> Result<Cart, CartError>;
        async fn fetch_cart(&self, buyer_id: &str) -> Result<Cart, CartError>;
    }
    impl OrderManagement for MarketDb {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderQueryError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderQueryError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<OrderSearchResult, OrderQueryError>;
    }
    impl MarketDatabase for MarketDb {
        fn url(&self) -> &'static str;
        async fn checkout_cart(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, MarketError>;
        async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, MarketError>;
        async fn fetch_intent(&self, intent_id: &IntentId) -> Result<Option<PaymentIntent>, MarketError>;
        async fn apply_provider_event(&self, event: &ProviderEvent) -> Result<WebhookOutcome, MarketError>;
        async fn update_fulfillment_status(&self, order_id: &OrderId, new_status: FulfillmentStatus) -> Result<Order, MarketError>;
    }
}

mock! {
    pub SettlementDb {}
    impl SettlementManagement for SettlementDb {
        async fn fetch_settleable_lines(
            &self,
            period_start: DateTime<Utc>,
            period_end: DateTime<Utc>,
        ) -> Result<Vec<SettlementLine>, SettlementError>;
        async fn insert_settlement(&self, settlement: NewSettlement) -> Result<Option<Settlement>, SettlementError>;
        async fn fetch_settlement(
            &self,
            settlement_id: &SettlementId,
        ) -> Result<Option<(Settlement, Vec<SettlementLine>)>, SettlementError>;
        async fn update_settlement_status(
            &self,
            settlement_id: &SettlementId,
            new_status: SettlementStatus,
        ) -> Result<Settlement, SettlementError>;
    }
}

//----------------------------------------------  Collaborator stubs  -------------------------------------------------

/// Flat 10% tax and fixed shipping, so checkout totals in tests are easy to eyeball.
pub struct StubPricing;

impl PricingPolicy for StubPricing {
    async fn quote(
        &self,
        items: &[NewOrderItem],
        _address: &ShippingAddress,
        _currency: &str,
    ) -> Result<PricingQuote, CollaboratorError> {
        let subtotal = items.iter().map(|i| i.line_total()).sum::<Money>();
        Ok(PricingQuote { tax: subtotal.take_basis_points(1_000), shipping: Money::from(500) })
    }
}

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

pub struct StubVendors(pub CommissionPolicy);

impl VendorPolicies for StubVendors {
    async fn commission_policy(&self, _vendor_code: &str) -> Result<CommissionPolicy, CollaboratorError> {
        Ok(self.0)
    }
}

//----------------------------------------------  Canned records  -----------------------------------------------------

pub fn order(order_id: &str, buyer_id: &str) -> Order {
    Order {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        buyer_id: buyer_id.to_string(),
        currency: "SAR".to_string(),
        shipping_address: Json(ShippingAddress::new("1 King Fahd Rd", "Riyadh")),
        subtotal: Money::from(10_000),
        tax: Money::from(1_000),
        shipping: Money::from(500),
        total: Money::from(11_500),
        payment_status: PaymentStatus::Pending,
        fulfillment_status: FulfillmentStatus::Pending,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    }
}

pub fn order_item(order_id: &str, sku: &str, vendor_code: &str) -> OrderItem {
    OrderItem {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        sku: sku.to_string(),
        quantity: 2,
        unit_price: Money::from(5_000),
        vendor_code: vendor_code.to_string(),
    }
}

pub fn intent(intent_id: &str, order_id: &str) -> PaymentIntent {
    PaymentIntent {
        id: 1,
        intent_id: IntentId(intent_id.to_string()),
        order_id: OrderId(order_id.to_string()),
        provider: "stubpay".to_string(),
        provider_ref: format!("pr_{order_id}"),
        amount: Money::from(11_500),
        currency: "SAR".to_string(),
        status: IntentStatus::Created,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap(),
    }
}

pub fn settlement(settlement_id: &str, vendor_code: &str) -> Settlement {
    Settlement {
        id: 1,
        settlement_id: SettlementId(settlement_id.to_string()),
        vendor_code: vendor_code.to_string(),
        period_start: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        period_end: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
        status: SettlementStatus::Pending,
        gross_amount: Money::from(20_000),
        commission_amount: Money::from(500),
        net_amount: Money::from(19_500),
        created_at: Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap(),
    }
}

pub fn line(order_id: &str, vendor_code: &str, gross: i64) -> SettlementLine {
    SettlementLine {
        order_id: OrderId(order_id.to_string()),
        vendor_code: vendor_code.to_string(),
        vendor_gross: Money::from(gross),
    }
}
