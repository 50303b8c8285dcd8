use crate::db_types::{IntentStatus, Order, PaymentIntent, Settlement};

/// Fired when a provider webhook moves an order's payment track to `Paid`.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub intent: PaymentIntent,
}

impl OrderPaidEvent {
    pub fn new(order: Order, intent: PaymentIntent) -> Self {
        Self { order, intent }
    }
}

/// Fired when a provider webhook moves an intent to `Failed`. The order stays available for a fresh intent.
#[derive(Debug, Clone)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub intent: PaymentIntent,
    pub status: IntentStatus,
}

impl PaymentFailedEvent {
    pub fn new(order: Order, intent: PaymentIntent) -> Self {
        let status = intent.status;
        Self { order, intent, status }
    }
}

/// Fired for each settlement a batch run creates.
#[derive(Debug, Clone)]
pub struct SettlementCreatedEvent {
    pub settlement: Settlement,
}

impl SettlementCreatedEvent {
    pub fn new(settlement: Settlement) -> Self {
        Self { settlement }
    }
}
