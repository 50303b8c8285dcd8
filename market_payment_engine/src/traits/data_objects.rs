use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db_types::{
    CommissionPolicy,
    IntentStatus,
    Order,
    PaymentIntent,
    Settlement,
    SettlementId,
    SettlementLine,
};

/// The result of applying a provider webhook event. Only `Applied` changes state; every other outcome is an
/// acknowledged no-op that the HTTP layer reports as a 2xx so the provider stops redelivering.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// The event moved the intent (and its order's payment track) to a terminal state.
    Applied { order: Order, intent: PaymentIntent },
    /// The event id has been processed before. Redelivery is a no-op.
    Duplicate { event_id: String },
    /// No intent matches the event's provider reference. Logged and acknowledged without state change.
    Orphaned { provider_ref: String },
    /// The intent already reached a different terminal state. First terminal state wins; the event is logged
    /// and dropped.
    Conflict { provider_ref: String, existing: IntentStatus },
}

/// A settlement about to be persisted. The backend drops any line whose order has already been settled for the
/// vendor (a concurrent run got there first) and recomputes the totals from the surviving lines using `policy`.
#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub settlement_id: SettlementId,
    pub vendor_code: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub policy: CommissionPolicy,
    pub lines: Vec<SettlementLine>,
}

/// Summary of one settlement batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementBatchResult {
    pub settlements: Vec<Settlement>,
    /// Orders settled by this run.
    pub orders_settled: usize,
    /// Candidate order-vendor lines skipped because another run settled them first.
    pub orders_skipped: usize,
}
